//! Shared result alias.
//!
//! Each crate defines its own error enum; fallible operations return
//! `Result<T, ThatError>`, which carries a `rootcause::Report` so the
//! failure keeps its origin as it moves up through the store, the agent
//! and the HTTP layer.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
