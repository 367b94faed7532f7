//! Core types and utilities for the chatline service.
//!
//! This crate provides the session identifier shared by the conversation
//! store and the HTTP layer, plus the `Result` alias used across crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId};
