//! chatline HTTP service.
//!
//! Exposes the chat agent over a small JSON API: `POST /chat`,
//! `POST /clear`, `GET /status` and a liveness route at `/`.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::router;
pub use state::AppState;
