//! HTTP adapter for vocstream.
//!
//! Thin wrappers only: handlers parse requests, call the speech
//! controllers, and shape responses. All pipeline behaviour lives in
//! `vocstream-voice`; the service objects are constructed once at
//! startup and injected through [`state::AppState`].

pub mod bootstrap;
pub mod chat_worker;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use bootstrap::serve;
pub use routes::build_router;
pub use state::{AppState, ServerContext};
