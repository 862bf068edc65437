//! Conversation sessions
//!
//! History is kept in memory only and is bounded per session.

mod store;
mod types;

pub use store::SessionStore;
pub use types::{Role, Turn};
