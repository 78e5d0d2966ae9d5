//! Authentication module for managing the session token.
//!
//! This module provides:
//! - `SessionManager`: login, logout, profile fetch and account creation
//! - `AuthState`: the explicit logged-in / logged-out state
//! - `TokenStore`: where the token is kept between runs (file, OS keychain
//!   or memory)
//!
//! Tokens are never refreshed; a token the server rejects is discarded.

pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use error::SessionError;
pub use session::{AuthState, SessionManager};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use token::SessionToken;
