//! teebox core - session handling for the teebox account screens.
//!
//! Front ends build a [`SessionManager`] from an [`ApiClient`] and a
//! [`TokenStore`], then call its operations and match on [`SessionError`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod route;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthState, FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionError, SessionManager,
    SessionToken, TokenStore,
};
pub use config::{Config, TokenBackend};
pub use models::{Credentials, NewAccount, UserProfile};
pub use route::Route;
