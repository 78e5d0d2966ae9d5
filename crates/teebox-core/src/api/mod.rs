//! REST API client module for the teebox server.
//!
//! This module provides the `ApiClient` for the login, account creation
//! and profile endpoints. Authenticated requests carry the session token
//! as a bearer `Authorization` header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
