//! Data models exchanged with the teebox API.
//!
//! - `Credentials`: login form submission
//! - `NewAccount`: account creation submission
//! - `UserProfile`: the account as the server reports it

pub mod user;

pub use user::{Credentials, NewAccount, UserProfile};
