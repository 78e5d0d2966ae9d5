//! Views of the client and where the session state sends the user.

use crate::auth::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Feed,
    Account,
    Login,
    CreateAccount,
}

impl Route {
    /// Resolve a path. Unknown paths land on the feed.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/account" => Route::Account,
            "/login" => Route::Login,
            "/create-account" => Route::CreateAccount,
            _ => Route::Feed,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Feed => "/",
            Route::Account => "/account",
            Route::Login => "/login",
            Route::CreateAccount => "/create-account",
        }
    }

    /// Views that need a token
    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Account)
    }

    /// Where a visit actually ends up given the current state
    pub fn guard(self, state: &AuthState) -> Self {
        if self.requires_auth() && !state.is_authenticated() {
            Route::Login
        } else {
            self
        }
    }

    pub fn after_login() -> Self {
        Route::Feed
    }

    /// Account creation does not log in, so the user goes to the login view
    pub fn after_account_created() -> Self {
        Route::Login
    }

    pub fn after_logout() -> Self {
        Route::Login
    }
}
