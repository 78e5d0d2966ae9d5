use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::models::{Credentials, NewAccount, UserProfile};

use super::{SessionError, SessionToken, TokenStore};

const VALIDATION_MESSAGE: &str = "username and password required";
const LOGIN_FAILED: &str = "Login failed";
const CREATE_FAILED: &str = "Failed to create user";
const PROFILE_FAILED: &str = "Failed to fetch user data";

/// Whether the client currently holds a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated(SessionToken),
}

impl AuthState {
    /// Transition taken on a successful login. Replaces any previous token.
    pub fn authenticate(self, token: SessionToken) -> Self {
        AuthState::Authenticated(token)
    }

    /// Transition taken on logout or when the server rejects the token.
    pub fn sign_out(self) -> Self {
        AuthState::Unauthenticated
    }

    pub fn token(&self) -> Option<&SessionToken> {
        match self {
            AuthState::Authenticated(token) => Some(token),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Owns the session token lifecycle and gates the profile endpoint.
///
/// The in-process state is authoritative; the store mirrors it so that a
/// later process starts in the same state.
pub struct SessionManager<S: TokenStore> {
    api: ApiClient,
    store: S,
    state: AuthState,
}

impl<S: TokenStore> SessionManager<S> {
    /// Build a manager whose initial state follows whatever the store holds.
    /// An unreadable store is treated as holding no token.
    pub fn new(api: ApiClient, store: S) -> Self {
        let state = match store.load() {
            Ok(Some(token)) => {
                debug!("Restored session token from store");
                AuthState::Authenticated(token)
            }
            Ok(None) => AuthState::Unauthenticated,
            Err(e) => {
                warn!(error = %e, "Failed to load session token, starting logged out");
                AuthState::Unauthenticated
            }
        };
        Self { api, store, state }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.state.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Log in and keep the issued token.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let credentials = Credentials::new(username, password);
        if !credentials.is_complete() {
            return Err(SessionError::Validation(VALIDATION_MESSAGE.to_string()));
        }

        let token = match self.api.login(&credentials).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, username = %username, "Login failed");
                return Err(SessionError::from_api(e, LOGIN_FAILED));
            }
        };

        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to save session token");
        }
        self.state = std::mem::take(&mut self.state).authenticate(token);
        info!(username = %username, "Login successful");
        Ok(())
    }

    /// Drop the token. Always succeeds.
    pub fn logout(&mut self) {
        self.sign_out();
        info!("Logged out");
    }

    /// Fetch the current user's profile. A rejected token is discarded.
    pub async fn fetch_profile(&mut self) -> Result<UserProfile, SessionError> {
        let token = self.token().cloned().ok_or(SessionError::Unauthenticated)?;

        match self.api.me(&token).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                let err = SessionError::from_api(e, PROFILE_FAILED);
                if let SessionError::Auth(ref message) = err {
                    warn!(message = %message, "Token rejected, clearing session");
                    self.sign_out();
                }
                Err(err)
            }
        }
    }

    /// Create an account. Does not log in and never touches the token.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<UserProfile, SessionError> {
        let account = NewAccount::new(username, password, email.map(str::to_string));
        if !account.is_complete() {
            return Err(SessionError::Validation(VALIDATION_MESSAGE.to_string()));
        }

        let profile = self
            .api
            .create_user(&account)
            .await
            .map_err(|e| SessionError::from_api(e, CREATE_FAILED))?;
        info!(username = %profile.username, id = profile.id, "Account created");
        Ok(profile)
    }

    fn sign_out(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session token");
        }
        self.state = std::mem::take(&mut self.state).sign_out();
    }
}
