//! Cookie/CSRF session handling and connection token minting.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::domain::{DomainError, Member, Session, value_object::ConnectionToken};
use crate::infrastructure::api::{ApiClient, ApiError};
use crate::infrastructure::dto::http::{
    JwtResponse, LoginRequest, ProfileResponse, RegisterRequest, RegisterResponse,
};

/// Backend detail string marking an account without a linked Discord ID
const DISCORD_UNVERIFIED_DETAIL: &str =
    "Your account does not have a Discord ID associated with it.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("your discord is not verified: type /verify in the server and enter {username}")]
    DiscordUnverified { username: String },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("already logged in as '{0}'; log out first")]
    AlreadyAuthenticated(String),
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
    #[error("backend returned an unusable profile: {0}")]
    InvalidProfile(#[from] DomainError),
    #[error("backend issued an empty connection token")]
    EmptyToken,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("session engine is no longer running")]
    EngineStopped,
}

/// Converts the cookie/CSRF login session into everything the transport
/// needs: an authenticated profile and a short-lived connection token.
///
/// Holds the only [`ApiClient`] in the engine, so all REST traffic shares
/// one cookie jar. At most one session is active at a time; a second login
/// is rejected until the first is logged out.
pub struct CredentialBridge {
    api: ApiClient,
    session: Option<Session>,
    dev_fallback: bool,
}

impl CredentialBridge {
    pub fn new(config: &EngineConfig) -> Result<Self, AuthError> {
        Ok(Self {
            api: ApiClient::new(&config.api_base_url)?,
            session: None,
            dev_fallback: config.dev_fallback_token,
        })
    }

    /// Log in with username and password, establishing the cookie session
    /// and loading the member profile.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Member, AuthError> {
        if let Some(session) = &self.session {
            return Err(AuthError::AlreadyAuthenticated(
                session.username().to_string(),
            ));
        }
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let _: serde_json::Value = self
            .api
            .post_json("/auth/login/", &request)
            .await
            .map_err(map_login_error)?;
        // the backend rotates the CSRF token on login
        if let Err(e) = self.api.fetch_csrf().await {
            tracing::warn!("CSRF refresh after login failed: {}", e);
        }
        let member = self.fetch_profile().await?;
        self.session = Some(Session::new(member.clone()));
        tracing::info!("Logged in as '{}'", member.username);
        Ok(member)
    }

    /// Adopt an already-established cookie session, if any.
    ///
    /// Probes `/auth/session/` first; only a valid cookie session proceeds
    /// to the profile fetch.
    pub async fn check_session(&mut self) -> Result<Member, AuthError> {
        if let Some(session) = &self.session {
            return Err(AuthError::AlreadyAuthenticated(
                session.username().to_string(),
            ));
        }
        let _: serde_json::Value = self.api.get_json("/auth/session/").await.map_err(|e| {
            if e.is_unauthorized() {
                AuthError::NotAuthenticated
            } else {
                AuthError::Api(e)
            }
        })?;
        let member = self.fetch_profile().await.map_err(|e| match e {
            AuthError::Api(api) if api.is_unauthorized() => AuthError::NotAuthenticated,
            other => other,
        })?;
        self.session = Some(Session::new(member.clone()));
        tracing::info!("Resumed session for '{}'", member.username);
        Ok(member)
    }

    /// End the cookie session on the backend and locally.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        if self.session.is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let _: serde_json::Value = self.api.post_empty("/auth/logout/").await?;
        self.session = None;
        // the old CSRF token dies with the session
        self.api.clear_csrf();
        tracing::info!("Logged out");
        Ok(())
    }

    /// Create a new account. Does not log in; returns the new member id.
    pub async fn register(&mut self, request: RegisterRequest) -> Result<i64, AuthError> {
        let response: RegisterResponse = self
            .api
            .post_json("/auth/register/", &request)
            .await
            .map_err(map_register_error)?;
        tracing::info!("Registered member '{}' (id {})", request.username, response.id);
        Ok(response.id)
    }

    /// Mint a short-lived connection token for the websocket handshake.
    ///
    /// A rejected mint clears the local session when the backend says the
    /// cookie session is gone. With the development fallback enabled, any
    /// failure degrades to the fixed local token instead.
    pub async fn mint_connection_token(&mut self) -> Result<ConnectionToken, AuthError> {
        match self.try_mint().await {
            Ok(token) => Ok(token),
            Err(e) if self.dev_fallback => {
                tracing::warn!("Using development fallback connection token: {}", e);
                Ok(ConnectionToken::dev_fallback())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_member(&self) -> Option<Member> {
        self.session.as_ref().map(|s| s.member.clone())
    }

    async fn fetch_profile(&mut self) -> Result<Member, AuthError> {
        let profile: ProfileResponse = self.api.get_json("/members/profile/").await?;
        Ok(Member::try_from(profile)?)
    }

    async fn try_mint(&mut self) -> Result<ConnectionToken, AuthError> {
        if self.session.is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let response: JwtResponse = match self.api.get_json("/auth/jwt/").await {
            Ok(response) => response,
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("Cookie session expired; dropping local session");
                self.session = None;
                return Err(AuthError::NotAuthenticated);
            }
            Err(e) => return Err(e.into()),
        };
        let token = ConnectionToken::new(response.token).map_err(|_| AuthError::EmptyToken)?;
        if let Some(session) = &mut self.session {
            session.connection_token = Some(token.clone());
        }
        Ok(token)
    }

    #[cfg(test)]
    pub(crate) fn set_session_for_tests(&mut self, member: Member) {
        self.session = Some(Session::new(member));
    }
}

fn map_login_error(error: ApiError) -> AuthError {
    match error {
        ApiError::Status { body, .. }
            if body.detail.as_deref() == Some(DISCORD_UNVERIFIED_DETAIL) =>
        {
            AuthError::DiscordUnverified {
                username: body.username.unwrap_or_default(),
            }
        }
        ApiError::Status {
            status: 400 | 401 | 403,
            ..
        } => AuthError::InvalidCredentials,
        other => AuthError::Api(other),
    }
}

fn map_register_error(error: ApiError) -> AuthError {
    match error {
        ApiError::Status { body, .. } => AuthError::RegistrationFailed(
            body.detail
                .unwrap_or_else(|| "registration rejected".to_string()),
        ),
        other => AuthError::Api(other),
    }
}
