use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::profile::{ProfileMapping, fetch_profile};
use crate::{
    AuthError, AuthorizationResponse, CallbackParams, FlowProvider, OAuthClient,
    OAuthClientConfig, Provider, Session, TokenResponse, User,
};

/// Redirect-flow provider for any standard OAuth 2.0 authorization server.
#[derive(Debug)]
pub struct OAuth2Provider {
    name: String,
    client: OAuthClient,
    profile_url: String,
    mapping: ProfileMapping,
    debug: AtomicBool,
}

/// In-flight state of an [`OAuth2Provider`] attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Session {
    pub auth_url: String,
    pub state: String,
    pub code_verifier: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl Session for OAuth2Session {
    fn auth_url(&self) -> Result<String, AuthError> {
        if self.auth_url.is_empty() {
            return Err(AuthError::InvalidSession(
                "an auth url has not been set".to_string(),
            ));
        }
        Ok(self.auth_url.clone())
    }

    fn marshal(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl OAuth2Provider {
    pub fn new(
        name: impl Into<String>,
        config: OAuthClientConfig,
        profile_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        Ok(Self::with_client(name, OAuthClient::new(config)?, profile_url))
    }

    pub fn with_client(
        name: impl Into<String>,
        client: OAuthClient,
        profile_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            profile_url: profile_url.into(),
            mapping: ProfileMapping::default(),
            debug: AtomicBool::new(false),
        }
    }

    pub fn with_mapping(mut self, mapping: ProfileMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    pub fn mapping(&self) -> &ProfileMapping {
        &self.mapping
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.client.refresh_token(refresh_token).await
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

impl Provider for OAuth2Provider {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    fn as_flow(&self) -> Option<&dyn FlowProvider> {
        Some(self)
    }
}

#[async_trait]
impl FlowProvider for OAuth2Provider {
    async fn begin_auth(&self, state: &str) -> Result<Box<dyn Session>, AuthError> {
        let request = self.client.authorization_request(state)?;
        Ok(Box::new(OAuth2Session {
            auth_url: request.authorization_url,
            state: request.state,
            code_verifier: request.pkce.map(|pkce| pkce.code_verifier),
            ..OAuth2Session::default()
        }))
    }

    fn unmarshal_session(&self, data: &str) -> Result<Box<dyn Session>, AuthError> {
        let session: OAuth2Session = serde_json::from_str(data)
            .map_err(|err| AuthError::InvalidSession(err.to_string()))?;
        Ok(Box::new(session))
    }

    async fn authorize(
        &self,
        session: &mut dyn Session,
        params: &CallbackParams,
    ) -> Result<String, AuthError> {
        let session = session.downcast_mut::<OAuth2Session>()?;
        let response = AuthorizationResponse::from_params(params)?;
        let token = self
            .client
            .exchange_code(
                response,
                session.code_verifier.as_deref(),
                Some(session.state.as_str()),
            )
            .await?;

        if self.debug_enabled() {
            tracing::debug!(provider = %self.name, token_type = ?token.token_type, scope = ?token.scope, "exchanged authorization code");
        }

        session.access_token = Some(token.access_token.clone());
        session.refresh_token = token.refresh_token;
        session.expires_in = token.expires_in;
        Ok(token.access_token)
    }

    async fn fetch_user(&self, session: &dyn Session) -> Result<User, AuthError> {
        let session = session.downcast_ref::<OAuth2Session>()?;
        let access_token = session.access_token.as_deref().ok_or_else(|| {
            AuthError::InvalidSession(format!(
                "{} cannot get user information without an access token",
                self.name
            ))
        })?;

        let profile = fetch_profile(self.client.http(), &self.profile_url, access_token).await?;
        if self.debug_enabled() {
            tracing::debug!(provider = %self.name, ?profile, "fetched profile");
        }

        let mut user = self.mapping.map_user(&self.name, access_token, profile)?;
        user.refresh_token = session.refresh_token.clone();
        user.expires_in = session.expires_in;
        Ok(user)
    }
}
