use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::profile::{ProfileMapping, fetch_profile};
use crate::{AuthError, Provider, TokenVerifier, User};

/// Verifies an access token the client already holds by reading the
/// provider's profile endpoint with it.
#[derive(Debug)]
pub struct BearerVerifier {
    name: String,
    profile_url: String,
    mapping: ProfileMapping,
    http: Client,
    debug: AtomicBool,
}

impl BearerVerifier {
    pub fn new(name: impl Into<String>, profile_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::build(name, profile_url, None)
    }

    pub fn with_timeout(
        name: impl Into<String>,
        profile_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        Self::build(name, profile_url, Some(timeout))
    }

    fn build(
        name: impl Into<String>,
        profile_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AuthError> {
        let profile_url = profile_url.into();
        url::Url::parse(&profile_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            name: name.into(),
            profile_url,
            mapping: ProfileMapping::default(),
            http: builder.build()?,
            debug: AtomicBool::new(false),
        })
    }

    pub fn with_mapping(mut self, mapping: ProfileMapping) -> Self {
        self.mapping = mapping;
        self
    }
}

impl Provider for BearerVerifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    fn as_verifier(&self) -> Option<&dyn TokenVerifier> {
        Some(self)
    }
}

#[async_trait]
impl TokenVerifier for BearerVerifier {
    async fn verify_auth(&self, access_token: &str) -> Result<User, AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::InvalidSession("access token is empty".to_string()));
        }

        let profile = fetch_profile(&self.http, &self.profile_url, access_token).await?;
        if self.debug.load(Ordering::Relaxed) {
            tracing::debug!(provider = %self.name, ?profile, "verified token profile");
        }
        self.mapping.map_user(&self.name, access_token, profile)
    }
}
