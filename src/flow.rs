//! Two-phase authentication over a provider registry and a session store.
//!
//! `begin_auth` asks the provider for a session, parks its marshaled form
//! under a session key and hands back the URL to send the user to. The
//! callback brings the user back; `complete_user_auth` takes the parked
//! session, lets the provider finish the exchange and returns the user.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pkce::random_token;
use crate::{
    AuthError, CallbackParams, FlowProvider, Provider, ProviderRegistry, SessionStore,
    TokenVerifier, User,
};

/// Cookie and store key name used when nothing else is configured.
pub const SESSION_NAME: &str = "_authgate_session";

const DEFAULT_COOKIE_MAX_AGE: Duration = Duration::from_secs(600);

/// Produces the `state` value sent to the provider for each attempt.
pub type StateFn = Arc<dyn Fn() -> Result<String, AuthError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_path: String,
    pub cookie_max_age: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_NAME.to_string(),
            cookie_secure: true,
            cookie_path: "/".to_string(),
            cookie_max_age: DEFAULT_COOKIE_MAX_AGE,
        }
    }
}

impl FlowConfig {
    /// Reads overrides from the environment:
    ///
    /// - `AUTHGATE_COOKIE_NAME`
    /// - `AUTHGATE_COOKIE_SECURE` (`true`/`false`)
    /// - `AUTHGATE_COOKIE_MAX_AGE_SECS`
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let mut config = Self::default();
        if let Some(name) = lookup("AUTHGATE_COOKIE_NAME").filter(|name| !name.is_empty()) {
            config.cookie_name = name;
        }
        if let Some(secure) = lookup("AUTHGATE_COOKIE_SECURE") {
            config.cookie_secure = secure.parse().map_err(|_| {
                AuthError::Config(format!("AUTHGATE_COOKIE_SECURE must be a bool, got {secure}"))
            })?;
        }
        if let Some(max_age) = lookup("AUTHGATE_COOKIE_MAX_AGE_SECS") {
            let secs: u64 = max_age.parse().map_err(|_| {
                AuthError::Config(format!(
                    "AUTHGATE_COOKIE_MAX_AGE_SECS must be a number, got {max_age}"
                ))
            })?;
            config.cookie_max_age = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn with_cookie_max_age(mut self, max_age: Duration) -> Self {
        self.cookie_max_age = max_age;
        self
    }
}

/// Result of starting an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginAuth {
    pub auth_url: String,
    pub session_key: String,
}

/// Stored value for one pending attempt. The callback must name the same
/// provider that began it.
#[derive(Debug, Serialize, Deserialize)]
struct PendingAuth {
    provider: String,
    session: String,
}

#[derive(Clone)]
pub struct AuthFlow {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn SessionStore>,
    state_fn: StateFn,
    config: FlowConfig,
}

impl AuthFlow {
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            registry,
            store,
            state_fn: Arc::new(random_token),
            config: FlowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_state_fn<F>(mut self, state_fn: F) -> Self
    where
        F: Fn() -> Result<String, AuthError> + Send + Sync + 'static,
    {
        self.state_fn = Arc::new(state_fn);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Starts an attempt with `provider_name`.
    ///
    /// The marshaled session is stored under `session_key`, replacing any
    /// attempt already pending there. A fresh key is generated when none is
    /// given.
    pub async fn begin_auth(
        &self,
        provider_name: &str,
        session_key: Option<&str>,
    ) -> Result<BeginAuth, AuthError> {
        let provider = self.registry.get(provider_name)?;
        let flow = flow_provider(provider.as_ref())?;

        let state = (self.state_fn)()?;
        let session = flow.begin_auth(&state).await?;
        let auth_url = session.auth_url()?;

        let session_key = match session_key.filter(|key| !key.is_empty()) {
            Some(key) => key.to_string(),
            None => random_token()?,
        };
        let pending = PendingAuth {
            provider: provider_name.to_string(),
            session: session.marshal()?,
        };
        self.store
            .save(&session_key, serde_json::to_string(&pending)?)
            .await?;

        tracing::debug!(provider = provider_name, "began authentication");
        Ok(BeginAuth {
            auth_url,
            session_key,
        })
    }

    /// Finishes the attempt parked under `session_key`.
    ///
    /// The stored session is discarded whether or not the provider accepts
    /// the callback. A session begun with another provider counts as
    /// missing.
    pub async fn complete_user_auth(
        &self,
        provider_name: &str,
        session_key: Option<&str>,
        params: &CallbackParams,
    ) -> Result<User, AuthError> {
        let provider = self.registry.get(provider_name)?;
        let flow = flow_provider(provider.as_ref())?;

        let session_key = session_key
            .filter(|key| !key.is_empty())
            .ok_or(AuthError::SessionNotFound)?;
        let stored = self
            .store
            .take(session_key)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        let pending: PendingAuth = serde_json::from_str(&stored)
            .map_err(|err| AuthError::InvalidSession(err.to_string()))?;
        if pending.provider != provider_name {
            tracing::warn!(
                provider = provider_name,
                began_with = %pending.provider,
                "callback provider does not match the pending session"
            );
            return Err(AuthError::SessionNotFound);
        }

        let user = flow.complete_auth(&pending.session, params).await?;
        tracing::info!(provider = provider_name, user_id = %user.user_id, "completed authentication");
        Ok(user)
    }

    pub async fn verify_user_auth(
        &self,
        provider_name: &str,
        access_token: &str,
    ) -> Result<User, AuthError> {
        let provider = self.registry.get(provider_name)?;
        let verifier = token_verifier(provider.as_ref())?;
        let user = verifier.verify_auth(access_token).await?;
        tracing::info!(provider = provider_name, user_id = %user.user_id, "verified access token");
        Ok(user)
    }
}

impl fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFlow")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn flow_provider(provider: &dyn Provider) -> Result<&dyn FlowProvider, AuthError> {
    provider
        .as_flow()
        .ok_or_else(|| AuthError::UnsupportedFlow {
            provider: provider.name().to_string(),
            flow: "redirect",
        })
}

fn token_verifier(provider: &dyn Provider) -> Result<&dyn TokenVerifier, AuthError> {
    provider
        .as_verifier()
        .ok_or_else(|| AuthError::UnsupportedFlow {
            provider: provider.name().to_string(),
            flow: "token verification",
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::MemoryStore;
    use crate::test_support::{BareProvider, MockProvider};

    fn flow_with_store() -> (AuthFlow, MemoryStore) {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(MockProvider::new("mock"));
        registry.register(MockProvider::new("other"));
        registry.register(BareProvider("bare"));
        let store = MemoryStore::new();
        let flow = AuthFlow::new(registry, Arc::new(store.clone()))
            .with_state_fn(|| Ok("fixed-state".to_string()));
        (flow, store)
    }

    #[tokio::test]
    async fn begin_then_complete_returns_user() {
        let (flow, store) = flow_with_store();

        let begun = flow.begin_auth("mock", None).await.unwrap();
        assert_eq!(
            begun.auth_url,
            "https://mock.example.com/authorize?state=fixed-state"
        );
        assert!(store.load(&begun.session_key).await.unwrap().is_some());

        let params = CallbackParams::new()
            .with("code", "abc")
            .with("state", "fixed-state");
        let user = flow
            .complete_user_auth("mock", Some(&begun.session_key), &params)
            .await
            .unwrap();

        assert_eq!(user.provider, "mock");
        assert_eq!(user.access_token, "token-abc");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn second_begin_replaces_pending_attempt() {
        let (flow, store) = flow_with_store();

        flow.begin_auth("mock", Some("browser-1")).await.unwrap();
        let flow = flow.with_state_fn(|| Ok("second".to_string()));
        flow.begin_auth("mock", Some("browser-1")).await.unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.load("browser-1").await.unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored["provider"], "mock");
        assert!(
            stored["session"]
                .as_str()
                .unwrap()
                .contains("\"state\":\"second\"")
        );
    }

    #[tokio::test]
    async fn callback_through_another_provider_is_rejected() {
        let (flow, store) = flow_with_store();
        let begun = flow.begin_auth("mock", None).await.unwrap();

        let params = CallbackParams::new()
            .with("code", "abc")
            .with("state", "fixed-state");
        let result = flow
            .complete_user_auth("other", Some(&begun.session_key), &params)
            .await;

        assert!(matches!(result, Err(AuthError::SessionNotFound)));
        assert!(store.is_empty().await);

        let retry = flow
            .complete_user_auth("mock", Some(&begun.session_key), &params)
            .await;
        assert!(matches!(retry, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn corrupt_stored_value_is_invalid_session() {
        let (flow, store) = flow_with_store();
        store
            .save("browser-1", "not json".to_string())
            .await
            .unwrap();

        let params = CallbackParams::new().with("code", "abc");
        let result = flow
            .complete_user_auth("mock", Some("browser-1"), &params)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSession(_))));
    }

    #[tokio::test]
    async fn callback_without_stored_session_fails() {
        let (flow, _) = flow_with_store();
        let params = CallbackParams::new().with("code", "abc");

        let missing_key = flow.complete_user_auth("mock", None, &params).await;
        assert!(matches!(missing_key, Err(AuthError::SessionNotFound)));

        let unknown_key = flow
            .complete_user_auth("mock", Some("never-began"), &params)
            .await;
        assert!(matches!(unknown_key, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn failed_callback_discards_session() {
        let (flow, store) = flow_with_store();
        let begun = flow.begin_auth("mock", None).await.unwrap();

        let params = CallbackParams::new()
            .with("code", "abc")
            .with("state", "forged");
        let result = flow
            .complete_user_auth("mock", Some(&begun.session_key), &params)
            .await;

        assert!(matches!(result, Err(AuthError::StateMismatch { .. })));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_provider_is_reported() {
        let (flow, _) = flow_with_store();
        let result = flow.begin_auth("nope", None).await;
        assert!(matches!(result, Err(AuthError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn provider_without_capability_is_rejected() {
        let (flow, _) = flow_with_store();

        let begin = flow.begin_auth("bare", None).await;
        assert!(matches!(
            begin,
            Err(AuthError::UnsupportedFlow { flow: "redirect", .. })
        ));

        let verify = flow.verify_user_auth("bare", "valid").await;
        assert!(matches!(
            verify,
            Err(AuthError::UnsupportedFlow {
                flow: "token verification",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn verify_user_auth_delegates_to_verifier() {
        let (flow, _) = flow_with_store();

        let user = flow.verify_user_auth("mock", "valid").await.unwrap();
        assert_eq!(user.user_id, "verified-user");

        let rejected = flow.verify_user_auth("mock", "forged").await;
        assert!(matches!(
            rejected,
            Err(AuthError::HttpStatus { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn state_fn_errors_propagate() {
        let (flow, store) = flow_with_store();
        let flow = flow.with_state_fn(|| {
            Err(AuthError::OsRng {
                message: "entropy unavailable".to_string(),
            })
        });

        let result = flow.begin_auth("mock", None).await;
        assert!(matches!(result, Err(AuthError::OsRng { .. })));
        assert!(store.is_empty().await);
    }

    #[test]
    fn config_reads_overrides() {
        let env: HashMap<&str, &str> = [
            ("AUTHGATE_COOKIE_NAME", "sid"),
            ("AUTHGATE_COOKIE_SECURE", "false"),
            ("AUTHGATE_COOKIE_MAX_AGE_SECS", "30"),
        ]
        .into_iter()
        .collect();
        let config =
            FlowConfig::from_lookup(|key| env.get(key).map(|value| value.to_string())).unwrap();

        assert_eq!(config.cookie_name, "sid");
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_max_age, Duration::from_secs(30));
        assert_eq!(config.cookie_path, "/");
    }

    #[test]
    fn config_rejects_malformed_values() {
        let result = FlowConfig::from_lookup(|key| {
            (key == "AUTHGATE_COOKIE_SECURE").then(|| "sometimes".to_string())
        });
        assert!(matches!(result, Err(AuthError::Config(_))));
    }
}
