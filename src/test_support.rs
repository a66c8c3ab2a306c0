use std::any::Any;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AuthError, CallbackParams, FlowProvider, Provider, Session, TokenVerifier, User};

/// Provider that completes without any network traffic.
pub(crate) struct MockProvider {
    name: &'static str,
}

impl MockProvider {
    pub(crate) fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MockSession {
    pub(crate) auth_url: String,
    pub(crate) state: String,
    pub(crate) access_token: Option<String>,
}

impl Session for MockSession {
    fn auth_url(&self) -> Result<String, AuthError> {
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

impl Provider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn as_flow(&self) -> Option<&dyn FlowProvider> {
        Some(self)
    }

    fn as_verifier(&self) -> Option<&dyn TokenVerifier> {
        Some(self)
    }
}

#[async_trait]
impl FlowProvider for MockProvider {
    async fn begin_auth(&self, state: &str) -> Result<Box<dyn Session>, AuthError> {
        Ok(Box::new(MockSession {
            auth_url: format!("https://mock.example.com/authorize?state={state}"),
            state: state.to_string(),
            access_token: None,
        }))
    }

    fn unmarshal_session(&self, data: &str) -> Result<Box<dyn Session>, AuthError> {
        let session: MockSession = serde_json::from_str(data)
            .map_err(|err| AuthError::InvalidSession(err.to_string()))?;
        Ok(Box::new(session))
    }

    async fn authorize(
        &self,
        session: &mut dyn Session,
        params: &CallbackParams,
    ) -> Result<String, AuthError> {
        let session = session.downcast_mut::<MockSession>()?;
        let code = params
            .get("code")
            .ok_or(AuthError::MissingAuthorizationCode)?;
        let received = params.get("state").unwrap_or_default();
        if received != session.state {
            return Err(AuthError::StateMismatch {
                expected: session.state.clone(),
                received: received.to_string(),
            });
        }
        let token = format!("token-{code}");
        session.access_token = Some(token.clone());
        Ok(token)
    }

    async fn fetch_user(&self, session: &dyn Session) -> Result<User, AuthError> {
        let session = session.downcast_ref::<MockSession>()?;
        let token = session
            .access_token
            .clone()
            .ok_or_else(|| AuthError::InvalidSession("no access token".to_string()))?;
        Ok(User::new(self.name, "mock-user").with_access_token(token))
    }
}

#[async_trait]
impl TokenVerifier for MockProvider {
    async fn verify_auth(&self, access_token: &str) -> Result<User, AuthError> {
        if access_token != "valid" {
            return Err(AuthError::HttpStatus {
                status: 401,
                body: "invalid token".to_string(),
            });
        }
        Ok(User::new(self.name, "verified-user").with_access_token(access_token))
    }
}

/// Provider with neither capability.
pub(crate) struct BareProvider(pub(crate) &'static str);

impl Provider for BareProvider {
    fn name(&self) -> &str {
        self.0
    }
}
