//! The contract every identity provider satisfies.
//!
//! A [`Provider`] is looked up by name. It can drive a redirect flow
//! ([`FlowProvider`]), verify an access token obtained elsewhere
//! ([`TokenVerifier`]), or both.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

use crate::{AuthError, CallbackParams, User};

pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Toggles verbose logging of provider traffic. No-op unless overridden.
    fn set_debug(&self, _debug: bool) {}

    fn as_flow(&self) -> Option<&dyn FlowProvider> {
        None
    }

    fn as_verifier(&self) -> Option<&dyn TokenVerifier> {
        None
    }
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("flow", &self.as_flow().is_some())
            .field("verifier", &self.as_verifier().is_some())
            .finish()
    }
}

/// In-flight authentication state owned by one provider.
///
/// The marshaled form is what gets parked in the session store between the
/// redirect and the callback.
pub trait Session: Send + Sync + fmt::Debug {
    fn auth_url(&self) -> Result<String, AuthError>;
    fn marshal(&self) -> Result<String, AuthError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Session + 'a {
    pub fn downcast_ref<T: Session + 'static>(&self) -> Result<&T, AuthError> {
        self.as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| AuthError::InvalidSession("session belongs to another provider".into()))
    }

    pub fn downcast_mut<T: Session + 'static>(&mut self) -> Result<&mut T, AuthError> {
        self.as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| AuthError::InvalidSession("session belongs to another provider".into()))
    }
}

#[async_trait]
pub trait FlowProvider: Provider {
    /// Starts an attempt. `state` must round-trip through the provider.
    async fn begin_auth(&self, state: &str) -> Result<Box<dyn Session>, AuthError>;

    fn unmarshal_session(&self, data: &str) -> Result<Box<dyn Session>, AuthError>;

    /// Validates the callback against the session and completes whatever
    /// exchange the provider needs. Returns the access token.
    async fn authorize(
        &self,
        session: &mut dyn Session,
        params: &CallbackParams,
    ) -> Result<String, AuthError>;

    async fn fetch_user(&self, session: &dyn Session) -> Result<User, AuthError>;

    async fn complete_auth(
        &self,
        marshaled: &str,
        params: &CallbackParams,
    ) -> Result<User, AuthError> {
        let mut session = self.unmarshal_session(marshaled)?;
        self.authorize(session.as_mut(), params).await?;
        self.fetch_user(session.as_ref()).await
    }
}

#[async_trait]
pub trait TokenVerifier: Provider {
    async fn verify_auth(&self, access_token: &str) -> Result<User, AuthError>;
}
