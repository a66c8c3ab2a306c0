//! Pluggable identity providers behind a name-keyed registry.
//!
//! A provider either drives a redirect flow (begin, callback, fetch user) or
//! verifies an access token the client already holds. [`AuthFlow`] sequences
//! the redirect flow over a [`SessionStore`]; with the `web` feature the
//! `web` module mounts it on axum.

mod client;
mod error;
mod flow;
mod pkce;
mod provider;
mod providers;
mod registry;
mod store;
#[cfg(test)]
mod test_support;
mod types;
mod user;
#[cfg(feature = "web")]
pub mod web;

pub use client::{OAuthClient, OAuthClientConfig, TokenRequestFormat};
pub use error::AuthError;
pub use flow::{AuthFlow, BeginAuth, FlowConfig, SESSION_NAME, StateFn};
pub use pkce::{PkcePair, random_token};
pub use provider::{FlowProvider, Provider, Session, TokenVerifier};
pub use providers::{BearerVerifier, OAuth2Provider, OAuth2Session, ProfileMapping};
pub use registry::ProviderRegistry;
pub use store::{MemoryStore, SessionStore};
pub use types::{AuthorizationRequest, AuthorizationResponse, CallbackParams, TokenResponse};
pub use user::User;
