//! axum glue for the begin/callback flow.
//!
//! The session key travels in a cookie; the provider name comes from the
//! `provider` path parameter, or the `provider` query parameter when the
//! route has none.

mod extractors;
mod handlers;
mod response;

pub use extractors::ProviderName;
pub use handlers::{
    VerifyRequest, auth_routes, auth_url, begin_auth_handler, callback_handler,
    complete_user_auth, verify_handler,
};
