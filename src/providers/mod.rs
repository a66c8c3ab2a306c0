mod oauth2;
mod profile;
mod verifier;

pub use oauth2::{OAuth2Provider, OAuth2Session};
pub use profile::ProfileMapping;
pub use verifier::BearerVerifier;
