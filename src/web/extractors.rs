use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;

use crate::AuthError;

/// Provider name for the current request.
///
/// Read from the `provider` path parameter, falling back to the `provider`
/// query parameter. Rejects with [`AuthError::MissingProviderName`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderName(pub String);

impl<S> FromRequestParts<S> for ProviderName
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(params) = RawPathParams::from_request_parts(parts, state).await {
            let from_path = params
                .iter()
                .find(|(key, value)| *key == "provider" && !value.is_empty())
                .map(|(_, value)| value.to_string());
            if let Some(name) = from_path {
                return Ok(Self(name));
            }
        }

        parts
            .uri
            .query()
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == "provider")
                    .map(|(_, value)| value.into_owned())
            })
            .filter(|name| !name.is_empty())
            .map(Self)
            .ok_or(AuthError::MissingProviderName)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(uri: &str) -> Result<ProviderName, AuthError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        ProviderName::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn falls_back_to_query() {
        let name = extract("/login?provider=github&x=1").await.unwrap();
        assert_eq!(name, ProviderName("github".to_string()));
    }

    #[tokio::test]
    async fn missing_name_is_rejected() {
        assert!(matches!(
            extract("/login").await,
            Err(AuthError::MissingProviderName)
        ));
        assert!(matches!(
            extract("/login?provider=").await,
            Err(AuthError::MissingProviderName)
        ));
    }
}
