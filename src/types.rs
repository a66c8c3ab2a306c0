use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::AuthError;

/// Query parameters a provider redirected back with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams(HashMap<String, String>);

impl CallbackParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_query(query: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    pub fn from_url(callback_url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(callback_url)?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub pkce: Option<crate::PkcePair>,
    pub state: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationResponse {
    pub fn new(code: impl Into<String>, state: Option<String>) -> Self {
        Self {
            code: code.into(),
            state,
        }
    }

    /// Reads `code` and `state` out of callback parameters, surfacing an
    /// `error` parameter as a provider denial.
    pub fn from_params(params: &CallbackParams) -> Result<Self, AuthError> {
        if let Some(error) = params.get("error") {
            return Err(AuthError::ProviderDenied {
                error: error.to_string(),
                description: params.get("error_description").map(str::to_string),
            });
        }

        let code = params
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingAuthorizationCode)?;
        Ok(Self::new(code, params.get("state").map(str::to_string)))
    }

    pub fn from_url(callback_url: &str) -> Result<Self, AuthError> {
        Self::from_params(&CallbackParams::from_url(callback_url)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::{AuthorizationResponse, CallbackParams};
    use crate::AuthError;

    #[test]
    fn hash_in_code_is_kept_verbatim() {
        let params = CallbackParams::from_query("code=abc123%23state456");
        let response = AuthorizationResponse::from_params(&params).unwrap();
        assert_eq!(response.code, "abc123#state456");
        assert_eq!(response.state, None);
    }

    #[test]
    fn from_url_parses_query_params() {
        let response =
            AuthorizationResponse::from_url("http://localhost/callback?code=abc123&state=state456")
                .unwrap();
        assert_eq!(response.code, "abc123");
        assert_eq!(response.state.as_deref(), Some("state456"));
    }

    #[test]
    fn from_url_requires_code() {
        let result = AuthorizationResponse::from_url("http://localhost/callback?state=state456");
        assert!(matches!(result, Err(AuthError::MissingAuthorizationCode)));
    }

    #[test]
    fn error_param_becomes_provider_denied() {
        let params = CallbackParams::from_query(
            "error=access_denied&error_description=user%20cancelled&state=xyz",
        );
        match AuthorizationResponse::from_params(&params) {
            Err(AuthError::ProviderDenied { error, description }) => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("user cancelled"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn callback_params_decode_percent_encoding() {
        let params = CallbackParams::from_query("code=a%2Fb&state=s+t");
        assert_eq!(params.get("code"), Some("a/b"));
        assert_eq!(params.get("state"), Some("s t"));
        assert_eq!(params.get("missing"), None);
    }
}
