use std::collections::HashMap;
use std::time::Duration;

use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, HeaderName, HeaderValue},
};
use url::Url;

use crate::{AuthError, AuthorizationRequest, AuthorizationResponse, PkcePair, TokenResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenRequestFormat {
    Json,
    #[default]
    Form,
}

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub use_pkce: bool,
    pub token_request_format: TokenRequestFormat,
    pub authorize_params: Vec<(String, String)>,
    pub token_params: Vec<(String, String)>,
    pub token_headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl OAuthClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            redirect_uri: redirect_uri.into(),
            scope: None,
            use_pkce: true,
            token_request_format: TokenRequestFormat::default(),
            authorize_params: Vec::new(),
            token_params: Vec::new(),
            token_headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn with_token_request_format(mut self, format: TokenRequestFormat) -> Self {
        self.token_request_format = format;
        self
    }

    pub fn with_authorize_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.authorize_params.push((key.into(), value.into()));
        self
    }

    pub fn with_token_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_params.push((key.into(), value.into()));
        self
    }

    pub fn with_token_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_headers.push((name.into(), value.into()));
        self
    }
}

/// Standard OAuth 2.0 authorization-code client.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthClientConfig,
    http: Client,
}

impl OAuthClient {
    pub fn new(config: OAuthClientConfig) -> Result<Self, AuthError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Self::with_http_client(config, http)
    }

    pub fn with_http_client(config: OAuthClientConfig, http: Client) -> Result<Self, AuthError> {
        Url::parse(&config.authorize_url)?;
        Url::parse(&config.token_url)?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn authorization_request(&self, state: &str) -> Result<AuthorizationRequest, AuthError> {
        let pkce = if self.config.use_pkce {
            Some(PkcePair::generate()?)
        } else {
            None
        };
        let scope = self.config.scope.clone().unwrap_or_default();

        let mut params: Vec<(String, String)> = self.config.authorize_params.clone();
        set_param(&mut params, "response_type", "code".to_string());
        set_param(&mut params, "client_id", self.config.client_id.clone());
        set_param(&mut params, "redirect_uri", self.config.redirect_uri.clone());
        if !scope.is_empty() {
            set_param(&mut params, "scope", scope.clone());
        }
        if let Some(pkce) = &pkce {
            set_param(&mut params, "code_challenge", pkce.code_challenge.clone());
            set_param(&mut params, "code_challenge_method", "S256".to_string());
        }
        set_param(&mut params, "state", state.to_string());

        let mut url = Url::parse(&self.config.authorize_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            pkce,
            state: state.to_string(),
            scope,
        })
    }

    pub async fn exchange_code(
        &self,
        response: AuthorizationResponse,
        code_verifier: Option<&str>,
        expected_state: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let AuthorizationResponse { code, state } = response;
        let returned_state = state.as_deref();

        if let Some(expected) = expected_state {
            let received = returned_state.unwrap_or_default();
            if expected != received {
                return Err(AuthError::StateMismatch {
                    expected: expected.to_string(),
                    received: received.to_string(),
                });
            }
        }

        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "authorization_code".to_string());
        payload.insert("code".to_string(), code);
        payload.insert("client_id".to_string(), self.config.client_id.clone());
        payload.insert("redirect_uri".to_string(), self.config.redirect_uri.clone());

        if let Some(verifier) = code_verifier {
            payload.insert("code_verifier".to_string(), verifier.to_string());
        }

        if let Some(secret) = &self.config.client_secret {
            payload.insert("client_secret".to_string(), secret.clone());
        }

        self.send_token_request(payload).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let mut payload = HashMap::new();
        payload.insert("grant_type".to_string(), "refresh_token".to_string());
        payload.insert("refresh_token".to_string(), refresh_token.to_string());
        payload.insert("client_id".to_string(), self.config.client_id.clone());

        if let Some(secret) = &self.config.client_secret {
            payload.insert("client_secret".to_string(), secret.clone());
        }

        self.send_token_request(payload).await
    }

    async fn send_token_request(
        &self,
        mut payload: HashMap<String, String>,
    ) -> Result<TokenResponse, AuthError> {
        for (key, value) in &self.config.token_params {
            payload.insert(key.clone(), value.clone());
        }

        let mut builder = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json");
        builder = apply_headers(builder, &self.config.token_headers)?;

        let response = match self.config.token_request_format {
            TokenRequestFormat::Json => builder.json(&payload).send().await?,
            TokenRequestFormat::Form => builder.form(&payload).send().await?,
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "token endpoint rejected request");
            return Err(AuthError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token = serde_json::from_str(&body).map_err(|err| AuthError::InvalidResponse {
            message: err.to_string(),
            body,
        })?;

        Ok(token)
    }
}

pub(crate) fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, AuthError> {
    for (name, value) in headers {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| AuthError::InvalidHeader {
                name: name.clone(),
                value: value.clone(),
            })?;
        let value = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader {
            name: name.to_string(),
            value: value.clone(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: String) {
    if let Some((_, existing)) = params.iter_mut().find(|(param, _)| param == key) {
        *existing = value;
    } else {
        params.push((key.to_string(), value));
    }
}
