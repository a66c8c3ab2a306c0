use reqwest::Client;
use serde_json::{Map, Value};

use crate::{AuthError, User};

/// Where each `User` field lives in a provider's profile JSON.
///
/// Paths are dot-separated (`picture.data.url`). An empty path leaves the
/// field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileMapping {
    pub user_id: String,
    pub name: String,
    pub nick_name: String,
    pub email: String,
    pub description: String,
    pub avatar_url: String,
    pub location: String,
}

impl Default for ProfileMapping {
    fn default() -> Self {
        Self {
            user_id: "id".to_string(),
            name: "name".to_string(),
            nick_name: "login".to_string(),
            email: "email".to_string(),
            description: "bio".to_string(),
            avatar_url: "avatar_url".to_string(),
            location: "location".to_string(),
        }
    }
}

impl ProfileMapping {
    pub fn with_user_id(mut self, path: impl Into<String>) -> Self {
        self.user_id = path.into();
        self
    }

    pub fn with_name(mut self, path: impl Into<String>) -> Self {
        self.name = path.into();
        self
    }

    pub fn with_nick_name(mut self, path: impl Into<String>) -> Self {
        self.nick_name = path.into();
        self
    }

    pub fn with_email(mut self, path: impl Into<String>) -> Self {
        self.email = path.into();
        self
    }

    pub fn with_description(mut self, path: impl Into<String>) -> Self {
        self.description = path.into();
        self
    }

    pub fn with_avatar_url(mut self, path: impl Into<String>) -> Self {
        self.avatar_url = path.into();
        self
    }

    pub fn with_location(mut self, path: impl Into<String>) -> Self {
        self.location = path.into();
        self
    }

    pub fn map_user(
        &self,
        provider: &str,
        access_token: &str,
        profile: Map<String, Value>,
    ) -> Result<User, AuthError> {
        let root = Value::Object(profile);
        let user_id = extract_field(&root, &self.user_id).ok_or_else(|| {
            AuthError::InvalidResponse {
                message: format!("profile has no user id at `{}`", self.user_id),
                body: root.to_string(),
            }
        })?;

        let mut user = User::new(provider, user_id).with_access_token(access_token);
        user.name = extract_field(&root, &self.name);
        user.nick_name = extract_field(&root, &self.nick_name);
        user.email = extract_field(&root, &self.email);
        user.description = extract_field(&root, &self.description);
        user.avatar_url = extract_field(&root, &self.avatar_url);
        user.location = extract_field(&root, &self.location);
        if let Value::Object(raw) = root {
            user.raw_data = raw;
        }
        Ok(user)
    }
}

fn extract_field(data: &Value, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let mut current = data;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// GETs a profile endpoint with bearer auth and returns the JSON object.
pub(crate) async fn fetch_profile(
    http: &Client,
    url: &str,
    access_token: &str,
) -> Result<Map<String, Value>, AuthError> {
    let response = http
        .get(url)
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(status = status.as_u16(), url, "profile endpoint rejected token");
        return Err(AuthError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(profile)) => Ok(profile),
        Ok(_) => Err(AuthError::InvalidResponse {
            message: "profile is not a json object".to_string(),
            body,
        }),
        Err(err) => Err(AuthError::InvalidResponse {
            message: err.to_string(),
            body,
        }),
    }
}
