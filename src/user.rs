use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized user record produced once an authentication flow completes.
///
/// Every provider maps its own profile payload onto these fields; the
/// untouched payload is kept in `raw_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub provider: String,
    pub user_id: String,
    pub name: Option<String>,
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub raw_data: Map<String, Value>,
}

impl User {
    pub fn new(provider: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = access_token.into();
        self
    }
}
