use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no provider for {0} exists")]
    UnknownProvider(String),

    #[error("you must select a provider")]
    MissingProviderName,

    #[error("provider {provider} does not support the {flow} flow")]
    UnsupportedFlow {
        provider: String,
        flow: &'static str,
    },

    #[error("could not find a matching session for this request")]
    SessionNotFound,

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("session store error: {0}")]
    Store(String),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("missing authorization code in callback")]
    MissingAuthorizationCode,

    #[error("provider denied authorization: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("configuration error: {0}")]
    Config(String),
}
