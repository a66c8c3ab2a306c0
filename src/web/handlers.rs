use axum::{
    Json, Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::ProviderName;
use crate::{AuthError, AuthFlow, CallbackParams, FlowConfig, User};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub access_token: String,
}

/// Routes:
/// - `GET /auth/{provider}` - redirect to the provider
/// - `GET /auth/{provider}/callback` - finish the flow, respond with the user
/// - `POST /auth/{provider}/verify` - verify a client-held access token
pub fn auth_routes() -> Router<AuthFlow> {
    Router::new()
        .route("/auth/{provider}", get(begin_auth_handler))
        .route("/auth/{provider}/callback", get(callback_handler))
        .route("/auth/{provider}/verify", post(verify_handler))
}

/// Starts the flow and returns the provider URL to send the user to, with
/// the session cookie added to `jar`.
pub async fn auth_url(
    flow: &AuthFlow,
    jar: CookieJar,
    provider: &str,
) -> Result<(CookieJar, String), AuthError> {
    let config = flow.config();
    let existing = jar
        .get(&config.cookie_name)
        .map(|cookie| cookie.value().to_string());
    let begun = flow.begin_auth(provider, existing.as_deref()).await?;
    let jar = jar.add(session_cookie(config, begun.session_key));
    Ok((jar, begun.auth_url))
}

/// Completes the flow for the session named by the cookie in `jar`.
///
/// The stored session is consumed whether or not the callback succeeds, so
/// the returned jar always clears the cookie.
pub async fn complete_user_auth(
    flow: &AuthFlow,
    jar: CookieJar,
    provider: &str,
    params: &CallbackParams,
) -> (CookieJar, Result<User, AuthError>) {
    let config = flow.config();
    let session_key = jar
        .get(&config.cookie_name)
        .map(|cookie| cookie.value().to_string());
    let result = flow
        .complete_user_auth(provider, session_key.as_deref(), params)
        .await;
    let jar = jar.remove(
        Cookie::build(config.cookie_name.clone()).path(config.cookie_path.clone()),
    );
    (jar, result)
}

/// Redirects (307) to the provider. Any failure, a missing provider name
/// included, answers 400 "Invalid request".
pub async fn begin_auth_handler(
    State(flow): State<AuthFlow>,
    provider: Result<ProviderName, AuthError>,
    jar: CookieJar,
) -> Response {
    let begun = match provider {
        Ok(ProviderName(provider)) => auth_url(&flow, jar, &provider)
            .await
            .map_err(|error| (provider, error)),
        Err(error) => Err((String::new(), error)),
    };
    match begun {
        Ok((jar, url)) => (jar, Redirect::temporary(&url)).into_response(),
        Err((provider, error)) => {
            tracing::warn!(provider = %provider, %error, "could not begin authentication");
            (StatusCode::BAD_REQUEST, Json("Invalid request")).into_response()
        }
    }
}

pub async fn callback_handler(
    State(flow): State<AuthFlow>,
    ProviderName(provider): ProviderName,
    jar: CookieJar,
    RawQuery(query): RawQuery,
) -> Response {
    let params = CallbackParams::from_query(query.as_deref().unwrap_or_default());
    match complete_user_auth(&flow, jar, &provider, &params).await {
        (jar, Ok(user)) => (jar, Json(user)).into_response(),
        (jar, Err(error)) => (jar, error).into_response(),
    }
}

pub async fn verify_handler(
    State(flow): State<AuthFlow>,
    ProviderName(provider): ProviderName,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<User>, AuthError> {
    let user = flow
        .verify_user_auth(&provider, &request.access_token)
        .await?;
    Ok(Json(user))
}

fn session_cookie(config: &FlowConfig, session_key: String) -> Cookie<'static> {
    let max_age = i64::try_from(config.cookie_max_age.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((config.cookie_name.clone(), session_key))
        .path(config.cookie_path.clone())
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}
