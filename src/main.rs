use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use authgate::{
    AuthError, AuthFlow, FlowConfig, MemoryStore, OAuth2Provider, OAuthClientConfig,
    ProfileMapping, Provider, ProviderRegistry, web,
};
use axum::{Router, extract::State, response::Html, routing::get};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "authgate",
    about = "Serve the OAuth begin/callback flow for one configured provider and print users as JSON."
)]
struct Cli {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1", env = "AUTHGATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = 3000, env = "AUTHGATE_PORT")]
    port: u16,

    /// Public base URL used to build the callback redirect URI
    #[arg(long, env = "AUTHGATE_BASE_URL")]
    base_url: Option<String>,

    /// Name the provider is registered under
    #[arg(long, default_value = "oauth2", env = "AUTHGATE_PROVIDER")]
    provider: String,

    #[arg(long, env = "AUTHGATE_CLIENT_ID")]
    client_id: String,

    #[arg(long, env = "AUTHGATE_CLIENT_SECRET")]
    client_secret: Option<String>,

    #[arg(long, env = "AUTHGATE_AUTHORIZE_URL")]
    authorize_url: String,

    #[arg(long, env = "AUTHGATE_TOKEN_URL")]
    token_url: String,

    #[arg(long, env = "AUTHGATE_PROFILE_URL")]
    profile_url: String,

    #[arg(long, env = "AUTHGATE_SCOPE")]
    scope: Option<String>,

    /// JSON path of the user id in the profile payload
    #[arg(long, default_value = "id", env = "AUTHGATE_USER_ID_PATH")]
    user_id_path: String,

    /// Disable PKCE for servers that reject it
    #[arg(long)]
    no_pkce: bool,

    /// Log provider traffic at debug level
    #[arg(long)]
    debug: bool,

    /// Open the login page in a browser once listening
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<(), AuthError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .map_err(|err| AuthError::Config(format!("invalid listen address: {err}")))?;
    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| format!("http://{addr}"));
    let redirect_uri = format!(
        "{}/auth/{}/callback",
        base_url.trim_end_matches('/'),
        cli.provider
    );

    let mut config = OAuthClientConfig::new(
        cli.client_id.clone(),
        cli.authorize_url.clone(),
        cli.token_url.clone(),
        redirect_uri,
    )
    .with_pkce(!cli.no_pkce)
    .with_timeout(Duration::from_secs(10));
    if let Some(secret) = &cli.client_secret {
        config = config.with_client_secret(secret.clone());
    }
    if let Some(scope) = &cli.scope {
        config = config.with_scope(scope.clone());
    }

    let provider = OAuth2Provider::new(cli.provider.clone(), config, cli.profile_url.clone())?
        .with_mapping(ProfileMapping::default().with_user_id(cli.user_id_path.clone()));
    provider.set_debug(cli.debug);

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(provider);

    let mut flow_config = FlowConfig::from_env()?;
    if !base_url.starts_with("https://") {
        flow_config = flow_config.with_cookie_secure(false);
    }
    let store = MemoryStore::with_ttl(flow_config.cookie_max_age);
    let flow = AuthFlow::new(registry, Arc::new(store)).with_config(flow_config);

    let app = Router::new()
        .route("/", get(index))
        .merge(web::auth_routes())
        .with_state(flow);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    if cli.open {
        if let Err(err) = webbrowser::open(&base_url) {
            tracing::warn!(%err, "failed to open browser automatically");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(State(flow): State<AuthFlow>) -> Html<String> {
    let links: String = flow
        .registry()
        .names()
        .iter()
        .map(|name| {
            let name = html_escape(name);
            format!("<li><a href=\"/auth/{name}\">Sign in with {name}</a></li>")
        })
        .collect();
    Html(format!(
        "<!doctype html>\n<html>\n  <head><meta charset=\"utf-8\" /><title>Sign in</title></head>\n  <body>\n    <ul>{links}</ul>\n  </body>\n</html>\n"
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
