use crate::{
    api::handlers::health,
    auth::{AuthConfig, AuthService, SessionService},
    cache::{CacheStore, MemoryCache, RedisCache},
    catalog::{CatalogRepository, CatalogService, PgCatalogRepository},
    queue::{MemoryQueue, MessageQueue},
    users::{PgUserRepository, UserRepository, UserService},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    routing::options,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod email;
pub mod handlers;
pub mod middleware;
pub mod response;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;


pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Account created at startup when no user holds its email yet.
#[derive(Debug, Clone)]
pub struct Owner {
    pub full_name: String,
    pub email: String,
}

/// Everything the handlers reach through request extensions.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AuthConfig>,
    pub cache: Arc<dyn CacheStore>,
    pub repo: Arc<dyn UserRepository>,
    pub sessions: Arc<SessionService>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
}

impl Services {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn MessageQueue>,
        repo: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionService::new(cache.clone(), config.session_ttl()));
        let auth = Arc::new(AuthService::new(
            config.clone(),
            cache.clone(),
            queue,
            sessions.clone(),
            repo.clone(),
        ));
        let users = Arc::new(UserService::new(
            repo.clone(),
            cache.clone(),
            sessions.clone(),
            config.user_cache_ttl(),
        ));
        let catalog = Arc::new(CatalogService::new(catalog));

        Self {
            config,
            cache,
            repo,
            sessions,
            auth,
            users,
            catalog,
        }
    }
}

/// Assemble the HTTP application: documented routes, the undocumented
/// `OPTIONS /health`, request ids, tracing, CORS and the service extensions.
///
/// # Errors
/// Returns an error if a redirect URL cannot be turned into a CORS origin.
pub fn app(services: &Services) -> Result<Router> {
    let origins = [
        frontend_origin(services.config.redirect_admin_url())?,
        frontend_origin(services.config.redirect_member_url())?,
    ];
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true);

    let (router, _openapi) = router().split_for_parts();
    let app = router.route("/health", options(health::health)).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(services.config.clone()))
            .layer(Extension(services.cache.clone()))
            .layer(Extension(services.repo.clone()))
            .layer(Extension(services.sessions.clone()))
            .layer(Extension(services.auth.clone()))
            .layer(Extension(services.users.clone()))
            .layer(Extension(services.catalog.clone())),
    );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    redis_url: Option<SecretString>,
    auth_config: AuthConfig,
    owner: Option<Owner>,
    email_sender: Arc<dyn email::EmailSender>,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let cache: Arc<dyn CacheStore> = match redis_url {
        Some(url) => Arc::new(RedisCache::connect(url.expose_secret()).await?),
        None => {
            warn!("No Redis URL configured, sessions live in process memory");
            Arc::new(MemoryCache::new())
        }
    };

    let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new());
    let repo: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    let catalog: Arc<dyn CatalogRepository> = Arc::new(PgCatalogRepository::new(pool));

    // Background worker drains send_email_queue and hands each task to the sender.
    email::spawn_email_worker(queue.clone(), email_sender).await?;

    let services = Services::new(auth_config, cache, queue, repo, catalog);

    if let Some(owner) = owner {
        services
            .users
            .ensure_owner(&owner.full_name, &owner.email)
            .await
            .with_context(|| format!("Failed to bootstrap owner {}", owner.email))?;
    }

    let app = app(&services)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
