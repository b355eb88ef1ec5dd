use crate::api::{
    error::INTERNAL_ERROR_MESSAGE,
    handlers::{health, root, Media, MessageResponse, Store},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, options},
    Extension, Json, Router,
};
use std::{any::Any, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod error;
pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState, SessionSigner, DEFAULT_SESSION_TTL_SECONDS};
pub use openapi::openapi;

/// Largest accepted request body, multipart uploads included.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Everything a handler may pull out of the request extensions.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: Arc<AuthState>,
    pub media: Media,
}

/// Wire the documented routes, the undocumented extras and the middleware stack.
pub fn app(state: AppState, cors_origin: Option<HeaderValue>) -> Router {
    // OpenAPI-wired routes first, then `/` and the preflight-only `OPTIONS /health`.
    let (router, _openapi) = router().split_for_parts();
    let mut app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(Extension(state.auth))
                .layer(Extension(state.media))
                .layer(Extension(state.store)),
        );

    if let Some(origin) = cors_origin {
        let cors = CorsLayer::new()
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_methods([Method::GET, Method::POST])
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true);
        app = app.layer(cors);
    }

    app
}

/// Start the server and block until a shutdown signal arrives.
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn serve(port: u16, state: AppState, cors_origin: Option<HeaderValue>) -> Result<()> {
    let app = app(state, cors_origin);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
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

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageResponse::failure(INTERNAL_ERROR_MESSAGE)),
    )
        .into_response()
}

/// Reduce a configured browser origin to `scheme://host[:port]`.
/// # Errors
/// Return error if the value is not an absolute URL with a host
pub fn cors_origin(raw: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid CORS origin: {raw}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {raw}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}
