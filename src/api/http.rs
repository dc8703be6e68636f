//! HTTP server setup and handlers.
//!
//! # Responsibilities
//! - Create Axum Router with the user endpoints
//! - Apply the shared rate limiter before any body is read
//! - Decode requests, call the service, encode results and errors
//! - Answer unmatched paths and expired requests with the same error body
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::domain::{render, Error, SharedService, User};
use crate::observability::metrics;
use crate::resilience::timeouts::DeadlineExceeded;
use crate::resilience::RateLimiter;
use crate::transport::http::{
    is_user_path, status_for, CreateUserRequest, ErrorResponse, USERS_PATH, USER_ROUTE,
};
use crate::transport::rpc::{CREATE_USER, FIND_USER_BY_ID};

const TRANSPORT: &str = "http";

/// Encode any error as a status code and `{"error": {code, message}}` body.
pub fn error_response(err: &Error) -> Response {
    let body = render(err);
    let status = status_for(body.code);
    (status, Json(ErrorResponse { error: body })).into_response()
}

/// HTTP server for the user API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(
        service: SharedService,
        limiter: Arc<RateLimiter>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            router: build_router(service, limiter, request_timeout),
        }
    }

    /// Run the server, accepting connections on the given listener until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(
    service: SharedService,
    limiter: Arc<RateLimiter>,
    request_timeout: Duration,
) -> Router {
    Router::new()
        .route(USERS_PATH, post(create_user))
        .route(USER_ROUTE, get(find_user))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit))
        .fallback(unmatched)
        .with_state(service)
        .layer(middleware::from_fn_with_state(request_timeout, deadline))
        .layer(TraceLayer::new_for_http())
}

async fn deadline(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(transport = TRANSPORT, timeout = ?limit, "Request deadline exceeded");
            error_response(&Error::internal().with_cause(DeadlineExceeded(limit)))
        }
    }
}

/// A path under the users collection that no route matched carries a malformed id.
async fn unmatched(uri: Uri) -> Response {
    if is_user_path(uri.path()) {
        error_response(&Error::invalid_user_id())
    } else {
        error_response(&Error::not_found())
    }
}

async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(
                transport = TRANSPORT,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(TRANSPORT);
            error_response(&err)
        }
    }
}

async fn create_user(State(service): State<SharedService>, body: Bytes) -> Response {
    let start = Instant::now();
    let result = async {
        let request: CreateUserRequest =
            serde_json::from_slice(&body).map_err(|e| Error::internal().with_cause(e))?;
        let mut user = User::new(request.username);
        service.create_user(&mut user).await?;
        Ok::<_, Error>(user)
    }
    .await;

    metrics::record_request(
        TRANSPORT,
        CREATE_USER,
        result.as_ref().err().map(Error::code),
        start.elapsed(),
    );
    match result {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn find_user(
    State(service): State<SharedService>,
    user_id: Result<Path<String>, PathRejection>,
) -> Response {
    let start = Instant::now();
    let result = match user_id {
        Ok(Path(user_id)) => service.find_user_by_id(&user_id).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Undecodable user id");
            Err(Error::invalid_user_id())
        }
    };

    metrics::record_request(
        TRANSPORT,
        FIND_USER_BY_ID,
        result.as_ref().err().map(Error::code),
        start.elapsed(),
    );
    match result {
        Ok(user) => Json(user).into_response(),
        Err(err) => error_response(&err),
    }
}
