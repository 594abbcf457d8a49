//! axum wiring of the schema endpoint.
//!
//! Requires the `server` feature (enabled by default).

use std::sync::Arc;

use axum::extract::rejection::{HostRejection, PathRejection};
use axum::extract::{Host, Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use crate::boundary::{respond, FlagDefaults, RequestFlags, SchemaQuery, SchemaResponse};
use crate::config::JsonSchemasConfig;
use crate::service::SchemaService;
use crate::types::Principal;

#[derive(Clone)]
struct AppState {
    service: Arc<SchemaService>,
    defaults: FlagDefaults,
    principal_header: Option<HeaderName>,
}

/// Build the router serving `GET {endpoint}/*path`.
///
/// When `register_routes` is off the router has no routes and answers 404
/// to everything.
pub fn router(service: Arc<SchemaService>, config: &JsonSchemasConfig) -> Router {
    if !config.register_routes {
        return Router::new();
    }

    let principal_header = config.principal_header.as_deref().and_then(|name| {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| warn!(header = name, "ignoring invalid principal header name"))
            .ok()
    });

    let route = format!("{}/*path", service.mapper().rule().endpoint());
    let state = AppState {
        service,
        defaults: FlagDefaults::from(config),
        principal_header,
    };

    Router::new()
        .route(&route, get(get_schema))
        .with_state(state)
}

/// Bind `config.bind` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns the I/O error if binding or serving fails.
pub async fn serve(service: Arc<SchemaService>, config: &JsonSchemasConfig) -> std::io::Result<()> {
    let app = router(service, config);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %listener.local_addr()?, endpoint = %config.endpoint, "serving schemas");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn get_schema(
    State(state): State<AppState>,
    host: Result<Host, HostRejection>,
    path: Result<Path<String>, PathRejection>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let (Ok(Host(host)), Ok(Path(path))) = (host, path) else {
        return to_http(SchemaResponse::not_found());
    };
    if !state.service.mapper().matches_host(&host) {
        return to_http(SchemaResponse::not_found());
    }

    let principal = Principal::from_header(
        state
            .principal_header
            .as_ref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok()),
    );
    let flags = RequestFlags::from_query(&SchemaQuery::parse(query.as_deref()), state.defaults);

    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || respond(&service, &path, flags, &principal)).await {
        Ok(response) => to_http(response),
        Err(e) => {
            warn!(error = %e, "schema request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn to_http(response: SchemaResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::NOT_FOUND);
    (status, Json(response.body.as_ref())).into_response()
}
