//! Application state, HTTP router construction and serving.
//!
//! Used by [main] and by the integration tests to build and run the Axum app.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql::{ErrorExtensions, Pos};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::db::Database;
use crate::graphql::auth::bearer_token;
use crate::graphql::{
    ApiError, BookshelfSchema, connection_data, extract_token, resolve_current_user,
};
use crate::services::AuthService;

/// Shared state for HTTP handlers (GraphQL, health routes).
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub schema: BookshelfSchema,
    pub auth: Arc<AuthService>,
    /// Cancelled to stop accepting connections and close subscriptions
    pub shutdown: CancellationToken,
}

/// Build the full Axum router: /graphql, /graphql/ws, health checks and layers.
/// Returns Router<()> (state fully applied) for use with axum::serve.
pub fn build_app(state: AppState) -> Router<()> {
    Router::new()
        // Health endpoints (no auth required)
        .merge(api::health::router())
        // GraphQL endpoint (queries and mutations; GET serves the playground)
        .route("/graphql", get(graphiql).post(graphql_handler))
        // GraphQL WebSocket endpoint for subscriptions
        .route("/graphql/ws", get(graphql_ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the app until `state.shutdown` is cancelled.
///
/// In-flight HTTP requests finish; open subscription sockets are closed.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// GraphQL query/mutation handler with auth context
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let token = extract_token(&headers);

    match resolve_current_user(&state.auth, token.as_deref()).await {
        Ok(user) => {
            let mut request = req.into_inner();
            if let Some(user) = user {
                request = request.data(user);
            }
            state.schema.execute(request).await.into()
        }
        Err(e) => rejected(e).into(),
    }
}

/// A response for a request whose context could not be built
fn rejected(err: ApiError) -> async_graphql::Response {
    async_graphql::Response::from_errors(vec![err.extend().into_server_error(Pos::default())])
}

/// GraphiQL interactive playground (only for browsers)
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    // Check if this is a browser request (accepts HTML)
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(
            GraphiQLSource::build()
                .endpoint("/graphql")
                .subscription_endpoint("/graphql/ws")
                .finish(),
        )
        .into_response()
    } else {
        // Return a helpful JSON error for non-browser requests
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

/// GraphQL WebSocket handler for subscriptions with auth
async fn graphql_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    // Auth from headers for the initial connection
    let header_user =
        match resolve_current_user(&state.auth, extract_token(&headers).as_deref()).await {
            Ok(user) => user,
            Err(e) => {
                return (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response();
            }
        };

    let auth = state.auth.clone();
    let shutdown = state.shutdown.clone();
    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| async move {
            let connection = GraphQLWebSocket::new(socket, state.schema.clone(), protocol)
                .with_data(connection_data(header_user.clone()))
                // Token in connection_init payload (browsers cannot set WS headers).
                // Without one, the upgrade header's user stays in effect.
                .on_connection_init(move |params| {
                    let auth = auth.clone();
                    let header_user = header_user.clone();
                    async move {
                        let token = params
                            .get("Authorization")
                            .or_else(|| params.get("authorization"))
                            .and_then(|v| v.as_str())
                            .map(|v| bearer_token(v).unwrap_or(v).to_string());

                        match token {
                            Some(token) => resolve_current_user(&auth, Some(&token))
                                .await
                                .map(connection_data)
                                .map_err(|e| e.extend()),
                            None => Ok(connection_data(header_user)),
                        }
                    }
                })
                .serve();

            tokio::select! {
                _ = connection => {}
                _ = shutdown.cancelled() => {
                    tracing::debug!("Closing subscription connection for shutdown");
                }
            }
        })
        .into_response()
}
