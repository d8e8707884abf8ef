/*!
   Module `inbound` exposes the preview domain over HTTP.
*/

mod api;
mod handlers;

use crate::domain::ports::PreviewService;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpServerConfig<'a> {
    pub port: &'a str,
}

/// The global application state shared between all request handlers.
#[derive(Debug, Clone)]
struct AppState<PS: PreviewService> {
    preview_service: Arc<PS>,
}

/// The application's HTTP server. The underlying HTTP package is opaque to module consumers.
pub struct HttpServer {
    router: Router,
    listener: net::TcpListener,
}

impl HttpServer {
    /// Returns a new HTTP server bound to the port specified in `config`.
    pub async fn new<PS: PreviewService>(
        preview_service: PS,
        config: HttpServerConfig<'_>,
    ) -> anyhow::Result<Self> {
        let trace_layer = tower_http::trace::TraceLayer::new_for_http().make_span_with(
            |request: &axum::extract::Request| {
                let uri = request.uri().to_string();
                tracing::info_span!("http_request", method = ?request.method(), uri)
            },
        );

        let state = AppState {
            preview_service: Arc::new(preview_service),
        };

        let router = axum::Router::new()
            .merge(routes::<PS>())
            .layer(trace_layer)
            .with_state(state);

        let listener = net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
            .await
            .with_context(|| format!("failed to listen on {}", config.port))?;

        Ok(Self { router, listener })
    }

    /// Runs the HTTP server.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::debug!("listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router)
            .await
            .context("received error from running server")?;

        Ok(())
    }
}

fn routes<PS: PreviewService>() -> Router<AppState<PS>> {
    Router::new()
        .route("/styles", get(handlers::list_styles_handler))
        .route("/preview", post(handlers::create_preview_handler::<PS>))
}
