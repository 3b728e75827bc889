use crate::{
    config::{Config, CorsConfig},
    model_service::ModelService,
    ort_service::OrtModelService,
    routes::api_routes,
};
use anyhow::Context;
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct SharedState {
    pub model_service: Arc<dyn ModelService>,
}

pub fn build_router(model_service: Arc<dyn ModelService>, config: &Config) -> anyhow::Result<Router> {
    let app_state = SharedState { model_service };

    let router = Router::new()
        .merge(api_routes())
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors_layer(&config.cors)?)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

/// Wildcard methods and headers cannot be combined with credentials, so both
/// are mirrored back from the preflight request instead.
fn cors_layer(cors: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let origins = cors
        .allowed_origins
        .iter()
        .map(|origin| {
            if origin == "*" {
                anyhow::bail!("wildcard CORS origin cannot be used with credentials");
            }
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin {origin:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(model_service: Arc<dyn ModelService>, config: &Config) -> anyhow::Result<Self> {
        let addr = config.server.get_address();
        let router = build_router(model_service, config)?;
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let shutdown = async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown")
        };

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let model_service = match OrtModelService::new(&config.model) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("Failed to load model: {}", e);
            return Err(Box::new(e));
        }
    };

    tracing::info!(
        "Allowed CORS origins: {}",
        config.cors.allowed_origins.join(", ")
    );

    let server = HttpServer::new(model_service, &config).await?;
    server.run().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
