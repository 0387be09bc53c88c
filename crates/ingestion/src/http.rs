//! HTTP listener
//!
//! Routes:
//! - `POST <inputs.http.path>`: ingest one or more metrics
//! - `GET /_health`: liveness
//! - `GET <output.prometheus.endpoint>`: Prometheus text exposition
//!
//! Served over plain TCP, or TLS when `inputs.http.tls.enabled`.

use std::io::{BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{RelayConfig, RunMode, TlsConfig, FAVICON_PATH, HEALTH_PATH};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use observability::MetricsHandle;
use rustls_pemfile::{certs, pkcs8_private_keys};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::adapter::InputAdapter;
use crate::config::IngestionMetrics;
use crate::error::{IngestionError, QueueError, Result};
use crate::parser::{parse_http_body, HTTP_SOURCE};
use crate::queue::QueueProducer;

/// Correlation id header, reused when supplied by the client
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Correlation id of the current request, stored in request extensions
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

#[derive(Clone)]
struct AppState {
    producer: QueueProducer,
    metrics: Arc<IngestionMetrics>,
    prometheus: Option<MetricsHandle>,
}

#[derive(Clone)]
struct TrackingState {
    mode: RunMode,
    routes: Arc<[String]>,
}

/// HTTP input adapter
pub struct HttpListener {
    bind_addr: String,
    ingest_path: String,
    metrics_path: Option<String>,
    tls: TlsConfig,
    mode: RunMode,
    producer: QueueProducer,
    metrics: Arc<IngestionMetrics>,
    prometheus: Option<MetricsHandle>,
}

impl HttpListener {
    pub fn new(config: &RelayConfig, producer: QueueProducer) -> Self {
        let http = &config.inputs.http;
        let prometheus = &config.output.prometheus;

        Self {
            bind_addr: http.bind_addr(),
            ingest_path: http.path.clone(),
            metrics_path: prometheus.enabled.then(|| prometheus.endpoint.clone()),
            tls: http.tls.clone(),
            mode: config.app.mode,
            producer,
            metrics: Arc::new(IngestionMetrics::new(HTTP_SOURCE)),
            prometheus: None,
        }
    }

    /// Attach the Prometheus handle rendered by the metrics endpoint
    pub fn with_metrics_handle(mut self, handle: MetricsHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Shared ingestion counters
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        let state = AppState {
            producer: self.producer.clone(),
            metrics: Arc::clone(&self.metrics),
            prometheus: self.prometheus.clone(),
        };

        let mut routes = vec![self.ingest_path.clone(), HEALTH_PATH.to_string()];

        let mut router = Router::new()
            .route(&self.ingest_path, post(ingest))
            .route(HEALTH_PATH, get(health))
            .route(FAVICON_PATH, get(favicon));

        if let Some(path) = &self.metrics_path {
            router = router.route(path, get(render_metrics));
            routes.push(path.clone());
        }

        let tracking = TrackingState {
            mode: self.mode,
            routes: routes.into(),
        };

        router
            .with_state(state)
            .layer(middleware::from_fn_with_state(tracking, track_request))
    }

    /// Load TLS material and bind the listening socket
    ///
    /// Nothing is served until [`BoundHttpListener::serve`] is called.
    #[instrument(name = "http_listener_bind", skip(self), fields(addr = %self.bind_addr))]
    pub async fn bind(self) -> Result<BoundHttpListener> {
        let acceptor = if self.tls.enabled {
            Some(load_tls(&self.tls)?)
        } else {
            None
        };

        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|source| IngestionError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            path = %self.ingest_path,
            tls = acceptor.is_some(),
            "HTTP listener bound"
        );

        Ok(BoundHttpListener {
            router: self.router(),
            listener,
            acceptor,
            local_addr,
        })
    }
}

impl InputAdapter for HttpListener {
    fn name(&self) -> &'static str {
        HTTP_SOURCE
    }

    async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bind().await?.serve(shutdown).await
    }
}

/// HTTP listener with its socket bound
pub struct BoundHttpListener {
    router: Router,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    local_addr: SocketAddr,
}

impl BoundHttpListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is cancelled, then finish in-flight requests
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        match self.acceptor {
            None => {
                axum::serve(self.listener, self.router)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await?;
            }
            Some(acceptor) => serve_tls(self.listener, acceptor, self.router, shutdown).await,
        }

        info!("HTTP listener stopped");
        Ok(())
    }
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let router = router.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let builder = Builder::new(TokioExecutor::new());
            let connection = builder.serve_connection(
                TokioIo::new(tls_stream),
                TowerToHyperService::new(router),
            );
            tokio::pin!(connection);

            let result = tokio::select! {
                result = connection.as_mut() => result,
                _ = shutdown.cancelled() => {
                    connection.as_mut().graceful_shutdown();
                    connection.as_mut().await
                }
            };

            if let Err(e) = result {
                debug!(peer = %peer, error = %e, "TLS connection closed with error");
            }
        });
    }
}

/// Load a PEM certificate chain and PKCS#8 private key
fn load_tls(config: &TlsConfig) -> Result<TlsAcceptor> {
    let cert_file = std::fs::read(&config.cert_path).map_err(|e| {
        IngestionError::tls(format!("cannot read certificate {}: {e}", config.cert_path))
    })?;
    let certs: Vec<CertificateDer> = certs(&mut BufReader::new(Cursor::new(cert_file)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| IngestionError::tls(format!("invalid certificate {}: {e}", config.cert_path)))?;

    if certs.is_empty() {
        return Err(IngestionError::tls(format!(
            "no certificates found in {}",
            config.cert_path
        )));
    }

    let key_file = std::fs::read(&config.key_path).map_err(|e| {
        IngestionError::tls(format!("cannot read private key {}: {e}", config.key_path))
    })?;
    let key = pkcs8_private_keys(&mut BufReader::new(Cursor::new(key_file)))
        .next()
        .transpose()
        .map_err(|e| IngestionError::tls(format!("invalid private key {}: {e}", config.key_path)))?
        .map(PrivateKeyDer::from)
        .ok_or_else(|| {
            IngestionError::tls(format!("no private keys found in {}", config.key_path))
        })?;

    let tls_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| IngestionError::tls(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

async fn ingest(State(state): State<AppState>, body: Bytes) -> Response {
    let messages = match parse_http_body(&body) {
        Ok(messages) => messages,
        Err(e) => {
            state.metrics.record_parse_error();
            warn!(error = %e, "Rejected malformed payload");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string(), 0);
        }
    };

    state.metrics.record_received(messages.len());

    let mut accepted = 0usize;
    for message in messages {
        match state.producer.enqueue(message).await {
            Ok(()) => {
                state.metrics.record_enqueued();
                accepted += 1;
            }
            Err(e) => {
                state.metrics.record_rejected();
                let status = match e {
                    QueueError::Full { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    QueueError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
                };
                warn!(error = %e, accepted, "Enqueue failed");
                return error_response(status, &e.to_string(), accepted);
            }
        }
    }

    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))).into_response()
}

fn error_response(status: StatusCode, message: &str, accepted: usize) -> Response {
    (
        status,
        Json(json!({ "error": message, "accepted": accepted })),
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Correlation id, request metrics and access log
async fn track_request(
    State(tracking): State<TrackingState>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = if tracking.routes.iter().any(|r| *r == path) {
        path.clone()
    } else {
        "other".to_string()
    };

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let latency = started.elapsed();
    let status = response.status().as_u16();

    observability::record_http_request(method.as_str(), &route, status, latency);

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    span.in_scope(|| {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        match tracking.mode {
            RunMode::Dev => info!(status, latency_ms, "request completed"),
            RunMode::Prod => debug!(status, latency_ms, "request completed"),
        }
    });

    response
}
