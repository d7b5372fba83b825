use crate::config::{Config, ServerConfig};
use crate::http::{collect_body, HttpResponse, Request};
use crate::routing::Router;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Server {
    router: Arc<Router>,
    host: String,
    port: u16,
    max_body_size: usize,
}

impl Server {
    pub fn from_config(router: Router) -> Self {
        let config = Config::get::<ServerConfig>().unwrap_or_else(ServerConfig::from_env);
        Self {
            router: Arc::new(router),
            host: config.host,
            port: config.port,
            max_body_size: config.max_body_size,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()>,
    {
        let addr: SocketAddr = format!("{}:{}", self.host, self.port).parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(%addr, "ingestion server listening");

        let router = self.router;
        let max_body_size = self.max_body_size;
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    tracing::info!("ingestion server stopped");
                    return Ok(());
                }
            };
            let io = TokioIo::new(stream);
            let router = router.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(handle_request(router, req, max_body_size).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, error = ?err, "error serving connection");
                }
            });
        }
    }
}

async fn handle_request(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    let body = match collect_body(body, max_body_size).await {
        Ok(body) => body,
        Err(err) => return HttpResponse::from(err).status(413).into_hyper(),
    };

    let request = Request::new(parts.method.clone(), path.clone())
        .with_headers(parts.headers)
        .with_body(body);

    let response = router.dispatch(request).await;
    tracing::info!(method = %parts.method, %path, status = response.status_code(), "request handled");
    response.into_hyper()
}
