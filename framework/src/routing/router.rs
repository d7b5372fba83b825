use crate::http::{HttpResponse, Request, Response};
use futures::future::BoxFuture;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Type alias for route handlers
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// HTTP router for GET and POST routes
///
/// ```rust,ignore
/// let router = Router::new()
///     .get("/health", |_req| async { json(json!({"status": "ok"})) })
///     .post("/api/events", move |req| ingest(state.clone(), req));
/// ```
#[derive(Default)]
pub struct Router {
    get_routes: MatchitRouter<BoxedHandler>,
    post_routes: MatchitRouter<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn boxed<H, Fut>(handler: H) -> BoxedHandler
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Arc::new(move |req| Box::pin(handler(req)))
    }

    /// Register a GET route
    pub fn get<H, Fut>(mut self, path: &str, handler: H) -> Self
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        if let Err(err) = self.get_routes.insert(path, Self::boxed(handler)) {
            tracing::error!(path, error = %err, "invalid route");
        }
        self
    }

    /// Register a POST route
    pub fn post<H, Fut>(mut self, path: &str, handler: H) -> Self
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        if let Err(err) = self.post_routes.insert(path, Self::boxed(handler)) {
            tracing::error!(path, error = %err, "invalid route");
        }
        self
    }

    /// Match a request and return the handler with extracted params
    pub fn match_route(
        &self,
        method: &hyper::Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let routes = match *method {
            hyper::Method::GET => &self.get_routes,
            hyper::Method::POST => &self.post_routes,
            _ => return None,
        };

        routes.at(path).ok().map(|matched| {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (matched.value.clone(), params)
        })
    }

    /// Route a request to its handler, answering 404 when nothing matches
    pub async fn dispatch(&self, request: Request) -> HttpResponse {
        match self.match_route(request.method(), request.path()) {
            Some((handler, params)) => {
                let response = handler(request.with_params(params)).await;
                response.unwrap_or_else(|e| e)
            }
            None => HttpResponse::json(serde_json::json!({ "message": "Not Found" })).status(404),
        }
    }
}
