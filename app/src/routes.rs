use kit::{json, HttpResponse, Request, Response, Router};
use serde_json::json as value;
use std::sync::Arc;

use crate::events::{EventBus, EventEnvelope};

pub fn router(events: Arc<dyn EventBus>) -> Router {
    Router::new()
        .get("/health", |_req: Request| async { json(value!({ "status": "ok" })) })
        .post("/api/events", move |req: Request| ingest(events.clone(), req))
}

/// Accept a trigger event and enqueue its workflow
async fn ingest(events: Arc<dyn EventBus>, req: Request) -> Response {
    let event = req.json::<EventEnvelope>()?.into_event()?;
    events.send(&event).await?;

    Ok(HttpResponse::json(value!({
        "accepted": event.name(),
        "slug": event.slug(),
    }))
    .status(202))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::testing::RecordingEventBus;
    use kit::http::Method;

    fn post(body: &str) -> Request {
        Request::new(Method::POST, "/api/events").with_body(body.to_string())
    }

    #[tokio::test]
    async fn test_event_is_accepted() {
        let bus = Arc::new(RecordingEventBus::new());
        let router = router(bus.clone());

        let response = router
            .dispatch(post(r#"{"name":"tool.scheduled","data":{"slug":"foo"}}"#))
            .await;

        assert_eq!(response.status_code(), 202);
        assert_eq!(bus.sent(), vec![Event::ToolScheduled { slug: "foo".into() }]);
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let bus = Arc::new(RecordingEventBus::new());
        let router = router(bus.clone());

        let response = router
            .dispatch(post(r#"{"name":"tool.exploded","data":{"slug":"foo"}}"#))
            .await;

        assert_eq!(response.status_code(), 422);
        assert!(bus.sent().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let router = router(Arc::new(RecordingEventBus::new()));
        let response = router.dispatch(Request::new(Method::GET, "/health")).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body(), r#"{"status":"ok"}"#);
    }
}
