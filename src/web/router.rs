//! Route definitions for web server.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::{api, auth, AppState};

/// Login and messaging routes, behind the bearer-token guard.
pub fn create_control_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/qr", get(api::qr))
        .route("/pair", post(api::pair))
        .route("/send", post(api::send))
        .route("/auth/status", get(api::status))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token))
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .merge(create_control_router(state.clone()))
        .route("/health", get(health_check))
        .route("/bridge/events", post(api::events))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::auth::{Arbiter, ArbiterOptions, Method};
    use crate::transport::testing::RecordingTransport;
    use crate::transport::{SessionEvent, TransportEvent};

    struct Harness {
        app: Router,
        arbiter: Arc<Arbiter>,
        main: Arc<RecordingTransport>,
        events: mpsc::Receiver<SessionEvent>,
    }

    fn harness(secret: Option<&str>) -> Harness {
        let main = Arc::new(RecordingTransport::new());
        let arbiter = Arc::new(Arbiter::new(
            Arc::clone(&main) as Arc<dyn crate::transport::Transport>,
            ArbiterOptions {
                qr_wait: Duration::from_millis(100),
            },
        ));
        let (tx, rx) = mpsc::channel(8);
        let state = AppState {
            arbiter: Arc::clone(&arbiter),
            events: tx,
            secret: secret.map(Arc::from),
        };
        Harness {
            app: create_app_router(state),
            arbiter,
            main,
            events: rx,
        }
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(Some("s3cret"));
        let resp = h.app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_qr_rejected_while_terminal_owns() {
        let h = harness(None);
        h.arbiter.begin_terminal(Method::Qr).await.unwrap();

        let resp = h.app.oneshot(get_req("/qr")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("terminal"));
        assert_eq!(h.arbiter.snapshot().await.session.method, Method::Qr);
    }

    #[tokio::test]
    async fn test_qr_text_and_png() {
        let h = harness(None);
        h.arbiter
            .handle_event(
                "main",
                &TransportEvent::QrCode {
                    payload: "2@abc".to_string(),
                },
            )
            .await;

        let resp = h
            .app
            .clone()
            .oneshot(get_req("/qr?format=text"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["qr"], "2@abc");

        let resp = h.app.oneshot(get_req("/qr")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_qr_timeout_is_bad_gateway() {
        let h = harness(None);
        let resp = h.app.oneshot(get_req("/qr")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            h.arbiter.snapshot().await.session.owner,
            crate::auth::Owner::None
        );
    }

    #[tokio::test]
    async fn test_pair_invalid_phone() {
        let h = harness(None);
        let resp = h
            .app
            .oneshot(post_json("/pair", r#"{"phone": "12"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(h.main.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pair_returns_code() {
        let h = harness(None);
        let resp = h
            .app
            .oneshot(post_json("/pair", r#"{"phone": "+254700000000"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["code"], "ABCD1234");
    }

    #[tokio::test]
    async fn test_send_requires_ready_session() {
        let h = harness(None);
        let req = r#"{"target": "254700000000", "text": "hello"}"#;

        let resp = h.app.clone().oneshot(post_json("/send", req)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        h.arbiter.handle_event("main", &TransportEvent::Ready).await;
        let resp = h.app.oneshot(post_json("/send", req)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            h.main.sent(),
            vec![("254700000000@c.us".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_bridge_events_forwarded() {
        let mut h = harness(Some("s3cret"));
        let resp = h
            .app
            .oneshot(post_json(
                "/bridge/events",
                r#"{"session": "main", "type": "ready"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let event = h.events.recv().await.unwrap();
        assert_eq!(event.event, TransportEvent::Ready);
    }

    #[tokio::test]
    async fn test_token_guard() {
        let h = harness(Some("s3cret"));

        let resp = h
            .app
            .clone()
            .oneshot(get_req("/auth/status"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let token = auth::generate_token("s3cret", "operator", 1).unwrap();
        let req = Request::builder()
            .uri("/auth/status")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let resp = h.app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["phase"], "idle");
        assert_eq!(body["owner"], "none");
        assert_eq!(body["ready"], false);
    }
}
