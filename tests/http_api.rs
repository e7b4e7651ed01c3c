//! HTTP API integration tests
//!
//! Exercise the axum router in-process with `tower::ServiceExt::oneshot`;
//! no network, Redis or database is needed.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use sirama_queue_service::announcer::{AnnouncementPublisher, AnnouncementSink, BroadcastSink};
use sirama_queue_service::auth::Claims;
use sirama_queue_service::config::Settings;
use sirama_queue_service::server::{create_app, AppState};
use sirama_queue_service::store::{MemoryQueueStore, QueueStore};

const SECRET: &str = "integration-test-secret";

struct TestApp {
    router: Router,
    broadcast: BroadcastSink,
    _shutdown: broadcast::Sender<()>,
}

fn create_test_app(settings: Settings) -> TestApp {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let broadcast_sink = BroadcastSink::new(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sinks: Vec<Arc<dyn AnnouncementSink>> = vec![Arc::new(broadcast_sink.clone())];
    let (publisher, _handle) = AnnouncementPublisher::spawn(sinks, 16, shutdown_rx);

    let state = AppState::new(settings, store, publisher, broadcast_sink.clone(), None);

    TestApp {
        router: create_app(state),
        broadcast: broadcast_sink,
        _shutdown: shutdown_tx,
    }
}

fn open_app() -> TestApp {
    create_test_app(Settings::default())
}

fn secured_app() -> TestApp {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = Some(SECRET.to_string());
    create_test_app(settings)
}

fn token(roles: &[&str]) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: "staff-1".to_string(),
        exp: now + 3600,
        iat: now,
        roles: roles.iter().map(|r| r.to_string()).collect(),
        extra: Default::default(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_queue(app: &TestApp, service_type: &str, bearer: Option<&str>) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/queue-managements",
        Some(json!({
            "service_type": service_type,
            "working_hours_start": "08:00",
            "working_hours_end": "14:00",
            "max_queue_per_hour": 12,
            "average_consultation_time": 10
        })),
        bearer,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

async fn start(app: &TestApp, id: i64) {
    let (status, _) = send(
        app,
        Method::POST,
        &format!("/queue-managements/{}/action", id),
        Some(json!({ "action": "start" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Queue endpoints
// ============================================================================

mod queue_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_fetch_queue() {
        let app = open_app();
        let id = create_queue(&app, "Poli Umum", None).await;

        let (status, body) = send(&app, Method::GET, &format!("/queue-managements/{}", id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "paused");
        assert_eq!(body["data"]["working_hours_start"], "08:00");
        assert_eq!(body["data"]["service_type"], "Poli Umum");

        let (status, body) = send(&app, Method::GET, "/queue-managements", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_call_next_and_skip() {
        let app = open_app();
        let id = create_queue(&app, "Poli Gigi", None).await;
        start(&app, id).await;
        let mut announcements = app.broadcast.subscribe();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/call-next", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["announcement"]["number"], 1);
        assert_eq!(body["data"]["queue"]["total_served_today"], 1);
        assert_eq!(announcements.recv().await.unwrap().number, 1);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/skip", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_number"], 2);
        assert_eq!(body["data"]["total_skipped_today"], 1);
        assert_eq!(body["data"]["total_served_today"], 1);
    }

    #[tokio::test]
    async fn test_domain_errors_map_to_status_codes() {
        let app = open_app();
        let id = create_queue(&app, "Poli Mata", None).await;

        // Paused queue cannot call
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/call-next", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "QUEUE_NOT_ACTIVE");

        // Paused queue cannot be paused again
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/action", id),
            Some(json!({ "action": "pause" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");

        let (status, body) = send(&app, Method::GET, "/queue-managements/999", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = send(
            &app,
            Method::POST,
            "/queue-managements",
            Some(json!({
                "service_type": "Poli Jantung",
                "working_hours_start": "15:00",
                "working_hours_end": "09:00",
                "average_consultation_time": 10
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/action", id),
            Some(json!({ "action": "explode" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_put_status_goes_through_transitions() {
        let app = open_app();
        let id = create_queue(&app, "Poli Umum", None).await;
        let uri = format!("/queue-managements/{}", id);

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({ "status": "active", "average_consultation_time": 12 })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["average_consultation_time"], 12);

        send(&app, Method::PUT, &uri, Some(json!({ "status": "stopped" })), None).await;

        // stopped -> paused is not a legal transition
        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "status": "paused" })), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_issue_ticket_and_queue_empty() {
        let app = open_app();
        let id = create_queue(&app, "Poli Anak", None).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/issue", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["ticket_number"], 1);

        start(&app, id).await;
        let call = format!("/queue-managements/{}/call-next", id);
        let (status, _) = send(&app, Method::POST, &call, None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::POST, &call, None, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "QUEUE_EMPTY");
    }

    #[tokio::test]
    async fn test_delete_queue() {
        let app = open_app();
        let id = create_queue(&app, "Poli Kulit", None).await;
        let uri = format!("/queue-managements/{}", id);

        let (status, body) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Queue deleted");

        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

// ============================================================================
// Polled endpoints and bulk actions
// ============================================================================

mod dashboard_tests {
    use super::*;

    #[tokio::test]
    async fn test_active_list_reflects_writes_immediately() {
        let app = open_app();
        let first = create_queue(&app, "Poli Umum", None).await;
        let _second = create_queue(&app, "Poli Gigi", None).await;

        let (_, body) = send(&app, Method::GET, "/queue-managements/active", None, None).await;
        assert!(body["data"].as_array().unwrap().is_empty());

        start(&app, first).await;

        let (status, body) = send(&app, Method::GET, "/queue-managements/active", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let active = body["data"].as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], first);
    }

    #[tokio::test]
    async fn test_statistics() {
        let app = open_app();
        let a = create_queue(&app, "Poli Umum", None).await;
        let _b = create_queue(&app, "Poli Umum", None).await;
        let c = create_queue(&app, "Poli Gigi", None).await;
        start(&app, a).await;
        start(&app, c).await;
        send(&app, Method::POST, &format!("/queue-managements/{}/call-next", a), None, None).await;

        let (status, body) = send(&app, Method::GET, "/queue-managements/statistics", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let stats = &body["data"];
        assert_eq!(stats["total_queues"], 3);
        assert_eq!(stats["active_queues"], 2);
        assert_eq!(stats["paused_queues"], 1);
        assert_eq!(stats["total_served_today"], 1);
        assert_eq!(stats["by_service_type"]["Poli Umum"]["count"], 2);
        assert_eq!(stats["by_service_type"]["Poli Gigi"]["count"], 1);
    }

    #[tokio::test]
    async fn test_bulk_action_partial_failure() {
        let app = open_app();
        let a = create_queue(&app, "Poli Umum", None).await;
        let b = create_queue(&app, "Poli Gigi", None).await;
        start(&app, a).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/queue-managements/bulk-action",
            Some(json!({ "action": "pause" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["succeeded"], json!([a]));
        assert_eq!(body["data"]["failed"][0]["queue_id"], b);
        assert_eq!(body["data"]["failed"][0]["code"], "INVALID_TRANSITION");

        let (_, body) = send(
            &app,
            Method::POST,
            "/queue-managements/bulk-action",
            Some(json!({ "action": "start" })),
            None,
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["succeeded"], json!([a, b]));

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/queue-managements/{}/action", a),
            Some(json!({ "action": "stop" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/queue-managements/bulk-action",
            Some(json!({ "action": "stop" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["succeeded"], json!([b]));
        assert_eq!(body["data"]["failed"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["failed"][0]["queue_id"], a);
        assert_eq!(body["data"]["failed"][0]["code"], "INVALID_TRANSITION");
    }
}

// ============================================================================
// Health, metrics and auth
// ============================================================================

mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = open_app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["backend"], "memory");
        assert!(body.get("postgres").is_none());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = open_app();
        let id = create_queue(&app, "Poli Umum", None).await;
        start(&app, id).await;

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("sirama_queues"));
        assert!(text.contains("sirama_queue_operations_total"));
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let app = open_app();
        let (status, body) = send(&app, Method::GET, "/no-such-route", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_auth_required_when_secret_configured() {
        let app = secured_app();

        let (status, body) = send(&app, Method::GET, "/queue-managements", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = send(&app, Method::GET, "/queue-managements", None, Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Health stays open
        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_operator_role_required_for_mutations() {
        let app = secured_app();
        let viewer = token(&["display"]);
        let nurse = token(&["nurse"]);

        let (status, _) = send(&app, Method::GET, "/queue-managements", None, Some(&viewer)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/queue-managements",
            Some(json!({
                "service_type": "Poli Umum",
                "working_hours_start": "08:00",
                "working_hours_end": "14:00",
                "average_consultation_time": 10
            })),
            Some(&viewer),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        create_queue(&app, "Poli Umum", Some(&nurse)).await;
    }
}
