use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;
use yatra_api::build_app;

const API_KEY: &str = "dev-yatra-key";

async fn app() -> Router {
    build_app().await.expect("app should build")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn turn_request(user_id: &str, text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/turn")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({ "user_id": user_id, "text": text }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["store"], "memory");
    assert!(parsed["metrics"].get("turns_total").is_some());
}

#[tokio::test]
async fn webhook_replies_with_escaped_twiml() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(
            "Body=Book%20train%20from%20Delhi%20to%20Mumbai&From=whatsapp%3A%2B919800000001",
        ))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/xml"
    );

    let body = body_text(response).await;
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>"));
    assert!(body.ends_with("</Message></Response>"));
    assert!(body.contains("When do you want to travel?"));
}

#[tokio::test]
async fn webhook_strips_channel_prefix_from_sender() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("Body=bus%20from%20Mumbai%20to%20Pune&From=whatsapp%3A%2B15550001"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats = Request::builder()
        .uri("/v1/users/+15550001/stats")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(stats).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["turn_count"], 1);
    assert_eq!(parsed["active_task"], "bus_booking");
}

#[tokio::test]
async fn webhook_without_text_gets_a_polite_reply() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("Body=&From=whatsapp%3A%2B15550002"))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("couldn&apos;t read that message"));
}

#[tokio::test]
async fn turn_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/turn")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "user_id": "u1", "text": "hello" }).to_string(),
        ))
        .unwrap();

    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn turn_walks_through_a_booking() {
    let app = app().await;

    let first = app
        .clone()
        .oneshot(turn_request("rider", "I want to book a train from Delhi to Mumbai"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body_text(first).await).unwrap();
    assert_eq!(parsed["user_id"], "rider");
    assert!(parsed["reply"]
        .as_str()
        .unwrap()
        .contains("When do you want to travel?"));

    let second = app
        .clone()
        .oneshot(turn_request("rider", "tomorrow"))
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body_text(second).await).unwrap();
    assert!(parsed["reply"]
        .as_str()
        .unwrap()
        .contains("Which class would you prefer?"));

    let third = app.oneshot(turn_request("rider", "2AC")).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body_text(third).await).unwrap();
    let reply = parsed["reply"].as_str().unwrap();
    assert!(reply.contains("Delhi"));
    assert!(reply.contains("2AC"));
}

#[tokio::test]
async fn stats_are_missing_until_the_first_turn() {
    let app = app().await;

    let stats = || {
        Request::builder()
            .uri("/v1/users/newcomer/stats")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(stats()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.clone()
        .oneshot(turn_request("newcomer", "hi"))
        .await
        .unwrap();

    let response = app.oneshot(stats()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["turn_count"], 1);
    assert!(parsed["active_task"].is_null());
}

#[tokio::test]
async fn reset_reports_whether_anything_was_removed() {
    let app = app().await;
    let reset = || {
        Request::builder()
            .method("POST")
            .uri("/v1/users/resetter/reset")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap()
    };

    app.clone()
        .oneshot(turn_request("resetter", "bus from Mumbai to Pune"))
        .await
        .unwrap();

    let response = app.clone().oneshot(reset()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["removed"], true);

    let response = app.oneshot(reset()).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["removed"], false);
}

#[tokio::test]
async fn purge_keeps_live_contexts() {
    let app = app().await;
    app.clone()
        .oneshot(turn_request("active", "hello"))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/maintenance/purge")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["purged"], 0);
}
