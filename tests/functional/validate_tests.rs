//! End-to-end tests of `POST /validate`.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::task::JoinSet;

use crate::fixtures::{AdmissionReviewBuilder, deployment_review};
use crate::harness::{JSON, Webhook};
use crate::mock_engine::{MockEngine, Reply, refused_url};

async fn json_body(response: reqwest::Response) -> Value {
    let bytes = response.bytes().await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_round_trip_allow() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let body = AdmissionReviewBuilder::new("abc-123").operation("CREATE").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let review = json_body(response).await;
    assert_eq!(review["response"]["uid"], "abc-123");
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(review["response"]["status"]["status"], "Success");
    assert_eq!(review["response"]["status"].get("reason"), None);
    assert_eq!(engine.calls(), 1);

    webhook.stop().await;
}

#[tokio::test]
async fn test_denial_is_http_200() {
    let engine = MockEngine::denying("no privileged containers").await;
    let webhook = Webhook::start(engine.url()).await;

    let body = AdmissionReviewBuilder::new("xyz-9").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let review = json_body(response).await;
    assert_eq!(review["response"]["uid"], "xyz-9");
    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(review["response"]["status"]["status"], "Failure");
    assert_eq!(
        review["response"]["status"]["message"],
        "no privileged containers"
    );
    assert_eq!(review["response"]["status"]["reason"], "Forbidden");
    assert_eq!(review["response"]["status"]["code"], 403);

    webhook.stop().await;
}

#[tokio::test]
async fn test_response_echoes_request() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let review = deployment_review("echo-1");
    let sent = serde_json::to_value(&review).unwrap();
    let response = webhook
        .validate(JSON, serde_json::to_vec(&review).unwrap())
        .await;

    let received = json_body(response).await;
    assert_eq!(received["request"], sent["request"]);
    assert_eq!(received["apiVersion"], sent["apiVersion"]);
    assert_eq!(received["kind"], sent["kind"]);

    webhook.stop().await;
}

#[tokio::test]
async fn test_engine_receives_wrapped_review() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let review = deployment_review("query-1");
    webhook
        .validate(JSON, serde_json::to_vec(&review).unwrap())
        .await;

    let queries = engine.queries();
    assert_eq!(queries.len(), 1);
    let query = &queries[0];
    assert_eq!(query.content_type.as_deref(), Some(JSON));
    assert_eq!(query.accept.as_deref(), Some(JSON));
    assert_eq!(query.body, json!({"input": serde_json::to_value(&review).unwrap()}));

    webhook.stop().await;
}

#[tokio::test]
async fn test_wrong_content_type_is_bad_request() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let body = AdmissionReviewBuilder::new("abc-123").to_json();
    let response = webhook.validate("text/plain", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Bad Request");
    assert_eq!(engine.calls(), 0);

    webhook.stop().await;
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let response = webhook.validate(JSON, b"{\"request\":".to_vec()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = response.text().await.unwrap();
    assert_eq!(text, "Bad Request");
    assert_eq!(engine.calls(), 0);

    webhook.stop().await;
}

#[tokio::test]
async fn test_review_without_uid_echoes_empty_uid() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let response = webhook
        .validate(JSON, br#"{"request":{"operation":"CREATE"}}"#.to_vec())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let review = json_body(response).await;
    assert_eq!(review["response"]["uid"], "");
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(review["request"]["operation"], "CREATE");
    assert_eq!(engine.calls(), 1);

    webhook.stop().await;
}

#[tokio::test]
async fn test_review_without_request_is_bad_request() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let response = webhook
        .validate(JSON, br#"{"apiVersion":"admission.k8s.io/v1"}"#.to_vec())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(engine.calls(), 0);

    webhook.stop().await;
}

#[tokio::test]
async fn test_large_update_review_is_evaluated() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    // Old and new ConfigMap of ~1.25 MB each, well past axum's default limit
    let data = "x".repeat(1_250_000);
    let config_map = |data: &str| {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "big", "namespace": "default"},
            "data": {"payload": data}
        })
    };
    let body = AdmissionReviewBuilder::new("big-1")
        .operation("UPDATE")
        .field("object", config_map(&data))
        .field("oldObject", config_map(&data))
        .to_json();
    assert!(body.len() > 2_500_000);

    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let review = json_body(response).await;
    assert_eq!(review["response"]["uid"], "big-1");
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(engine.calls(), 1);
    assert_eq!(
        engine.queries()[0].body["input"]["request"]["object"]["data"]["payload"]
            .as_str()
            .map(str::len),
        Some(1_250_000)
    );

    webhook.stop().await;
}

#[tokio::test]
async fn test_unreachable_engine_is_internal_error() {
    let webhook = Webhook::start(refused_url().await).await;

    let body = AdmissionReviewBuilder::new("abc-123").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.bytes().await.unwrap();
    assert!(serde_json::from_slice::<Value>(&bytes).is_err());
    assert_eq!(&bytes[..], b"Internal Server Error");

    webhook.stop().await;
}

#[tokio::test]
async fn test_undefined_policy_document_is_denial() {
    for reply in [json!({}), json!({"result": null})] {
        let engine = MockEngine::start(Reply::Json(reply.clone())).await;
        let webhook = Webhook::start(engine.url()).await;

        let body = AdmissionReviewBuilder::new("abc-123").to_json();
        let response = webhook.validate(JSON, body).await;

        assert_eq!(response.status(), StatusCode::OK, "{}", reply);
        let review = json_body(response).await;
        assert_eq!(review["response"]["uid"], "abc-123");
        assert_eq!(review["response"]["allowed"], false);
        assert_eq!(review["response"]["status"]["status"], "Failure");
        assert_eq!(review["response"]["status"]["reason"], "Forbidden");
        assert_eq!(review["response"]["status"]["code"], 403);
        assert_eq!(engine.calls(), 1);

        webhook.stop().await;
    }
}

#[tokio::test]
async fn test_engine_json_error_reply_is_denial() {
    let engine = MockEngine::start(Reply::Raw(
        StatusCode::BAD_REQUEST,
        r#"{"code":"invalid_parameter","message":"bad input"}"#,
    ))
    .await;
    let webhook = Webhook::start(engine.url()).await;

    let body = AdmissionReviewBuilder::new("abc-123").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let review = json_body(response).await;
    assert_eq!(review["response"]["allowed"], false);

    webhook.stop().await;
}

#[tokio::test]
async fn test_engine_non_json_error_reply_is_internal_error() {
    let engine =
        MockEngine::start(Reply::Raw(StatusCode::SERVICE_UNAVAILABLE, "unavailable")).await;
    let webhook = Webhook::start(engine.url()).await;

    let body = AdmissionReviewBuilder::new("abc-123").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    webhook.stop().await;
}

#[tokio::test]
async fn test_slow_engine_hits_configured_timeout() {
    let engine = MockEngine::start(Reply::Delayed(Duration::from_secs(5))).await;
    let webhook = Webhook::start_with(engine.url(), Some(1)).await;

    let body = AdmissionReviewBuilder::new("abc-123").to_json();
    let response = webhook.validate(JSON, body).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(engine.calls(), 1);

    webhook.stop().await;
}

#[tokio::test]
async fn test_concurrent_reviews_keep_their_uid() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;
    let url = webhook.url("/validate");

    let mut set = JoinSet::new();
    for i in 0..16 {
        let http = webhook.http.clone();
        let url = url.clone();
        set.spawn(async move {
            let uid = format!("uid-{}", i);
            let body = AdmissionReviewBuilder::new(uid.clone()).to_json();
            let response = http
                .post(url)
                .header("content-type", JSON)
                .body(body)
                .send()
                .await
                .unwrap();
            (uid, json_body(response).await)
        });
    }

    while let Some(result) = set.join_next().await {
        let (uid, review) = result.unwrap();
        assert_eq!(review["response"]["uid"], Value::String(uid));
    }
    assert_eq!(engine.calls(), 16);

    webhook.stop().await;
}

#[tokio::test]
async fn test_only_post_is_routed() {
    let engine = MockEngine::allowing().await;
    let webhook = Webhook::start(engine.url()).await;

    let response = webhook.get("/validate").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(engine.calls(), 0);

    webhook.stop().await;
}
