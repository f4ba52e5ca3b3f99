//! Storefront router tests.
//!
//! Requests go through the full middleware stack via `oneshot`. Stripe and
//! Melhor Envio are replaced by small local servers; the database pool points
//! at a closed port, so any route that reaches it sees a database error.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::{Body, to_bytes};
use axum::extract::Path;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use colando_integration_tests::{Upstreams, spawn_upstream, stripe_signature, test_app};

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook(payload: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::post("/api/stripe/webhook");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

fn cart_line(price: &str) -> Value {
    json!({ "id": "7", "name": "Adesivo Gato", "price": price, "quantity": 2 })
}

// ============================================================================
// Health & Middleware
// ============================================================================

#[tokio::test]
async fn test_health_carries_api_headers() {
    let response = test_app(&Upstreams::default())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = test_app(&Upstreams::default())
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Stripe Webhook
// ============================================================================

#[tokio::test]
async fn test_webhook_without_signature_is_rejected() {
    let payload = json!({ "type": "checkout.session.completed", "data": { "object": {} } });
    let response = test_app(&Upstreams::default())
        .oneshot(webhook(&payload.to_string(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid signature");
}

#[tokio::test]
async fn test_webhook_with_tampered_payload_is_rejected() {
    let signed = json!({ "type": "payment_intent.created", "data": { "object": {} } }).to_string();
    let signature = stripe_signature(signed.as_bytes(), Utc::now().timestamp());
    let tampered = signed.replace("payment_intent.created", "checkout.session.completed");

    let response = test_app(&Upstreams::default())
        .oneshot(webhook(&tampered, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_stale_timestamp_is_rejected() {
    let payload = json!({ "type": "payment_intent.created", "data": { "object": {} } }).to_string();
    let signature = stripe_signature(payload.as_bytes(), Utc::now().timestamp() - 3600);

    let response = test_app(&Upstreams::default())
        .oneshot(webhook(&payload, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_extreme_timestamp_is_rejected() {
    let payload = json!({ "type": "payment_intent.created", "data": { "object": {} } }).to_string();

    for timestamp in [i64::MIN, i64::MAX] {
        let signature = stripe_signature(payload.as_bytes(), timestamp);
        let response = test_app(&Upstreams::default())
            .oneshot(webhook(&payload, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid signature");
    }
}

#[tokio::test]
async fn test_webhook_acknowledges_unhandled_event_types() {
    let payload = json!({
        "id": "evt_1",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_1" } }
    })
    .to_string();
    let signature = stripe_signature(payload.as_bytes(), Utc::now().timestamp());

    let response = test_app(&Upstreams::default())
        .oneshot(webhook(&payload, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn test_webhook_acknowledges_invalid_draft_reference() {
    let payload = json!({
        "id": "evt_2",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "payment_status": "paid",
            "metadata": { "draft_order_id": "not-a-uuid" }
        } }
    })
    .to_string();
    let signature = stripe_signature(payload.as_bytes(), Utc::now().timestamp());

    let response = test_app(&Upstreams::default())
        .oneshot(webhook(&payload, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_signed_garbage_is_bad_request() {
    let payload = "not json";
    let signature = stripe_signature(payload.as_bytes(), Utc::now().timestamp());

    let response = test_app(&Upstreams::default())
        .oneshot(webhook(payload, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Checkout Session
// ============================================================================

#[tokio::test]
async fn test_checkout_with_empty_cart() {
    let response = test_app(&Upstreams::default())
        .oneshot(post_json("/api/checkout/session", &json!({ "cart_items": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Your cart is empty");
}

#[tokio::test]
async fn test_checkout_with_negative_price() {
    let response = test_app(&Upstreams::default())
        .oneshot(post_json(
            "/api/checkout/session",
            &json!({ "cart_items": [cart_line("-1.00")] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_with_oversized_price() {
    let response = test_app(&Upstreams::default())
        .oneshot(post_json(
            "/api/checkout/session",
            &json!({ "cart_items": [cart_line("79228162514264337593543950335")] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Invalid item 7: price is too large"
    );
}

#[tokio::test]
async fn test_checkout_with_malformed_body() {
    let request = Request::post("/api/checkout/session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"cart_items\": "))
        .unwrap();
    let response = test_app(&Upstreams::default()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_checkout_relays_stripe_rejection() {
    let stripe = spawn_upstream(Router::new().route(
        "/v1/checkout/sessions",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "message": "Invalid currency: xyz" } })),
            )
        }),
    ))
    .await;

    let upstreams = Upstreams {
        stripe: Some(format!("{stripe}/v1")),
        ..Upstreams::default()
    };
    let response = test_app(&upstreams)
        .oneshot(post_json(
            "/api/checkout/session",
            &json!({ "cart_items": [cart_line("9.90")] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid currency: xyz");
}

#[tokio::test]
async fn test_checkout_stripe_outage_is_bad_gateway() {
    let stripe = spawn_upstream(Router::new().route(
        "/v1/checkout/sessions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
    ))
    .await;

    let upstreams = Upstreams {
        stripe: Some(format!("{stripe}/v1")),
        ..Upstreams::default()
    };
    let response = test_app(&upstreams)
        .oneshot(post_json(
            "/api/checkout/session",
            &json!({ "cart_items": [cart_line("9.90")] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "Payment service error");
}

#[tokio::test]
async fn test_checkout_expires_session_when_order_is_not_recorded() {
    let expired = Arc::new(AtomicUsize::new(0));
    let stripe = Router::new()
        .route(
            "/v1/checkout/sessions",
            post(|| async {
                Json(json!({
                    "id": "cs_test_orphan",
                    "url": "https://checkout.stripe.test/c/pay/cs_test_orphan"
                }))
            }),
        )
        .route(
            "/v1/checkout/sessions/{id}/expire",
            post({
                let expired = Arc::clone(&expired);
                move |Path(id): Path<String>| async move {
                    assert_eq!(id, "cs_test_orphan");
                    expired.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "id": id, "status": "expired" }))
                }
            }),
        );
    let stripe = spawn_upstream(stripe).await;

    let upstreams = Upstreams {
        stripe: Some(format!("{stripe}/v1")),
        ..Upstreams::default()
    };
    let response = test_app(&upstreams)
        .oneshot(post_json(
            "/api/checkout/session",
            &json!({ "cart_items": [cart_line("9.90")] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Shipping Quotes
// ============================================================================

fn quote_request(postal_code: &str) -> Value {
    json!({
        "to_postal_code": postal_code,
        "products": [{
            "width": "11", "height": "2", "length": "16",
            "weight": "0.3", "insurance_value": "19.80", "quantity": 1
        }]
    })
}

#[tokio::test]
async fn test_shipping_quote_with_invalid_cep() {
    let response = test_app(&Upstreams::default())
        .oneshot(post_json("/api/shipping/quote", &quote_request("0131")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shipping_quote_through_provider() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&token_requests);

    let provider = Router::new()
        .route(
            "/oauth/token",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({ "access_token": "tok_1", "expires_in": 3600 })) }
            }),
        )
        .route(
            "/api/v2/me/shipment/calculate",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers[header::AUTHORIZATION], "Bearer tok_1");
                assert_eq!(body["from"]["postal_code"], "49095806");
                assert_eq!(body["to"]["postal_code"], "01310100");
                assert!(body["products"][0]["width"].is_number());
                Json(json!([
                    { "id": 1, "name": "PAC", "price": "21.40", "delivery_time": 8,
                      "company": { "name": "Correios" } },
                    { "id": 2, "name": "SEDEX", "price": "38.10", "delivery_time": 3,
                      "company": { "name": "Correios" } },
                    { "id": 3, "name": ".Com", "error": "Transportadora não atende este trecho.",
                      "company": { "name": "Jadlog" } }
                ]))
            }),
        );
    let provider = spawn_upstream(provider).await;

    let app = test_app(&Upstreams {
        melhor_envio: Some(provider),
        ..Upstreams::default()
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/shipping/quote", &quote_request("01310-100")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let quotes = json_body(response).await;
        let ids: Vec<i64> = quotes
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    assert_eq!(token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shipping_provider_failure_is_bad_gateway() {
    let provider = spawn_upstream(Router::new().route(
        "/oauth/token",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Client authentication failed" })),
            )
        }),
    ))
    .await;

    let response = test_app(&Upstreams {
        melhor_envio: Some(provider),
        ..Upstreams::default()
    })
    .oneshot(post_json("/api/shipping/quote", &quote_request("01310100")))
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "Shipping service error");
}

// ============================================================================
// Draft Orders
// ============================================================================

#[tokio::test]
async fn test_draft_order_with_malformed_id() {
    let response = test_app(&Upstreams::default())
        .oneshot(
            Request::get("/api/draft-orders/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid draft order id");
}

#[tokio::test]
async fn test_draft_order_requires_personalization() {
    let response = test_app(&Upstreams::default())
        .oneshot(post_json(
            "/api/draft-orders",
            &json!({ "product_id": 3, "personalization_type": "  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Customer Account
// ============================================================================

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_order_history_requires_user() {
    for uri in ["/api/orders", "/api/orders?user_id="] {
        let response = test_app(&Upstreams::default()).oneshot(get(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json_body(response).await["error"], "user_id is required");
    }
}

#[tokio::test]
async fn test_order_history_with_malformed_ids() {
    let app = test_app(&Upstreams::default());

    let response = app
        .clone()
        .oneshot(get("/api/orders?user_id=maria"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid user id");

    let response = app.oneshot(get("/api/orders/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid order id");
}

#[tokio::test]
async fn test_wishlist_with_malformed_ids() {
    let app = test_app(&Upstreams::default());

    let response = app
        .clone()
        .oneshot(get("/api/users/not-a-uuid/wishlist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid user id");

    let user = uuid::Uuid::new_v4();
    let response = app
        .oneshot(
            Request::delete(format!("/api/users/{user}/wishlist/adesivo"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid product id");
}

#[tokio::test]
async fn test_wishlist_add_requires_product_id() {
    let user = uuid::Uuid::new_v4();
    let response = test_app(&Upstreams::default())
        .oneshot(post_json(
            &format!("/api/users/{user}/wishlist"),
            &json!({ "product": 3 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}
