//! End-to-end tests for the order lifecycle over HTTP.
//!
//! - UPI order placement, verification and the kitchen workflow
//! - Payment window expiry, failure reports and reference regeneration
//! - Cash orders and the admin kitchen queue
//! - Ownership and role checks

mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use common::{response_json, TestApp};
use foodease_api::{
    events::Event,
    models::AttemptOutcome,
    repositories::{OrderPatch, OrderStore},
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

fn cart() -> Value {
    json!([
        { "name": "Masala Dosa", "unitPrice": "60", "quantity": 2 },
        { "name": "Filter Coffee", "price": "45", "quantity": 1 }
    ])
}

async fn place_online(app: &TestApp, token: &str, body: Value) -> Value {
    let response = app.post("/api/order/place", body, token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

fn order_id(placed: &Value) -> Uuid {
    placed["orderId"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("order id in response")
}

// ==================== UPI flow ====================

#[tokio::test]
async fn test_upi_order_verified_then_collected() {
    let app = TestApp::new();
    let customer = app.customer_token("student-1");
    let admin = app.admin_token();

    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;
    assert_eq!(placed["totalAmount"], "170.00");
    assert_eq!(placed["amount"], "170.00");
    assert_eq!(placed["remainingAmount"], "0.00");
    assert_eq!(placed["upiId"], "foodease@upi");
    assert!(placed["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
    let link = placed["upiLink"].as_str().unwrap();
    assert!(link.starts_with("upi://pay?"));
    assert!(link.contains("am=170.00"));
    let reference = placed["referenceId"].as_str().unwrap().to_string();
    assert_eq!(reference.len(), 12);
    let id = order_id(&placed);

    // The kitchen cannot start before the payment is confirmed.
    let early = app
        .post(
            "/api/order/status",
            json!({ "orderId": id, "status": "Order Confirmed" }),
            &admin,
        )
        .await;
    assert_eq!(early.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let check = app
        .post(
            "/api/order/check-reference",
            json!({ "orderId": id, "referenceId": "WRONG" }),
            &customer,
        )
        .await;
    assert_eq!(check.status(), StatusCode::OK);
    assert_eq!(response_json(check).await["data"]["matches"], false);

    let verified = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": format!("  {}  ", reference) }),
            &customer,
        )
        .await;
    assert_eq!(verified.status(), StatusCode::OK);
    let body = response_json(verified).await;
    assert_eq!(body["data"]["status"], "Order Received");
    assert_eq!(body["data"]["payment"], true);
    assert_eq!(body["data"]["paymentVerified"], true);

    let again = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": reference }),
            &customer,
        )
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(again).await["error"], "already_verified");

    for status in ["Order Confirmed", "PreparingFood", "Food Ready", "Completed"] {
        let response = app
            .post(
                "/api/order/status",
                json!({ "orderId": id, "status": status }),
                &admin,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "moving to {status}");
    }

    let stuck = app
        .post(
            "/api/order/status",
            json!({ "orderId": id, "status": "Cancelled" }),
            &admin,
        )
        .await;
    assert_eq!(stuck.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let events = app.delivered_events().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::PaymentVerified { order_id, .. } if *order_id == id)));
    let invoices = events
        .iter()
        .filter(|e| matches!(e, Event::InvoiceRequested { .. }))
        .count();
    assert_eq!(invoices, 2, "one invoice on verification, one on collection");
    assert_matches!(
        events.iter().find(|e| matches!(e, Event::StatusChanged { .. })),
        Some(Event::StatusChanged { recipient: Some(email), .. }) if email == "student-1@campus.test"
    );
}

#[tokio::test]
async fn test_mismatched_reference_is_rejected() {
    let app = TestApp::new();
    let customer = app.customer_token("student-2");
    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;

    let response = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": order_id(&placed), "referenceId": "000000000000" }),
            &customer,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "reference_mismatch");
}

#[tokio::test]
async fn test_expired_payment_removes_order() {
    let app = TestApp::new();
    let customer = app.customer_token("student-3");
    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;
    let id = order_id(&placed);

    app.orders
        .update_fields(
            id,
            None,
            OrderPatch {
                payment_expiry: Some(Utc::now() - Duration::minutes(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": placed["referenceId"] }),
            &customer,
        )
        .await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(response_json(response).await["error"], "payment_expired");

    let missing = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": placed["referenceId"] }),
            &customer,
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regenerated_reference_replaces_old_one() {
    let app = TestApp::new();
    let customer = app.customer_token("student-4");
    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;
    let id = order_id(&placed);

    let response = app
        .post("/api/order/regenerate-payment", json!({ "orderId": id }), &customer)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fresh = response_json(response).await["data"].clone();
    assert_ne!(fresh["referenceId"], placed["referenceId"]);
    assert_eq!(fresh["amount"], "170.00");
    assert_ne!(fresh["qrCode"], placed["qrCode"]);
    assert!(fresh["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
    assert!(fresh["upiLink"]
        .as_str()
        .unwrap()
        .contains(fresh["referenceId"].as_str().unwrap()));

    let stale = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": placed["referenceId"] }),
            &customer,
        )
        .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);

    let ok = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": fresh["referenceId"] }),
            &customer,
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let order = app.orders.get(id).await.unwrap();
    let outcomes: Vec<_> = order.payment_attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::Pending,
            AttemptOutcome::Pending,
            AttemptOutcome::Success
        ]
    );
}

#[tokio::test]
async fn test_payment_failure_removes_unpaid_order() {
    let app = TestApp::new();
    let customer = app.customer_token("student-5");
    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;
    let id = order_id(&placed);

    let response = app
        .post("/api/order/payment-failed", json!({ "orderId": id }), &customer)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let orders = app
        .post("/api/order/userorders", json!({}), &customer)
        .await;
    assert_eq!(response_json(orders).await["data"], json!([]));

    let events = app.delivered_events().await;
    assert!(events.iter().any(|e| matches!(e, Event::OrderRemoved { .. })));
}

// ==================== Pricing options ====================

#[tokio::test]
async fn test_partial_payment_with_welcome_code() {
    let app = TestApp::new();
    app.seed_promocode("WELCOME20", 20, dec!(100), true).await;
    let customer = app.customer_token("fresher");

    let placed = place_online(
        &app,
        &customer,
        json!({
            "items": cart(),
            "promocode": "welcome20",
            "paymentMethod": "partial"
        }),
    )
    .await;
    // 165 - 33 + 5 = 137; 40% now
    assert_eq!(placed["totalAmount"], "137.00");
    assert_eq!(placed["amount"], "54.80");
    assert_eq!(placed["remainingAmount"], "82.20");

    let second = app
        .post(
            "/api/order/place",
            json!({ "items": cart(), "promocode": "WELCOME20" }),
            &customer,
        )
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(second).await["error"], "welcome_ineligible");
}

#[tokio::test]
async fn test_rush_and_scheduled_orders() {
    let app = TestApp::new();
    let customer = app.customer_token("student-6");

    let rush = place_online(
        &app,
        &customer,
        json!({ "items": cart(), "orderType": "rush" }),
    )
    .await;
    assert_eq!(rush["totalAmount"], "190.00");

    let no_time = app
        .post(
            "/api/order/place",
            json!({ "items": cart(), "orderType": "scheduled" }),
            &customer,
        )
        .await;
    assert_eq!(no_time.status(), StatusCode::BAD_REQUEST);

    let later = (Utc::now() + Duration::hours(2)).to_rfc3339();
    let scheduled = place_online(
        &app,
        &customer,
        json!({ "items": cart(), "orderType": "scheduled", "scheduledTime": later }),
    )
    .await;
    assert_eq!(scheduled["totalAmount"], "170.00");
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let app = TestApp::new();
    let customer = app.customer_token("student-7");
    let response = app
        .post("/api/order/place", json!({ "items": [] }), &customer)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["error"], "validation_error");
}

// ==================== Cash orders and kitchen queue ====================

#[tokio::test]
async fn test_cod_order_goes_straight_to_kitchen() {
    let app = TestApp::new();
    let customer = app.customer_token("student-8");
    let admin = app.admin_token();

    let regular = app
        .post("/api/order/placecod", json!({ "items": cart() }), &customer)
        .await;
    assert_eq!(regular.status(), StatusCode::CREATED);
    let regular = response_json(regular).await["data"].clone();
    assert_eq!(regular["status"], "Order Received");
    assert_eq!(regular["amount"], "170.00");

    let rush = app
        .post(
            "/api/order/placecod",
            json!({ "items": cart(), "orderType": "rush" }),
            &customer,
        )
        .await;
    let rush = response_json(rush).await["data"].clone();

    let queue = app
        .request(Method::GET, "/api/order/list", None, Some(&admin))
        .await;
    assert_eq!(queue.status(), StatusCode::OK);
    let queue = response_json(queue).await["data"].clone();
    assert_eq!(queue[0]["id"], rush["orderId"]);
    assert_eq!(queue[1]["id"], regular["orderId"]);

    let confirmed = app
        .post(
            "/api/order/status",
            json!({ "orderId": regular["orderId"], "status": "Order Confirmed" }),
            &admin,
        )
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_override_moves_unverified_order() {
    let app = TestApp::new();
    let customer = app.customer_token("student-9");
    let admin = app.admin_token();
    let placed = place_online(&app, &customer, json!({ "items": cart() })).await;

    let response = app
        .post(
            "/api/order/status",
            json!({
                "orderId": order_id(&placed),
                "status": "Order Received",
                "overridePayment": true
            }),
            &admin,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["payment"], true);
}

// ==================== Access control ====================

#[tokio::test]
async fn test_customers_cannot_touch_other_orders() {
    let app = TestApp::new();
    let owner = app.customer_token("owner");
    let other = app.customer_token("intruder");
    let placed = place_online(&app, &owner, json!({ "items": cart() })).await;
    let id = order_id(&placed);

    let verify = app
        .post(
            "/api/order/verify-payment",
            json!({ "orderId": id, "referenceId": placed["referenceId"] }),
            &other,
        )
        .await;
    assert_eq!(verify.status(), StatusCode::FORBIDDEN);

    let cancel = app
        .post(
            "/api/order/status",
            json!({ "orderId": id, "status": "Cancelled" }),
            &other,
        )
        .await;
    assert_eq!(cancel.status(), StatusCode::FORBIDDEN);

    let listing = app
        .post("/api/order/userorders", json!({ "userId": "owner" }), &other)
        .await;
    assert_eq!(listing.status(), StatusCode::FORBIDDEN);

    let cancel = app
        .post(
            "/api/order/status",
            json!({ "orderId": id, "status": "Cancelled" }),
            &owner,
        )
        .await;
    assert_eq!(cancel.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authentication_is_required() {
    let app = TestApp::new();
    let customer = app.customer_token("student-10");

    let anonymous = app
        .request(Method::POST, "/api/order/place", Some(json!({ "items": cart() })), None)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let not_admin = app
        .request(Method::GET, "/api/order/list", None, Some(&customer))
        .await;
    assert_eq!(not_admin.status(), StatusCode::FORBIDDEN);

    let unknown_status = app
        .post(
            "/api/order/status",
            json!({ "orderId": Uuid::new_v4(), "status": "Shipped" }),
            &app.admin_token(),
        )
        .await;
    assert_eq!(unknown_status.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_status_and_openapi() {
    let app = TestApp::new();

    for uri in ["/health", "/status", "/api-docs/openapi.json"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(response.headers().contains_key("x-request-id"));
    }
}

#[tokio::test]
async fn test_oversized_cart_is_rejected_with_envelope() {
    let app = TestApp::new();
    let customer = app.customer_token("student-30");

    let overflowing = app
        .post(
            "/api/order/place",
            json!({
                "items": [{
                    "name": "Feast",
                    "unitPrice": "79228162514264337593543950335",
                    "quantity": 2
                }]
            }),
            &customer,
        )
        .await;
    assert_eq!(overflowing.status(), StatusCode::BAD_REQUEST);
    let body = response_json(overflowing).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");

    let bulk = app
        .post(
            "/api/order/placecod",
            json!({ "items": [{ "name": "Chai", "unitPrice": "10", "quantity": 5000 }] }),
            &customer,
        )
        .await;
    assert_eq!(bulk.status(), StatusCode::BAD_REQUEST);
    assert!(app.orders.list_by_user("student-30").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = TestApp::new();
    let customer = app.customer_token("student-31");

    let negative_quantity = app
        .post(
            "/api/order/place",
            json!({ "items": [{ "name": "Chai", "unitPrice": "10", "quantity": -1 }] }),
            &customer,
        )
        .await;
    assert_eq!(negative_quantity.status(), StatusCode::BAD_REQUEST);
    let body = response_json(negative_quantity).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
    assert!(body["request_id"].is_string());

    let not_json = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/promocode/validate")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(not_json).await["success"], false);
}
