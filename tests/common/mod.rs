#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use foodease_api::{
    auth::ADMIN_ROLE,
    config::AppConfig,
    events::{self, Event, EventSender, Notifier},
    handlers::AppServices,
    models::Promocode,
    repositories::{InMemoryOrderStore, InMemoryPromocodeStore, InMemoryUserStore},
    services::NewPromocode,
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Keeps every delivered event so tests can assert on notifications.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<Event>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, event: &Event) -> Result<(), String> {
        self.delivered.lock().await.push(event.clone());
        Ok(())
    }
}

/// Helper harness for spinning up the full router on in-memory stores.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Direct handle on the order store for arranging edge cases.
    pub orders: Arc<InMemoryOrderStore>,
    pub notifier: Arc<RecordingNotifier>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::new(TEST_SECRET.to_string(), "test".to_string()))
    }

    pub fn with_config(cfg: AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let notifier = Arc::new(RecordingNotifier::default());
        let event_task = tokio::spawn(events::process_events(event_rx, notifier.clone()));

        let orders = Arc::new(InMemoryOrderStore::new());
        let services = AppServices::new(
            orders.clone(),
            Arc::new(InMemoryPromocodeStore::new()),
            Arc::new(InMemoryUserStore::new()),
            event_sender.clone(),
            &cfg,
        );
        let state = AppState::new(cfg, event_sender, services);
        let router = foodease_api::build_router(state.clone());

        Self {
            router,
            state,
            orders,
            notifier,
            _event_task: event_task,
        }
    }

    pub fn customer_token(&self, user_id: &str) -> String {
        self.state
            .auth
            .issue_token(user_id, vec![], Some(format!("{user_id}@campus.test")))
            .expect("issue customer token")
    }

    pub fn admin_token(&self) -> String {
        self.state
            .auth
            .issue_token("kitchen-admin", vec![ADMIN_ROLE.to_string()], None)
            .expect("issue admin token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Send a prebuilt request, for bodies that are not valid JSON.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post(&self, uri: &str, body: Value, token: &str) -> Response {
        self.request(Method::POST, uri, Some(body), Some(token)).await
    }

    pub async fn seed_promocode(
        &self,
        code: &str,
        percentage: u32,
        min_order_value: Decimal,
        is_welcome_code: bool,
    ) -> Promocode {
        self.state
            .services
            .promocodes
            .create(NewPromocode {
                code: code.to_string(),
                discount_percentage: percentage,
                min_order_value,
                expiry_date: Utc::now() + Duration::days(30),
                is_welcome_code,
            })
            .await
            .expect("seed promocode for tests")
    }

    /// Lets the event processor drain what has been sent so far.
    pub async fn delivered_events(&self) -> Vec<Event> {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        self.notifier.delivered.lock().await.clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
