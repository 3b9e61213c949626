pub mod orders;
pub mod promocodes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::EventSender,
    repositories::{
        InMemoryOrderStore, InMemoryPromocodeStore, InMemoryUserStore, OrderStore, PromocodeStore,
        UserStore,
    },
    services::{OrderService, PromocodeService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub promocodes: Arc<PromocodeService>,
    pub users: Arc<dyn UserStore>,
}

impl AppServices {
    pub fn new(
        order_store: Arc<dyn OrderStore>,
        promocode_store: Arc<dyn PromocodeStore>,
        user_store: Arc<dyn UserStore>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Self {
        let promocodes = PromocodeService::new(
            promocode_store,
            user_store.clone(),
            order_store.clone(),
        );
        let orders = OrderService::new(
            order_store,
            user_store.clone(),
            promocodes.clone(),
            event_sender,
            config,
        );
        Self {
            orders: Arc::new(orders),
            promocodes: Arc::new(promocodes),
            users: user_store,
        }
    }

    /// Build a services container backed by the in-memory stores.
    pub fn in_memory(event_sender: EventSender, config: &AppConfig) -> Self {
        Self::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryPromocodeStore::new()),
            Arc::new(InMemoryUserStore::new()),
            event_sender,
            config,
        )
    }
}

/// JSON body extractor whose rejections use the standard error envelope.
///
/// Malformed or mistyped bodies become `validation_error` responses instead of
/// axum's plain-text rejection.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ServiceError::ValidationError(rejection.body_text())),
        }
    }
}
