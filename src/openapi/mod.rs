use axum::{response::Json, routing::get, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FoodEase API",
        version = "1.0.0",
        description = r#"
# FoodEase campus ordering API

Students order from the campus kitchen and pay over UPI or in cash.

## Payment flow

1. `POST /api/order/place` prices the cart and returns a UPI link plus a reference id.
2. The customer pays and submits the reference via `POST /api/order/verify-payment`.
3. Unverified orders are removed once the payment window lapses.

## Authentication

Send a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

Older clients may send the raw token in a `token` header instead.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "orders", description = "Order placement and kitchen workflow"),
        (name = "payments", description = "UPI payment verification"),
        (name = "promocodes", description = "Discount codes")
    ),
    paths(
        crate::handlers::orders::place_order,
        crate::handlers::orders::place_cod_order,
        crate::handlers::orders::verify_payment,
        crate::handlers::orders::check_reference,
        crate::handlers::orders::regenerate_payment,
        crate::handlers::orders::payment_failed,
        crate::handlers::orders::update_status,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::user_orders,
        crate::handlers::promocodes::validate_promocode,
        crate::handlers::promocodes::list_active_promocodes,
        crate::handlers::promocodes::create_promocode,
        crate::handlers::promocodes::list_promocodes,
        crate::handlers::promocodes::toggle_promocode,
        crate::handlers::promocodes::record_usage,
    ),
    components(
        schemas(
            crate::models::Order,
            crate::models::OrderStatus,
            crate::models::OrderType,
            crate::models::PaymentMethod,
            crate::models::LineItem,
            crate::models::Promocode,
            crate::services::PriceBreakdown,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_order_and_promocode_paths() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("FoodEase API"));
        assert!(json.contains("/api/order/verify-payment"));
        assert!(json.contains("/api/promocode/toggle/{id}"));
        assert!(json.contains("bearer_auth"));
    }
}
