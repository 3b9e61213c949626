use std::str::FromStr;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AdminUser, AuthUser},
    errors::ServiceError,
    handlers::AppJson,
    models::{Order, OrderStatus},
    services::{PlaceOrder, PlacedOrder, TransitionRequest},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/place", post(place_order))
        .route("/placecod", post(place_cod_order))
        .route("/verify-payment", post(verify_payment))
        .route("/check-reference", post(check_reference))
        .route("/regenerate-payment", post(regenerate_payment))
        .route("/payment-failed", post(payment_failed))
        .route("/status", post(update_status))
        .route("/list", get(list_orders))
        .route("/userorders", post(user_orders))
}

// Order DTOs
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    /// QR image of the payment link, as a `data:image/svg+xml;base64,` URL
    pub qr_code: String,
    /// Raw `upi://pay` deep link for devices that open UPI apps directly
    pub upi_link: String,
    /// Amount to pay now
    pub amount: Decimal,
    pub total_amount: Decimal,
    pub remaining_amount: Decimal,
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
    pub upi_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceCodResponse {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReferenceRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub reference_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegeneratePaymentResponse {
    pub qr_code: String,
    pub upi_link: String,
    pub reference_id: String,
    pub expires_at: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCheckResponse {
    pub order_id: Uuid,
    pub matches: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub order_id: Uuid,
    /// Display name or identifier, e.g. `Order Confirmed` or `FoodReady`
    #[validate(length(min = 1, max = 64))]
    pub status: String,
    #[serde(default)]
    pub override_payment: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserOrdersRequest {
    /// Admins may look up another user's orders
    #[serde(default)]
    pub user_id: Option<String>,
}

async fn remember_contact(state: &AppState, user: &AuthUser) {
    if user.name.is_none() && user.email.is_none() {
        return;
    }
    if let Err(e) = state
        .services
        .users
        .update_contact(&user.user_id, user.name.clone(), user.email.clone())
        .await
    {
        warn!(user_id = %user.user_id, error = %e, "failed to store contact details");
    }
}

#[utoipa::path(
    post,
    path = "/api/order/place",
    summary = "Place UPI order",
    description = "Price the cart, apply an optional promocode and issue a UPI payment reference",
    request_body = PlaceOrder,
    responses(
        (status = 201, description = "Order placed, awaiting payment verification", body = ApiResponse<PlaceOrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid cart or promocode", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Promocode not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Promocode already used", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PlaceOrder>,
) -> Result<(StatusCode, Json<ApiResponse<PlaceOrderResponse>>), ServiceError> {
    remember_contact(&state, &user).await;
    let PlacedOrder { order, payment } = state
        .services
        .orders
        .place_online(&user.user_id, payload)
        .await?;
    let payment = payment.ok_or_else(|| {
        ServiceError::InternalError(format!("Order {} has no payment reference", order.id))
    })?;

    let response = PlaceOrderResponse {
        order_id: order.id,
        qr_code: payment.qr_code,
        upi_link: payment.upi_link,
        amount: payment.amount,
        total_amount: order.amount,
        remaining_amount: order.remaining_amount,
        reference_id: payment.reference_id,
        expires_at: payment.expires_at,
        upi_id: state.services.orders.payee_vpa().to_string(),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[utoipa::path(
    post,
    path = "/api/order/placecod",
    summary = "Place cash order",
    request_body = PlaceOrder,
    responses(
        (status = 201, description = "Order placed and sent to the kitchen", body = ApiResponse<PlaceCodResponse>),
        (status = 400, description = "Invalid cart or promocode", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn place_cod_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PlaceOrder>,
) -> Result<(StatusCode, Json<ApiResponse<PlaceCodResponse>>), ServiceError> {
    remember_contact(&state, &user).await;
    let placed = state
        .services
        .orders
        .place_cod(&user.user_id, payload)
        .await?;
    let response = PlaceCodResponse {
        order_id: placed.order.id,
        amount: placed.order.amount,
        status: placed.order.status,
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[utoipa::path(
    post,
    path = "/api/order/verify-payment",
    summary = "Verify UPI payment",
    description = "Confirm the UPI transaction reference submitted by the customer",
    request_body = PaymentReferenceRequest,
    responses(
        (status = 200, description = "Payment verified", body = ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reference mismatch or already verified", body = crate::errors::ErrorResponse),
        (status = 410, description = "Payment window expired; order removed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is not awaiting payment", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentReferenceRequest>,
) -> ApiResult<Order> {
    payload.validate()?;
    let order = state
        .services
        .orders
        .verify_payment(&user.actor(), payload.order_id, &payload.reference_id)
        .await?;
    let mut response = ApiResponse::success(order);
    response.message = Some("Payment verified successfully".to_string());
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/order/check-reference",
    summary = "Check payment reference",
    description = "Compare a reference with the order's active reference without changing anything",
    request_body = PaymentReferenceRequest,
    responses(
        (status = 200, description = "Comparison result", body = ApiResponse<ReferenceCheckResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn check_reference(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<PaymentReferenceRequest>,
) -> ApiResult<ReferenceCheckResponse> {
    payload.validate()?;
    let matches = state
        .services
        .orders
        .check_reference(&user.actor(), payload.order_id, &payload.reference_id)
        .await?;
    Ok(Json(ApiResponse::success(ReferenceCheckResponse {
        order_id: payload.order_id,
        matches,
    })))
}

#[utoipa::path(
    post,
    path = "/api/order/regenerate-payment",
    summary = "Regenerate payment reference",
    request_body = OrderIdRequest,
    responses(
        (status = 200, description = "New reference issued", body = ApiResponse<RegeneratePaymentResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is not awaiting payment", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn regenerate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<OrderIdRequest>,
) -> ApiResult<RegeneratePaymentResponse> {
    let issued = state
        .services
        .orders
        .regenerate_payment(&user.actor(), payload.order_id)
        .await?;
    Ok(Json(ApiResponse::success(RegeneratePaymentResponse {
        qr_code: issued.qr_code,
        upi_link: issued.upi_link,
        reference_id: issued.reference_id,
        expires_at: issued.expires_at,
        amount: issued.amount,
    })))
}

#[utoipa::path(
    post,
    path = "/api/order/payment-failed",
    summary = "Report failed payment",
    description = "Removes an order whose UPI payment failed before verification",
    request_body = OrderIdRequest,
    responses(
        (status = 200, description = "Order removed", body = ApiResponse<OrderIdResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order already paid or progressed", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn payment_failed(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<OrderIdRequest>,
) -> ApiResult<OrderIdResponse> {
    state
        .services
        .orders
        .payment_failed(&user.actor(), payload.order_id)
        .await?;
    let mut response = ApiResponse::success(OrderIdResponse {
        order_id: payload.order_id,
    });
    response.message = Some("Order removed after failed payment".to_string());
    Ok(Json(response))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdResponse {
    pub order_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/order/status",
    summary = "Update order status",
    description = "Admins move orders along the kitchen workflow; customers may cancel their own orders",
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not allowed for this user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Illegal transition", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> ApiResult<Order> {
    payload.validate()?;
    let status = OrderStatus::from_str(payload.status.trim()).map_err(|_| {
        ServiceError::ValidationError(format!("Unknown order status: {}", payload.status))
    })?;
    let order = state
        .services
        .orders
        .update_status(
            &user.actor(),
            TransitionRequest {
                order_id: payload.order_id,
                status,
                override_payment: payload.override_payment,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/order/list",
    summary = "Kitchen queue",
    description = "All orders, rush orders first, then oldest first",
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<Order>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Vec<Order>> {
    let orders = state.services.orders.list_all().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/api/order/userorders",
    summary = "Orders of a user",
    request_body = UserOrdersRequest,
    responses(
        (status = 200, description = "Orders, oldest first", body = ApiResponse<Vec<Order>>),
        (status = 403, description = "Not allowed for this user", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn user_orders(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<UserOrdersRequest>>,
) -> ApiResult<Vec<Order>> {
    let requested = payload.and_then(|Json(body)| body.user_id);
    let target = match requested {
        Some(other) if other != user.user_id && !user.is_admin() => {
            return Err(ServiceError::Forbidden(
                "Cannot list orders of another user".into(),
            ))
        }
        Some(other) => other,
        None => user.user_id.clone(),
    };
    let orders = state.services.orders.list_for_user(&target).await?;
    Ok(Json(ApiResponse::success(orders)))
}
