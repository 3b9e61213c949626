use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AdminUser, AuthUser},
    errors::ServiceError,
    handlers::AppJson,
    models::Promocode,
    services::{NewPromocode, PromocodeEvaluation},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_promocode))
        .route("/active", get(list_active_promocodes))
        .route("/create", post(create_promocode))
        .route("/list", get(list_promocodes))
        .route("/toggle/:id", put(toggle_promocode))
        .route("/record-usage", post(record_usage))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromocodeRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub order_amount: Decimal,
    /// Enables the per-user checks (already used, welcome eligibility)
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromocodeResponse {
    pub promocode_id: Uuid,
    pub code: String,
    pub discount: Decimal,
    pub percentage: u32,
    pub final_amount: Decimal,
}

impl From<(PromocodeEvaluation, Decimal)> for ValidatePromocodeResponse {
    fn from((evaluation, order_amount): (PromocodeEvaluation, Decimal)) -> Self {
        Self {
            promocode_id: evaluation.promocode.id,
            code: evaluation.promocode.code,
            discount: evaluation.discount,
            percentage: evaluation.percentage,
            final_amount: order_amount - evaluation.discount,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TogglePromocodeRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub promocode_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/promocode/validate",
    summary = "Validate promocode",
    description = "Checks a code against an order amount without recording usage",
    request_body = ValidatePromocodeRequest,
    responses(
        (status = 200, description = "Code applies", body = ApiResponse<ValidatePromocodeResponse>),
        (status = 400, description = "Below minimum or not eligible", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown, inactive or expired code", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already used by this user", body = crate::errors::ErrorResponse),
    ),
    tag = "promocodes"
)]
pub async fn validate_promocode(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ValidatePromocodeRequest>,
) -> ApiResult<ValidatePromocodeResponse> {
    payload.validate()?;
    if payload.order_amount.is_sign_negative() {
        return Err(ServiceError::ValidationError(
            "Order amount cannot be negative".into(),
        ));
    }
    let evaluation = state
        .services
        .promocodes
        .evaluate(
            &payload.code,
            payload.order_amount,
            payload.user_id.as_deref(),
        )
        .await?;
    Ok(Json(ApiResponse::success(
        (evaluation, payload.order_amount).into(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/promocode/active",
    summary = "Active promocodes",
    responses(
        (status = 200, description = "Codes usable right now", body = ApiResponse<Vec<Promocode>>),
    ),
    tag = "promocodes"
)]
pub async fn list_active_promocodes(State(state): State<AppState>) -> ApiResult<Vec<Promocode>> {
    let promocodes = state.services.promocodes.list_active().await?;
    Ok(Json(ApiResponse::success(promocodes)))
}

#[utoipa::path(
    post,
    path = "/api/promocode/create",
    summary = "Create promocode",
    request_body = NewPromocode,
    responses(
        (status = 201, description = "Promocode created", body = ApiResponse<Promocode>),
        (status = 400, description = "Invalid promocode", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "promocodes"
)]
pub async fn create_promocode(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    AppJson(payload): AppJson<NewPromocode>,
) -> Result<(StatusCode, Json<ApiResponse<Promocode>>), ServiceError> {
    let created = state.services.promocodes.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/promocode/list",
    summary = "All promocodes",
    responses(
        (status = 200, description = "Promocodes, newest first", body = ApiResponse<Vec<Promocode>>),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "promocodes"
)]
pub async fn list_promocodes(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Vec<Promocode>> {
    let promocodes = state.services.promocodes.list_all().await?;
    Ok(Json(ApiResponse::success(promocodes)))
}

#[utoipa::path(
    put,
    path = "/api/promocode/toggle/{id}",
    summary = "Activate or deactivate promocode",
    params(("id" = Uuid, Path, description = "Promocode id")),
    request_body = TogglePromocodeRequest,
    responses(
        (status = 200, description = "Promocode updated", body = ApiResponse<Promocode>),
        (status = 404, description = "Promocode not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "promocodes"
)]
pub async fn toggle_promocode(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<TogglePromocodeRequest>,
) -> ApiResult<Promocode> {
    let updated = state
        .services
        .promocodes
        .set_active(id, payload.is_active)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    post,
    path = "/api/promocode/record-usage",
    summary = "Record promocode usage",
    request_body = RecordUsageRequest,
    responses(
        (status = 200, description = "Usage recorded"),
        (status = 403, description = "Not allowed for this user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Promocode not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "promocodes"
)]
pub async fn record_usage(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<RecordUsageRequest>,
) -> ApiResult<()> {
    payload.validate()?;
    if payload.user_id != user.user_id && !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Cannot record usage for another user".into(),
        ));
    }
    state
        .services
        .promocodes
        .record_usage(&payload.user_id, payload.promocode_id)
        .await?;
    let mut response = ApiResponse::success(());
    response.message = Some("Promocode usage recorded".to_string());
    Ok(Json(response))
}
