use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use qrcode::{render::svg, QrCode};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{format_money, round_money},
    config::PaymentConfig,
    errors::ServiceError,
    models::{AttemptOutcome, OrderStatus, PaymentAttempt},
    repositories::{OrderPatch, OrderStore},
};

const TOKEN_BYTES: usize = 6;
const QR_MIN_SIZE: u32 = 240;
const QR_DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// A freshly issued payment reference and the UPI link that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedReference {
    pub reference_id: String,
    /// `upi://pay?...` deep link opened by UPI apps.
    pub upi_link: String,
    /// The deep link rendered as an SVG QR code, as a base64 data URL.
    pub qr_code: String,
    pub amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

impl IssuedReference {
    pub fn pending_attempt(&self, at: DateTime<Utc>) -> PaymentAttempt {
        PaymentAttempt {
            reference_id: self.reference_id.clone(),
            attempted_at: at,
            outcome: AttemptOutcome::Pending,
        }
    }
}

#[derive(Clone)]
pub struct PaymentReferenceIssuer {
    orders: Arc<dyn OrderStore>,
    payee_vpa: String,
    payee_name: String,
    currency: String,
    window: Duration,
}

impl PaymentReferenceIssuer {
    pub fn new(orders: Arc<dyn OrderStore>, config: &PaymentConfig) -> Self {
        Self {
            orders,
            payee_vpa: config.payee_vpa.clone(),
            payee_name: config.payee_name.clone(),
            currency: config.currency.clone(),
            window: config.window(),
        }
    }

    pub fn payee_vpa(&self) -> &str {
        &self.payee_vpa
    }

    /// 12 upper-case hex characters from 6 random bytes.
    pub fn generate_token() -> String {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        hex::encode_upper(bytes)
    }

    pub fn upi_payload(&self, amount: Decimal, token: &str) -> Result<String, ServiceError> {
        let amount = format_money(amount);
        let params = [
            ("pa", self.payee_vpa.as_str()),
            ("pn", self.payee_name.as_str()),
            ("am", amount.as_str()),
            ("tn", token),
            ("cu", self.currency.as_str()),
        ];
        Url::parse_with_params("upi://pay", &params)
            .map(String::from)
            .map_err(|e| ServiceError::InternalError(format!("Failed to build UPI link: {}", e)))
    }

    /// Renders `link` as a scannable QR code wrapped in a data URL.
    pub fn qr_data_url(link: &str) -> Result<String, ServiceError> {
        let code = QrCode::new(link.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("Failed to encode QR code: {}", e)))?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build();
        Ok(format!("{}{}", QR_DATA_URL_PREFIX, STANDARD.encode(image)))
    }

    /// Issues a reference for `amount` without touching the store.
    pub fn issue(&self, order_id: Uuid, amount: Decimal) -> Result<IssuedReference, ServiceError> {
        let reference_id = Self::generate_token();
        let upi_link = self.upi_payload(amount, &reference_id)?;
        let qr_code = Self::qr_data_url(&upi_link)?;
        let expires_at = Utc::now() + self.window;
        info!(%order_id, %reference_id, %expires_at, "payment reference issued");
        Ok(IssuedReference {
            reference_id,
            upi_link,
            qr_code,
            amount: round_money(amount),
            expires_at,
        })
    }

    /// Replaces the active reference of an order still waiting for payment.
    #[instrument(skip(self))]
    pub async fn regenerate(&self, order_id: Uuid) -> Result<IssuedReference, ServiceError> {
        let order = self.orders.get(order_id).await?;
        if order.payment || order.status != OrderStatus::AwaitingPaymentVerification {
            return Err(ServiceError::InvalidState(format!(
                "Order {} is not awaiting payment (status: {})",
                order_id, order.status
            )));
        }

        let issued = self.issue(order_id, order.upfront_amount())?;
        let patch = OrderPatch {
            reference_id: Some(issued.reference_id.clone()),
            payment_expiry: Some(issued.expires_at),
            push_attempt: Some(issued.pending_attempt(Utc::now())),
            ..Default::default()
        };
        self.orders
            .update_fields(order_id, Some(order.version), patch)
            .await?;
        Ok(issued)
    }
}
