use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{errors::ServiceError, models::OrderStatus};

/// Why an order document was physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RemovalReason {
    /// The payment window lapsed before verification.
    PaymentExpired,
    /// The customer reported the UPI payment as failed.
    PaymentFailed,
}

// Things that happen to orders and that someone outside the request may care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        user_id: String,
        amount: Decimal,
    },
    PaymentVerified {
        order_id: Uuid,
        reference_id: String,
    },
    StatusChanged {
        order_id: Uuid,
        user_id: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
        /// Email of the owning user, when known.
        recipient: Option<String>,
        timestamp: DateTime<Utc>,
    },
    InvoiceRequested {
        order_id: Uuid,
        user_id: String,
        recipient: Option<String>,
    },
    OrderRemoved {
        order_id: Uuid,
        reason: RemovalReason,
    },
}

impl Event {
    pub fn order_id(&self) -> Uuid {
        match self {
            Event::OrderPlaced { order_id, .. }
            | Event::PaymentVerified { order_id, .. }
            | Event::StatusChanged { order_id, .. }
            | Event::InvoiceRequested { order_id, .. }
            | Event::OrderRemoved { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Delivery is best effort: a closed channel never fails the caller.
    pub async fn send_or_log(&self, event: Event) {
        let order_id = event.order_id();
        if let Err(e) = self.send(event).await {
            warn!(%order_id, error = %e, "dropping order event");
        }
    }

    /// True once the event processor has shut down.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Outbound side of event processing (email, invoice rendering, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &Event) -> Result<(), String>;
}

/// Default notifier: writes each event to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::StatusChanged {
                order_id,
                old_status,
                new_status,
                recipient,
                ..
            } => info!(
                %order_id,
                %old_status,
                %new_status,
                recipient = recipient.as_deref().unwrap_or("-"),
                "order status notification"
            ),
            Event::InvoiceRequested {
                order_id,
                recipient,
                ..
            } => info!(
                %order_id,
                recipient = recipient.as_deref().unwrap_or("-"),
                "invoice requested"
            ),
            Event::OrderRemoved { order_id, reason } => {
                info!(%order_id, %reason, "order removed")
            }
            other => info!(order_id = %other.order_id(), "order event: {:?}", other),
        }
        Ok(())
    }
}

// Drains the channel and hands every event to the notifier until all senders are gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        if let Err(e) = notifier.deliver(&event).await {
            error!(
                "Failed to deliver event: order_id={}, error={}",
                event.order_id(),
                e
            );
        }
    }

    info!("Event channel closed, stopping event processing");
}
