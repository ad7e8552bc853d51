use std::fmt::Display;

use agt_common::Cents;
use agrotoken_engine::db_types::{NewOrder, OrderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The payment gateway's webhook body, parsed only after the HMAC check has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventPayload {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub order_id: String,
    #[serde(default)]
    pub payment_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_id: String,
    pub buyer_id: String,
    pub crop_id: String,
    pub amount: Cents,
    #[serde(default)]
    pub currency: Option<String>,
}

impl From<NewOrderRequest> for NewOrder {
    fn from(r: NewOrderRequest) -> Self {
        let mut order = NewOrder::new(OrderId(r.order_id), r.buyer_id, r.crop_id, r.amount);
        if let Some(currency) = r.currency {
            order.currency = currency;
        }
        order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUploadResult {
    pub content_id: String,
    pub crop_id: String,
    /// False when identical bytes were already pinned and the existing record was reused.
    pub newly_pinned: bool,
}
