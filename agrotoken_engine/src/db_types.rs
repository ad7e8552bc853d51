use std::{fmt::Display, str::FromStr};

use agt_common::Cents;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The lifecycle state of a crop purchase order. Progression is strictly monotonic; see [`crate::state_machine`]
/// for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order record exists but has not been submitted for payment yet.
    Created,
    /// The order has been submitted and the gateway is collecting payment.
    AwaitingPayment,
    /// Payment has been captured in full. The order is eligible for tokenization.
    Paid,
    /// A tokenization worker has claimed the order and is minting the crop token.
    Minting,
    /// The crop token has been minted on-chain. Terminal.
    Minted,
    /// The order failed unrecoverably (payment failure, or mint retries exhausted). Terminal, except for an
    /// explicit operator re-queue.
    Failed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "Created"),
            OrderStatusType::AwaitingPayment => write!(f, "AwaitingPayment"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Minting => write!(f, "Minting"),
            OrderStatusType::Minted => write!(f, "Minted"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "AwaitingPayment" => Ok(Self::AwaitingPayment),
            "Paid" => Ok(Self::Paid),
            "Minting" => Ok(Self::Minting),
            "Minted" => Ok(Self::Minted),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError("order status", s.to_string())),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Created");
            OrderStatusType::Created
        })
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// A crop purchase order as stored in the settlement ledger. Owned exclusively by the ledger; mutated only through
/// version-guarded transitions.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub crop_id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    /// The gateway's payment reference. Null until the first accepted payment webhook.
    pub payment_ref: Option<String>,
    /// The on-chain mint transaction reference. Null until the order reaches `Minted`.
    pub mint_txid: Option<String>,
    /// Optimistic concurrency counter. Exactly one transition may succeed per version.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The order id as assigned by the storefront
    pub order_id: OrderId,
    /// The buyer placing the order
    pub buyer_id: String,
    /// The crop listing being purchased
    pub crop_id: String,
    /// The total purchase amount
    pub amount: Cents,
    /// The currency of the purchase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: String, crop_id: String, amount: Cents) -> Self {
        Self {
            order_id,
            buyer_id,
            crop_id,
            amount,
            currency: agt_common::DEFAULT_CURRENCY_CODE.to_string(),
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------     LedgerEvent      --------------------------------------------------------
/// The closed set of triggers that may move an order through its lifecycle. Gateway webhook types map onto the
/// payment variants; the tokenization worker drives the mint variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// The order has been submitted for payment (external storefront trigger).
    Submit,
    /// A signature-verified `payment.captured` gateway event.
    PaymentCaptured { payment_ref: String },
    /// A signature-verified `payment.failed` gateway event.
    PaymentFailed,
    /// A tokenization worker claims the order for minting.
    ClaimForMinting,
    /// The on-chain mint transaction has been confirmed.
    MintConfirmed { txid: String },
    /// The mint retry budget has been exhausted.
    MintFailed,
    /// Operator action: put a failed order back in the mint queue.
    Requeue,
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Submit => "submit",
            LedgerEvent::PaymentCaptured { .. } => "payment.captured",
            LedgerEvent::PaymentFailed => "payment.failed",
            LedgerEvent::ClaimForMinting => "claim",
            LedgerEvent::MintConfirmed { .. } => "mint.confirmed",
            LedgerEvent::MintFailed => "mint.failed",
            LedgerEvent::Requeue => "requeue",
        }
    }
}

//--------------------------------------    WebhookOutcome    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WebhookOutcome {
    /// The event has been recorded but processing has not completed.
    Pending,
    /// The event was processed to completion. Redeliveries of the id are answered from this record.
    Accepted,
    /// The event was rejected (unknown type, unknown order, or invalid transition).
    Rejected,
}

impl Display for WebhookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookOutcome::Pending => write!(f, "Pending"),
            WebhookOutcome::Accepted => write!(f, "Accepted"),
            WebhookOutcome::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for WebhookOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError("webhook outcome", s.to_string())),
        }
    }
}

//--------------------------------------    WebhookEvent      --------------------------------------------------------
/// Append-only audit record for an inbound gateway event. The gateway-assigned `event_id` carries the
/// at-most-once guarantee: a second delivery of the same id is answered from this table without reprocessing.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub event_id: String,
    pub payload_digest: String,
    pub received_at: DateTime<Utc>,
    pub outcome: WebhookOutcome,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub payload_digest: String,
}

impl NewWebhookEvent {
    pub fn new<S1: Into<String>, S2: Into<String>>(event_id: S1, payload_digest: S2) -> Self {
        Self { event_id: event_id.into(), payload_digest: payload_digest.into() }
    }
}

//--------------------------------------      PriceQuote      --------------------------------------------------------
/// The latest known quote for a commodity symbol. Only the most recent quote per symbol is retained.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Cents,
    pub currency: String,
    /// When the source produced the quote.
    pub quoted_at: DateTime<Utc>,
    /// When we fetched it.
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new<S: Into<String>>(symbol: S, price: Cents, quoted_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            currency: agt_common::DEFAULT_CURRENCY_CODE.to_string(),
            quoted_at,
            fetched_at: Utc::now(),
        }
    }
}

//--------------------------------------      PinStatus       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PinStatus {
    Pending,
    Pinned,
    Failed,
}

impl Display for PinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinStatus::Pending => write!(f, "Pending"),
            PinStatus::Pinned => write!(f, "Pinned"),
            PinStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PinStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Pinned" => Ok(Self::Pinned),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError("pin status", s.to_string())),
        }
    }
}

//--------------------------------------      MediaAsset      --------------------------------------------------------
/// A content-addressed media record. The `content_id` is derived from the bytes, so identical content never
/// produces two records.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MediaAsset {
    pub content_id: String,
    pub crop_id: String,
    pub size: i64,
    pub mime_type: String,
    pub pin_status: PinStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub content_id: String,
    pub crop_id: String,
    pub size: i64,
    pub mime_type: String,
    pub pin_status: PinStatus,
}
