//! Database models for invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::{InvoiceId, LeadId};

/// Invoice lifecycle.
///
/// ```text
/// draft ──send──▶ sent ──succeeded──▶ paid
///   │              │ ▲                  ▲
///   │              │ └──────┐           │
///   │              └─failed─▶ failed ───┘
///   └──────────────void◀─────┘
/// ```
///
/// `paid` and `void` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Failed,
    Void,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Failed,
        InvoiceStatus::Void,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Void => "void",
        }
    }

    pub fn can_transition_to(self, target: InvoiceStatus) -> bool {
        matches!(
            (self, target),
            (Self::Draft, Self::Sent)
                | (Self::Sent | Self::Failed, Self::Paid)
                | (Self::Sent, Self::Failed)
                | (Self::Draft | Self::Sent | Self::Failed, Self::Void)
        )
    }

    /// The statuses an invoice may be in to move to `target`.
    pub fn sources_for(target: InvoiceStatus) -> Vec<InvoiceStatus> {
        Self::ALL.into_iter().filter(|s| s.can_transition_to(target)).collect()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Void)
    }
}

/// Database request for creating a draft invoice
#[derive(Debug, Clone)]
pub struct InvoiceCreateDBRequest {
    pub lead_id: LeadId,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
}

/// Database request for editing a draft invoice. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdateDBRequest {
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

/// Database response for an invoice
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceDBResponse {
    pub id: InvoiceId,
    pub lead_id: LeadId,
    pub invoice_number: Option<String>,
    pub public_token: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub payment_id: Option<String>,
    pub payment_client_secret: Option<String>,
    pub failure_message: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceDBResponse {
    /// Human readable number, falling back to the row id before one is assigned
    pub fn display_number(&self) -> String {
        self.invoice_number.clone().unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// Format an amount in minor units for display, e.g. `1999, "usd"` → `"19.99 USD"`.
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{sign}{}.{:02} {}", abs / 100, abs % 100, currency.to_uppercase())
}
