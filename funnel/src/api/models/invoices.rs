//! API request/response models for invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::invoices::{InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceStatus, format_amount},
    errors::Error,
    types::{InvoiceId, LeadId},
};

const MAX_DESCRIPTION_LEN: usize = 500;

/// Admin view of an invoice
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub lead_id: LeadId,
    pub invoice_number: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    /// Human readable amount, e.g. "19.99 USD"
    pub amount_display: String,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub payment_id: Option<String>,
    pub failure_message: Option<String>,
    /// Link the lead pays through
    pub pay_url: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    pub fn new(db: InvoiceDBResponse, pay_url: String) -> Self {
        Self {
            id: db.id,
            lead_id: db.lead_id,
            invoice_number: db.display_number(),
            amount_display: format_amount(db.amount_cents, &db.currency),
            description: db.description,
            amount_cents: db.amount_cents,
            currency: db.currency,
            status: db.status,
            due_date: db.due_date,
            payment_id: db.payment_id,
            failure_message: db.failure_message,
            pay_url,
            sent_at: db.sent_at,
            paid_at: db.paid_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// What the payment page needs
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicInvoiceResponse {
    pub invoice_number: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    pub amount_display: String,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub customer_name: String,
    pub business_name: String,
    /// Present while the invoice can be paid
    pub client_secret: Option<String>,
    pub publishable_key: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// New draft invoice
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InvoiceCreate {
    pub lead_id: LeadId,
    pub description: String,
    /// Amount in the currency's minor unit
    pub amount_cents: i64,
    /// ISO 4217 code; defaults to `usd`
    pub currency: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Send immediately after creating
    #[serde(default)]
    pub send: bool,
}

impl InvoiceCreate {
    pub fn to_db_request(&self) -> Result<InvoiceCreateDBRequest, Error> {
        let description = self.description.trim();
        if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(Error::BadRequest {
                message: format!("Description must be between 1 and {MAX_DESCRIPTION_LEN} characters"),
            });
        }

        if self.amount_cents <= 0 {
            return Err(Error::BadRequest {
                message: "Amount must be greater than zero".to_string(),
            });
        }

        let currency = self.currency.as_deref().unwrap_or("usd").trim().to_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::BadRequest {
                message: format!("'{currency}' is not an ISO 4217 currency code"),
            });
        }

        Ok(InvoiceCreateDBRequest {
            lead_id: self.lead_id,
            description: description.to_string(),
            amount_cents: self.amount_cents,
            currency,
            due_date: self.due_date,
        })
    }
}

/// Query parameters for listing invoices
#[serde_as]
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListInvoicesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<InvoiceStatus>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub lead_id: Option<LeadId>,
}
