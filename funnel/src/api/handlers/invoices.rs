//! Invoice handlers: the public payment page view and the admin lifecycle.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        auth::CurrentAdmin,
        invoices::{InvoiceCreate, InvoiceResponse, ListInvoicesQuery, PublicInvoiceResponse},
        pagination::PaginatedResponse,
    },
    config::Config,
    db::{
        handlers::{Invoices, Leads, Repository, invoices::InvoiceFilter},
        models::{
            invoices::{InvoiceDBResponse, InvoiceStatus, format_amount},
            leads::LeadStatus,
        },
    },
    email::EmailContent,
    errors::{Error, Result},
    types::InvoiceId,
};

/// Link the lead pays an invoice through
pub(crate) fn pay_url(config: &Config, invoice: &InvoiceDBResponse) -> String {
    config.public_link(&format!("pay?invoice={}", invoice.public_token))
}

fn not_found(id: impl ToString) -> Error {
    Error::NotFound {
        resource: "Invoice".to_string(),
        id: id.to_string(),
    }
}

fn response(config: &Config, invoice: InvoiceDBResponse) -> InvoiceResponse {
    let url = pay_url(config, &invoice);
    InvoiceResponse::new(invoice, url)
}

/// Open a payment for a draft and email the invoice to the lead.
///
/// Sent and failed invoices are emailed again with their existing payment. Paid and void
/// invoices cannot be sent.
async fn send_invoice_inner(state: &AppState, invoice: InvoiceDBResponse) -> Result<InvoiceDBResponse> {
    let payments = state.payments.as_ref().ok_or_else(|| Error::BadRequest {
        message: "Payment processing is not configured".to_string(),
    })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let lead = Leads::new(&mut conn).get_by_id(invoice.lead_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lead".to_string(),
        id: invoice.lead_id.to_string(),
    })?;
    drop(conn);

    let invoice = match invoice.status {
        InvoiceStatus::Draft => {
            let payment = payments.create_payment(&invoice, &lead).await?;

            let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
            let sent = Invoices::new(&mut tx)
                .mark_sent(invoice.id, &payment.payment_id, payment.client_secret.as_deref())
                .await?
                .ok_or_else(|| Error::Conflict {
                    message: "Invoice was changed while it was being sent".to_string(),
                })?;
            Leads::new(&mut tx).advance_status(lead.id, LeadStatus::Invoiced).await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;

            tracing::info!(invoice_id = sent.id, payment_id = %payment.payment_id, "Invoice sent");
            sent
        }
        InvoiceStatus::Sent | InvoiceStatus::Failed => invoice,
        status @ (InvoiceStatus::Paid | InvoiceStatus::Void) => {
            return Err(Error::Conflict {
                message: format!("Invoice is already {}", status.as_str()),
            });
        }
    };

    let content = EmailContent::Invoice {
        first_name: lead.first_name.clone(),
        invoice_number: invoice.display_number(),
        description: invoice.description.clone(),
        amount: format_amount(invoice.amount_cents, &invoice.currency),
        due_date: invoice.due_date.map(|d| d.to_string()),
        pay_link: pay_url(&state.config, &invoice),
    };
    if let Err(e) = state.notifier.email_lead(&lead, content).await {
        tracing::warn!(invoice_id = invoice.id, error = %e, "Failed to record invoice email");
    }

    Ok(invoice)
}

/// Invoice as shown on the payment page
#[utoipa::path(
    get,
    path = "/api/invoices/{public_token}",
    tag = "funnel",
    params(("public_token" = String, Path, description = "Token from the payment link")),
    responses(
        (status = 200, description = "Invoice", body = PublicInvoiceResponse),
        (status = 404, description = "Invoice not found"),
    )
)]
#[instrument(skip_all)]
pub async fn get_public_invoice(State(state): State<AppState>, Path(public_token): Path<String>) -> Result<Json<PublicInvoiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Drafts have not been issued and are not visible to the lead
    let invoice = Invoices::new(&mut conn)
        .get_by_public_token(&public_token)
        .await?
        .filter(|i| i.status != InvoiceStatus::Draft)
        .ok_or_else(|| not_found("(payment link)"))?;
    let lead = Leads::new(&mut conn)
        .get_by_id(invoice.lead_id)
        .await?
        .ok_or_else(|| not_found("(payment link)"))?;

    let payable = matches!(invoice.status, InvoiceStatus::Sent | InvoiceStatus::Failed);

    Ok(Json(PublicInvoiceResponse {
        invoice_number: invoice.display_number(),
        amount_display: format_amount(invoice.amount_cents, &invoice.currency),
        description: invoice.description,
        amount_cents: invoice.amount_cents,
        currency: invoice.currency,
        status: invoice.status,
        due_date: invoice.due_date,
        customer_name: lead.full_name(),
        business_name: state.config.business_name.clone(),
        client_secret: invoice.payment_client_secret.filter(|_| payable),
        publishable_key: state.payments.as_ref().and_then(|p| p.publishable_key()),
        paid_at: invoice.paid_at,
    }))
}

/// List invoices
#[utoipa::path(
    get,
    path = "/invoices",
    tag = "invoices",
    params(ListInvoicesQuery),
    responses(
        (status = 200, description = "Page of invoices", body = PaginatedResponse<InvoiceResponse>),
        (status = 401, description = "Not signed in"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
    _admin: CurrentAdmin,
) -> Result<Json<PaginatedResponse<InvoiceResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = InvoiceFilter {
        status: query.status,
        lead_id: query.lead_id,
        ..InvoiceFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Invoices::new(&mut conn);
    let invoices = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        invoices.into_iter().map(|i| response(&state.config, i)).collect(),
        total,
        skip,
        limit,
    )))
}

/// Create a draft invoice, optionally sending it straight away
#[utoipa::path(
    post,
    path = "/invoices",
    tag = "invoices",
    request_body = InvoiceCreate,
    responses(
        (status = 201, description = "Invoice created", body = InvoiceResponse),
        (status = 400, description = "Invalid invoice"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Lead not found"),
        (status = 502, description = "Payment processor unavailable"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin, request), fields(admin_id = admin.id, lead_id = request.lead_id))]
pub async fn create_invoice(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Json(request): Json<InvoiceCreate>,
) -> Result<(StatusCode, Json<InvoiceResponse>)> {
    let db_request = request.to_db_request()?;
    if request.send && state.payments.is_none() {
        return Err(Error::BadRequest {
            message: "Payment processing is not configured".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Leads::new(&mut conn).get_by_id(request.lead_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Lead".to_string(),
            id: request.lead_id.to_string(),
        });
    }
    let invoice = Invoices::new(&mut conn).create(&db_request).await?;
    drop(conn);

    tracing::info!(invoice_id = invoice.id, number = %invoice.display_number(), "Created invoice");

    let invoice = if request.send {
        let id = invoice.id;
        match send_invoice_inner(&state, invoice).await {
            Ok(sent) => sent,
            Err(e) => {
                // A create-and-send that fails leaves no draft behind
                let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
                if let Err(cleanup) = Invoices::new(&mut conn).delete(id).await {
                    tracing::error!(invoice_id = id, error = %cleanup, "Failed to remove unsent draft");
                }
                return Err(e);
            }
        }
    } else {
        invoice
    };

    Ok((StatusCode::CREATED, Json(response(&state.config, invoice))))
}

/// Get an invoice
#[utoipa::path(
    get,
    path = "/invoices/{id}",
    tag = "invoices",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice", body = InvoiceResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Invoice not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn get_invoice(State(state): State<AppState>, Path(id): Path<InvoiceId>, _admin: CurrentAdmin) -> Result<Json<InvoiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invoice = Invoices::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(response(&state.config, invoice)))
}

/// Send an invoice to its lead
#[utoipa::path(
    post,
    path = "/invoices/{id}/send",
    tag = "invoices",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice sent", body = InvoiceResponse),
        (status = 400, description = "Payment processing is not configured"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is paid or void"),
        (status = 502, description = "Payment processor unavailable"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin), fields(admin_id = admin.id))]
pub async fn send_invoice(State(state): State<AppState>, Path(id): Path<InvoiceId>, admin: CurrentAdmin) -> Result<Json<InvoiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let invoice = Invoices::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    drop(conn);

    let invoice = send_invoice_inner(&state, invoice).await?;
    Ok(Json(response(&state.config, invoice)))
}

/// Void an invoice
///
/// Only marks the invoice locally. An open payment at the processor is left to expire.
#[utoipa::path(
    post,
    path = "/invoices/{id}/void",
    tag = "invoices",
    params(("id" = i64, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice voided", body = InvoiceResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Invoice not found"),
        (status = 409, description = "Invoice is paid or already void"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip(state, admin), fields(admin_id = admin.id))]
pub async fn void_invoice(State(state): State<AppState>, Path(id): Path<InvoiceId>, admin: CurrentAdmin) -> Result<Json<InvoiceResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Invoices::new(&mut conn);

    let Some(invoice) = repo.mark_void(id).await? else {
        let existing = repo.get_by_id(id).await?.ok_or_else(|| not_found(id))?;
        return Err(Error::Conflict {
            message: format!("Cannot void an invoice that is {}", existing.status.as_str()),
        });
    };

    tracing::info!(invoice_id = id, "Voided invoice");
    Ok(Json(response(&state.config, invoice)))
}
