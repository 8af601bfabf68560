//! Database repository for invoices.
//!
//! Status changes are conditional updates: each `mark_*` method only touches rows whose current
//! status may move to the target (see [`InvoiceStatus::can_transition_to`]) and returns `None`
//! when nothing changed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::invoices::{InvoiceCreateDBRequest, InvoiceDBResponse, InvoiceStatus, InvoiceUpdateDBRequest},
};
use crate::types::{InvoiceId, LeadId, abbrev_token, generate_token};

/// Filter for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<InvoiceStatus>,
    pub lead_id: Option<LeadId>,
}

impl InvoiceFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(lead_id) = self.lead_id {
            query.push(" AND lead_id = ");
            query.push_bind(lead_id);
        }
    }
}

pub struct Invoices<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Invoices<'c> {
    type CreateRequest = InvoiceCreateDBRequest;
    type UpdateRequest = InvoiceUpdateDBRequest;
    type Response = InvoiceDBResponse;
    type Id = InvoiceId;
    type Filter = InvoiceFilter;

    /// Create a draft invoice and assign its number (`INV-000001`) from the row id.
    #[instrument(skip(self, request), fields(lead_id = request.lead_id, amount_cents = request.amount_cents), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let (id,): (InvoiceId,) = sqlx::query_as(
            r#"
            INSERT INTO invoices (lead_id, public_token, description, amount_cents, currency, status, due_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(request.lead_id)
        .bind(generate_token())
        .bind(&request.description)
        .bind(request.amount_cents)
        .bind(request.currency.to_lowercase())
        .bind(InvoiceStatus::Draft)
        .bind(request.due_date)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let invoice = sqlx::query_as::<_, InvoiceDBResponse>("UPDATE invoices SET invoice_number = ? WHERE id = ? RETURNING *")
            .bind(format!("INV-{id:06}"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(invoice)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let invoice = sqlx::query_as::<_, InvoiceDBResponse>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(invoice)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM invoices WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let invoices = query.build_query_as::<InvoiceDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(invoices.into_iter().map(|invoice| (invoice.id, invoice)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM invoices WHERE 1=1");
        filter.push_conditions(&mut query);

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let invoices = query.build_query_as::<InvoiceDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(invoices)
    }

    /// Delete a draft invoice. Invoices that have been sent are kept for the record.
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ? AND status = ?")
            .bind(id)
            .bind(InvoiceStatus::Draft)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Edit a draft invoice. Returns `NotFound` when there is no draft with this id.
    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let invoice = sqlx::query_as::<_, InvoiceDBResponse>(
            r#"
            UPDATE invoices SET
                description = COALESCE(?, description),
                amount_cents = COALESCE(?, amount_cents),
                due_date = COALESCE(?, due_date),
                updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING *
            "#,
        )
        .bind(&request.description)
        .bind(request.amount_cents)
        .bind(request.due_date)
        .bind(Utc::now())
        .bind(id)
        .bind(InvoiceStatus::Draft)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(invoice)
    }
}

impl<'c> Invoices<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip_all, fields(token = %abbrev_token(token)), err)]
    pub async fn get_by_public_token(&mut self, token: &str) -> Result<Option<InvoiceDBResponse>> {
        let invoice = sqlx::query_as::<_, InvoiceDBResponse>("SELECT * FROM invoices WHERE public_token = ?")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(invoice)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_payment_id(&mut self, payment_id: &str) -> Result<Option<InvoiceDBResponse>> {
        let invoice = sqlx::query_as::<_, InvoiceDBResponse>("SELECT * FROM invoices WHERE payment_id = ?")
            .bind(payment_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(invoice)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &InvoiceFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM invoices WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// draft → sent, recording the payment the lead will complete
    #[instrument(skip(self, client_secret), err)]
    pub async fn mark_sent(&mut self, id: InvoiceId, payment_id: &str, client_secret: Option<&str>) -> Result<Option<InvoiceDBResponse>> {
        let now = Utc::now();
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE invoices SET status = ");
        query.push_bind(InvoiceStatus::Sent);
        query.push(", payment_id = ");
        query.push_bind(payment_id.to_string());
        query.push(", payment_client_secret = ");
        query.push_bind(client_secret.map(str::to_string));
        query.push(", sent_at = ");
        query.push_bind(now);
        query.push(", updated_at = ");
        query.push_bind(now);
        Self::push_transition_guard(&mut query, id, InvoiceStatus::Sent);

        self.execute_transition(query).await
    }

    /// sent|failed → paid
    #[instrument(skip(self), err)]
    pub async fn mark_paid(&mut self, id: InvoiceId, paid_at: DateTime<Utc>) -> Result<Option<InvoiceDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE invoices SET status = ");
        query.push_bind(InvoiceStatus::Paid);
        query.push(", paid_at = ");
        query.push_bind(paid_at);
        query.push(", failure_message = NULL, updated_at = ");
        query.push_bind(Utc::now());
        Self::push_transition_guard(&mut query, id, InvoiceStatus::Paid);

        self.execute_transition(query).await
    }

    /// sent → failed
    #[instrument(skip(self, message), err)]
    pub async fn mark_failed(&mut self, id: InvoiceId, message: Option<&str>) -> Result<Option<InvoiceDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE invoices SET status = ");
        query.push_bind(InvoiceStatus::Failed);
        query.push(", failure_message = ");
        query.push_bind(message.map(str::to_string));
        query.push(", updated_at = ");
        query.push_bind(Utc::now());
        Self::push_transition_guard(&mut query, id, InvoiceStatus::Failed);

        self.execute_transition(query).await
    }

    /// draft|sent|failed → void
    #[instrument(skip(self), err)]
    pub async fn mark_void(&mut self, id: InvoiceId) -> Result<Option<InvoiceDBResponse>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE invoices SET status = ");
        query.push_bind(InvoiceStatus::Void);
        query.push(", updated_at = ");
        query.push_bind(Utc::now());
        Self::push_transition_guard(&mut query, id, InvoiceStatus::Void);

        self.execute_transition(query).await
    }

    fn push_transition_guard(query: &mut QueryBuilder<'_, Sqlite>, id: InvoiceId, target: InvoiceStatus) {
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in InvoiceStatus::sources_for(target) {
            separated.push_bind(status);
        }
        separated.push_unseparated(") RETURNING *");
    }

    async fn execute_transition(&mut self, mut query: QueryBuilder<'_, Sqlite>) -> Result<Option<InvoiceDBResponse>> {
        let invoice = query.build_query_as::<InvoiceDBResponse>().fetch_optional(&mut *self.db).await?;
        Ok(invoice)
    }

    /// `(status, count)` for every status with at least one invoice
    #[instrument(skip(self), err)]
    pub async fn count_by_status(&mut self) -> Result<Vec<(InvoiceStatus, i64)>> {
        let rows: Vec<(InvoiceStatus, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM invoices GROUP BY status ORDER BY status")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::handlers::{Leads, leads::tests::lead_request};
    use sqlx::SqlitePool;

    pub(crate) fn invoice_request(lead_id: LeadId) -> InvoiceCreateDBRequest {
        InvoiceCreateDBRequest {
            lead_id,
            description: "Coaching package".to_string(),
            amount_cents: 50_000,
            currency: "USD".to_string(),
            due_date: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_assigns_number_and_token(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("inv@example.com")).await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let first = repo.create(&invoice_request(lead.id)).await.unwrap();
        let second = repo.create(&invoice_request(lead.id)).await.unwrap();

        assert_eq!(first.status, InvoiceStatus::Draft);
        assert_eq!(first.currency, "usd");
        assert_eq!(first.invoice_number.as_deref(), Some(format!("INV-{:06}", first.id).as_str()));
        assert_ne!(first.public_token, second.public_token);

        let by_token = repo.get_by_public_token(&first.public_token).await.unwrap().unwrap();
        assert_eq!(by_token.id, first.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_full_lifecycle(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("inv@example.com")).await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let invoice = repo.create(&invoice_request(lead.id)).await.unwrap();

        // Cannot be paid before it is sent
        assert!(repo.mark_paid(invoice.id, Utc::now()).await.unwrap().is_none());

        let sent = repo.mark_sent(invoice.id, "pi_123", Some("pi_123_secret")).await.unwrap().unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert_eq!(repo.get_by_payment_id("pi_123").await.unwrap().unwrap().id, invoice.id);

        let failed = repo.mark_failed(invoice.id, Some("card declined")).await.unwrap().unwrap();
        assert_eq!(failed.status, InvoiceStatus::Failed);
        assert_eq!(failed.failure_message.as_deref(), Some("card declined"));

        let paid = repo.mark_paid(invoice.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.failure_message.is_none());
        assert!(paid.paid_at.is_some());

        // Terminal
        assert!(repo.mark_void(invoice.id).await.unwrap().is_none());
        assert!(repo.mark_failed(invoice.id, None).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_drafts_are_editable(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("inv@example.com")).await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let invoice = repo.create(&invoice_request(lead.id)).await.unwrap();
        let edited = repo
            .update(
                invoice.id,
                &InvoiceUpdateDBRequest {
                    amount_cents: Some(75_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.amount_cents, 75_000);
        assert_eq!(edited.description, "Coaching package");

        repo.mark_void(invoice.id).await.unwrap().unwrap();
        let err = repo.update(invoice.id, &InvoiceUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
        assert!(!repo.delete(invoice.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_amount_must_be_positive(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("inv@example.com")).await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let err = repo
            .create(&InvoiceCreateDBRequest {
                amount_cents: 0,
                ..invoice_request(lead.id)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }), "unexpected error: {err:?}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_count_by_status(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let lead = Leads::new(&mut conn).create(&lead_request("inv@example.com")).await.unwrap();
        let mut repo = Invoices::new(&mut conn);

        let a = repo.create(&invoice_request(lead.id)).await.unwrap();
        repo.create(&invoice_request(lead.id)).await.unwrap();
        repo.mark_sent(a.id, "pi_a", None).await.unwrap();

        let drafts = repo
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Draft),
                lead_id: Some(lead.id),
                ..InvoiceFilter::new(0, 10)
            })
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(repo.count(&InvoiceFilter::new(0, 10)).await.unwrap(), 2);

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts, vec![(InvoiceStatus::Draft, 1), (InvoiceStatus::Sent, 1)]);
    }
}
