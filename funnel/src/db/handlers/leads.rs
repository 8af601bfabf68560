//! Database repository for leads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::leads::{LeadCreateDBRequest, LeadDBResponse, LeadStatus, LeadUpdateDBRequest},
};
use crate::types::{LeadId, generate_token};

/// Filter for listing leads
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<LeadStatus>,
    /// Case-insensitive substring match on email, name and company
    pub search: Option<String>,
}

impl LeadFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }

        if let Some(ref search) = self.search {
            let search_pattern = format!("%{}%", search.to_lowercase());
            query.push(" AND (LOWER(email) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(first_name || ' ' || COALESCE(last_name, '')) LIKE ");
            query.push_bind(search_pattern.clone());
            query.push(" OR LOWER(COALESCE(company, '')) LIKE ");
            query.push_bind(search_pattern);
            query.push(")");
        }
    }
}

pub struct Leads<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Leads<'c> {
    type CreateRequest = LeadCreateDBRequest;
    type UpdateRequest = LeadUpdateDBRequest;
    type Response = LeadDBResponse;
    type Id = LeadId;
    type Filter = LeadFilter;

    #[instrument(skip(self, request), fields(source = ?request.source), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();

        let lead = sqlx::query_as::<_, LeadDBResponse>(
            r#"
            INSERT INTO leads (
                email, first_name, last_name, phone, company, source,
                utm_source, utm_medium, utm_campaign, status, access_token, sms_consent,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&request.email)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone)
        .bind(&request.company)
        .bind(&request.source)
        .bind(&request.utm_source)
        .bind(&request.utm_medium)
        .bind(&request.utm_campaign)
        .bind(LeadStatus::New)
        .bind(generate_token())
        .bind(request.sms_consent)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(lead)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lead = sqlx::query_as::<_, LeadDBResponse>("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lead)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM leads WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let leads = query.build_query_as::<LeadDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(leads.into_iter().map(|lead| (lead.id, lead)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM leads WHERE 1=1");
        filter.push_conditions(&mut query);

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let leads = query.build_query_as::<LeadDBResponse>().fetch_all(&mut *self.db).await?;

        Ok(leads)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ?").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lead = sqlx::query_as::<_, LeadDBResponse>(
            r#"
            UPDATE leads SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                phone = COALESCE(?, phone),
                company = COALESCE(?, company),
                status = COALESCE(?, status),
                sms_consent = COALESCE(?, sms_consent),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone)
        .bind(&request.company)
        .bind(request.status)
        .bind(request.sms_consent)
        .bind(&request.notes)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(lead)
    }
}

impl<'c> Leads<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Look up a lead by email (case-insensitive)
    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<LeadDBResponse>> {
        let lead = sqlx::query_as::<_, LeadDBResponse>("SELECT * FROM leads WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lead)
    }

    /// Look up a lead by the access token handed out at capture time
    #[instrument(skip_all, err)]
    pub async fn get_by_access_token(&mut self, token: &str) -> Result<Option<LeadDBResponse>> {
        let lead = sqlx::query_as::<_, LeadDBResponse>("SELECT * FROM leads WHERE access_token = ?")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(lead)
    }

    /// Move a lead forward to `target` if that is a forward move along the funnel ladder.
    ///
    /// Returns whether the row changed. Leads already at or past `target`, and `lost` leads, are
    /// left alone.
    #[instrument(skip(self), fields(target = target.as_str()), err)]
    pub async fn advance_status(&mut self, id: LeadId, target: LeadStatus) -> Result<bool> {
        let sources: Vec<LeadStatus> = LeadStatus::ALL.into_iter().filter(|s| s.can_advance_to(target)).collect();
        if sources.is_empty() {
            return Ok(false);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE leads SET status = ");
        query.push_bind(target);
        query.push(", updated_at = ");
        query.push_bind(Utc::now());
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in sources {
            separated.push_bind(status);
        }
        separated.push_unseparated(")");

        let result = query.build().execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count leads matching the filter (ignores skip/limit)
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &LeadFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM leads WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Leads captured since `since`
    #[instrument(skip(self), err)]
    pub async fn count_created_since(&mut self, since: DateTime<Utc>) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads WHERE created_at >= ?")
            .bind(since)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::SqlitePool;

    pub(crate) fn lead_request(email: &str) -> LeadCreateDBRequest {
        LeadCreateDBRequest {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: Some("Lovelace".to_string()),
            phone: Some("+15550001111".to_string()),
            sms_consent: true,
            source: Some("landing".to_string()),
            ..Default::default()
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_lead(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let lead = repo.create(&lead_request("ada@example.com")).await.unwrap();

        assert_eq!(lead.email, "ada@example.com");
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.full_name(), "Ada Lovelace");
        assert_eq!(lead.access_token.len(), 43);
        assert!(lead.sms_consent);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        repo.create(&lead_request("dup@example.com")).await.unwrap();
        let err = repo.create(&lead_request("DUP@example.com")).await.unwrap_err();

        assert!(err.is_unique_on("leads", "email"), "unexpected error: {err:?}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lookup_by_email_and_token(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let lead = repo.create(&lead_request("find@example.com")).await.unwrap();

        let by_email = repo.get_by_email("FIND@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, lead.id);

        let by_token = repo.get_by_access_token(&lead.access_token).await.unwrap().unwrap();
        assert_eq!(by_token.id, lead.id);

        assert!(repo.get_by_access_token("nope").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_advance_status_only_moves_forward(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let lead = repo.create(&lead_request("ladder@example.com")).await.unwrap();

        assert!(repo.advance_status(lead.id, LeadStatus::Booked).await.unwrap());
        assert!(!repo.advance_status(lead.id, LeadStatus::VideoWatched).await.unwrap());
        assert!(!repo.advance_status(lead.id, LeadStatus::Booked).await.unwrap());

        let lead = repo.get_by_id(lead.id).await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Booked);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lost_leads_are_not_advanced(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let lead = repo.create(&lead_request("lost@example.com")).await.unwrap();
        repo.update(
            lead.id,
            &LeadUpdateDBRequest {
                status: Some(LeadStatus::Lost),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!repo.advance_status(lead.id, LeadStatus::Customer).await.unwrap());
        assert_eq!(repo.get_by_id(lead.id).await.unwrap().unwrap().status, LeadStatus::Lost);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_count(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let a = repo.create(&lead_request("alpha@example.com")).await.unwrap();
        repo.create(&lead_request("beta@example.com")).await.unwrap();
        repo.create(&LeadCreateDBRequest {
            company: Some("Gamma Corp".to_string()),
            ..lead_request("c@example.com")
        })
        .await
        .unwrap();
        repo.advance_status(a.id, LeadStatus::VideoWatched).await.unwrap();

        assert_eq!(repo.list(&LeadFilter::new(0, 10)).await.unwrap().len(), 3);
        assert_eq!(repo.list(&LeadFilter::new(0, 2)).await.unwrap().len(), 2);
        assert_eq!(repo.count(&LeadFilter::new(0, 1)).await.unwrap(), 3);

        let watched = repo
            .list(&LeadFilter::new(0, 10).with_status(LeadStatus::VideoWatched))
            .await
            .unwrap();
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[0].id, a.id);

        let gamma = repo.list(&LeadFilter::new(0, 10).with_search("GAMMA".to_string())).await.unwrap();
        assert_eq!(gamma.len(), 1);
        assert_eq!(gamma[0].email, "c@example.com");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_bulk_and_delete(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let a = repo.create(&lead_request("a@example.com")).await.unwrap();
        let b = repo.create(&lead_request("b@example.com")).await.unwrap();

        let bulk = repo.get_bulk(vec![a.id, b.id, 9999]).await.unwrap();
        assert_eq!(bulk.len(), 2);
        assert_eq!(bulk[&b.id].email, "b@example.com");

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_lead_is_not_found(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Leads::new(&mut conn);

        let err = repo.update(42, &LeadUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
