//! API model for the admin dashboard summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::dashboard::DashboardDBResponse;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub total_leads: i64,
    /// Count per lead status; every status is present
    pub leads_by_status: BTreeMap<String, i64>,
    /// Count per invoice status; every status is present
    pub invoices_by_status: BTreeMap<String, i64>,
    /// Sum of paid invoices in minor units. Currencies are not converted.
    pub revenue_cents: i64,
    /// Sum of sent and failed invoices in minor units
    pub outstanding_cents: i64,
    pub upcoming_appointments: i64,
    pub pending_reminders: i64,
    pub video_completions: i64,
    /// Customers divided by all leads, 0.0 to 1.0
    pub conversion_rate: f64,
    /// Whether the reminder scheduler is mid-tick
    pub reminders_processing: bool,
    pub generated_at: DateTime<Utc>,
}

impl DashboardResponse {
    pub fn new(db: DashboardDBResponse, reminders_processing: bool, generated_at: DateTime<Utc>) -> Self {
        Self {
            conversion_rate: db.conversion_rate(),
            total_leads: db.total_leads,
            leads_by_status: db.leads_by_status,
            invoices_by_status: db.invoices_by_status,
            revenue_cents: db.revenue_cents,
            outstanding_cents: db.outstanding_cents,
            upcoming_appointments: db.upcoming_appointments,
            pending_reminders: db.pending_reminders,
            video_completions: db.video_completions,
            reminders_processing,
            generated_at,
        }
    }
}
