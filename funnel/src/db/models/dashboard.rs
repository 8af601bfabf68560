//! Aggregates shown on the admin dashboard.

use std::collections::BTreeMap;

/// Raw dashboard figures as computed from the database
#[derive(Debug, Clone, Default)]
pub struct DashboardDBResponse {
    pub total_leads: i64,
    pub leads_by_status: BTreeMap<String, i64>,
    pub invoices_by_status: BTreeMap<String, i64>,
    /// Sum of paid invoices, in minor units
    pub revenue_cents: i64,
    /// Sum of sent and failed invoices, in minor units
    pub outstanding_cents: i64,
    pub upcoming_appointments: i64,
    pub pending_reminders: i64,
    pub video_completions: i64,
}

impl DashboardDBResponse {
    /// Share of all leads that became customers, in `[0, 1]`
    pub fn conversion_rate(&self) -> f64 {
        if self.total_leads == 0 {
            return 0.0;
        }
        let customers = self.leads_by_status.get("customer").copied().unwrap_or(0);
        customers as f64 / self.total_leads as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_rate() {
        assert_eq!(DashboardDBResponse::default().conversion_rate(), 0.0);

        let stats = DashboardDBResponse {
            total_leads: 4,
            leads_by_status: BTreeMap::from([("customer".to_string(), 1), ("new".to_string(), 3)]),
            ..Default::default()
        };
        assert_eq!(stats.conversion_rate(), 0.25);
    }
}
