//! API models for booking availability.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::calendar::slots::Slot;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Calendar date in the business timezone, `YYYY-MM-DD`
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    /// IANA name of the timezone `date` is interpreted in
    pub timezone: String,
    pub slots: Vec<Slot>,
}
