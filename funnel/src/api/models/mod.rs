//! API request and response data models.
//!
//! These structures define the public API contract. They are distinct from the database models in
//! [`crate::db::models`] so that storage details (access tokens, payment secrets) only reach the
//! wire where a handler deliberately puts them.
//!
//! # Model Categories
//!
//! ## Public funnel
//!
//! - [`leads`]: Lead capture and the lead's own view of their progress
//! - [`videos`]: Video catalog and watch progress
//! - [`calendar`]: Availability queries
//! - [`appointments`]: Booking and cancellation
//! - [`invoices`]: Public invoice view plus admin invoice management
//! - [`preferences`]: Email/SMS preferences
//!
//! ## Admin
//!
//! - [`auth`]: Login payloads and the [`auth::CurrentAdmin`] extractor type
//! - [`dashboard`]: Aggregate funnel metrics
//! - [`notifications`]: Dispatch log and manual sends
//! - [`reminders`]: Reminder listing
//! - [`pagination`]: Shared `skip`/`limit` parameters

pub mod appointments;
pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod invoices;
pub mod leads;
pub mod notifications;
pub mod pagination;
pub mod preferences;
pub mod reminders;
pub mod videos;
