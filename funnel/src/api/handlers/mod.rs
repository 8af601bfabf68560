//! HTTP handlers for all API endpoints.
//!
//! Handlers are organized by resource. Each one validates its input, runs repository calls on a
//! connection (or transaction) taken from the pool for the duration of the request, calls
//! adapters through [`AppState`](crate::AppState), and converts rows into API models.
//!
//! # Handler Modules
//!
//! - [`leads`]: Lead capture, the lead's progress view and admin lead management
//! - [`videos`]: Gated video catalog and progress tracking
//! - [`calendar`]: Booking availability
//! - [`appointments`]: Booking, cancellation and admin status changes
//! - [`invoices`]: Public invoice view and admin invoice lifecycle
//! - [`payments`]: Payment processor webhook
//! - [`preferences`]: Email/SMS preferences and unsubscribe
//! - [`notifications`]: Notification log and manual sends
//! - [`reminders`]: Reminder listing and manual processing
//! - [`dashboard`]: Funnel metrics
//! - [`auth`]: Admin login and logout
//! - [`static_assets`]: Embedded landing pages
//!
//! # Authentication
//!
//! Public handlers identify the lead by the access token in the request. Admin handlers take a
//! [`CurrentAdmin`](crate::api::models::auth::CurrentAdmin) argument, which rejects the request
//! with 401 before the handler runs.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to an HTTP status and a JSON body.
//! Email and SMS sends that follow a successful state change are best effort: failures are
//! recorded in the notification log and do not fail the request.

pub mod appointments;
pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod invoices;
pub mod leads;
pub mod notifications;
pub mod payments;
pub mod preferences;
pub mod reminders;
pub mod static_assets;
pub mod videos;
