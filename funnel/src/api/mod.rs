//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Public funnel endpoints (no login; leads identify themselves with their access token):
//!
//! - **Leads** (`/api/leads`): Lead capture and progress
//! - **Videos** (`/api/videos/*`): Gated video catalog and watch progress
//! - **Calendar** (`/api/calendar/availability`): Open booking slots
//! - **Appointments** (`/api/appointments/*`): Booking and cancellation
//! - **Invoices** (`/api/invoices/{public_token}`): Payment page data
//! - **Preferences** (`/api/preferences/{token}`): Email/SMS opt-ins and unsubscribe
//! - **Payments** (`/webhooks/payments`): Signed payment processor callback
//!
//! Admin endpoints (`/admin/api/v1/*`, session cookie or bearer JWT):
//!
//! - **Authentication** (`/authentication/*`): Login and logout
//! - **Dashboard**, **Leads**, **Appointments**, **Reminders**, **Invoices**, **Notifications**
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. API documentation is available at
//! `/admin/docs` when the server is running.

pub mod handlers;
pub mod models;
