//! Admin authentication.
//!
//! The dashboard has a single kind of account: admin users, created from configuration at
//! startup. An admin logs in with email and password at `/admin/api/v1/authentication/login`
//! and receives a signed JWT, both as an HTTP-only session cookie and in the response body.
//!
//! Every admin route takes a [`CurrentAdmin`](crate::api::models::auth::CurrentAdmin) extractor,
//! which accepts either:
//!
//! - the session cookie (browser dashboard), or
//! - an `Authorization: Bearer <jwt>` header (scripts).
//!
//! Public funnel routes never use this module; leads are identified by their access token.
//!
//! # Modules
//!
//! - [`session`]: JWT creation and verification
//! - [`password`]: Argon2 password hashing
//! - [`current_admin`]: request extractor

pub mod current_admin;
pub mod password;
pub mod session;
