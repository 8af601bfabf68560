//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite. The database is a single
//! file on disk; the schema lives in `migrations/` and is applied on startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, reminder scheduler)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Connections and transactions
//!
//! Repositories borrow a `&mut SqliteConnection`, which can come from a pooled connection or a
//! transaction. Each request acquires what it needs and releases it when the handler returns:
//!
//! ```ignore
//! use funnel::db::handlers::{Leads, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let lead = Leads::new(&mut tx).create(&request).await?;
//! EmailPreferences::new(&mut tx).create_for_lead(lead.id, true).await?;
//! tx.commit().await?;
//! ```
//!
//! Timestamps are always bound from application code as UTC, so the RFC3339 text SQLite stores
//! compares correctly as a string.

pub mod errors;
pub mod handlers;
pub mod models;
