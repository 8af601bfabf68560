//! OpenAPI documentation configuration.
//!
//! Two documents describe the two API surfaces:
//! - [`admin::AdminApiDoc`]: Admin API at `/admin/api/v1/*`, rendered at `/admin/docs`
//! - [`public::PublicApiDoc`]: Funnel pages API and payment webhook, rendered at `/docs`

pub mod admin;
pub mod public;

pub use admin::AdminApiDoc;
pub use public::PublicApiDoc;
