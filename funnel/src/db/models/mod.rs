//! Database record models matching table schemas.
//!
//! Each module holds the row struct returned by its repository (`*DBResponse`, deriving
//! [`sqlx::FromRow`]) together with the request structs repositories accept. Status enums live
//! next to their rows and carry the transition rules for that entity.
//!
//! Database models are distinct from the API models in [`crate::api::models`]; handlers convert
//! between the two with `From` impls.

pub mod admin_users;
pub mod appointments;
pub mod dashboard;
pub mod email_preferences;
pub mod invoices;
pub mod leads;
pub mod notifications;
pub mod reminders;
pub mod video_views;
