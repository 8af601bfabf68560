//! OpenAPI documentation for the public funnel API.
//!
//! These endpoints back the landing pages. Leads authenticate with the access token they receive
//! at capture time, or the preferences token from an email footer.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::leads::capture_lead,
        api::handlers::leads::get_lead_progress,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::videos::record_progress,
        api::handlers::calendar::get_availability,
        api::handlers::appointments::book_appointment,
        api::handlers::appointments::cancel_appointment,
        api::handlers::invoices::get_public_invoice,
        api::handlers::preferences::get_preferences,
        api::handlers::preferences::update_preferences,
        api::handlers::preferences::unsubscribe,
        api::handlers::payments::webhook_handler,
    ),
    tags(
        (name = "funnel", description = "Lead-facing funnel endpoints"),
        (name = "payments", description = "Payment processor callbacks"),
    ),
    info(
        title = "Funnel API",
        description = "Lead capture, gated videos, booking, invoice payment and email preferences.",
    )
)]
pub struct PublicApiDoc;
