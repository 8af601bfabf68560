//! OpenAPI documentation for the admin API.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security schemes for the admin API: the session cookie set by login, or the same JWT as a
/// bearer token.
struct AdminSecurityAddon;

impl Modify for AdminSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /authentication/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("funnel_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/admin/api/v1", description = "Admin API server")
    ),
    modifiers(&AdminSecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::dashboard::get_dashboard,
        api::handlers::leads::list_leads,
        api::handlers::leads::get_lead,
        api::handlers::leads::update_lead,
        api::handlers::leads::delete_lead,
        api::handlers::appointments::list_appointments,
        api::handlers::appointments::update_appointment,
        api::handlers::reminders::list_reminders,
        api::handlers::reminders::process_reminders,
        api::handlers::invoices::list_invoices,
        api::handlers::invoices::create_invoice,
        api::handlers::invoices::get_invoice,
        api::handlers::invoices::send_invoice,
        api::handlers::invoices::void_invoice,
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::send_email,
        api::handlers::notifications::send_sms,
    ),
    tags(
        (name = "authentication", description = "Admin login and logout"),
        (name = "dashboard", description = "Funnel metrics"),
        (name = "leads", description = "Lead management"),
        (name = "appointments", description = "Booked calls"),
        (name = "reminders", description = "Appointment reminders"),
        (name = "invoices", description = "Invoice lifecycle"),
        (name = "notifications", description = "Notification log and manual sends"),
    ),
    info(
        title = "Funnel Admin API",
        description = "Manage leads, appointments, invoices and notifications.",
    )
)]
pub struct AdminApiDoc;
