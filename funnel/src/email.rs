//! Email service for funnel notifications.
//!
//! Bodies are rendered from HTML templates compiled into the binary (`templates/email/`). Every
//! template extends a shared layout whose footer carries the preference/unsubscribe link.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use minijinja::{Environment, Value, context};
use serde::Serialize;
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    db::models::notifications::NotificationKind,
    errors::Error,
};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/email/layout.html")),
    ("welcome.html", include_str!("../templates/email/welcome.html")),
    ("booking_confirmation.html", include_str!("../templates/email/booking_confirmation.html")),
    ("appointment_reminder.html", include_str!("../templates/email/appointment_reminder.html")),
    ("appointment_cancelled.html", include_str!("../templates/email/appointment_cancelled.html")),
    ("invoice.html", include_str!("../templates/email/invoice.html")),
    ("payment_receipt.html", include_str!("../templates/email/payment_receipt.html")),
    ("custom.html", include_str!("../templates/email/custom.html")),
];

/// What an email says. Field names are the template variables under `content`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EmailContent {
    Welcome {
        first_name: String,
        watch_link: String,
    },
    BookingConfirmation {
        first_name: String,
        start_local: String,
        meeting_link: Option<String>,
        manage_link: String,
    },
    AppointmentReminder {
        first_name: String,
        start_local: String,
        meeting_link: Option<String>,
    },
    AppointmentCancelled {
        first_name: String,
        start_local: String,
        book_link: String,
    },
    Invoice {
        first_name: String,
        invoice_number: String,
        description: String,
        amount: String,
        due_date: Option<String>,
        pay_link: String,
    },
    PaymentReceipt {
        first_name: String,
        invoice_number: String,
        description: String,
        amount: String,
        paid_on: String,
    },
    Custom {
        first_name: String,
        subject: String,
        body: String,
    },
}

impl EmailContent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Welcome { .. } => NotificationKind::Welcome,
            Self::BookingConfirmation { .. } => NotificationKind::BookingConfirmation,
            Self::AppointmentReminder { .. } => NotificationKind::AppointmentReminder,
            Self::AppointmentCancelled { .. } => NotificationKind::AppointmentCancelled,
            Self::Invoice { .. } => NotificationKind::Invoice,
            Self::PaymentReceipt { .. } => NotificationKind::PaymentReceipt,
            Self::Custom { .. } => NotificationKind::Custom,
        }
    }

    fn template_name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome.html",
            Self::BookingConfirmation { .. } => "booking_confirmation.html",
            Self::AppointmentReminder { .. } => "appointment_reminder.html",
            Self::AppointmentCancelled { .. } => "appointment_cancelled.html",
            Self::Invoice { .. } => "invoice.html",
            Self::PaymentReceipt { .. } => "payment_receipt.html",
            Self::Custom { .. } => "custom.html",
        }
    }

    fn subject(&self, business_name: &str) -> String {
        match self {
            Self::Welcome { .. } => format!("Welcome to {business_name}"),
            Self::BookingConfirmation { start_local, .. } => format!("Confirmed: your call on {start_local}"),
            Self::AppointmentReminder { start_local, .. } => format!("Reminder: your call {start_local}"),
            Self::AppointmentCancelled { .. } => "Your call has been cancelled".to_string(),
            Self::Invoice { invoice_number, .. } => format!("Invoice {invoice_number} from {business_name}"),
            Self::PaymentReceipt { invoice_number, .. } => format!("Receipt for invoice {invoice_number}"),
            Self::Custom { subject, .. } => subject.clone(),
        }
    }
}

/// `href` filter: an absolute http(s) URL with only `&` escaped. Anything else becomes `#`.
fn href_filter(value: String) -> Value {
    match url::Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Value::from_safe_string(url.as_str().replace('&', "&amp;")),
        _ => Value::from_safe_string("#".to_string()),
    }
}

/// A rendered email ready to send
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
    reply_to: Option<Mailbox>,
    business_name: String,
    templates: Environment<'static>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from = format!("{} <{}>", email_config.from_name, email_config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let reply_to = email_config
            .reply_to
            .as_deref()
            .map(|addr| addr.parse::<Mailbox>())
            .transpose()
            .map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;

        let mut templates = Environment::new();
        templates.add_filter("href", href_filter);
        for &(name, source) in TEMPLATES {
            templates.add_template(name, source).map_err(|e| Error::Internal {
                operation: format!("compile email template {name}: {e}"),
            })?;
        }

        Ok(Self {
            transport,
            from,
            reply_to,
            business_name: config.business_name.clone(),
            templates,
        })
    }

    /// Render an email. `preferences_link` is shown in the footer when given.
    pub fn render(&self, content: &EmailContent, preferences_link: Option<&str>) -> Result<RenderedEmail, Error> {
        let subject = content.subject(&self.business_name);
        let html = self
            .templates
            .get_template(content.template_name())
            .and_then(|template| {
                template.render(context! {
                    subject => &subject,
                    business_name => &self.business_name,
                    preferences_link => preferences_link,
                    content => content,
                })
            })
            .map_err(|e| Error::Internal {
                operation: format!("render email template {}: {e}", content.template_name()),
            })?;

        Ok(RenderedEmail { subject, html })
    }

    /// Send a rendered email.
    pub async fn send(&self, to_email: &str, to_name: Option<&str>, email: &RenderedEmail) -> Result<(), Error> {
        let to = if let Some(name) = to_name {
            format!("{name} <{to_email}>")
        } else {
            to_email.to_string()
        }
        .parse::<Mailbox>()
        .map_err(|e| Error::BadRequest {
            message: format!("Invalid recipient address: {e}"),
        })?;

        let mut builder = Message::builder().from(self.from.clone()).to(to).subject(&email.subject);
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Provider {
                    provider: "Email",
                    message: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}
