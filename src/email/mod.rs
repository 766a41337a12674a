//! Notification dispatch. Domain code builds typed [`Notification`] values;
//! the [`Mailer`] is the only delivery path. Delivery is best-effort for every
//! path except the password-reset email, whose failure the caller must see.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::errors::ApiError;
use crate::models::status::BookingStatus;

/// A fully rendered transactional email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    operator: String,
}

impl Mailer {
    pub fn from_config(config: &EmailConfig) -> Mailer {
        let transport = match &config.smtp_host {
            Some(host) => match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
                Ok(builder) => {
                    let mut builder = builder.port(config.smtp_port);
                    if let (Some(user), Some(pass)) =
                        (&config.smtp_username, &config.smtp_password)
                    {
                        builder =
                            builder.credentials(Credentials::new(user.clone(), pass.clone()));
                    }
                    Some(builder.build())
                }
                Err(err) => {
                    log::error!("invalid SMTP configuration: {}", err);
                    None
                }
            },
            None => {
                log::warn!("EMAIL_HOST not set, email delivery disabled");
                None
            }
        };

        Mailer {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
            operator: config.operator_recipient.clone(),
        }
    }

    /// Operator inbox for booking and contact notifications.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub async fn send(&self, notification: &Notification) -> Result<(), ApiError> {
        let transport = match &self.transport {
            Some(transport) => transport,
            None => {
                log::info!(
                    "email delivery disabled, skipping '{}' to {}",
                    notification.subject,
                    notification.to
                );
                return Ok(());
            }
        };

        let from: Mailbox = self.from.parse().map_err(|err| {
            log::error!("invalid sender address '{}': {}", self.from, err);
            ApiError::EmailDelivery
        })?;
        let to: Mailbox = notification.to.parse().map_err(|err| {
            log::error!("invalid recipient address '{}': {}", notification.to, err);
            ApiError::EmailDelivery
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&notification.subject)
            .header(ContentType::TEXT_HTML)
            .body(notification.html.clone())
            .map_err(|err| {
                log::error!("failed to build email: {}", err);
                ApiError::EmailDelivery
            })?;

        transport.send(message).await.map_err(|err| {
            log::error!(
                "failed to send '{}' to {}: {}",
                notification.subject,
                notification.to,
                err
            );
            ApiError::EmailDelivery
        })?;

        Ok(())
    }

    /// Fire-and-forget delivery: failures are logged, never surfaced.
    pub async fn send_best_effort(&self, notification: Notification) {
        if self.send(&notification).await.is_err() {
            log::warn!(
                "notification '{}' to {} was not delivered",
                notification.subject,
                notification.to
            );
        }
    }
}

pub fn welcome(to: &str, frontend_url: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: "Welcome to Vroum-Auto!".to_string(),
        html: format!(
            "<p>Hello {to},</p>\
             <p>Welcome to Vroum-Auto! Your account has been created.</p>\
             <p>Start browsing our vehicles for sale and for rent right away.</p>\
             <p><a href=\"{frontend_url}/auth\">Log in</a></p>\
             <p>The Vroum-Auto team</p>"
        ),
    }
}

pub fn password_reset(to: &str, reset_url: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: "Vroum-Auto password reset".to_string(),
        html: format!(
            "<p>Hello,</p>\
             <p>You (or someone else) requested a password reset for your Vroum-Auto account.</p>\
             <p><a href=\"{reset_url}\">Reset my password</a></p>\
             <p>This link expires in 10 minutes.</p>\
             <p>If you did not request this, ignore this email and your password will remain unchanged.</p>\
             <p>The Vroum-Auto team</p>"
        ),
    }
}

pub fn contact_message(
    operator: &str,
    name: &str,
    email: &str,
    subject: &str,
    message: &str,
) -> Notification {
    Notification {
        to: operator.to_string(),
        subject: format!("[Vroum-Auto contact] {subject}"),
        html: format!(
            "<p>New contact message:</p>\
             <p><strong>Name:</strong> {name}</p>\
             <p><strong>Email:</strong> {email}</p>\
             <p><strong>Message:</strong></p><p>{message}</p>"
        ),
    }
}

pub fn booking_received_user(to: &str, kind: &str, vehicle: &str, when: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: format!("We received your {kind} request"),
        html: format!(
            "<p>Hello {to},</p>\
             <p>We received your {kind} request for <strong>{vehicle}</strong>.</p>\
             <ul><li><strong>When:</strong> {when}</li>\
             <li><strong>Status:</strong> {}</li></ul>\
             <p>We will review your request and get back to you shortly.</p>\
             <p>The Vroum-Auto team</p>",
            BookingStatus::Pending.label()
        ),
    }
}

pub fn booking_received_operator(
    operator: &str,
    kind: &str,
    vehicle: &str,
    user_email: &str,
    when: &str,
    message: Option<&str>,
) -> Notification {
    Notification {
        to: operator.to_string(),
        subject: format!("[New {kind}] {vehicle} by {user_email}"),
        html: format!(
            "<p>New {kind} request:</p>\
             <ul><li><strong>Vehicle:</strong> {vehicle}</li>\
             <li><strong>User:</strong> {user_email}</li>\
             <li><strong>When:</strong> {when}</li>\
             <li><strong>Message:</strong> {}</li></ul>\
             <p>Confirm or cancel it from the admin dashboard.</p>",
            message.unwrap_or("No message.")
        ),
    }
}

pub fn status_changed(
    to: &str,
    kind: &str,
    vehicle: &str,
    when: &str,
    status: BookingStatus,
) -> Notification {
    Notification {
        to: to.to_string(),
        subject: format!("Your {kind} for {vehicle} is now {}", status.as_str()),
        html: format!(
            "<p>Hello {to},</p>\
             <p>The status of your {kind} for <strong>{vehicle}</strong> has changed.</p>\
             <ul><li><strong>Vehicle:</strong> {vehicle}</li>\
             <li><strong>When:</strong> {when}</li>\
             <li><strong>Status:</strong> {}</li></ul>\
             <p>The Vroum-Auto team</p>",
            status.label()
        ),
    }
}

pub fn status_changed_operator(
    operator: &str,
    kind: &str,
    vehicle: &str,
    user_email: &str,
    when: &str,
    status: BookingStatus,
) -> Notification {
    Notification {
        to: operator.to_string(),
        subject: format!("[{kind} update] {vehicle} by {user_email}"),
        html: format!(
            "<p>A {kind} changed status:</p>\
             <ul><li><strong>Vehicle:</strong> {vehicle}</li>\
             <li><strong>User:</strong> {user_email}</li>\
             <li><strong>When:</strong> {when}</li>\
             <li><strong>Status:</strong> {}</li></ul>",
            status.label()
        ),
    }
}

pub fn cancellation_user(to: &str, kind: &str, vehicle: &str, when: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: format!("Your {kind} for {vehicle} has been cancelled"),
        html: format!(
            "<p>Hello {to},</p>\
             <p>Your {kind} for <strong>{vehicle}</strong> has been cancelled.</p>\
             <ul><li><strong>When:</strong> {when}</li>\
             <li><strong>Status:</strong> {}</li></ul>\
             <p>If this was a mistake or you have questions, please contact us.</p>\
             <p>The Vroum-Auto team</p>",
            BookingStatus::Cancelled.label()
        ),
    }
}

pub fn cancellation_operator(
    operator: &str,
    kind: &str,
    vehicle: &str,
    user_email: &str,
    when: &str,
    cancelled_by_admin: bool,
) -> Notification {
    Notification {
        to: operator.to_string(),
        subject: format!("[{kind} cancelled] {vehicle} by {user_email}"),
        html: format!(
            "<p>A {kind} was cancelled:</p>\
             <ul><li><strong>Vehicle:</strong> {vehicle}</li>\
             <li><strong>User:</strong> {user_email}</li>\
             <li><strong>When:</strong> {when}</li>\
             <li><strong>Cancelled by:</strong> {}</li></ul>",
            if cancelled_by_admin { "Admin" } else { "User" }
        ),
    }
}

pub fn account_status_changed(to: &str, active: bool) -> Notification {
    Notification {
        to: to.to_string(),
        subject: if active {
            "Your Vroum-Auto account has been unblocked".to_string()
        } else {
            "Your Vroum-Auto account has been blocked".to_string()
        },
        html: format!(
            "<p>Hello {to},</p>\
             <p>Your Vroum-Auto account has been <b>{}</b> by an administrator.</p>\
             <p>{}</p>\
             <p>The Vroum-Auto team</p>",
            if active { "unblocked" } else { "blocked" },
            if active {
                "You can log in and use our services again."
            } else {
                "If you believe this is a mistake, please contact us."
            }
        ),
    }
}

pub fn account_deleted(to: &str) -> Notification {
    Notification {
        to: to.to_string(),
        subject: "Your Vroum-Auto account has been deleted".to_string(),
        html: format!(
            "<p>Hello {to},</p>\
             <p>Your Vroum-Auto account has been deleted by an administrator.</p>\
             <p>If you believe this is a mistake, please contact us.</p>\
             <p>The Vroum-Auto team</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_mailer_swallows_sends() {
        let mailer = Mailer {
            transport: None,
            from: "Vroum-Auto <noreply@vroum-auto.example>".into(),
            operator: "ops@vroum-auto.example".into(),
        };
        let result = mailer.send(&welcome("a@x.com", "http://localhost")).await;
        assert!(result.is_ok());
    }

    #[test]
    fn status_email_carries_vehicle_dates_and_readable_status() {
        let n = status_changed(
            "a@x.com",
            "reservation",
            "Clio 5 (Renault Clio 2022)",
            "from 2026-09-01 to 2026-09-04",
            BookingStatus::Confirmed,
        );
        assert_eq!(n.to, "a@x.com");
        assert!(n.html.contains("Clio 5 (Renault Clio 2022)"));
        assert!(n.html.contains("from 2026-09-01 to 2026-09-04"));
        assert!(n.html.contains("Confirmed"));
    }

    #[test]
    fn operator_notifications_name_the_requesting_user() {
        let n = booking_received_operator(
            "ops@x.com",
            "test drive",
            "Clio 5 (Renault Clio 2022)",
            "a@x.com",
            "2026-09-01 14:30",
            None,
        );
        assert_eq!(n.to, "ops@x.com");
        assert!(n.html.contains("a@x.com"));
        assert!(n.html.contains("No message."));
    }

    #[test]
    fn reset_email_embeds_the_raw_link() {
        let n = password_reset("a@x.com", "http://front/resetpassword/abc123");
        assert!(n.html.contains("http://front/resetpassword/abc123"));
        assert!(n.html.contains("10 minutes"));
    }
}
