use reqwest::Method;
use serde::Serialize;
use tracing::info;

use crate::auth::pin::PIN_TTL_MINUTES;
use crate::hub::client::{HubClient, HubError};

#[derive(Debug, Serialize)]
struct SendEmailPayload {
    to: String,
    subject: String,
    html: String,
    text: String,
}

/// Deliver via the Hub; with no Hub configured this logs and succeeds so
/// local development works without outbound email.
async fn send_email(hub: &HubClient, payload: SendEmailPayload) -> Result<(), HubError> {
    if !hub.is_configured() {
        info!(to = %payload.to, subject = %payload.subject, "hub not configured, skipping email");
        return Ok(());
    }
    let _: serde_json::Value = hub
        .request(Method::POST, "/hub/email/v1/send", Some(&payload))
        .await?;
    Ok(())
}

pub async fn send_pin(hub: &HubClient, email: &str, pin: &str) -> Result<(), HubError> {
    send_email(
        hub,
        SendEmailPayload {
            to: email.to_string(),
            subject: format!("Your login code: {pin}"),
            html: format!(
                "<h2>Your verification code</h2>\
                 <p>Enter this code to sign in. It expires in {PIN_TTL_MINUTES} minutes.</p>\
                 <div style=\"font-size:32px;font-weight:bold;letter-spacing:8px\">{pin}</div>\
                 <p>If you didn't request this code, you can safely ignore this email.</p>"
            ),
            text: format!("Your verification code is: {pin} (expires in {PIN_TTL_MINUTES} minutes)"),
        },
    )
    .await
}

pub async fn send_invitation(
    hub: &HubClient,
    email: &str,
    org_name: &str,
    inviter_name: &str,
    link: &str,
) -> Result<(), HubError> {
    send_email(
        hub,
        SendEmailPayload {
            to: email.to_string(),
            subject: format!("You're invited to join {org_name}"),
            html: format!(
                "<h2>You've been invited!</h2>\
                 <p>{inviter_name} invited you to join <strong>{org_name}</strong>.</p>\
                 <a href=\"{link}\">Accept Invitation</a>\
                 <p>This invitation expires in 7 days.</p>"
            ),
            text: format!("{inviter_name} invited you to join {org_name}. Accept here: {link}"),
        },
    )
    .await
}

pub async fn send_welcome(hub: &HubClient, email: &str, name: &str) -> Result<(), HubError> {
    send_email(
        hub,
        SendEmailPayload {
            to: email.to_string(),
            subject: "Welcome!".to_string(),
            html: format!(
                "<h2>Welcome, {name}!</h2>\
                 <p>Your account has been created. You're all set to get started.</p>"
            ),
            text: format!("Welcome, {name}! Your account has been created."),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;

    fn unconfigured_hub() -> HubClient {
        HubClient::new(&HubConfig {
            url: "https://hub.invalid/api".into(),
            token: None,
        })
    }

    #[tokio::test]
    async fn unconfigured_hub_is_log_only_for_email() {
        let hub = unconfigured_hub();
        send_pin(&hub, "a@x.com", "123456").await.expect("pin email");
        send_invitation(&hub, "a@x.com", "Acme", "Bea", "https://x/invite/t")
            .await
            .expect("invitation email");
        send_welcome(&hub, "a@x.com", "Ann").await.expect("welcome email");
    }
}
