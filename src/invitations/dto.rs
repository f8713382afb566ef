use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub email: String,
    pub role: Option<String>,
}

/// Public summary shown to the invitee before they accept.
#[derive(Debug, Serialize)]
pub struct InvitationSummary {
    pub email: String,
    pub role: String,
    pub organization: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
