use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateOrgRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrgRequest {
    pub name: Option<String>,
    pub logo_url: Option<String>,
    pub settings: Option<serde_json::Value>,
}

impl UpdateOrgRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.logo_url.is_none() && self.settings.is_none()
    }
}
