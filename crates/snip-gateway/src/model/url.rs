use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequestItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

#[derive(Debug, Serialize)]
pub struct UserUrlItem {
    pub short_url: String,
    pub original_url: String,
}
