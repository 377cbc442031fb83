use snip_core::{ShortCode, Shortener};
use snip_identity::TokenCodec;
use snip_shortener::DeleteSubmitter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    codec: TokenCodec,
    base_url: Arc<str>,
    deletes: DeleteSubmitter,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        codec: TokenCodec,
        public_base_url: impl Into<String>,
        deletes: DeleteSubmitter,
    ) -> Self {
        Self {
            shortener,
            codec,
            base_url: Arc::from(public_base_url.into()),
            deletes,
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn deletes(&self) -> &DeleteSubmitter {
        &self.deletes
    }

    /// Public URL that redirects to `code`.
    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
