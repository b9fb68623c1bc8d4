//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::realtime::config::RealtimeConfig;

/// State shared by all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }

    /// Connection settings for one realtime session, or `None` when no API
    /// key is configured.
    pub fn realtime_config(&self) -> Option<RealtimeConfig> {
        let api_key = self.config.openai_api_key.clone()?;
        Some(RealtimeConfig {
            api_key,
            url: self.config.realtime_url.clone(),
            model: self.config.realtime_model.clone(),
            voice: self.config.voice,
            instructions: Some(self.config.instructions.clone()),
            temperature: Some(self.config.temperature),
        })
    }
}
