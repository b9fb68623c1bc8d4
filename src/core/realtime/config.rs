//! Realtime API configuration types.

use serde::{Deserialize, Serialize};

use super::messages::{SessionConfig, TurnDetection};

/// Realtime API WebSocket endpoint.
pub const REALTIME_API_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// G.711 µ-law, the audio format telephony media streams speak natively.
/// The relay passes payloads through without transcoding, so both directions
/// of the realtime session use it too.
pub const TELEPHONY_AUDIO_FORMAT: &str = "g711_ulaw";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for synthesized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    /// Ash voice
    Ash,
    /// Ballad voice
    Ballad,
    /// Coral voice
    Coral,
    /// Echo voice
    Echo,
    /// Sage voice
    Sage,
    /// Shimmer voice
    Shimmer,
    /// Verse voice
    Verse,
}

impl RealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "alloy" => Self::Alloy,
            "ash" => Self::Ash,
            "ballad" => Self::Ballad,
            "coral" => Self::Coral,
            "echo" => Self::Echo,
            "sage" => Self::Sage,
            "shimmer" => Self::Shimmer,
            "verse" => Self::Verse,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Connection settings for one realtime session.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,
    /// WebSocket endpoint; overridable for self-hosted gateways and tests
    pub url: String,
    /// Model to use
    pub model: String,
    /// Voice for synthesized output
    pub voice: RealtimeVoice,
    /// Persona instructions for the assistant
    pub instructions: Option<String>,
    /// Temperature for response generation
    pub temperature: Option<f32>,
}

impl RealtimeConfig {
    /// Full WebSocket URL including the model parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }

    /// The initial session configuration for a telephony-bridged call:
    /// µ-law audio both directions and server-side turn detection, so the
    /// endpoint fires speech-started events when the caller talks over a
    /// response.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(TELEPHONY_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(TELEPHONY_AUDIO_FORMAT.to_string()),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: None,
            }),
            temperature: self.temperature,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            api_key: "test-key".to_string(),
            url: REALTIME_API_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: RealtimeVoice::Shimmer,
            instructions: Some("Be helpful".to_string()),
            temperature: Some(0.8),
        }
    }

    #[test]
    fn test_voice_from_str() {
        assert_eq!(
            RealtimeVoice::from_str_or_default("alloy"),
            RealtimeVoice::Alloy
        );
        assert_eq!(
            RealtimeVoice::from_str_or_default("SHIMMER"),
            RealtimeVoice::Shimmer
        );
        assert_eq!(
            RealtimeVoice::from_str_or_default("unknown"),
            RealtimeVoice::Alloy
        );
    }

    #[test]
    fn test_ws_url() {
        let url = test_config().ws_url();
        assert!(url.starts_with("wss://api.openai.com"));
        assert!(url.ends_with("?model=gpt-4o-realtime-preview"));
    }

    #[test]
    fn test_session_config_uses_telephony_audio_format() {
        let session = test_config().session_config();
        assert_eq!(session.input_audio_format.as_deref(), Some("g711_ulaw"));
        assert_eq!(session.output_audio_format.as_deref(), Some("g711_ulaw"));
        assert_eq!(session.voice.as_deref(), Some("shimmer"));
        assert!(matches!(
            session.turn_detection,
            Some(TurnDetection::ServerVad { .. })
        ));
    }
}
