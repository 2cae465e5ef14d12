//! Data models for Glorp

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel peer identifier for records whose counterparty is not yet resolved.
pub const UNKNOWN_PEER: &str = "unknown";

// ============================================================================
// Game
// ============================================================================

/// A 1:1 guessing session with a peer. Also the shape of a pending invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub peer_address: String,
    pub peer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Game {
    pub fn new(id: impl Into<String>, peer_address: impl Into<String>) -> Self {
        let peer_address = peer_address.into();
        Self {
            id: id.into(),
            peer_name: crate::identity::display_name(&peer_address),
            peer_address,
            last_message: None,
            last_message_time: None,
            unread_count: 0,
        }
    }

    /// Composite roster key, `id::peerAddress`.
    pub fn dedupe_key(&self) -> String {
        format!("{}::{}", self.id, self.peer_address)
    }

    pub fn has_known_peer(&self) -> bool {
        !self.peer_address.is_empty() && self.peer_address != UNKNOWN_PEER
    }

    pub fn is_peer(&self, identifier: &str) -> bool {
        self.has_known_peer() && crate::identity::same_identifier(&self.peer_address, identifier)
    }

    pub(crate) fn touch(&mut self, preview: String, at: DateTime<Utc>) {
        self.last_message = Some(preview);
        self.last_message_time = Some(at);
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMessage {
    pub id: String,
    pub audio_url: String,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl AudioMessage {
    /// Whether the recorded guess matches the answer, ignoring case and padding.
    pub fn is_solved(&self) -> bool {
        match (&self.guess, &self.correct_answer) {
            (Some(guess), Some(answer)) => guess.trim().eq_ignore_ascii_case(answer.trim()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessage {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// A visible entry in the message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatMessage {
    Audio(AudioMessage),
    Text(TextMessage),
}

impl ChatMessage {
    pub fn id(&self) -> &str {
        match self {
            ChatMessage::Audio(m) => &m.id,
            ChatMessage::Text(m) => &m.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: String) {
        match self {
            ChatMessage::Audio(m) => m.id = id,
            ChatMessage::Text(m) => m.id = id,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            ChatMessage::Audio(m) => &m.sender,
            ChatMessage::Text(m) => &m.sender,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChatMessage::Audio(m) => m.timestamp,
            ChatMessage::Text(m) => m.timestamp,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ChatMessage::Audio(m) => m.conversation_id.as_deref(),
            ChatMessage::Text(m) => m.conversation_id.as_deref(),
        }
    }

    /// Short preview shown in the game list.
    pub fn preview(&self) -> String {
        match self {
            ChatMessage::Audio(_) => "Audio challenge".to_string(),
            ChatMessage::Text(m) => m.text.clone(),
        }
    }
}

/// An answer to an audio challenge. Applied onto the referenced message, never listed itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    pub original_message_id: String,
    pub guess: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    Audio(AudioMessage),
    Text(TextMessage),
    Guess(Guess),
}

impl IncomingMessage {
    pub fn sender(&self) -> &str {
        match self {
            IncomingMessage::Audio(m) => &m.sender,
            IncomingMessage::Text(m) => &m.sender,
            IncomingMessage::Guess(g) => &g.sender,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            IncomingMessage::Audio(m) => m.timestamp,
            IncomingMessage::Text(m) => m.timestamp,
            IncomingMessage::Guess(g) => g.timestamp,
        }
    }

    pub fn preview(&self) -> String {
        match self {
            IncomingMessage::Audio(_) => "Audio challenge".to_string(),
            IncomingMessage::Text(m) => m.text.clone(),
            IncomingMessage::Guess(g) => format!("Guess: {}", g.guess),
        }
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

/// JSON body carried as the text content of a network message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChallengePayload {
    #[serde(rename = "audio-challenge", rename_all = "camelCase")]
    AudioChallenge {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
        #[serde(default)]
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correct_answer: Option<String>,
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        timestamp: Option<DateTime<Utc>>,
    },
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        timestamp: Option<DateTime<Utc>>,
    },
    #[serde(rename = "guess", rename_all = "camelCase")]
    Guess {
        guess: String,
        original_message_id: String,
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl ChallengePayload {
    pub const AUDIO_CHALLENGE: &'static str = "audio-challenge";
    pub const TEXT: &'static str = "text";
    pub const GUESS: &'static str = "guess";

    pub fn is_known_type(tag: &str) -> bool {
        matches!(tag, Self::AUDIO_CHALLENGE | Self::TEXT | Self::GUESS)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds; anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value))
}

pub(crate) fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

// ============================================================================
// Sounds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A guessable item from the static catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sound {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
}

// ============================================================================
// Media
// ============================================================================

/// Raw captured audio. The bytes are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "audio/wav")
    }

    /// Inline `data:` reference, playable on any receiving device.
    pub fn to_data_url(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine};
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}
