//! Classification and decoding of inbound message payloads
//!
//! The channel is shared with other applications, so anything that is not one
//! of our three payload kinds is ignored rather than treated as an error.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::identity::same_identifier;
use crate::models::{AudioMessage, ChallengePayload, Guess, IncomingMessage, TextMessage};
use crate::network::RawMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotJson,
    MissingType,
    UnknownType(String),
    Malformed(String),
    MissingAudio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Message(IncomingMessage),
    Ignored(IgnoreReason),
}

impl Decoded {
    pub fn message(self) -> Option<IncomingMessage> {
        match self {
            Decoded::Message(message) => Some(message),
            Decoded::Ignored(_) => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Decoded::Ignored(_))
    }
}

/// Decode one raw record. Never fails; unusable input comes back as `Ignored`.
pub fn classify(raw: &RawMessage, received_at: DateTime<Utc>) -> Decoded {
    match decode(raw, received_at) {
        Ok(message) => Decoded::Message(message),
        Err(reason) => {
            debug!(?reason, message_id = ?raw.id(), "ignoring payload");
            Decoded::Ignored(reason)
        }
    }
}

fn decode(raw: &RawMessage, received_at: DateTime<Utc>) -> Result<IncomingMessage, IgnoreReason> {
    let document = match raw.content() {
        Value::String(text) => {
            serde_json::from_str::<Value>(text).map_err(|_| IgnoreReason::NotJson)?
        }
        object @ Value::Object(_) => object.clone(),
        _ => return Err(IgnoreReason::NotJson),
    };

    let tag = document
        .get("type")
        .and_then(Value::as_str)
        .ok_or(IgnoreReason::MissingType)?;
    if !ChallengePayload::is_known_type(tag) {
        return Err(IgnoreReason::UnknownType(tag.to_string()));
    }

    let payload: ChallengePayload =
        serde_json::from_value(document).map_err(|e| IgnoreReason::Malformed(e.to_string()))?;

    let id = raw.id().unwrap_or_else(|| content_id(raw));
    let sender = raw.sender();
    let conversation_id = raw.conversation_id();

    let message = match payload {
        ChallengePayload::AudioChallenge {
            audio_data,
            audio_url,
            filename,
            correct_answer,
            timestamp,
        } => {
            // Inline data plays anywhere; a bare URL may only be valid on the sender's device.
            let audio_url = audio_data
                .filter(|d| !d.is_empty())
                .or(audio_url.filter(|u| !u.is_empty()))
                .ok_or(IgnoreReason::MissingAudio)?;

            IncomingMessage::Audio(AudioMessage {
                id,
                audio_url,
                filename,
                timestamp: timestamp.unwrap_or(received_at),
                sender,
                guess: None,
                correct_answer,
                conversation_id,
            })
        }
        ChallengePayload::Text { text, timestamp } => IncomingMessage::Text(TextMessage {
            id,
            text,
            timestamp: timestamp.unwrap_or(received_at),
            sender,
            conversation_id,
        }),
        ChallengePayload::Guess {
            guess,
            original_message_id,
            timestamp,
        } => IncomingMessage::Guess(Guess {
            original_message_id,
            guess,
            timestamp: timestamp.unwrap_or(received_at),
            sender,
        }),
    };

    Ok(message)
}

/// Stable id for a record the network delivered without one: derived from
/// sender and content, so a redelivery maps to the same id and distinct
/// messages do not collide.
fn content_id(raw: &RawMessage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.sender().as_bytes());
    hasher.update([0u8]);
    hasher.update(raw.content().to_string().as_bytes());
    format!("content-{}", &hex::encode(hasher.finalize())[..16])
}

/// Whether a raw record belongs to the open conversation.
///
/// Matches by conversation id when both sides carry one, otherwise by the
/// peer appearing as sender or recipient.
pub fn belongs_to(raw: &RawMessage, conversation_id: Option<&str>, peer: &str) -> bool {
    if let (Some(open_id), Some(message_conversation)) = (conversation_id, raw.conversation_id()) {
        return open_id == message_conversation;
    }

    same_identifier(&raw.sender(), peer)
        || raw
            .recipient()
            .is_some_and(|recipient| same_identifier(&recipient, peer))
}
