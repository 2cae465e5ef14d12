//! Messaging network contract and tolerant readers for its records
//!
//! The network hands back loosely shaped JSON records. All field probing for
//! those records lives here; the rest of the crate reads them through
//! [`ConversationHandle`] and [`RawMessage`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::Result;
use crate::identity::NetworkIdentity;
use crate::models::UNKNOWN_PEER;

pub type MessageStream = BoxStream<'static, RawMessage>;

/// Operations the core needs from the external messaging network.
#[async_trait]
pub trait MessagingNetwork: Send + Sync {
    /// Register the identity for this session and return the own inbox id.
    async fn connect(&self, identity: &NetworkIdentity) -> Result<String>;

    async fn list_conversations(&self) -> Result<Vec<Value>>;

    /// Inbox id registered for a network address, if any.
    async fn find_inbox_id(&self, address: &str) -> Result<Option<String>>;

    async fn find_dm(&self, inbox_id: &str) -> Result<Option<ConversationHandle>>;

    async fn create_dm(&self, inbox_id: &str) -> Result<ConversationHandle>;

    async fn send(&self, conversation: &ConversationHandle, text: &str) -> Result<()>;

    async fn stream_all_messages(&self) -> Result<MessageStream>;

    async fn stream_messages(&self, conversation: &ConversationHandle) -> Result<MessageStream>;
}

// ============================================================================
// Field probing
// ============================================================================

const CONVERSATION_ID_FIELDS: &[&str] = &[
    "dmId",
    "id",
    "conversationId",
    "topic",
    "groupId",
    "inboxId",
    "peerInboxId",
];
const CONVERSATION_PEER_FIELDS: &[&str] = &["peerInboxId", "peerAddress", "inboxId"];
const HANDLE_ID_FIELDS: &[&str] = &["id", "conversationId", "dmId"];
const MESSAGE_ID_FIELDS: &[&str] = &["id", "messageId"];
const SENDER_FIELDS: &[&str] = &["senderAddress", "senderInboxId", "sender", "from"];
const RECIPIENT_FIELDS: &[&str] = &["recipientAddress", "recipientInboxId", "recipient", "to"];
const MESSAGE_CONVERSATION_FIELDS: &[&str] = &["conversationId", "topic"];

/// First non-empty string (or number) among `fields`, in order.
pub fn probe_str(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(*field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn probe_conversation_id(record: &Value) -> Option<String> {
    probe_str(record, CONVERSATION_ID_FIELDS)
}

pub fn probe_conversation_peer(record: &Value) -> Option<String> {
    probe_str(record, CONVERSATION_PEER_FIELDS)
}

// ============================================================================
// Conversation handle
// ============================================================================

/// Opaque one-to-one conversation owned by the network.
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    raw: Arc<Value>,
}

impl ConversationHandle {
    pub fn new(raw: Value) -> Self {
        Self { raw: Arc::new(raw) }
    }

    pub fn id(&self) -> Option<String> {
        probe_str(&self.raw, HANDLE_ID_FIELDS)
    }

    pub fn peer(&self) -> Option<String> {
        probe_conversation_peer(&self.raw)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Same underlying network object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }
}

impl PartialEq for ConversationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.raw == other.raw
    }
}

// ============================================================================
// Raw inbound message
// ============================================================================

/// One record from a message stream, as delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    raw: Value,
}

impl RawMessage {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The envelope's `content`, or the record itself when it is not wrapped.
    pub fn content(&self) -> &Value {
        match self.raw.get("content") {
            Some(content) if !content.is_null() => content,
            _ => &self.raw,
        }
    }

    pub fn id(&self) -> Option<String> {
        probe_str(&self.raw, MESSAGE_ID_FIELDS)
    }

    pub fn sender(&self) -> String {
        probe_str(&self.raw, SENDER_FIELDS).unwrap_or_else(|| UNKNOWN_PEER.to_string())
    }

    pub fn recipient(&self) -> Option<String> {
        probe_str(&self.raw, RECIPIENT_FIELDS)
    }

    pub fn conversation_id(&self) -> Option<String> {
        probe_str(&self.raw, MESSAGE_CONVERSATION_FIELDS)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl From<Value> for RawMessage {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}
