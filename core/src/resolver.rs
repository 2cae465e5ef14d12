//! Identifier to conversation resolution

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identity::{classify_identifier, IdentifierKind};
use crate::network::{ConversationHandle, MessagingNetwork};

/// Maps peer identifiers to one-to-one conversations for one connected session.
///
/// Every alias a conversation is reached by (input identifier, inbox id and
/// conversation id) is cached, so later lookups by any alias skip the network.
pub struct Resolver {
    network: Arc<dyn MessagingNetwork>,
    cache: Mutex<HashMap<String, ConversationHandle>>,
}

impl Resolver {
    pub fn new(network: Arc<dyn MessagingNetwork>) -> Self {
        Self {
            network,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, identifier: &str) -> Option<ConversationHandle> {
        self.cache.lock().get(identifier).cloned()
    }

    pub async fn resolve(&self, identifier: &str) -> Result<ConversationHandle> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(Error::PeerUnreachable(String::new()));
        }

        if let Some(handle) = self.cached(identifier) {
            debug!(identifier, "conversation cache hit");
            return Ok(handle);
        }

        let inbox_id = match classify_identifier(identifier) {
            IdentifierKind::Address => self
                .network
                .find_inbox_id(identifier)
                .await?
                .ok_or_else(|| Error::PeerUnreachable(identifier.to_string()))?,
            IdentifierKind::InboxId => identifier.to_string(),
        };

        // A different alias may already have produced this conversation.
        if let Some(handle) = self.cached(&inbox_id) {
            self.remember(identifier, &inbox_id, &handle);
            return Ok(handle);
        }

        let handle = match self.network.find_dm(&inbox_id).await? {
            Some(existing) => existing,
            None => {
                info!(inbox_id = %inbox_id, "creating conversation");
                self.network.create_dm(&inbox_id).await?
            }
        };

        self.remember(identifier, &inbox_id, &handle);
        Ok(handle)
    }

    fn remember(&self, identifier: &str, inbox_id: &str, handle: &ConversationHandle) {
        let mut cache = self.cache.lock();
        cache.insert(identifier.to_string(), handle.clone());
        cache.insert(inbox_id.to_string(), handle.clone());
        if let Some(id) = handle.id() {
            cache.insert(id, handle.clone());
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
