//! Connected messaging session
//!
//! Built on connect and dropped on disconnect; the resolver cache lives and
//! dies with it.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::identity::{derive_identity, NetworkIdentity, WalletProvider};
use crate::network::{ConversationHandle, MessageStream, MessagingNetwork};
use crate::resolver::Resolver;

pub struct Session {
    identity: NetworkIdentity,
    network: Arc<dyn MessagingNetwork>,
    resolver: Resolver,
}

impl Session {
    pub async fn connect(
        network: Arc<dyn MessagingNetwork>,
        wallet: &dyn WalletProvider,
    ) -> Result<Self> {
        let mut identity = derive_identity(wallet).await?;
        let inbox_id = network.connect(&identity).await?;
        info!(address = %identity.address, inbox_id = %inbox_id, "connected to messaging network");
        identity.inbox_id = Some(inbox_id);

        Ok(Self {
            identity,
            resolver: Resolver::new(network.clone()),
            network,
        })
    }

    pub fn identity(&self) -> &NetworkIdentity {
        &self.identity
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub async fn resolve(&self, identifier: &str) -> Result<ConversationHandle> {
        self.resolver.resolve(identifier).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Value>> {
        self.network.list_conversations().await
    }

    pub async fn send(&self, conversation: &ConversationHandle, text: &str) -> Result<()> {
        self.network
            .send(conversation, text)
            .await
            .map_err(|e| match e {
                Error::SendFailed(_) => e,
                other => Error::SendFailed(other.to_string()),
            })
    }

    pub async fn stream_all_messages(&self) -> Result<MessageStream> {
        self.network.stream_all_messages().await
    }

    pub async fn stream_messages(&self, conversation: &ConversationHandle) -> Result<MessageStream> {
        self.network.stream_messages(conversation).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.resolver.clear();
        info!(address = %self.identity.address, "messaging session closed");
    }
}
