//! Game client: roster, invitations and message list kept in step with the network

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::random_sound;
use crate::classify::{belongs_to, classify, Decoded};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::identity::{display_name, NetworkIdentity, WalletProvider};
use crate::logging::DebugLog;
use crate::merge::merge_roster;
use crate::models::*;
use crate::network::{ConversationHandle, MessageStream, MessagingNetwork, RawMessage};
use crate::session::Session;
use crate::storage::{KeyValueStore, PersistenceMirror, SqliteStore};

/// Outcome of routing a message seen by the global listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalEvent {
    Ignored,
    Duplicate,
    OwnMessage,
    UnknownSender,
    /// Sender is the peer of the open game; the conversation listener handles it.
    OpenGame,
    Unread { peer_address: String, unread_count: u32 },
    Invitation(Game),
}

/// Outcome of routing a message seen by the open game's listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    NotForOpenGame,
    Ignored,
    Duplicate,
    OwnEcho,
    Appended(ChatMessage),
    GuessApplied { message_id: String },
    GuessOrphaned { message_id: String },
    /// The network's copy of a message we sent; the local record now carries `message_id`.
    EchoConfirmed { local_id: String, message_id: String },
}

#[derive(Debug, Clone)]
pub struct OpenGame {
    /// Copy of the roster entry, carrying the resolved conversation id.
    pub game: Game,
    /// Id of the roster entry the game was opened from.
    pub roster_id: String,
    pub conversation: ConversationHandle,
}

/// Sent messages not yet matched to their network echo.
const PENDING_ECHO_LIMIT: usize = 64;

/// Recently seen message ids, oldest evicted first.
#[derive(Debug)]
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`. Returns false if it is already remembered.
    fn insert(&mut self, id: String) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.clone());
        self.order.push_back(id);
        true
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

pub struct GameClient {
    network: Arc<dyn MessagingNetwork>,
    mirror: PersistenceMirror,
    session: Option<Session>,
    games: Vec<Game>,
    invitations: Vec<Game>,
    messages: Vec<ChatMessage>,
    message_ids: HashSet<String>,
    pending_echo: VecDeque<String>,
    open: Option<OpenGame>,
    seen_global: SeenIds,
    debug_log: DebugLog,
}

impl GameClient {
    pub fn new(
        network: Arc<dyn MessagingNetwork>,
        store: Box<dyn KeyValueStore>,
        config: &ClientConfig,
    ) -> Self {
        let mirror = PersistenceMirror::with_keys(
            store,
            &config.storage.games_key,
            &config.storage.messages_key,
        );
        let (games, messages) = mirror.load();

        let mut debug_log = DebugLog::new(config.debug_log_capacity);
        debug_log.push(format!(
            "Loaded {} games and {} messages from storage",
            games.len(),
            messages.len()
        ));

        Self {
            network,
            mirror,
            session: None,
            games,
            invitations: Vec::new(),
            message_ids: messages.iter().map(|m| m.id().to_string()).collect(),
            messages,
            pending_echo: VecDeque::new(),
            open: None,
            seen_global: SeenIds::new(config.seen_message_capacity),
            debug_log,
        }
    }

    /// Open the SQLite-backed client under `data_dir`, reading `config.json` if present.
    pub fn open(network: Arc<dyn MessagingNetwork>, data_dir: &Path) -> Result<Self> {
        let config = ClientConfig::load(data_dir)?;
        let store = SqliteStore::open(data_dir, &config.storage.database_file)?;
        Ok(Self::new(network, Box::new(store), &config))
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Connect the wallet, fold the remote conversation list into the roster
    /// and persist the result. An existing session is replaced.
    pub async fn connect(&mut self, wallet: &dyn WalletProvider) -> Result<()> {
        if self.session.is_some() {
            self.disconnect();
        }

        self.debug_log.push("Starting connection...");
        let session = Session::connect(self.network.clone(), wallet).await?;
        self.debug_log.push("Connection successful");

        let remote = match session.list_conversations().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "failed to list conversations");
                self.debug_log.push(format!("Error listing conversations: {e}"));
                Vec::new()
            }
        };
        self.debug_log
            .push(format!("Found {} conversations", remote.len()));

        let (persisted, _) = self.mirror.load();
        let before = self.games.len();
        self.games = merge_roster(&self.games, &remote, &persisted);
        self.mirror.save_games(&self.games);
        info!(added = self.games.len() - before, total = self.games.len(), "roster merged");

        self.session = Some(session);
        Ok(())
    }

    /// Tear down the session, its listeners and the resolver cache.
    pub fn disconnect(&mut self) {
        self.open = None;
        self.seen_global.clear();
        if self.session.take().is_some() {
            self.debug_log.push("Disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotConnected)
    }

    pub fn identity(&self) -> Option<&NetworkIdentity> {
        self.session.as_ref().map(Session::identity)
    }

    /// Stream for the process-wide listener; feed it to [`Self::handle_global_message`].
    pub async fn global_messages(&self) -> Result<MessageStream> {
        self.session()?.stream_all_messages().await
    }

    /// Stream for the open game; feed it to [`Self::handle_conversation_message`].
    pub async fn conversation_messages(&self) -> Result<MessageStream> {
        let open = self.open.as_ref().ok_or(Error::NoOpenGame)?;
        self.session()?.stream_messages(&open.conversation).await
    }

    // ========================================================================
    // Games
    // ========================================================================

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn invitations(&self) -> &[Game] {
        &self.invitations
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn open_game(&self) -> Option<&OpenGame> {
        self.open.as_ref()
    }

    pub fn game_for_peer(&self, peer: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.is_peer(peer))
    }

    /// Messages exchanged with the game's peer.
    pub fn messages_for(&self, game: &Game) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| match m.conversation_id() {
                Some(id) => id == game.id,
                None => game.is_peer(m.sender()),
            })
            .collect()
    }

    /// Start a game with a peer address or inbox id.
    pub async fn create_game(&mut self, identifier: &str) -> Result<Game> {
        let identifier = identifier.trim();
        let conversation = self.session()?.resolve(identifier).await?;

        if let Some(existing) = self.game_for_peer(identifier) {
            debug!(peer = identifier, "game already exists");
            return Ok(existing.clone());
        }

        let id = conversation
            .id()
            .unwrap_or_else(|| identifier.to_string());
        let game = Game::new(id, identifier);

        self.games.push(game.clone());
        self.mirror.save_games(&self.games);
        self.debug_log
            .push(format!("Created game with {}", game.peer_name));
        Ok(game)
    }

    /// Resolve the game's conversation, clear its unread count and make it the open game.
    pub async fn start_game(&mut self, game_id: &str) -> Result<OpenGame> {
        let game = self
            .games
            .iter()
            .find(|g| g.id == game_id)
            .cloned()
            .ok_or_else(|| Error::GameNotFound(game_id.to_string()))?;

        let target = if game.has_known_peer() {
            &game.peer_address
        } else {
            &game.id
        };
        let conversation = self.session()?.resolve(target).await?;

        for g in self.games.iter_mut().filter(|g| g.id == game.id || g.is_peer(&game.peer_address)) {
            g.unread_count = 0;
        }
        self.mirror.save_games(&self.games);

        let resolved_id = conversation.id().unwrap_or_else(|| game.id.clone());
        let roster_id = game.id.clone();
        let open = OpenGame {
            game: Game {
                id: resolved_id,
                unread_count: 0,
                ..game
            },
            roster_id,
            conversation,
        };
        self.open = Some(open.clone());
        Ok(open)
    }

    /// Detach the open game's listener.
    pub fn close_game(&mut self) {
        self.open = None;
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    pub fn accept_invitation(&mut self, invitation_id: &str) -> Result<Game> {
        let index = self
            .invitations
            .iter()
            .position(|i| i.id == invitation_id)
            .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))?;
        let invitation = self.invitations.remove(index);

        if let Some(existing) = self.game_for_peer(&invitation.peer_address) {
            return Ok(existing.clone());
        }

        self.games.push(invitation.clone());
        self.mirror.save_games(&self.games);
        self.debug_log
            .push(format!("Accepted invitation from {}", invitation.peer_name));
        Ok(invitation)
    }

    /// Drop an invitation. Nothing is persisted for it.
    pub fn decline_invitation(&mut self, invitation_id: &str) -> Result<()> {
        let before = self.invitations.len();
        self.invitations.retain(|i| i.id != invitation_id);
        if self.invitations.len() == before {
            return Err(Error::InvitationNotFound(invitation_id.to_string()));
        }
        Ok(())
    }

    fn next_invitation_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("invite_{}", now.timestamp_millis());
        let taken = |id: &str| self.invitations.iter().chain(&self.games).any(|g| g.id == id);

        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // ========================================================================
    // Inbound routing
    // ========================================================================

    /// Route one record from the all-messages stream: bump unread counts for
    /// known peers, raise an invitation for unknown ones.
    pub fn handle_global_message(&mut self, raw: &RawMessage) -> GlobalEvent {
        let now = Utc::now();
        let message = match classify(raw, now) {
            Decoded::Message(message) => message,
            Decoded::Ignored(_) => return GlobalEvent::Ignored,
        };

        if let Some(id) = raw.id() {
            if !self.seen_global.insert(id) {
                return GlobalEvent::Duplicate;
            }
        }

        let sender = message.sender().to_string();
        self.debug_log.push(format!("Message received from {sender}"));

        if self.identity().is_some_and(|me| me.is_self(&sender)) {
            self.confirm_echo(raw, &message);
            return GlobalEvent::OwnMessage;
        }
        if sender.is_empty() || sender == UNKNOWN_PEER {
            return GlobalEvent::UnknownSender;
        }
        let conversations = self.sender_conversations(raw, &sender);
        if self.open.as_ref().is_some_and(|o| {
            is_from(&o.game, &sender, &conversations) || conversations.contains(&o.roster_id)
        }) {
            return GlobalEvent::OpenGame;
        }

        let preview = message.preview();
        let at = message.timestamp();

        let mut unread = None;
        for game in self
            .games
            .iter_mut()
            .filter(|g| is_from(g, &sender, &conversations))
        {
            game.unread_count += 1;
            game.touch(preview.clone(), at);
            if unread.is_none() {
                unread = Some((game.peer_address.clone(), game.unread_count));
            }
        }
        if let Some((peer_address, unread_count)) = unread {
            self.mirror.save_games(&self.games);
            self.debug_log.push("Message from existing game");
            return GlobalEvent::Unread {
                peer_address,
                unread_count,
            };
        }

        if let Some(pending) = self.invitations.iter_mut().find(|i| i.is_peer(&sender)) {
            pending.unread_count += 1;
            pending.touch(preview, at);
            return GlobalEvent::Invitation(pending.clone());
        }

        let invitation = Game {
            id: self.next_invitation_id(now),
            peer_name: display_name(&sender),
            peer_address: sender,
            last_message: Some(preview),
            last_message_time: Some(at),
            unread_count: 1,
        };
        self.debug_log
            .push(format!("New invitation from {}", invitation.peer_name));
        self.invitations.push(invitation.clone());
        GlobalEvent::Invitation(invitation)
    }

    /// Route one record for the open game: append challenges and texts, apply guesses.
    pub fn handle_conversation_message(&mut self, raw: &RawMessage) -> Result<ConversationEvent> {
        let open = self.open.as_ref().ok_or(Error::NoOpenGame)?;
        let conversation_id = open.conversation.id();

        if !belongs_to(raw, conversation_id.as_deref(), &open.game.peer_address) {
            return Ok(ConversationEvent::NotForOpenGame);
        }

        let message = match classify(raw, Utc::now()) {
            Decoded::Message(message) => message,
            Decoded::Ignored(_) => return Ok(ConversationEvent::Ignored),
        };

        if self.identity().is_some_and(|me| me.is_self(message.sender())) {
            return Ok(match self.confirm_echo(raw, &message) {
                Some((local_id, message_id)) => ConversationEvent::EchoConfirmed {
                    local_id,
                    message_id,
                },
                None => ConversationEvent::OwnEcho,
            });
        }

        let preview = message.preview();
        let at = message.timestamp();

        let event = match message {
            IncomingMessage::Guess(guess) => {
                return Ok(self.apply_guess(&guess.original_message_id, &guess.guess));
            }
            IncomingMessage::Audio(mut audio) => {
                audio.conversation_id = audio.conversation_id.or(conversation_id);
                ChatMessage::Audio(audio)
            }
            IncomingMessage::Text(mut text) => {
                text.conversation_id = text.conversation_id.or(conversation_id);
                ChatMessage::Text(text)
            }
        };

        if !self.message_ids.insert(event.id().to_string()) {
            return Ok(ConversationEvent::Duplicate);
        }

        self.messages.push(event.clone());
        self.mirror.save_messages(&self.messages);
        self.touch_open_game(preview, at);
        Ok(ConversationEvent::Appended(event))
    }

    /// Conversation ids a record may belong to: its own, and the one its
    /// sender was resolved to during this session.
    fn sender_conversations(&self, raw: &RawMessage, sender: &str) -> Vec<String> {
        let resolved = self
            .session
            .as_ref()
            .and_then(|s| s.resolver().cached(sender))
            .and_then(|conversation| conversation.id());
        raw.conversation_id().into_iter().chain(resolved).collect()
    }

    /// Give a sent message the id the network assigned to it, so the peer's
    /// guesses (which quote that id) find it.
    fn confirm_echo(
        &mut self,
        raw: &RawMessage,
        echo: &IncomingMessage,
    ) -> Option<(String, String)> {
        let network_id = raw.id()?;
        if self.message_ids.contains(&network_id) {
            return None;
        }

        let pending = &self.pending_echo;
        let local = self
            .messages
            .iter_mut()
            .find(|m| pending.iter().any(|id| id == m.id()) && is_echo_of(m, echo))?;

        let local_id = local.id().to_string();
        local.set_id(network_id.clone());
        self.pending_echo.retain(|id| *id != local_id);
        self.message_ids.remove(&local_id);
        self.message_ids.insert(network_id.clone());
        self.mirror.save_messages(&self.messages);
        debug!(local_id = %local_id, message_id = %network_id, "sent message confirmed");
        Some((local_id, network_id))
    }

    fn apply_guess(&mut self, message_id: &str, guess: &str) -> ConversationEvent {
        let target = self.messages.iter_mut().find_map(|m| match m {
            ChatMessage::Audio(audio) if audio.id == message_id => Some(audio),
            _ => None,
        });

        match target {
            Some(audio) => {
                audio.guess = Some(guess.to_string());
                self.mirror.save_messages(&self.messages);
                ConversationEvent::GuessApplied {
                    message_id: message_id.to_string(),
                }
            }
            None => {
                debug!(message_id, "guess for unknown challenge");
                ConversationEvent::GuessOrphaned {
                    message_id: message_id.to_string(),
                }
            }
        }
    }

    fn touch_open_game(&mut self, preview: String, at: DateTime<Utc>) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        let (roster_id, peer) = (open.roster_id.clone(), open.game.peer_address.clone());

        let mut touched = false;
        for game in self
            .games
            .iter_mut()
            .filter(|g| g.id == roster_id || g.is_peer(&peer))
        {
            game.touch(preview.clone(), at);
            touched = true;
        }
        if touched {
            self.mirror.save_games(&self.games);
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Pick the sound the player should record next.
    pub fn new_sound_challenge(&self) -> &'static Sound {
        random_sound()
    }

    /// Send a recorded clip as a challenge whose answer is `sound`.
    pub async fn send_audio_challenge(
        &mut self,
        clip: &AudioClip,
        sound: &Sound,
    ) -> Result<AudioMessage> {
        let (conversation, sender) = self.outbound()?;
        let now = Utc::now();

        let extension = clip
            .mime_type
            .split(';')
            .next()
            .and_then(|mime| mime.split('/').nth(1))
            .filter(|ext| !ext.is_empty())
            .unwrap_or("wav");
        let filename = format!("audio_{}.{}", now.timestamp_millis(), extension);
        let audio_data = clip.to_data_url();

        let payload = ChallengePayload::AudioChallenge {
            audio_data: Some(audio_data.clone()),
            audio_url: None,
            filename: filename.clone(),
            correct_answer: Some(sound.name.to_string()),
            timestamp: Some(now),
        };
        self.session()?
            .send(&conversation, &payload.to_json()?)
            .await?;

        let message = AudioMessage {
            id: now.timestamp_millis().to_string(),
            audio_url: audio_data,
            filename,
            timestamp: now,
            sender,
            guess: None,
            correct_answer: Some(sound.name.to_string()),
            conversation_id: conversation.id(),
        };
        self.record_outgoing(ChatMessage::Audio(message.clone()));
        Ok(message)
    }

    /// Answer a challenge. Blank guesses are not sent.
    pub async fn send_guess(&mut self, original_message_id: &str, guess: &str) -> Result<bool> {
        let guess = guess.trim();
        if guess.is_empty() {
            return Ok(false);
        }
        let (conversation, _) = self.outbound()?;

        let payload = ChallengePayload::Guess {
            guess: guess.to_string(),
            original_message_id: original_message_id.to_string(),
            timestamp: Some(Utc::now()),
        };
        self.session()?
            .send(&conversation, &payload.to_json()?)
            .await?;

        self.apply_guess(original_message_id, guess);
        Ok(true)
    }

    /// Send a chat line. Blank text is not sent.
    pub async fn send_text(&mut self, text: &str) -> Result<Option<TextMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let (conversation, sender) = self.outbound()?;
        let now = Utc::now();

        let payload = ChallengePayload::Text {
            text: text.to_string(),
            timestamp: Some(now),
        };
        self.session()?
            .send(&conversation, &payload.to_json()?)
            .await?;

        let message = TextMessage {
            id: now.timestamp_millis().to_string(),
            text: text.to_string(),
            timestamp: now,
            sender,
            conversation_id: conversation.id(),
        };
        self.record_outgoing(ChatMessage::Text(message.clone()));
        Ok(Some(message))
    }

    fn outbound(&self) -> Result<(ConversationHandle, String)> {
        let sender = self.session()?.identity().address.clone();
        let open = self.open.as_ref().ok_or(Error::NoOpenGame)?;
        Ok((open.conversation.clone(), sender))
    }

    fn record_outgoing(&mut self, message: ChatMessage) {
        let preview = message.preview();
        let at = message.timestamp();
        let id = message.id().to_string();
        self.message_ids.insert(id.clone());
        self.messages.push(message);
        self.mirror.save_messages(&self.messages);

        if self.pending_echo.len() == PENDING_ECHO_LIMIT {
            self.pending_echo.pop_front();
        }
        self.pending_echo.push_back(id);
        self.touch_open_game(preview, at);
    }

    // ========================================================================
    // Debug log
    // ========================================================================

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    pub fn clear_debug_log(&mut self) {
        self.debug_log.clear();
    }
}

fn is_from(game: &Game, sender: &str, conversations: &[String]) -> bool {
    game.is_peer(sender) || conversations.iter().any(|id| *id == game.id)
}

/// Whether `echo` is the network's copy of the locally recorded `sent`.
fn is_echo_of(sent: &ChatMessage, echo: &IncomingMessage) -> bool {
    match (sent, echo) {
        (ChatMessage::Audio(sent), IncomingMessage::Audio(echo)) => {
            sent.filename == echo.filename && sent.timestamp == echo.timestamp
        }
        (ChatMessage::Text(sent), IncomingMessage::Text(echo)) => {
            sent.text == echo.text && sent.timestamp == echo.timestamp
        }
        _ => false,
    }
}
