//! End-to-end flows for Glorp Core against an in-memory network

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use glorp_core::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

const ME: &str = "0x1111111111111111111111111111111111111111";
const PEER: &str = "0xABCDEF0123456789abcdef0123456789ABCDEF01";
const PEER_INBOX: &str = "inbox-peer";

#[derive(Default)]
struct FakeState {
    inboxes: HashMap<String, String>,
    dms: HashMap<String, ConversationHandle>,
    conversations: Vec<Value>,
    lookups: usize,
    creates: usize,
    sent: Vec<(Option<String>, String)>,
    inbound: Vec<Value>,
    fail_send: bool,
}

#[derive(Default)]
struct FakeNetwork {
    state: Mutex<FakeState>,
}

impl FakeNetwork {
    fn new() -> Arc<Self> {
        let network = Self::default();
        network
            .state
            .lock()
            .inboxes
            .insert(PEER.to_string(), PEER_INBOX.to_string());
        Arc::new(network)
    }
}

#[async_trait]
impl MessagingNetwork for FakeNetwork {
    async fn connect(&self, identity: &NetworkIdentity) -> Result<String> {
        Ok(format!("inbox-{}", &identity.identity_key[..8]))
    }

    async fn list_conversations(&self) -> Result<Vec<Value>> {
        Ok(self.state.lock().conversations.clone())
    }

    async fn find_inbox_id(&self, address: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();
        state.lookups += 1;
        Ok(state.inboxes.get(address).cloned())
    }

    async fn find_dm(&self, inbox_id: &str) -> Result<Option<ConversationHandle>> {
        Ok(self.state.lock().dms.get(inbox_id).cloned())
    }

    async fn create_dm(&self, inbox_id: &str) -> Result<ConversationHandle> {
        let mut state = self.state.lock();
        state.creates += 1;
        let handle = ConversationHandle::new(json!({
            "id": format!("dm-{}", state.creates),
            "peerInboxId": inbox_id,
        }));
        state.dms.insert(inbox_id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn send(&self, conversation: &ConversationHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_send {
            return Err(Error::Network("connection reset".into()));
        }
        state.sent.push((conversation.id(), text.to_string()));
        Ok(())
    }

    async fn stream_all_messages(&self) -> Result<MessageStream> {
        let inbound: Vec<RawMessage> = self
            .state
            .lock()
            .inbound
            .iter()
            .cloned()
            .map(RawMessage::new)
            .collect();
        Ok(futures::stream::iter(inbound).boxed())
    }

    async fn stream_messages(&self, conversation: &ConversationHandle) -> Result<MessageStream> {
        let id = conversation.id();
        let inbound: Vec<RawMessage> = self
            .state
            .lock()
            .inbound
            .iter()
            .filter(|m| m.get("conversationId").and_then(Value::as_str) == id.as_deref())
            .cloned()
            .map(RawMessage::new)
            .collect();
        Ok(futures::stream::iter(inbound).boxed())
    }
}

struct TestWallet;

#[async_trait]
impl WalletProvider for TestWallet {
    fn address(&self) -> Option<String> {
        Some(ME.to_string())
    }

    async fn sign_message(&self, message: &str) -> Result<Vec<u8>> {
        Ok(message.as_bytes().to_vec())
    }
}

fn audio_challenge(id: &str, sender: &str) -> Value {
    json!({
        "id": id,
        "senderAddress": sender,
        "content": r#"{"type":"audio-challenge","audioData":"data:audio/wav;base64,AAAA","filename":"a.wav","correctAnswer":"Lion","timestamp":"2024-01-01T00:00:00Z"}"#,
    })
}

async fn connected(network: Arc<FakeNetwork>) -> GameClient {
    let mut client = GameClient::new(network, Box::new(MemoryStore::new()), &ClientConfig::default());
    client.connect(&TestWallet).await.unwrap();
    client
}

#[tokio::test]
async fn test_resolve_address_once() {
    let network = FakeNetwork::new();
    let client = connected(network.clone()).await;

    let first = client.session().unwrap().resolve(PEER).await.unwrap();
    let second = client.session().unwrap().resolve(PEER).await.unwrap();

    assert!(first.ptr_eq(&second));
    let state = network.state.lock();
    assert_eq!(state.lookups, 1);
    assert_eq!(state.creates, 1);
}

#[tokio::test]
async fn test_unreachable_peer_surfaces() {
    let network = FakeNetwork::new();
    let mut client = connected(network.clone()).await;

    let err = client
        .create_game("0x9999999999999999999999999999999999999999")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PeerUnreachable(_)));
    assert!(err.is_user_facing());
    assert!(client.games().is_empty());
}

#[tokio::test]
async fn test_connect_merges_remote_conversations() {
    let network = FakeNetwork::new();
    network.state.lock().conversations = vec![
        json!({ "id": "dm-a", "peerAddress": "0xAAAA000000" }),
        json!({ "id": "dm-a", "peerAddress": "0xAAAA000000" }),
        json!({ "conversationId": "dm-b", "peerInboxId": "inbox-b" }),
    ];

    let store = MemoryStore::new();
    store
        .set(GAMES_KEY, &serde_json::to_string(&[Game::new("local", "inbox-b")]).unwrap())
        .unwrap();
    let mut client = GameClient::new(network.clone(), Box::new(store), &ClientConfig::default());
    client.connect(&TestWallet).await.unwrap();

    let peers: Vec<&str> = client.games().iter().map(|g| g.peer_address.as_str()).collect();
    assert_eq!(peers, vec!["inbox-b", "0xAAAA000000"]);
    assert_eq!(client.games()[0].id, "local");

    // Reconnecting with the same remote list adds nothing.
    client.connect(&TestWallet).await.unwrap();
    assert_eq!(client.games().len(), 2);
}

#[tokio::test]
async fn test_new_sender_becomes_invitation() {
    let network = FakeNetwork::new();
    network.state.lock().inbound = vec![audio_challenge("m1", "0xPeer")];
    let mut client = connected(network.clone()).await;

    let mut stream = client.global_messages().await.unwrap();
    let mut events = Vec::new();
    while let Some(raw) = stream.next().await {
        events.push(client.handle_global_message(&raw));
    }

    assert_eq!(events.len(), 1);
    assert_eq!(client.invitations().len(), 1);
    let invitation = &client.invitations()[0];
    assert_eq!(invitation.peer_address, "0xPeer");
    assert_eq!(invitation.unread_count, 1);
    assert!(invitation.id.starts_with("invite_"));
    assert!(client.games().is_empty());
}

#[tokio::test]
async fn test_known_sender_increments_unread() {
    let network = FakeNetwork::new();
    let store = MemoryStore::new();
    store
        .set(GAMES_KEY, &serde_json::to_string(&[Game::new("dm-9", "0xPeer")]).unwrap())
        .unwrap();
    let mut client = GameClient::new(network, Box::new(store), &ClientConfig::default());
    client.connect(&TestWallet).await.unwrap();

    let event = client.handle_global_message(&RawMessage::new(audio_challenge("m1", "0xPeer")));

    assert_eq!(
        event,
        GlobalEvent::Unread {
            peer_address: "0xPeer".into(),
            unread_count: 1
        }
    );
    assert!(client.invitations().is_empty());
    assert_eq!(client.games()[0].unread_count, 1);
    assert_eq!(client.games()[0].last_message.as_deref(), Some("Audio challenge"));
}

#[tokio::test]
async fn test_duplicate_delivery_counted_once() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    client.accept_invitation("missing").unwrap_err();

    let raw = RawMessage::new(audio_challenge("m1", "0xPeer"));
    client.handle_global_message(&raw);
    assert_eq!(client.handle_global_message(&raw), GlobalEvent::Duplicate);
    assert_eq!(client.invitations()[0].unread_count, 1);
}

#[tokio::test]
async fn test_own_and_foreign_messages_ignored() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;

    let own = RawMessage::new(audio_challenge("m1", &ME.to_lowercase()));
    assert_eq!(client.handle_global_message(&own), GlobalEvent::OwnMessage);

    let foreign = RawMessage::new(json!({
        "id": "m2",
        "senderAddress": "0xPeer",
        "content": "{\"type\":\"poll\",\"question\":\"?\"}",
    }));
    assert_eq!(client.handle_global_message(&foreign), GlobalEvent::Ignored);
    assert!(client.invitations().is_empty());
}

#[tokio::test]
async fn test_accept_invitation_persists() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;

    let invitation = match client.handle_global_message(&RawMessage::new(audio_challenge("m1", PEER))) {
        GlobalEvent::Invitation(invitation) => invitation,
        other => panic!("unexpected {other:?}"),
    };

    let accepted = client.accept_invitation(&invitation.id).unwrap();
    assert_eq!(accepted.peer_address, PEER);
    assert!(client.invitations().is_empty());
    assert_eq!(client.game_for_peer(PEER).map(|g| g.unread_count), Some(1));
}

#[tokio::test]
async fn test_declined_invitation_not_persisted() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;

    client.handle_global_message(&RawMessage::new(audio_challenge("m1", "0xPeer")));
    let id = client.invitations()[0].id.clone();
    client.decline_invitation(&id).unwrap();

    assert!(client.invitations().is_empty());
    assert!(client.games().is_empty());
}

#[tokio::test]
async fn test_game_flow_with_guess() {
    let network = FakeNetwork::new();
    let mut client = connected(network.clone()).await;

    let game = client.create_game(PEER).await.unwrap();
    assert_eq!(game.id, "dm-1");
    assert_eq!(game.peer_name, "0xABCD...EF01");

    // Creating again for the same peer reuses the conversation and the game.
    client.create_game(PEER).await.unwrap();
    assert_eq!(client.games().len(), 1);
    assert_eq!(network.state.lock().creates, 1);

    let open = client.start_game(&game.id).await.unwrap();
    assert_eq!(open.game.id, "dm-1");

    network.state.lock().inbound = vec![
        json!({
            "id": "c1",
            "conversationId": "dm-1",
            "senderInboxId": PEER_INBOX,
            "content": { "type": "audio-challenge", "audioData": "data:audio/wav;base64,AAAA", "filename": "c.wav", "correctAnswer": "Owl" },
        }),
        json!({
            "id": "g1",
            "conversationId": "dm-1",
            "senderInboxId": PEER_INBOX,
            "content": { "type": "guess", "guess": "Owl", "originalMessageId": "c1" },
        }),
        json!({
            "id": "g2",
            "conversationId": "dm-1",
            "senderInboxId": PEER_INBOX,
            "content": { "type": "guess", "guess": "Cat", "originalMessageId": "missing" },
        }),
        json!({
            "id": "c1",
            "conversationId": "dm-1",
            "senderInboxId": PEER_INBOX,
            "content": { "type": "audio-challenge", "audioData": "data:audio/wav;base64,AAAA", "filename": "c.wav" },
        }),
    ];

    let mut stream = client.conversation_messages().await.unwrap();
    let mut events = Vec::new();
    while let Some(raw) = stream.next().await {
        events.push(client.handle_conversation_message(&raw).unwrap());
    }

    assert!(matches!(events[0], ConversationEvent::Appended(ChatMessage::Audio(_))));
    assert_eq!(events[1], ConversationEvent::GuessApplied { message_id: "c1".into() });
    assert_eq!(events[2], ConversationEvent::GuessOrphaned { message_id: "missing".into() });
    assert_eq!(events[3], ConversationEvent::Duplicate);

    assert_eq!(client.messages().len(), 1);
    match &client.messages()[0] {
        ChatMessage::Audio(audio) => {
            assert_eq!(audio.guess.as_deref(), Some("Owl"));
            assert!(audio.is_solved());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_send_audio_challenge_embeds_clip() {
    let network = FakeNetwork::new();
    let mut client = connected(network.clone()).await;
    let game = client.create_game(PEER).await.unwrap();
    client.start_game(&game.id).await.unwrap();

    let sound = find_sound("lion").unwrap();
    let sent = client
        .send_audio_challenge(&AudioClip::wav(vec![0, 1, 2]), sound)
        .await
        .unwrap();

    assert_eq!(sent.correct_answer.as_deref(), Some("Lion"));
    assert_eq!(sent.sender, ME);
    assert!(sent.filename.ends_with(".wav"));

    let (conversation_id, body) = network.state.lock().sent[0].clone();
    assert_eq!(conversation_id.as_deref(), Some("dm-1"));

    // The receiving side decodes what was sent.
    let raw = RawMessage::new(json!({ "id": "x", "senderAddress": ME, "content": body }));
    match classify(&raw, chrono::Utc::now()) {
        Decoded::Message(IncomingMessage::Audio(audio)) => {
            assert_eq!(audio.filename, sent.filename);
            assert_eq!(audio.correct_answer.as_deref(), Some("Lion"));
            assert_eq!(audio.audio_url, "data:audio/wav;base64,AAEC");
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(client.messages().len(), 1);
    assert_eq!(
        client.game_for_peer(PEER).and_then(|g| g.last_message.as_deref()),
        Some("Audio challenge")
    );
}

#[tokio::test]
async fn test_send_failure_surfaces() {
    let network = FakeNetwork::new();
    let mut client = connected(network.clone()).await;
    let game = client.create_game(PEER).await.unwrap();
    client.start_game(&game.id).await.unwrap();
    network.state.lock().fail_send = true;

    let err = client.send_text("hello").await.unwrap_err();
    assert!(matches!(err, Error::SendFailed(_)));
    assert!(client.messages().is_empty());

    assert!(!client.send_guess("c1", "   ").await.unwrap());
}

#[tokio::test]
async fn test_start_game_clears_unread() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    let game = client.create_game(PEER).await.unwrap();

    client.handle_global_message(&RawMessage::new(audio_challenge("m1", PEER)));
    assert_eq!(client.game_for_peer(PEER).unwrap().unread_count, 1);

    client.start_game(&game.id).await.unwrap();
    assert_eq!(client.game_for_peer(PEER).unwrap().unread_count, 0);

    // While the game is open its own traffic does not count as unread.
    let event = client.handle_global_message(&RawMessage::new(audio_challenge("m2", PEER)));
    assert_eq!(event, GlobalEvent::OpenGame);
    assert_eq!(client.game_for_peer(PEER).unwrap().unread_count, 0);
}

#[tokio::test]
async fn test_disconnect_requires_reconnect() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    client.disconnect();

    assert!(!client.is_connected());
    assert!(matches!(client.create_game(PEER).await, Err(Error::NotConnected)));
    assert!(matches!(client.send_text("hi").await, Err(Error::NotConnected)));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let network = FakeNetwork::new();
    let dir = std::env::temp_dir().join(format!("glorp-flow-{}", std::process::id()));
    {
        let mut client = GameClient::open(network.clone(), &dir).unwrap();
        client.connect(&TestWallet).await.unwrap();
        let game = client.create_game(PEER).await.unwrap();
        client.start_game(&game.id).await.unwrap();
        client.send_text("ready?").await.unwrap();
    }

    let client = GameClient::open(network, &dir).unwrap();
    assert_eq!(client.games().len(), 1);
    assert_eq!(client.messages().len(), 1);
    assert_eq!(client.games()[0].last_message.as_deref(), Some("ready?"));

    std::fs::remove_dir_all(&dir).ok();
}

fn peer_text(id: Option<&str>, conversation_id: &str, text: &str) -> RawMessage {
    let mut record = json!({
        "conversationId": conversation_id,
        "senderInboxId": PEER_INBOX,
        "content": { "type": "text", "text": text },
    });
    if let Some(id) = id {
        record["id"] = json!(id);
    }
    RawMessage::new(record)
}

#[tokio::test]
async fn test_known_peer_recognised_by_inbox_id() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    let game = client.create_game(PEER).await.unwrap();

    // The network names the sender by inbox id; the conversation id ties it to the game.
    let event = client.handle_global_message(&peer_text(Some("m1"), "dm-1", "hi"));
    assert_eq!(
        event,
        GlobalEvent::Unread {
            peer_address: PEER.into(),
            unread_count: 1
        }
    );

    // Without a conversation id the resolved alias still identifies the peer.
    let without_conversation = RawMessage::new(json!({
        "id": "m2",
        "senderInboxId": PEER_INBOX,
        "content": { "type": "text", "text": "there?" },
    }));
    assert_eq!(
        client.handle_global_message(&without_conversation),
        GlobalEvent::Unread {
            peer_address: PEER.into(),
            unread_count: 2
        }
    );
    assert!(client.invitations().is_empty());
    assert_eq!(client.games().len(), 1);

    client.start_game(&game.id).await.unwrap();
    let event = client.handle_global_message(&peer_text(Some("m3"), "dm-1", "now?"));
    assert_eq!(event, GlobalEvent::OpenGame);
    assert!(client.invitations().is_empty());
}

#[tokio::test]
async fn test_guess_reaches_sent_challenge_after_echo() {
    let network = FakeNetwork::new();
    let mut client = connected(network.clone()).await;
    let game = client.create_game(PEER).await.unwrap();
    client.start_game(&game.id).await.unwrap();

    let sent = client
        .send_audio_challenge(&AudioClip::wav(vec![1, 2, 3]), find_sound("owl").unwrap())
        .await
        .unwrap();
    let (_, body) = network.state.lock().sent[0].clone();

    let echo = RawMessage::new(json!({
        "id": "net-1",
        "conversationId": "dm-1",
        "senderAddress": ME,
        "content": body,
    }));
    assert_eq!(
        client.handle_conversation_message(&echo).unwrap(),
        ConversationEvent::EchoConfirmed {
            local_id: sent.id.clone(),
            message_id: "net-1".into()
        }
    );
    assert_eq!(
        client.handle_conversation_message(&echo).unwrap(),
        ConversationEvent::OwnEcho
    );

    // The peer answers with the id it received.
    let guess = RawMessage::new(json!({
        "id": "g1",
        "conversationId": "dm-1",
        "senderInboxId": PEER_INBOX,
        "content": { "type": "guess", "guess": "owl", "originalMessageId": "net-1" },
    }));
    assert_eq!(
        client.handle_conversation_message(&guess).unwrap(),
        ConversationEvent::GuessApplied {
            message_id: "net-1".into()
        }
    );

    assert_eq!(client.messages().len(), 1);
    match &client.messages()[0] {
        ChatMessage::Audio(audio) => {
            assert_eq!(audio.id, "net-1");
            assert!(audio.is_solved());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_messages_without_id_not_collapsed() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    let game = client.create_game(PEER).await.unwrap();
    client.start_game(&game.id).await.unwrap();

    let one = peer_text(None, "dm-1", "one");
    let two = peer_text(None, "dm-1", "two");
    assert!(matches!(
        client.handle_conversation_message(&one).unwrap(),
        ConversationEvent::Appended(_)
    ));
    assert!(matches!(
        client.handle_conversation_message(&two).unwrap(),
        ConversationEvent::Appended(_)
    ));
    assert_eq!(client.messages().len(), 2);

    // Redelivery of the same record is still recognised.
    assert_eq!(
        client.handle_conversation_message(&one).unwrap(),
        ConversationEvent::Duplicate
    );
}

#[tokio::test]
async fn test_other_conversation_filtered() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;
    let game = client.create_game(PEER).await.unwrap();
    client.start_game(&game.id).await.unwrap();

    let elsewhere = RawMessage::new(json!({
        "id": "x1",
        "conversationId": "dm-other",
        "senderAddress": "0xSomeoneElse",
        "content": { "type": "text", "text": "hi" },
    }));
    assert_eq!(
        client.handle_conversation_message(&elsewhere).unwrap(),
        ConversationEvent::NotForOpenGame
    );
    assert!(client.messages().is_empty());
}

#[tokio::test]
async fn test_accept_invitation_for_existing_game() {
    let network = FakeNetwork::new();
    let mut client = connected(network).await;

    let invitation = match client.handle_global_message(&RawMessage::new(audio_challenge("m1", PEER))) {
        GlobalEvent::Invitation(invitation) => invitation,
        other => panic!("unexpected {other:?}"),
    };
    let game = client.create_game(PEER).await.unwrap();

    let accepted = client.accept_invitation(&invitation.id).unwrap();
    assert_eq!(accepted.id, game.id);
    assert_eq!(client.games().len(), 1);
    assert!(client.invitations().is_empty());
}

#[tokio::test]
async fn test_start_game_with_unknown_peer_resolves_by_id() {
    let network = FakeNetwork::new();
    let store = MemoryStore::new();
    store
        .set(GAMES_KEY, &serde_json::to_string(&[Game::new("inbox-x", UNKNOWN_PEER)]).unwrap())
        .unwrap();
    let mut client = GameClient::new(network.clone(), Box::new(store), &ClientConfig::default());
    client.connect(&TestWallet).await.unwrap();

    let open = client.start_game("inbox-x").await.unwrap();
    assert_eq!(open.game.id, "dm-1");
    assert_eq!(open.roster_id, "inbox-x");
    assert_eq!(open.conversation.peer().as_deref(), Some("inbox-x"));
    assert_eq!(network.state.lock().lookups, 0);
    assert_eq!(client.games()[0].id, "inbox-x");

    let reply = RawMessage::new(json!({
        "id": "m1",
        "conversationId": "dm-1",
        "senderInboxId": "inbox-x",
        "content": { "type": "text", "text": "hello" },
    }));
    assert!(matches!(
        client.handle_conversation_message(&reply).unwrap(),
        ConversationEvent::Appended(_)
    ));
    assert_eq!(client.games()[0].last_message.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_guess_survives_restart() {
    let network = FakeNetwork::new();
    let dir = std::env::temp_dir().join(format!("glorp-guess-{}", std::process::id()));
    {
        let mut client = GameClient::open(network.clone(), &dir).unwrap();
        client.connect(&TestWallet).await.unwrap();
        let game = client.create_game(PEER).await.unwrap();
        client.start_game(&game.id).await.unwrap();

        let challenge = RawMessage::new(json!({
            "id": "c1",
            "conversationId": "dm-1",
            "senderInboxId": PEER_INBOX,
            "content": { "type": "audio-challenge", "audioData": "data:audio/wav;base64,AAAA", "filename": "c.wav", "correctAnswer": "Owl" },
        }));
        client.handle_conversation_message(&challenge).unwrap();
        assert!(client.send_guess("c1", "Owl").await.unwrap());
    }

    let client = GameClient::open(network, &dir).unwrap();
    match &client.messages()[0] {
        ChatMessage::Audio(audio) => {
            assert_eq!(audio.guess.as_deref(), Some("Owl"));
            assert!(audio.is_solved());
        }
        other => panic!("unexpected {other:?}"),
    }

    std::fs::remove_dir_all(&dir).ok();
}
