//! Roster reconciliation between local games and remote conversations

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::identity::display_name;
use crate::models::{Game, UNKNOWN_PEER};
use crate::network::{probe_conversation_id, probe_conversation_peer};

/// Turn one remote conversation record into a `Game`.
///
/// Records without any id get a `conv_<millis>` placeholder.
pub fn normalize_conversation(record: &Value, now: DateTime<Utc>) -> Game {
    let id_candidate = probe_conversation_id(record);
    let peer_candidate = probe_conversation_peer(record);

    let label = peer_candidate
        .as_deref()
        .or(id_candidate.as_deref())
        .unwrap_or("Unknown");
    let peer_name = display_name(label);

    let id = id_candidate
        .or_else(|| peer_candidate.clone())
        .unwrap_or_else(|| format!("conv_{}", now.timestamp_millis()));

    Game {
        id,
        peer_address: peer_candidate.unwrap_or_else(|| UNKNOWN_PEER.to_string()),
        peer_name,
        last_message: None,
        last_message_time: None,
        unread_count: 0,
    }
}

/// Normalize remote records together with already known ones, one entry per
/// `id::peer` key. Earlier records win over later duplicates.
pub fn normalize_remote(remote: &[Value], known: &[Game], now: DateTime<Utc>) -> Vec<Game> {
    let candidates: Vec<Game> = remote
        .iter()
        .map(|record| normalize_conversation(record, now))
        .chain(known.iter().cloned())
        .collect();

    let mut by_id: Vec<&Game> = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut by_peer: Vec<&Game> = Vec::new();
    let mut seen_peers: HashSet<&str> = HashSet::new();

    for game in &candidates {
        if !game.id.is_empty() && seen_ids.insert(game.id.as_str()) {
            by_id.push(game);
        }
        if game.has_known_peer() && seen_peers.insert(game.peer_address.as_str()) {
            by_peer.push(game);
        }
    }

    let mut seen_keys = HashSet::new();
    by_id
        .into_iter()
        .chain(by_peer)
        .filter(|game| seen_keys.insert(game.dedupe_key()))
        .cloned()
        .collect()
}

/// Fold remote conversations into the existing roster.
///
/// A normalized record is appended only when no roster entry shares its id or
/// its (known) peer. Existing entries are never modified.
pub fn merge_roster(existing: &[Game], remote: &[Value], local_cache: &[Game]) -> Vec<Game> {
    merge_roster_at(existing, remote, local_cache, Utc::now())
}

pub fn merge_roster_at(
    existing: &[Game],
    remote: &[Value],
    local_cache: &[Game],
    now: DateTime<Utc>,
) -> Vec<Game> {
    let mut merged = existing.to_vec();

    for game in normalize_remote(remote, local_cache, now) {
        let exists = merged
            .iter()
            .any(|g| g.id == game.id || (game.has_known_peer() && g.is_peer(&game.peer_address)));
        if !exists {
            merged.push(game);
        }
    }

    merged
}
