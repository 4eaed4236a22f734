//! Nostr event model, id hashing and signing.

use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{error::PublishError, keys::Keys};

/// NIP-01 short text note.
pub const KIND_TEXT_NOTE: u32 = 1;
/// NIP-23 long-form article.
pub const KIND_LONG_FORM: u32 = 30023;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("id mismatch")]
    IdMismatch,

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid signature: {0}")]
    Signature(#[from] secp256k1::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element names the tag and the following elements hold data:
///
/// - `title` – display title of an article or note
/// - `d` – stable identifier of an addressable event
/// - `t` – free-form topic or hashtag
/// - `r` – reference URL
/// - `e` – links to another event ID
///
/// A `["t", "news"]` tag is represented as
/// `Tag(vec!["t".into(), "news".into()])`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Tag(vec![name.to_string(), value.into()])
    }
}

/// Signed Nostr event as sent to relays.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "7e7e9c42…",
///   "kind": 30023,
///   "created_at": 1700000000,
///   "tags": [["title", "Notes on X"], ["d", "202401010000"]],
///   "content": "body text",
///   "sig": "deadbeef"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1` or `30023`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    pub tags: Vec<Tag>,
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    /// Check that `id` matches the content and `sig` is valid for `pubkey`.
    pub fn verify(&self) -> Result<(), EventError> {
        let hash = event_hash(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if hex::encode(hash) != self.id {
            return Err(EventError::IdMismatch);
        }
        let sig = Signature::from_slice(&hex::decode(&self.sig)?)?;
        let pk = XOnlyPublicKey::from_slice(&hex::decode(&self.pubkey)?)?;
        let secp = Secp256k1::verification_only();
        secp.verify_schnorr(&sig, &Message::from_digest(hash), &pk)?;
        Ok(())
    }
}

/// Event fields before the id and signature are computed.
#[derive(Debug, Clone)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub kind: u32,
    pub created_at: u64,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl UnsignedEvent {
    /// Assemble an event authored by `keys`, stamped with the current time.
    pub fn new(keys: &Keys, kind: u32, tags: Vec<Tag>, content: impl Into<String>) -> Self {
        Self::at(keys, kind, unix_now(), tags, content)
    }

    pub(crate) fn at(
        keys: &Keys,
        kind: u32,
        created_at: u64,
        tags: Vec<Tag>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            pubkey: keys.public_hex(),
            kind,
            created_at,
            tags,
            content: content.into(),
        }
    }

    /// Compute the id and sign it. Consumes the draft so the fields the id
    /// covers can no longer change.
    pub fn sign(self, keys: &Keys) -> Result<Event, PublishError> {
        if self.pubkey != keys.public_hex() {
            return Err(PublishError::Signing("pubkey does not match signing key".into()));
        }
        let hash = event_hash(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        let sig = keys.sign(&hash)?;
        Ok(Event {
            id: hex::encode(hash),
            pubkey: self.pubkey,
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags,
            content: self.content,
            sig: hex::encode(sig.as_ref()),
        })
    }
}

/// NIP-01 event hash: SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
pub(crate) fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; 32], EventError> {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let data = serde_json::to_vec(&arr)?;
    Ok(Sha256::digest(&data).into())
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
