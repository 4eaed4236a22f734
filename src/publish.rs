//! Sign, broadcast and, for articles, address a publication.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    broadcast::{BroadcastReport, Broadcaster},
    content::{build_tags, ContentKind, ContentRecord},
    error::PublishError,
    event::{Event, UnsignedEvent},
    keys::Keys,
    nip19::{self, Nip19Error},
};

/// Outcome of a completed publish.
#[derive(Debug)]
pub struct Published {
    pub event: Event,
    pub report: BroadcastReport,
    /// `naddr` of an article. `None` for notes; an error here does not undo
    /// the broadcast.
    pub address: Option<Result<String, Nip19Error>>,
}

/// Publishes content as one author to a fixed set of relays.
pub struct Publisher {
    keys: Keys,
    relays: Vec<String>,
    broadcaster: Broadcaster,
}

impl Publisher {
    pub fn new(keys: Keys, relays: Vec<String>, broadcaster: Broadcaster) -> Self {
        Self {
            keys,
            relays,
            broadcaster,
        }
    }

    /// Build and sign the event for `record` without sending it.
    pub fn sign(&self, record: &ContentRecord, kind: &ContentKind) -> Result<Event, PublishError> {
        let tags = build_tags(record, kind);
        let event =
            UnsignedEvent::new(&self.keys, kind.kind(), tags, record.content.as_str()).sign(&self.keys)?;
        debug!("signed {} (kind {})", event.id, event.kind);
        Ok(event)
    }

    /// Sign `record`, send it to every relay, then derive the article address.
    ///
    /// Fails only before anything is sent: on an empty relay list or a
    /// signing error. Per-relay failures are reported in
    /// [`Published::report`].
    pub async fn publish(
        &self,
        record: &ContentRecord,
        kind: &ContentKind,
    ) -> Result<Published, PublishError> {
        if self.relays.is_empty() {
            return Err(PublishError::NoRelays);
        }
        let event = Arc::new(self.sign(record, kind)?);
        let report = self
            .broadcaster
            .broadcast(Arc::clone(&event), &self.relays)
            .await?;
        debug!(
            "broadcast of {} complete: {} delivered, {} failed",
            event.id,
            report.delivered_count(),
            report.failed().count()
        );

        let address = kind.identifier().map(|identifier| {
            nip19::encode_address(&event.pubkey, event.kind, identifier, &self.relays)
                .inspect_err(|e| warn!("address encoding failed: {e}"))
        });

        let event = Arc::try_unwrap(event).unwrap_or_else(|shared| (*shared).clone());
        Ok(Published {
            event,
            report,
            address,
        })
    }
}
