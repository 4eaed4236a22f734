//! Concurrent best-effort delivery of one event to many relays.

use std::{fmt, sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{error::PublishError, event::Event, relay};

/// Result of delivering to one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    ConnectFailed(String),
    SendFailed(String),
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered)
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayOutcome::Delivered => write!(f, "delivered"),
            RelayOutcome::ConnectFailed(e) => write!(f, "connection failed: {e}"),
            RelayOutcome::SendFailed(e) => write!(f, "send failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub url: String,
    pub outcome: RelayOutcome,
}

/// Per-relay outcomes, in the order the relays were configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub relays: Vec<RelayReport>,
}

impl BroadcastReport {
    pub fn delivered(&self) -> impl Iterator<Item = &RelayReport> {
        self.relays.iter().filter(|r| r.outcome.is_delivered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RelayReport> {
        self.relays.iter().filter(|r| !r.outcome.is_delivered())
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered().count()
    }

    pub fn attempted(&self) -> usize {
        self.relays.len()
    }
}

/// Sends events to relays, one task per relay.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    pub connect_timeout: Duration,
    pub publish_timeout: Duration,
    pub socks_proxy: Option<String>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            publish_timeout: Duration::from_secs(10),
            socks_proxy: None,
        }
    }
}

impl Broadcaster {
    /// Attempt delivery of `event` to every relay concurrently and wait for
    /// all attempts to finish.
    ///
    /// A failing relay never affects the others. The call succeeds once every
    /// relay has been attempted, however many accepted; inspect the report to
    /// apply a delivery threshold. Each attempt is bounded by the connect
    /// timeout plus twice the publish timeout (send, then close). Dropping the
    /// returned future aborts any attempts still in flight.
    pub async fn broadcast(
        &self,
        event: Arc<Event>,
        relays: &[String],
    ) -> Result<BroadcastReport, PublishError> {
        if relays.is_empty() {
            return Err(PublishError::NoRelays);
        }
        debug!("broadcasting {} to {} relays", event.id, relays.len());

        let mut tasks = JoinSet::new();
        for (idx, url) in relays.iter().enumerate() {
            let this = self.clone();
            let event = Arc::clone(&event);
            let url = url.clone();
            tasks.spawn(async move {
                let outcome = this.deliver(&url, &event).await;
                (idx, RelayReport { url, outcome })
            });
        }

        let mut slots: Vec<Option<RelayReport>> = vec![None; relays.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, report)) => slots[idx] = Some(report),
                Err(e) => warn!("broadcast task failed: {e}"),
            }
        }

        let relays = slots
            .into_iter()
            .zip(relays)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| RelayReport {
                    url: url.clone(),
                    outcome: RelayOutcome::SendFailed("broadcast task aborted".into()),
                })
            })
            .collect();
        Ok(BroadcastReport { relays })
    }

    /// Connect, publish and close. The connection is released on every path.
    async fn deliver(&self, url: &str, event: &Event) -> RelayOutcome {
        let mut conn =
            match relay::connect(url, self.socks_proxy.as_deref(), self.connect_timeout).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("{url}: {e}");
                    return RelayOutcome::ConnectFailed(e.to_string());
                }
            };
        let res = conn.publish(event, self.publish_timeout).await;
        conn.close(self.publish_timeout).await;
        match res {
            Ok(()) => {
                info!("{url}: accepted {}", event.id);
                RelayOutcome::Delivered
            }
            Err(e) => {
                warn!("{url}: {e}");
                RelayOutcome::SendFailed(e.to_string())
            }
        }
    }
}
