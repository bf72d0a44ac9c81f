//! # Fan-out Bus
//!
//! Live tally events keyed by poll id. Each poll gets its own tokio
//! `broadcast` channel, created on first subscribe and removed as soon as
//! its last [`Subscription`] is dropped.
//!
//! Delivery is best-effort and fire-and-forget:
//! - publish never waits on subscribers
//! - late subscribers get nothing from before they attached
//! - a subscriber that falls more than `capacity` events behind skips the
//!   overflow and carries on from the oldest retained event
//!
//! Events for one poll reach every subscriber in publish order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::TallyEvent;

pub const DEFAULT_CAPACITY: usize = 256;

type Channels = RwLock<HashMap<Uuid, broadcast::Sender<TallyEvent>>>;

fn read(channels: &Channels) -> RwLockReadGuard<'_, HashMap<Uuid, broadcast::Sender<TallyEvent>>> {
    channels.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(channels: &Channels) -> RwLockWriteGuard<'_, HashMap<Uuid, broadcast::Sender<TallyEvent>>> {
    channels.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Remove the channel for `poll_id` if nobody is listening on it.
fn prune(channels: &Channels, poll_id: Uuid) {
    let mut channels = write(channels);
    // Re-checked under the write lock: a subscriber may have just attached.
    if channels
        .get(&poll_id)
        .is_some_and(|sender| sender.receiver_count() == 0)
    {
        channels.remove(&poll_id);
        debug!("Dropped idle channel for poll {}", poll_id);
    }
}

#[derive(Debug)]
pub struct FanoutBus {
    capacity: usize,
    channels: Arc<Channels>,
}

impl Default for FanoutBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FanoutBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Attach a subscriber to `poll_id`. Only events published after this
    /// call are delivered.
    pub fn subscribe(&self, poll_id: Uuid) -> Subscription {
        let mut channels = write(&self.channels);
        let sender = channels
            .entry(poll_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        Subscription {
            poll_id,
            receiver: Some(sender.subscribe()),
            channels: Arc::downgrade(&self.channels),
        }
    }

    /// Hand `event` to every subscriber currently attached to its poll.
    /// Returns how many subscribers it was handed to.
    pub fn publish(&self, event: TallyEvent) -> usize {
        let delivered = {
            let channels = read(&self.channels);
            match channels.get(&event.poll_id) {
                Some(sender) => sender.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(count) => {
                debug!(
                    "Published tally for poll {} option {} = {} to {} subscriber(s)",
                    event.poll_id, event.option_id, event.votes, count
                );
                count
            }
            None => {
                prune(&self.channels, event.poll_id);
                0
            }
        }
    }

    pub fn subscriber_count(&self, poll_id: Uuid) -> usize {
        read(&self.channels)
            .get(&poll_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of polls with at least one attached subscriber.
    pub fn channel_count(&self) -> usize {
        read(&self.channels).len()
    }
}

/// A live feed of tally events for one poll.
pub struct Subscription {
    poll_id: Uuid,
    receiver: Option<broadcast::Receiver<TallyEvent>>,
    channels: Weak<Channels>,
}

impl Subscription {
    pub fn poll_id(&self) -> Uuid {
        self.poll_id
    }

    /// Next event, or `None` once the bus itself is gone.
    pub async fn recv(&mut self) -> Option<TallyEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscriber on poll {} lagged, skipped {} event(s)",
                        self.poll_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release our receiver first so the count below excludes it.
        self.receiver.take();
        if let Some(channels) = self.channels.upgrade() {
            prune(&channels, self.poll_id);
        }
    }
}
