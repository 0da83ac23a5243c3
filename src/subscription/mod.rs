//! Live subscriptions: metric-id discovery feeds and value pushes.
//!
//! Discovery subscribers receive every identity created under one resource.
//! Value subscribers receive every point appended for one identity until
//! their lifetime token is cancelled or the stream is dropped. A stream
//! removes its own membership when it ends, and keys left without
//! subscribers are removed with it.

use crate::metrics::{MetricId, MetricPoint, ResourceKey};
use dashmap::DashMap;
use futures::Stream;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Points buffered per value subscriber before new pushes are dropped.
pub const VALUE_CHANNEL_CAPACITY: usize = 256;

type DiscoveryMap = DashMap<ResourceKey, Vec<DiscoverySubscriber>>;
type ValueMap = DashMap<MetricId, Vec<ValueSubscriber>>;

struct DiscoverySubscriber {
    handle: u64,
    sender: mpsc::UnboundedSender<MetricId>,
}

struct ValueSubscriber {
    handle: u64,
    lifetime: CancellationToken,
    sender: mpsc::Sender<MetricPoint>,
}

impl ValueSubscriber {
    fn is_live(&self) -> bool {
        !self.lifetime.is_cancelled() && !self.sender.is_closed()
    }
}

/// Keep only the subscribers under `key` accepted by `keep`; remove the key once empty.
fn remove_subscriber<K, S>(map: &DashMap<K, Vec<S>>, key: &K, keep: impl FnMut(&S) -> bool)
where
    K: Eq + Hash,
{
    if let Some(mut subscribers) = map.get_mut(key) {
        subscribers.retain(keep);
    }
    map.remove_if(key, |_, subscribers| subscribers.is_empty());
}

/// Snapshot of subscription bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    /// Identities with at least one registered value subscriber
    pub value_ids: usize,
    /// Registered value subscribers across all identities
    pub value_subscribers: usize,
    /// Resources with at least one registered discovery subscriber
    pub discovery_resources: usize,
    /// Registered discovery subscribers across all resources
    pub discovery_subscribers: usize,
    /// Discovery announcements made since the hub was created
    pub announcements: u64,
}

/// Tracks who wants discovery events and live values, and fans them out.
#[derive(Default)]
pub struct SubscriptionHub {
    discovery: Arc<DiscoveryMap>,
    values: Arc<ValueMap>,
    next_handle: AtomicU64,
    announcements: AtomicU64,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to identities created under `resource_key` from now on.
    ///
    /// `replay` runs while new announcements for this resource are held back,
    /// so identities it returns and later announcements never leave a gap.
    /// Duplicates between the two are filtered by the stream.
    pub fn subscribe_metric_ids<F>(&self, resource_key: &str, replay: F) -> MetricIdStream
    where
        F: FnOnce() -> Vec<MetricId>,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = self.next_handle();
        {
            let mut subscribers = self.discovery.entry(resource_key.to_string()).or_default();
            for id in replay() {
                let _ = sender.send(id);
            }
            subscribers.retain(|s| !s.sender.is_closed());
            subscribers.push(DiscoverySubscriber { handle, sender });
        }

        tracing::debug!("Discovery subscriber added for resource {}", resource_key);
        MetricIdStream {
            receiver,
            seen: FxHashSet::default(),
            discovery: Arc::clone(&self.discovery),
            resource_key: resource_key.to_string(),
            handle,
        }
    }

    /// Announce a newly created metric identity.
    pub fn metric_discovered(&self, id: &MetricId) {
        self.announcements.fetch_add(1, Ordering::Relaxed);

        let emptied = match self.discovery.get_mut(&id.resource_key) {
            Some(mut subscribers) => {
                subscribers.retain(|s| s.sender.send(id.clone()).is_ok());
                subscribers.is_empty()
            },
            None => false,
        };
        if emptied {
            self.discovery
                .remove_if(&id.resource_key, |_, subscribers| subscribers.is_empty());
        }
    }

    /// Subscribe to values appended for `id` while `lifetime` is not cancelled.
    pub fn subscribe_to_values(&self, id: MetricId, lifetime: CancellationToken) -> MetricValueStream {
        let (sender, receiver) = mpsc::channel(VALUE_CHANNEL_CAPACITY);
        let cancelled = Box::pin(lifetime.clone().cancelled_owned());
        let handle = self.next_handle();

        if !lifetime.is_cancelled() {
            let mut subscribers = self.values.entry(id.clone()).or_default();
            subscribers.retain(ValueSubscriber::is_live);
            subscribers.push(ValueSubscriber {
                handle,
                lifetime,
                sender,
            });
            tracing::debug!("Value subscriber added for {}", id);
        }

        MetricValueStream {
            id,
            receiver,
            cancelled,
            finished: false,
            values: Arc::clone(&self.values),
            handle,
        }
    }

    /// Push a point to every live subscriber of `id`. Returns how many received it.
    pub fn publish(&self, id: &MetricId, point: MetricPoint) -> usize {
        let mut delivered = 0;
        let emptied = {
            let Some(mut subscribers) = self.values.get_mut(id) else {
                return 0;
            };

            subscribers.retain(|subscriber| {
                if subscriber.lifetime.is_cancelled() {
                    return false;
                }
                match subscriber.sender.try_send(point) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    },
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!("Value subscriber for {} is lagging, point dropped", id);
                        true
                    },
                    Err(TrySendError::Closed(_)) => false,
                }
            });
            subscribers.is_empty()
        };

        if emptied {
            self.values.remove_if(id, |_, subscribers| subscribers.is_empty());
        }
        delivered
    }

    /// Whether anyone currently wants live values for `id`.
    pub fn is_subscribed(&self, id: &MetricId) -> bool {
        self.values
            .get(id)
            .is_some_and(|subscribers| subscribers.iter().any(ValueSubscriber::is_live))
    }

    pub fn value_subscriber_count(&self, id: &MetricId) -> usize {
        self.values
            .get(id)
            .map_or(0, |subscribers| subscribers.iter().filter(|s| s.is_live()).count())
    }

    pub fn discovery_subscriber_count(&self, resource_key: &str) -> usize {
        self.discovery
            .get(resource_key)
            .map_or(0, |subscribers| subscribers.iter().filter(|s| !s.sender.is_closed()).count())
    }

    pub fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            value_ids: self.values.len(),
            value_subscribers: self.values.iter().map(|entry| entry.value().len()).sum(),
            discovery_resources: self.discovery.len(),
            discovery_subscribers: self.discovery.iter().map(|entry| entry.value().len()).sum(),
            announcements: self.announcements.load(Ordering::Relaxed),
        }
    }
}

/// Stream of metric identities discovered under one resource, each yielded once.
pub struct MetricIdStream {
    receiver: mpsc::UnboundedReceiver<MetricId>,
    seen: FxHashSet<MetricId>,
    discovery: Arc<DiscoveryMap>,
    resource_key: ResourceKey,
    handle: u64,
}

impl Stream for MetricIdStream {
    type Item = MetricId;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<MetricId>> {
        loop {
            match self.receiver.poll_recv(cx) {
                Poll::Ready(Some(id)) => {
                    if self.seen.insert(id.clone()) {
                        return Poll::Ready(Some(id));
                    }
                },
                other => return other,
            }
        }
    }
}

impl Drop for MetricIdStream {
    fn drop(&mut self) {
        let handle = self.handle;
        remove_subscriber(&self.discovery, &self.resource_key, |s| s.handle != handle);
    }
}

/// Stream of points for one identity; ends when its lifetime is cancelled.
pub struct MetricValueStream {
    id: MetricId,
    receiver: mpsc::Receiver<MetricPoint>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    finished: bool,
    values: Arc<ValueMap>,
    handle: u64,
}

impl MetricValueStream {
    pub fn id(&self) -> &MetricId {
        &self.id
    }

    fn unregister(&self) {
        let handle = self.handle;
        remove_subscriber(&self.values, &self.id, |s| s.handle != handle);
    }
}

impl Stream for MetricValueStream {
    type Item = MetricPoint;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<MetricPoint>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.finished = true;
            self.receiver.close();
            self.unregister();
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for MetricValueStream {
    fn drop(&mut self) {
        if !self.finished {
            self.unregister();
        }
    }
}
