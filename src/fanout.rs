//! Consumer fan-out: one logical consumer backed by N physical
//! subscriptions.
//!
//! Partition discovery blocks, but the per-partition subscribe calls are
//! fired concurrently and race against the handle's return to the caller.
//! The returned [`ConsumerHandle`] therefore starts with zero members and
//! grows as subscribe operations resolve; callers that need full
//! membership await [`ConsumerHandle::ready`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::admin::AdminGateway;
use crate::config::{AckMode, ConsumerConfig};
use crate::data_plane::{
    ConsumerCallback, ConsumerInstance, DataPlaneGateway, SubscriptionMode, SubscriptionSpec,
};
use crate::error::{DataPlaneError, DriverError, DriverResult};

/// Assembles logical consumers from per-partition physical subscriptions.
pub struct ConsumerFanout {
    admin: Arc<dyn AdminGateway>,
    data_plane: Arc<dyn DataPlaneGateway>,
    config: ConsumerConfig,
}

impl ConsumerFanout {
    pub fn new(
        admin: Arc<dyn AdminGateway>,
        data_plane: Arc<dyn DataPlaneGateway>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            admin,
            data_plane,
            config,
        }
    }

    /// Create a logical consumer on `topic`.
    ///
    /// Discovers the partition count, then fires one failover subscribe
    /// per partition (`<topic>-partition-<i>`), or a single subscribe on
    /// the topic itself when it is non-partitioned. If discovery fails the
    /// single direct subscription is used as a fallback; the discovery
    /// error is logged but not surfaced.
    ///
    /// The handle is returned without waiting for the subscribe calls to
    /// complete. Subscribe failures are not retried; the first one is
    /// surfaced through [`ConsumerHandle::ready`].
    pub async fn create_consumer(
        &self,
        topic: &str,
        subscription: &str,
        callback: ConsumerCallback,
    ) -> ConsumerHandle {
        let physical_topics = match self.admin.partitioned_topic_metadata(topic).await {
            Ok(partitions) => partition_topic_names(topic, partitions),
            Err(e) => {
                warn!(
                    "Partition metadata lookup failed for {topic}, \
                     subscribing on the topic directly: {e}"
                );
                vec![topic.to_string()]
            }
        };
        self.spawn_subscriptions(physical_topics, subscription, callback)
    }

    fn spawn_subscriptions(
        &self,
        topics: Vec<String>,
        subscription: &str,
        callback: ConsumerCallback,
    ) -> ConsumerHandle {
        let (progress, _) = watch::channel(Progress::default());
        let shared = Arc::new(FanoutShared {
            expected: topics.len(),
            ack_mode: self.config.ack_mode,
            callback,
            members: Mutex::new(Vec::new()),
            progress,
            closed: AtomicBool::new(false),
        });

        for topic in topics {
            let spec = SubscriptionSpec {
                topic,
                subscription: subscription.to_string(),
                mode: SubscriptionMode::Failover,
                priority_level: 0,
                receiver_queue_size: self.config.receiver_queue_size,
                max_total_receiver_queue_size_across_partitions: self
                    .config
                    .max_total_receiver_queue_size_across_partitions,
            };
            let data_plane = Arc::clone(&self.data_plane);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                match data_plane.subscribe(&spec).await {
                    Ok(consumer) => {
                        {
                            let mut members = lock_members(&shared.members);
                            if !shared.closed.load(Ordering::SeqCst) {
                                let pump = tokio::spawn(pump_messages(
                                    Arc::clone(&consumer),
                                    Arc::clone(&shared.callback),
                                    shared.ack_mode,
                                ));
                                members.push(Member { consumer, pump });
                                drop(members);
                                shared.progress.send_modify(|p| p.settled += 1);
                                return;
                            }
                        }
                        // The handle was closed while this subscribe was
                        // still in flight.
                        let _ = consumer.close().await;
                    }
                    Err(error) => {
                        warn!("Subscribe failed on {}: {error}", spec.topic);
                        shared.progress.send_modify(|p| {
                            if p.failure.is_none() {
                                p.failure = Some(SubscribeFailure {
                                    topic: spec.topic.clone(),
                                    error: error.clone(),
                                });
                            }
                        });
                    }
                }
            });
        }

        ConsumerHandle { shared }
    }
}

/// Physical topic names a logical topic fans out to: the `partitions`
/// partition components, or the topic itself when non-partitioned.
fn partition_topic_names(topic: &str, partitions: u32) -> Vec<String> {
    if partitions == 0 {
        return vec![topic.to_string()];
    }
    (0..partitions)
        .map(|i| format!("{topic}-partition-{i}"))
        .collect()
}

/// Millisecond publish time in nanosecond representation. Resolution
/// stays bounded to milliseconds.
fn publish_nanos(publish_time_ms: u64) -> u64 {
    publish_time_ms.saturating_mul(1_000_000)
}

/// Receive loop for one physical consumer: invoke the harness callback,
/// then acknowledge per the configured mode.
async fn pump_messages(
    consumer: Arc<dyn ConsumerInstance>,
    callback: ConsumerCallback,
    ack_mode: AckMode,
) {
    loop {
        match consumer.recv().await {
            Ok(delivery) => {
                callback(&delivery.payload, publish_nanos(delivery.publish_time_ms));
                match ack_mode {
                    AckMode::FireAndForget => {
                        let consumer = Arc::clone(&consumer);
                        let token = delivery.ack;
                        tokio::spawn(async move {
                            let _ = consumer.ack(token).await;
                        });
                    }
                    AckMode::LogFailures => {
                        if let Err(e) = consumer.ack(delivery.ack).await {
                            warn!("Failed to acknowledge message: {e}");
                        }
                    }
                }
            }
            Err(DataPlaneError::Closed) => break,
            Err(e) => {
                warn!("Consumer receive failed: {e}");
                break;
            }
        }
    }
}

struct Member {
    consumer: Arc<dyn ConsumerInstance>,
    pump: JoinHandle<()>,
}

#[derive(Clone)]
struct SubscribeFailure {
    topic: String,
    error: DataPlaneError,
}

#[derive(Clone, Default)]
struct Progress {
    settled: usize,
    failure: Option<SubscribeFailure>,
}

struct FanoutShared {
    expected: usize,
    ack_mode: AckMode,
    callback: ConsumerCallback,
    members: Mutex<Vec<Member>>,
    progress: watch::Sender<Progress>,
    closed: AtomicBool,
}

fn lock_members(members: &Mutex<Vec<Member>>) -> MutexGuard<'_, Vec<Member>> {
    members.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logical consumer aggregate owning its physical consumers.
///
/// Membership is eventually consistent: the handle is returned before all
/// subscribe operations complete and may temporarily own fewer members
/// than expected. [`Self::ready`] resolves once every expected
/// subscription has been established, or with the first subscribe failure.
pub struct ConsumerHandle {
    shared: Arc<FanoutShared>,
}

impl ConsumerHandle {
    /// Number of physical subscriptions this handle will eventually own.
    pub fn expected_members(&self) -> usize {
        self.shared.expected
    }

    /// Number of physical consumers established so far.
    pub fn member_count(&self) -> usize {
        lock_members(&self.shared.members).len()
    }

    /// Wait until all expected subscriptions are established.
    ///
    /// Returns the first subscribe failure, if any; failed subscriptions
    /// are not retried.
    pub async fn ready(&self) -> DriverResult<()> {
        let mut rx = self.shared.progress.subscribe();
        let settled = rx
            .wait_for(|p| p.failure.is_some() || p.settled >= self.shared.expected)
            .await;
        match settled {
            Ok(progress) => match &progress.failure {
                Some(failure) => Err(DriverError::Subscribe {
                    topic: failure.topic.clone(),
                    source: failure.error.clone(),
                }),
                None => Ok(()),
            },
            // The sender lives in `shared`, which we own; it cannot have
            // been dropped while we are waiting.
            Err(_) => Ok(()),
        }
    }

    /// Close every physical consumer and stop their receive loops.
    ///
    /// Subscriptions that are still being established when this runs are
    /// closed as soon as they resolve.
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let members: Vec<Member> = {
            let mut members = lock_members(&self.shared.members);
            members.drain(..).collect()
        };
        for member in members {
            member.pump.abort();
            if let Err(e) = member.consumer.close().await {
                debug!("Error closing physical consumer: {e}");
            }
        }
    }
}
