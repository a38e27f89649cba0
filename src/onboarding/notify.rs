//! Reward notices: transient "credits earned" toasts, queued so that
//! back-to-back completions each get their own.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::checklist::Credit;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// How long a notice stays visible unless configured otherwise.
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(3000);

/// One reward notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardNotice {
    pub id: u64,
    pub item_key: String,
    pub title: String,
    pub reward: u32,
    /// Accumulated credits after this reward.
    pub total_reward: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RewardNotice {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Events fanned out to notice subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeEvent {
    Shown { notice: RewardNotice },
    Dismissed { id: u64 },
}

/// Queue of live reward notices backed by a broadcast channel.
pub struct RewardNotifier {
    notices: RwLock<VecDeque<RewardNotice>>,
    tx: broadcast::Sender<NoticeEvent>,
    duration: Duration,
    next_id: AtomicU64,
}

impl RewardNotifier {
    pub fn new(duration: Duration) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            notices: RwLock::new(VecDeque::new()),
            tx,
            duration,
            next_id: AtomicU64::new(1),
        })
    }

    /// How long each notice stays visible.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoticeEvent> {
        self.tx.subscribe()
    }

    /// Queue a notice for `credit` and broadcast it.
    pub async fn push(&self, credit: &Credit, total_reward: u32) -> RewardNotice {
        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.duration)
            .unwrap_or_else(|_| chrono::Duration::milliseconds(3000));
        let notice = RewardNotice {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            item_key: credit.key.clone(),
            title: credit.title.clone(),
            reward: credit.reward,
            total_reward,
            issued_at,
            expires_at: issued_at + ttl,
        };

        info!(
            notice_id = notice.id,
            item = %notice.item_key,
            reward = notice.reward,
            total = notice.total_reward,
            "Reward earned"
        );

        self.notices.write().await.push_back(notice.clone());
        // ok if nobody is listening
        let _ = self.tx.send(NoticeEvent::Shown {
            notice: notice.clone(),
        });
        notice
    }

    /// Notices still on screen, oldest first.
    pub async fn active(&self) -> Vec<RewardNotice> {
        let now = Utc::now();
        self.notices
            .read()
            .await
            .iter()
            .filter(|n| !n.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Dismiss a notice before it expires.
    pub async fn dismiss(&self, id: u64) -> bool {
        let mut notices = self.notices.write().await;
        let before = notices.len();
        notices.retain(|n| n.id != id);
        let removed = notices.len() != before;
        if removed {
            let _ = self.tx.send(NoticeEvent::Dismissed { id });
        }
        removed
    }

    /// Drop expired notices and broadcast their dismissal.
    /// Returns the number removed.
    pub async fn expire_old(&self) -> usize {
        let now = Utc::now();
        let mut notices = self.notices.write().await;
        let mut expired = Vec::new();
        notices.retain(|n| {
            if n.is_expired_at(now) {
                expired.push(n.id);
                false
            } else {
                true
            }
        });

        for id in &expired {
            debug!(notice_id = id, "Reward notice expired");
            let _ = self.tx.send(NoticeEvent::Dismissed { id: *id });
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.notices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notices.read().await.is_empty()
    }
}

/// Spawn a background task that periodically expires old notices.
pub fn spawn_expiry_task(
    notifier: Arc<RewardNotifier>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            notifier.expire_old().await;
        }
    })
}
