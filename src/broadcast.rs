use log::{debug, warn};
use tokio::sync::broadcast;

use crate::db::Database;
use crate::gesture::Reading;

/// Fans accepted readings out to live subscribers and mirrors the newest one into the store.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Reading>,
    db: Database,
}

impl BroadcastHub {
    pub fn new(db: Database, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, db }
    }

    /// Current stored frame (all-false if nothing was ever stored) plus a live feed.
    pub async fn subscribe(&self) -> (Reading, broadcast::Receiver<Reading>) {
        // Subscribe first so nothing published between the load and the return is missed.
        let receiver = self.sender.subscribe();
        let current = match self.db.load_latest_reading().await {
            Ok(reading) => reading.unwrap_or_default(),
            Err(err) => {
                warn!("Failed to load stored reading for new subscriber: {err:#}");
                Reading::default()
            }
        };
        (current, receiver)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub async fn publish(&self, reading: Reading) {
        if let Err(err) = self.db.save_latest_reading(&reading).await {
            warn!("Failed to persist latest reading {}: {err:#}", reading.bits());
        }

        // No subscribers is the normal idle case.
        if self.sender.send(reading).is_err() {
            debug!("No subscribers for reading {}", reading.bits());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_subscriber_sees_stored_then_live_readings() {
        let db = Database::in_memory().unwrap();
        let hub = BroadcastHub::new(db, 8);

        let (initial, _early) = hub.subscribe().await;
        assert_eq!(initial, Reading::default());

        let what = Reading::new([true, false, false, false, false]);
        hub.publish(what).await;

        let (current, mut receiver) = hub.subscribe().await;
        assert_eq!(current, what);
        assert_eq!(hub.subscriber_count(), 2);

        let go = Reading::new([false, false, true, false, false]);
        hub.publish(go).await;
        assert_eq!(receiver.recv().await.unwrap(), go);
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_stores() {
        let db = Database::in_memory().unwrap();
        let hub = BroadcastHub::new(db.clone(), 4);
        let help = Reading::new([true; 5]);
        hub.publish(help).await;
        assert_eq!(db.load_latest_reading().await.unwrap(), Some(help));
    }
}
