use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-bot submission locks. Signals for different bots run fully in
/// parallel; two signals for the same bot serialise at the submission
/// step so their stat updates cannot interleave.
#[derive(Default)]
pub struct BotLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The map lock is held only long enough to clone the entry; waiting
    /// on a busy bot never blocks other bots.
    pub async fn acquire(&self, bot_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(bot_id.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_bot_waits_different_bots_do_not() {
        let locks = Arc::new(BotLocks::new());

        let held = locks.acquire("bot-a").await;

        // Another bot acquires immediately.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("bot-b")).await;
        assert!(other.is_ok());

        // The same bot blocks until the guard drops.
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("bot-a")).await;
        assert!(same.is_err());

        drop(held);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("bot-a")).await;
        assert!(same.is_ok());
    }
}
