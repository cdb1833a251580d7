use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Process-wide, time-bounded read-through cache holding one value.
///
/// Refresh runs without holding the lock and swaps the whole value in at the
/// end, so readers see either the previous value or the new one. Two
/// concurrent refreshes both fetch; the last one to finish wins.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
}

#[derive(Debug)]
struct Entry<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: RwLock::new(None) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current value if it is still within the TTL.
    pub async fn fresh(&self) -> Option<Arc<T>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.fresh().await {
            return Ok(value);
        }

        let value = Arc::new(refresh().await?);
        let mut slot = self.slot.write().await;
        *slot = Some(Entry { value: Arc::clone(&value), loaded_at: Instant::now() });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::TtlCache;

    async fn load(calls: &AtomicUsize) -> Result<Vec<u32>, String> {
        let call = calls.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(vec![call])
    }

    #[tokio::test(start_paused = true)]
    async fn value_is_reused_until_ttl_elapses() {
        let cache = TtlCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_refresh(|| load(&calls)).await.expect("first load");
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = cache.get_or_refresh(|| load(&calls)).await.expect("cached");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let third = cache.get_or_refresh(|| load(&calls)).await.expect("reload");
        assert_eq!(*third, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_propagates_error() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache
            .get_or_refresh(|| async { Ok::<_, String>("cached".to_string()) })
            .await
            .expect("load");
        tokio::time::advance(Duration::from_secs(11)).await;

        let error = cache
            .get_or_refresh(|| async { Err::<String, _>("crm down".to_string()) })
            .await
            .expect_err("refresh fails");
        assert_eq!(error, "crm down");
        assert!(cache.fresh().await.is_none());

        cache.invalidate().await;
        let value = cache
            .get_or_refresh(|| async { Ok::<_, String>("reloaded".to_string()) })
            .await
            .expect("reload");
        assert_eq!(value.as_str(), "reloaded");
    }
}
