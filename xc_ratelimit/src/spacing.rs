use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use crate::limiter::KeyedRateLimiter;

/// Default spacing between two calls sharing an operation key
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum-spacing limiter keyed by operation
///
/// Guarantees that two calls sharing a key return from [`acquire`] at least
/// `interval` apart. This is not a token bucket: it only bounds the
/// instantaneous rate, never the burst over a longer window. Keys never
/// interact with each other.
///
/// Each caller reserves its slot (`max(now, last + interval)`) under the
/// key's shard lock and only then sleeps, so concurrent callers on the same
/// key are handed distinct, correctly spaced slots. A caller dropped while
/// waiting hands its slot back.
///
/// [`acquire`]: KeyedRateLimiter::acquire
pub struct MinSpacing {
    /// Last granted slot per operation key
    slots: DashMap<String, Instant>,

    /// Minimum spacing between calls sharing a key
    interval: Duration,
}

impl MinSpacing {
    /// Create a limiter with a custom interval
    ///
    /// A zero interval never waits.
    pub fn new(interval: Duration) -> Self {
        Self { slots: DashMap::new(), interval }
    }

    /// Reserve the next slot for `key`, returning it with the slot it replaced
    ///
    /// Unseen keys are granted `now`.
    pub(crate) fn reserve(&self, key: &str) -> (Instant, Option<Instant>) {
        let now = Instant::now();

        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                let previous = *entry.get();
                let slot = (previous + self.interval).max(now);
                entry.insert(slot);
                (slot, Some(previous))
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                (now, None)
            }
        }
    }

    /// Last slot granted for `key`, if the key has been seen
    pub fn last_acquire(&self, key: &str) -> Option<Instant> {
        self.slots.get(key).map(|slot| *slot)
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    async fn acquire_internal(&self, key: &str) {
        let (slot, previous) = self.reserve(key);
        let wait = slot.saturating_duration_since(Instant::now());

        let Some(previous) = previous.filter(|_| !wait.is_zero()) else {
            return;
        };

        tracing::warn!(key, wait_ms = wait.as_millis() as u64, "Rate limit delay {:.3}s", wait.as_secs_f64());

        let _pending = Pending { slots: &self.slots, key, slot, previous };
        tokio::time::sleep_until(slot).await;
    }
}

/// A slot reserved by a caller that is still sleeping
///
/// Dropping it before the slot is reached rolls the key back to `previous`,
/// unless a later caller has already reserved past it.
struct Pending<'a> {
    slots: &'a DashMap<String, Instant>,
    key: &'a str,
    slot: Instant,
    previous: Instant,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if Instant::now() >= self.slot {
            return;
        }

        if let Some(mut last) = self.slots.get_mut(self.key) {
            if *last == self.slot {
                *last = self.previous;
            }
        }
    }
}

impl Default for MinSpacing {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl KeyedRateLimiter for MinSpacing {
    fn acquire<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.acquire_internal(key))
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn reset(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::task::Poll;

    use proptest::prelude::*;
    use tokio::time::timeout;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let limiter = MinSpacing::default();

        let start = Instant::now();
        limiter.acquire("bybit.v5.market.get_kline").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_calls_are_spaced() {
        let limiter = MinSpacing::default();

        limiter.acquire("k").await;
        let first = Instant::now();
        limiter.acquire("k").await;
        let second = Instant::now();

        assert!(second - first >= DEFAULT_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_remaining_interval_is_waited() {
        let limiter = MinSpacing::new(Duration::from_millis(500));

        limiter.acquire("k").await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let before = Instant::now();
        limiter.acquire("k").await;

        assert_eq!(before.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_elapsed() {
        let limiter = MinSpacing::new(Duration::from_millis(500));

        limiter.acquire("k").await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        limiter.acquire("k").await;

        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = MinSpacing::default();

        limiter.acquire("okx.api.public_data.rest.get_funding_rate").await;
        let before = Instant::now();
        limiter.acquire("okx.api.public_data.rest.get_mark_price").await;

        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = MinSpacing::new(Duration::ZERO);

        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire("k").await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forgets_keys() {
        let limiter = MinSpacing::default();

        limiter.acquire("k").await;
        limiter.reset();
        assert!(limiter.is_empty());

        let before = Instant::now();
        limiter.acquire("k").await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_get_distinct_slots() {
        let limiter = Arc::new(MinSpacing::new(Duration::from_millis(100)));
        let mut handles = vec![];

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("shared").await;
                Instant::now()
            }));
        }

        let mut returned = vec![];
        for handle in handles {
            returned.push(handle.await.unwrap());
        }
        returned.sort();

        for pair in returned.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100), "calls spaced by {:?}", pair[1] - pair[0]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_hands_slot_back() {
        let limiter = MinSpacing::new(Duration::from_millis(500));

        limiter.acquire("k").await;
        let first = limiter.last_acquire("k");

        for _ in 0..2 {
            let abandoned = timeout(Duration::from_millis(100), limiter.acquire("k")).await;
            assert!(abandoned.is_err());
            assert_eq!(limiter.last_acquire("k"), first);
        }

        let before = Instant::now();
        limiter.acquire("k").await;

        assert_eq!(before.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_keeps_later_reservation() {
        let limiter = MinSpacing::new(Duration::from_millis(100));
        limiter.acquire("k").await;
        let start = Instant::now();

        let mut abandoned = limiter.acquire("k");
        assert!(poll_once(&mut abandoned).await);
        let mut later = limiter.acquire("k");
        assert!(poll_once(&mut later).await);
        drop(abandoned);

        later.await;

        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(limiter.last_acquire("k"), Some(start + Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_logged_with_key() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt().with_writer(captured.clone()).with_ansi(false).finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let limiter = MinSpacing::new(Duration::from_millis(300));
        limiter.acquire("bybit.v5.order.create").await;
        assert!(captured.text().is_empty());

        limiter.acquire("bybit.v5.order.create").await;

        let text = captured.text();
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("bybit.v5.order.create"), "{text}");
        assert!(text.contains("wait_ms=300"), "{text}");
        assert!(text.contains("Rate limit delay 0.300s"), "{text}");
    }

    /// Poll `future` once, returning true while it is still pending
    async fn poll_once<F: Future + Unpin>(future: &mut F) -> bool {
        std::future::poll_fn(|cx| Poll::Ready(Pin::new(&mut *future).poll(cx).is_pending())).await
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_reserve_records_slot() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();

        rt.block_on(async {
            let limiter = MinSpacing::new(Duration::from_millis(250));
            assert!(limiter.last_acquire("k").is_none());

            let (first, previous) = limiter.reserve("k");
            assert!(previous.is_none());

            let (second, previous) = limiter.reserve("k");
            assert_eq!(previous, Some(first));
            assert_eq!(second - first, Duration::from_millis(250));
            assert_eq!(limiter.last_acquire("k"), Some(second));
        });
    }

    proptest! {
        #[test]
        fn prop_spacing_holds_for_any_gaps(interval_ms in 1u64..1_000, gaps in proptest::collection::vec(0u64..1_500, 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();
            let interval = Duration::from_millis(interval_ms);

            let returned = rt.block_on(async {
                let limiter = MinSpacing::new(interval);
                let mut returned = vec![];
                for gap in &gaps {
                    tokio::time::sleep(Duration::from_millis(*gap)).await;
                    limiter.acquire("k").await;
                    returned.push(Instant::now());
                }
                returned
            });

            for pair in returned.windows(2) {
                prop_assert!(pair[1] - pair[0] >= interval);
            }
        }
    }
}
