use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A binary permit: either available or taken.
///
/// Unlike a counting semaphore, releasing an available permit leaves it available; a
/// double release is a caller error that is not guarded against.
#[derive(Debug)]
pub struct TurnPermit {
    available: AtomicBool,
    released: Notify,
}

impl TurnPermit {
    /// Creates an available permit.
    pub fn new() -> Self {
        Self { available: AtomicBool::new(true), released: Notify::new() }
    }

    /// Takes the permit if it is available, without suspending.
    pub fn try_acquire(&self) -> bool {
        self.available.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Suspends until the permit is available, then takes it.
    ///
    /// Cancel safe: a dropped `acquire` never holds the permit.
    pub async fn acquire(&self) {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // register before checking, a release in between must not be lost
            released.as_mut().enable();

            if self.try_acquire() {
                return;
            }

            released.await;
        }
    }

    pub fn release(&self) {
        self.available.store(true, Ordering::Release);
        self.released.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl Default for TurnPermit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn try_acquire_is_one_shot() {
        let permit = TurnPermit::new();
        assert!(permit.try_acquire());
        assert!(!permit.try_acquire());
        assert!(!permit.is_available());

        permit.release();
        assert!(permit.is_available());
        assert!(permit.try_acquire());
    }

    #[test]
    fn release_does_not_count() {
        let permit = TurnPermit::new();
        permit.release();
        permit.release();

        assert!(permit.try_acquire());
        assert!(!permit.try_acquire());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let permit = Arc::new(TurnPermit::new());
        permit.acquire().await;

        assert!(permit.acquire().now_or_never().is_none());

        let waiter = tokio::spawn({
            let permit = Arc::clone(&permit);
            async move { permit.acquire().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        permit.release();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(!permit.is_available());
    }

    #[tokio::test]
    async fn cancelled_acquire_keeps_permit_free() {
        let permit = TurnPermit::new();
        assert!(permit.try_acquire());

        assert!(tokio::time::timeout(Duration::from_millis(10), permit.acquire()).await.is_err());

        permit.release();
        assert!(permit.try_acquire());
    }
}
