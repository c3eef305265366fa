//! Wake/sleep coordination between the ingestion path and idle workers.
//!
//! Each [`Dispatcher::wake`] adds one unit of available work. A unit is
//! taken either by a worker returning from [`Dispatcher::wait`] or by a
//! worker that found work without waiting and calls
//! [`Dispatcher::consume`]. Units issued while nobody waits are kept, so a
//! wake can never be lost.

use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct Dispatcher {
    units: Semaphore,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            units: Semaphore::new(0),
        }
    }

    /// Signal that one more job may be available.
    pub fn wake(&self) {
        self.units.add_permits(1);
    }

    /// Block until a unit of work is signalled, then take it.
    pub async fn wait(&self) {
        // The semaphore is never closed, so acquire only fails if that changes
        if let Ok(permit) = self.units.acquire().await {
            permit.forget();
        }
    }

    /// Take one pending unit, if any, after claiming work without waiting.
    pub fn consume(&self) {
        if let Ok(permit) = self.units.try_acquire() {
            permit.forget();
        }
    }

    /// Number of signalled units not yet taken.
    pub fn pending(&self) -> usize {
        self.units.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wake_before_wait_is_not_lost() {
        let dispatcher = Dispatcher::new();
        dispatcher.wake();
        assert_eq!(dispatcher.pending(), 1);

        tokio::time::timeout(Duration::from_millis(100), dispatcher.wait())
            .await
            .expect("stored wake should release the waiter");
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_wait_blocks_until_wake() {
        let dispatcher = Dispatcher::new();
        let mut wait = tokio_test::task::spawn(dispatcher.wait());
        tokio_test::assert_pending!(wait.poll());

        dispatcher.wake();
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn test_each_wake_releases_one_waiter() {
        let dispatcher = Arc::new(Dispatcher::new());
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let d = Arc::clone(&dispatcher);
            waiters.push(tokio::spawn(async move { d.wait().await }));
        }
        tokio::task::yield_now().await;

        dispatcher.wake();
        dispatcher.wake();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let finished = waiters.iter().filter(|h| h.is_finished()).count();
        assert_eq!(finished, 2);

        dispatcher.wake();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_millis(100), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn test_consume_takes_at_most_one() {
        let dispatcher = Dispatcher::new();
        dispatcher.consume();
        assert_eq!(dispatcher.pending(), 0);

        dispatcher.wake();
        dispatcher.wake();
        dispatcher.consume();
        assert_eq!(dispatcher.pending(), 1);
    }
}
