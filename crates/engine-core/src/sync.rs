use std::sync::Arc;
use tokio::sync::watch;

/// A latch that starts closed and, once released, stays released.
///
/// Every waiter is woken by the single `release` call.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A gate that never blocks.
    pub fn released() -> Self {
        let gate = Self::new();
        gate.release();
        gate
    }

    /// Releases the gate. Returns `true` only for the call that flipped it.
    pub fn release(&self) -> bool {
        self.tx.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Counting barrier for outstanding units of work.
///
/// Units are taken with [`PendingUnits::acquire`] and given back when the
/// returned [`PendingUnit`] is dropped, so acquire and release always pair up.
#[derive(Debug, Clone)]
pub struct PendingUnits {
    count: Arc<watch::Sender<usize>>,
}

/// One outstanding unit; released on drop.
#[derive(Debug)]
#[must_use = "the unit is released as soon as it is dropped"]
pub struct PendingUnit {
    count: Arc<watch::Sender<usize>>,
}

impl PendingUnits {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    pub fn acquire(&self) -> PendingUnit {
        self.count.send_modify(|n| *n += 1);
        PendingUnit {
            count: self.count.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no units are outstanding.
    pub async fn drained(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for PendingUnits {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PendingUnit {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn gate_wakes_every_waiter_once() {
        let gate = Gate::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(!gate.is_released());
        assert!(gate.release());
        assert!(!gate.release());

        for w in waiters {
            timeout(Duration::from_secs(1), w).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn released_gate_does_not_block() {
        let gate = Gate::released();
        timeout(Duration::from_millis(50), gate.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pending_units_drain_when_tokens_drop() {
        let units = PendingUnits::new();
        let a = units.acquire();
        let b = units.acquire();
        assert_eq!(units.pending(), 2);

        let waiter = {
            let units = units.clone();
            tokio::spawn(async move { units.drained().await })
        };

        drop(a);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(b);
        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(units.pending(), 0);
    }

    #[tokio::test]
    async fn drained_is_immediate_without_units() {
        timeout(Duration::from_millis(50), PendingUnits::new().drained())
            .await
            .unwrap();
    }
}
