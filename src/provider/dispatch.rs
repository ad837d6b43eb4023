//! Bounded in-flight admission with a FIFO wait queue.
//!
//! At most `max_in_flight` permits are outstanding. Callers beyond the cap
//! wait in arrival order. Released capacity is handed out by a drain cycle
//! that grants up to `drain_batch` waiters, spaced by `dispatch_interval`,
//! and reschedules itself after `reschedule_delay` while waiters remain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_in_flight: usize,
    pub drain_batch: usize,
    pub dispatch_interval: Duration,
    pub reschedule_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 12,
            drain_batch: 5,
            dispatch_interval: Duration::from_millis(20),
            reschedule_delay: Duration::from_millis(5),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn with_drain_batch(mut self, batch: usize) -> Self {
        self.drain_batch = batch.max(1);
        self
    }

    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    pub fn with_reschedule_delay(mut self, delay: Duration) -> Self {
        self.reschedule_delay = delay;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub max_in_flight: usize,
    pub active: usize,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct State {
    active: usize,
    waiting: VecDeque<oneshot::Sender<DispatchPermit>>,
    draining: bool,
}

#[derive(Debug)]
struct Inner {
    config: DispatchConfig,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to one admission queue.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

/// One unit of in-flight capacity; released on drop.
#[derive(Debug)]
pub struct DispatchPermit {
    inner: Arc<Inner>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        let start_drain = {
            let mut st = self.inner.lock();
            st.active = st.active.saturating_sub(1);
            should_start_drain(&mut st, &self.inner.config)
        };
        if start_drain {
            spawn_drain(self.inner.clone());
        }
    }
}

fn should_start_drain(st: &mut State, config: &DispatchConfig) -> bool {
    if !st.draining && !st.waiting.is_empty() && st.active < config.max_in_flight {
        st.draining = true;
        true
    } else {
        false
    }
}

fn spawn_drain(inner: Arc<Inner>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(drain(inner));
        }
        // No runtime (permit dropped outside async context): grant without pacing.
        Err(_) => drain_now(&inner),
    }
}

/// Pops the next waiter if capacity allows, counting it as active.
fn grant_next(inner: &Arc<Inner>) -> Option<oneshot::Sender<DispatchPermit>> {
    let mut st = inner.lock();
    if st.active < inner.config.max_in_flight {
        let tx = st.waiting.pop_front()?;
        st.active += 1;
        Some(tx)
    } else {
        None
    }
}

fn deliver(inner: &Arc<Inner>, tx: oneshot::Sender<DispatchPermit>) {
    let permit = DispatchPermit {
        inner: inner.clone(),
    };
    // A cancelled waiter hands the permit back; dropping it releases the slot.
    let _ = tx.send(permit);
}

fn drain_now(inner: &Arc<Inner>) {
    while let Some(tx) = grant_next(inner) {
        deliver(inner, tx);
    }
    inner.lock().draining = false;
}

async fn drain(inner: Arc<Inner>) {
    let config = inner.config.clone();
    loop {
        let mut granted = 0;
        while granted < config.drain_batch {
            let Some(tx) = grant_next(&inner) else {
                break;
            };
            deliver(&inner, tx);
            granted += 1;

            let more = !inner.lock().waiting.is_empty();
            if more && granted < config.drain_batch && !config.dispatch_interval.is_zero() {
                tokio::time::sleep(config.dispatch_interval).await;
            }
        }

        let reschedule = {
            let mut st = inner.lock();
            if !st.waiting.is_empty() {
                debug!(
                    queued = st.waiting.len(),
                    active = st.active,
                    "dispatch queue still has waiters"
                );
            }
            if st.waiting.is_empty() || st.active >= config.max_in_flight {
                // Remaining waiters are picked up by the next released permit.
                st.draining = false;
                false
            } else {
                true
            }
        };
        if !reschedule {
            return;
        }
        tokio::time::sleep(config.reschedule_delay).await;
    }
}

impl DispatchQueue {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Waits for capacity. Requests arriving while others wait join the back
    /// of the queue even if a slot is momentarily free.
    pub async fn acquire(&self) -> DispatchPermit {
        let rx = {
            let mut st = self.inner.lock();
            if st.active < self.inner.config.max_in_flight && st.waiting.is_empty() {
                st.active += 1;
                return DispatchPermit {
                    inner: self.inner.clone(),
                };
            }
            let (tx, rx) = oneshot::channel();
            st.waiting.push_back(tx);
            debug!(queue_len = st.waiting.len(), active = st.active, "request queued");
            let start_drain = should_start_drain(&mut st, &self.inner.config);
            drop(st);
            if start_drain {
                spawn_drain(self.inner.clone());
            }
            rx
        };

        match rx.await {
            Ok(permit) => permit,
            // Sender dropped without a grant; only happens if the queue itself
            // is torn down. Take a slot directly rather than hang.
            Err(_) => {
                self.inner.lock().active += 1;
                DispatchPermit {
                    inner: self.inner.clone(),
                }
            }
        }
    }

    /// Non-waiting variant; `None` if at capacity or others are queued.
    pub fn try_acquire(&self) -> Option<DispatchPermit> {
        let mut st = self.inner.lock();
        if st.active < self.inner.config.max_in_flight && st.waiting.is_empty() {
            st.active += 1;
            Some(DispatchPermit {
                inner: self.inner.clone(),
            })
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let st = self.inner.lock();
        DispatchSnapshot {
            max_in_flight: self.inner.config.max_in_flight,
            active: st.active,
            queued: st.waiting.len(),
        }
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}
