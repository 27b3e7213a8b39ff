//! The scheduler.
//!
//! One periodic driver pulses every registered unit in turn. A unit that
//! fails or panics is logged and skipped; the others still tick.

use parking_lot::{ReentrantMutex, RwLock};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a unit learns about the pulse it is running in.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Pulses since the ticker was created.
    pub tick: u64,
    /// Captured once per pulse. Units compare against this, never the wall clock.
    pub now: Instant,
}

pub trait Ticked: Send + Sync {
    fn label(&self) -> String;

    fn tick(&self, ctx: &TickContext) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(u64);

/// `gate` is held for the whole of a unit's tick. Stopping takes the same lock,
/// so it returns only once an in-flight tick has finished.
struct Slot {
    unit: Weak<dyn Ticked>,
    gate: Arc<ReentrantMutex<Cell<bool>>>,
}

pub struct Ticker {
    period: Duration,
    slots: RwLock<BTreeMap<TickHandle, Slot>>,
    next_handle: AtomicU64,
    tick: AtomicU64,
    running: AtomicBool,
    shutdown: Notify,
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("period", &self.period)
            .field("units", &self.len())
            .field("tick", &self.current_tick())
            .finish()
    }
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            slots: RwLock::new(BTreeMap::new()),
            next_handle: AtomicU64::new(1),
            tick: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Registers a unit. The ticker keeps only a weak reference.
    pub fn start(&self, unit: Weak<dyn Ticked>) -> TickHandle {
        let handle = TickHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.slots.write().insert(
            handle,
            Slot {
                unit,
                gate: Arc::new(ReentrantMutex::new(Cell::new(true))),
            },
        );
        tracing::debug!(handle = handle.0, "unit scheduled");
        handle
    }

    /// Unregisters a unit. When this returns the unit is not ticking and never
    /// will again. Safe to call from inside the unit's own tick.
    pub fn stop(&self, handle: TickHandle) -> bool {
        let Some(slot) = self.slots.write().remove(&handle) else {
            return false;
        };
        let gate = slot.gate.lock();
        gate.set(false);
        tracing::debug!(handle = handle.0, "unit unscheduled");
        true
    }

    pub fn is_scheduled(&self, handle: TickHandle) -> bool {
        self.slots.read().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs one pulse over every live unit, in registration order.
    pub fn pulse(&self, now: Instant) -> u64 {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel);
        let ctx = TickContext { tick, now };

        // Snapshot so units can start/stop others without deadlocking on `slots`.
        let snapshot: Vec<(TickHandle, Weak<dyn Ticked>, Arc<ReentrantMutex<Cell<bool>>>)> = self
            .slots
            .read()
            .iter()
            .map(|(h, s)| (*h, s.unit.clone(), s.gate.clone()))
            .collect();

        let mut dead = Vec::new();
        for (handle, unit, gate) in snapshot {
            let guard = gate.lock();
            if !guard.get() {
                continue;
            }
            let Some(unit) = unit.upgrade() else {
                dead.push(handle);
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| unit.tick(&ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(unit = %unit.label(), tick, error = %e, "tick failed");
                }
                Err(_) => {
                    tracing::error!(unit = %unit.label(), tick, "tick panicked");
                }
            }
        }

        if !dead.is_empty() {
            let mut slots = self.slots.write();
            for handle in dead {
                slots.remove(&handle);
            }
        }

        tick
    }

    /// Drives [`Ticker::pulse`] on a tokio interval until [`Ticker::shutdown`].
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let ticker = Arc::clone(self);
        ticker.running.store(true, Ordering::Release);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ticker.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(period_ms = ticker.period.as_millis() as u64, "ticker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !ticker.running.load(Ordering::Acquire) {
                            break;
                        }
                        ticker.pulse(Instant::now());
                    }
                    _ = ticker.shutdown.notified() => break,
                }
            }

            tracing::info!(ticks = ticker.current_tick(), "ticker stopped");
        })
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.shutdown.notify_waiters();
    }
}
