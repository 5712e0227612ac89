// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delayed eviction of installed flows.
//!
//! Each scheduled flow carries a countdown. A clock thread ticks every
//! countdown by a fixed resolution; when one reaches zero the flow is taken
//! out of the flow table and its forwarding state is revoked. `tick` is
//! public so the clock can also be driven by hand.

use crate::flow::FlowTable;
use crate::log::wpr_log;
use crate::platform::Installer;
use crate::types::{FlowKey, InstalledPath};
use crate::MOD_TIMEOUT;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::Duration;
use wpr_common::lock;

pub struct TimeoutScheduler<I: Installer + Send + Sync + 'static> {
    pub resolution: Duration,
    evictor: Arc<Evictor<I>>,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

struct Evictor<I> {
    /// Time left before each flow is evicted.
    deadlines: Mutex<BTreeMap<FlowKey, Duration>>,
    table: FlowTable,
    installer: Arc<I>,
    log: Logger,
}

impl<I: Installer + Send + Sync + 'static> TimeoutScheduler<I> {
    pub fn new(
        resolution: Duration,
        table: FlowTable,
        installer: Arc<I>,
        log: Logger,
    ) -> Self {
        Self {
            resolution,
            evictor: Arc::new(Evictor {
                deadlines: Mutex::new(BTreeMap::new()),
                table,
                installer,
                log,
            }),
            shutdown: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        }
    }

    /// Start the clock thread. Calling this more than once has no effect.
    /// A scheduler is single use: once stopped it cannot be restarted.
    pub fn start(&self) {
        let mut handle = lock!(self.join_handle);
        if handle.is_some() {
            return;
        }
        if self.shutdown.load(Ordering::SeqCst) {
            wpr_log!(self.evictor.log, warn, MOD_TIMEOUT,
                "eviction clock already stopped, not starting");
            return;
        }
        let evictor = self.evictor.clone();
        let shutdown = self.shutdown.clone();
        let resolution = self.resolution;
        *handle = Some(spawn(move || loop {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            evictor.tick(resolution);
            sleep(resolution);
        }));
    }

    /// Stop the clock thread and wait for it to exit. Pending deadlines are
    /// kept; use `drain` to evict them.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = lock!(self.join_handle).take() {
            if h.join().is_err() {
                wpr_log!(self.evictor.log, error, MOD_TIMEOUT,
                    "eviction clock thread panicked");
            }
        }
    }

    /// Evict `key` after `delay`, replacing any deadline it already has. A
    /// zero delay, or a scheduler that has been stopped, evicts immediately
    /// on the calling thread.
    pub fn schedule(&self, key: FlowKey, delay: Duration) {
        {
            // checked under the deadline lock so a concurrent stop and drain
            // either sees this deadline or makes us evict inline
            let mut deadlines = lock!(self.evictor.deadlines);
            if !delay.is_zero() && !self.shutdown.load(Ordering::SeqCst) {
                wpr_log!(self.evictor.log, debug, MOD_TIMEOUT,
                    "evict in {:?}", delay;
                    "flow" => key.to_string()
                );
                deadlines.insert(key, delay);
                return;
            }
            deadlines.remove(&key);
        }
        self.evictor.evict(&key);
    }

    /// Drop the deadline for `key` without evicting it. Returns whether a
    /// deadline was pending.
    pub fn cancel(&self, key: &FlowKey) -> bool {
        lock!(self.evictor.deadlines).remove(key).is_some()
    }

    pub fn remaining(&self, key: &FlowKey) -> Option<Duration> {
        lock!(self.evictor.deadlines).get(key).copied()
    }

    pub fn pending(&self) -> usize {
        lock!(self.evictor.deadlines).len()
    }

    /// Advance every deadline by `elapsed`, evicting the ones that expire.
    pub fn tick(&self, elapsed: Duration) {
        self.evictor.tick(elapsed);
    }

    /// Evict every flow in the table now and forget all deadlines. Returns
    /// the number of flows evicted.
    pub fn drain(&self) -> usize {
        lock!(self.evictor.deadlines).clear();
        let flows = self.evictor.table.drain();
        let n = flows.len();
        for (key, path) in flows {
            self.evictor.revoke(&key, &path);
        }
        wpr_log!(self.evictor.log, info, MOD_TIMEOUT,
            "drained {} flows", n);
        n
    }
}

impl<I: Installer + Send + Sync + 'static> Drop for TimeoutScheduler<I> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl<I: Installer> Evictor<I> {
    fn tick(&self, elapsed: Duration) {
        let mut expired = Vec::new();
        lock!(self.deadlines).retain(|key, left| {
            *left = left.saturating_sub(elapsed);
            if left.is_zero() {
                expired.push(key.clone());
                false
            } else {
                true
            }
        });
        for key in expired {
            self.evict(&key);
        }
    }

    fn evict(&self, key: &FlowKey) -> bool {
        match self.table.remove(key) {
            Some(path) => {
                self.revoke(key, &path);
                true
            }
            None => {
                wpr_log!(self.log, debug, MOD_TIMEOUT,
                    "flow already evicted";
                    "flow" => key.to_string()
                );
                false
            }
        }
    }

    /// The table entry is already gone by the time this runs, so a failed
    /// revoke only leaves stale state in the data plane, never in the table.
    fn revoke(&self, key: &FlowKey, path: &InstalledPath) {
        match self.installer.revoke(path) {
            Ok(()) => {
                wpr_log!(self.log, info, MOD_TIMEOUT, "evicted flow";
                    "flow" => key.to_string(),
                    "intent" => path.id.to_string()
                );
            }
            Err(e) => {
                wpr_log!(self.log, warn, MOD_TIMEOUT,
                    "revoke failed: {}", e;
                    "flow" => key.to_string(),
                    "intent" => path.id.to_string()
                );
            }
        }
    }
}
