// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffer credit accounting.
//!
//! Two counters gate local-buffer allocation: packet slots and buffer slots.
//! One of each must be held before asking the allocator for a buffer. The
//! counters are shared by every receive context on the engine, so they are
//! atomics with compare-exchange decrement; no negative state is ever
//! observable. Replenishment comes from the external allocator on buffer
//! release.

use core::sync::atomic::{AtomicU32, Ordering};

pub struct CreditPool {
    pkt: AtomicU32,
    buf: AtomicU32,
}

impl CreditPool {
    pub const fn new(pkt: u32, buf: u32) -> Self {
        Self {
            pkt: AtomicU32::new(pkt),
            buf: AtomicU32::new(buf),
        }
    }

    /// Takes one credit from each pool, or neither. Returns whether the take
    /// succeeded.
    pub fn try_take(&self) -> bool {
        if !take_one(&self.pkt) {
            return false;
        }
        if !take_one(&self.buf) {
            // Roll back the packet credit so the pair stays balanced.
            self.pkt.fetch_add(1, Ordering::Release);
            return false;
        }
        true
    }

    /// Returns credits to the pools. Called by the external allocator on
    /// buffer release, and by the receive path when the allocator comes up
    /// empty after a successful take.
    pub fn put(&self, pkt: u32, buf: u32) {
        self.pkt.fetch_add(pkt, Ordering::Release);
        self.buf.fetch_add(buf, Ordering::Release);
    }

    /// Current (packet, buffer) credit counts. Monitoring only; the value is
    /// stale by the time the caller sees it.
    pub fn available(&self) -> (u32, u32) {
        (
            self.pkt.load(Ordering::Relaxed),
            self.buf.load(Ordering::Relaxed),
        )
    }
}

fn take_one(ctr: &AtomicU32) -> bool {
    let mut cur = ctr.load(Ordering::Relaxed);
    while cur > 0 {
        match ctr.compare_exchange_weak(
            cur,
            cur - 1,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return true,
            Err(seen) => cur = seen,
        }
    }
    false
}
