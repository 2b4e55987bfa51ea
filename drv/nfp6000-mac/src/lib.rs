// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! MAC link control for the NFP-6000
//!
//! The NFP-6000 MACs are shared between many packet-processing contexts, so
//! enabling, disabling, and flushing a port cannot be done with bare register
//! writes from an arbitrary caller.  Instead, a dedicated synchronization
//! agent owns the MAC configuration registers and consumes single-word
//! commands from a cross-island ring; this crate builds those command words,
//! drives the multi-phase RX disable handshake, and decodes per-port link
//! status.
//!
//! All hardware access goes through the [`MacSyncIo`] trait, so the logic
//! here is testable on the host against a scripted fake.

#![cfg_attr(not(test), no_std)]

pub mod cmd;
pub mod link;
pub mod regs;

mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use cmd::SyncCmd;
pub use link::LinkState;

/// Hardware access required by the MAC synchronization layer.
pub trait MacSyncIo {
    /// Reads a 32-bit CSR over the XPB bus.
    fn xpb_read(&mut self, addr: u32) -> u32;

    /// Writes a 32-bit CSR over the XPB bus.
    fn xpb_write(&mut self, addr: u32, value: u32);

    /// Pushes one command word onto the ring consumed by the synchronization
    /// agent, suspending until the ring accepts it.
    fn ring_push(&mut self, word: u32);

    /// Writes a mailbox CSR of the given microengine.
    fn mailbox_write(&mut self, island: u8, me: u8, mailbox: u8, value: u32);

    /// Sleeps for at least `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u32);
}

/// Addresses a single MAC port: which MAC island (0 or 1), which Ethernet
/// core within it (0 or 1), and the port within that core (0-11).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MacPort {
    pub island: u8,
    pub core: u8,
    pub port: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacSyncError {
    /// The synchronization agent did not confirm RX disable on this port
    /// within the polling window.
    RxDisableTimeout { island: u8, core: u8, port: u8 },
}

/// MAC synchronization handle, wrapping some implementation of [`MacSyncIo`].
pub struct MacSync<'a, S> {
    io: &'a mut S,
}

impl<'a, S: MacSyncIo> MacSync<'a, S> {
    pub fn new(io: &'a mut S) -> Self {
        Self { io }
    }
}
