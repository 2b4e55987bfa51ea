// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packet receive/transmit dispatch for the NFP-6000 datapath
//!
//! This crate normalizes packets arriving from three sources (wire/NBI, host
//! PCIe rings, and inter-engine work queues) into a single [`PktMeta`] record,
//! and multiplexes transmission of that record to wire, host, work-queue, and
//! drop destinations with credit-based flow control.
//!
//! Each packet-processing context runs one packet at a time to completion: a
//! receive entry point produces an owned [`PktMeta`], application logic
//! mutates it, and exactly one of [`PktIo::transmit`] or
//! [`PktIo::drop_packet`] consumes it.
//!
//! Everything the dispatch layer touches in hardware -- ingress queues, the
//! buffer allocator, local-buffer header memory, the host descriptor rings,
//! and the reorder service -- sits behind the traits in this module, so the
//! same logic runs against the real intrinsics on-target and against fakes
//! under the host test harness.

#![cfg_attr(not(test), no_std)]

pub mod credit;
pub mod meta;

mod rx;
mod tx;

#[cfg(test)]
pub(crate) mod testutil;

use counters::Count;

use crate::credit::CreditPool;
use crate::meta::{
    CsumFlags, CtmLocation, HostDesc, RawPktMeta, SizeClass, WireDesc,
    WqHandle,
};

pub use crate::meta::PktMeta;

/// Wire (NBI) ingress and egress.
pub trait WireIo {
    /// Pulls one descriptor from the wire ingress queue, suspending the
    /// calling context until one is available.
    fn wire_recv(&mut self) -> WireDesc;

    /// Size class of the local buffers the wire engine (and this engine's
    /// host receive path) allocates packets into.
    fn buffer_size_class(&mut self) -> SizeClass;

    /// Hands a packet directly to the wire egress engine.
    fn wire_send(
        &mut self,
        loc: CtmLocation,
        subsys: u8,
        queue: u16,
        len: u16,
        offset: u16,
        size: SizeClass,
    );

    /// Tells the wire engine to skip a sequence number that will never be
    /// transmitted.
    fn notify_drop_seq(&mut self, reorder_ctx: u8, seq: u16);
}

/// Host (PCIe) descriptor rings.
pub trait HostIo {
    /// Pulls one descriptor from a host ingress queue, suspending the calling
    /// context until one is available.
    fn host_recv(&mut self, queue: u16) -> HostDesc;

    /// Requests one transmit credit for a host egress queue. `false` means
    /// the queue has no room; the packet must be dropped.
    fn host_credit(&mut self, subsys: u8, queue: u16) -> bool;

    fn host_send(&mut self, subsys: u8, queue: u16, desc: &HostDesc);
}

/// The external buffer allocator.
pub trait PktBufs {
    /// Attempts to allocate a local buffer. `None` means the store is
    /// exhausted; the caller retries.
    fn alloc_local(&mut self, size: SizeClass) -> Option<CtmLocation>;

    fn free_local(&mut self, island: u8, pnum: u16);
    fn free_remote(&mut self, mu_handle: u32, size: SizeClass);
}

/// Local buffer header I/O.
///
/// The `stage_*` operations start asynchronous writes into the buffer's
/// header region; `commit` is the barrier that waits for all staged writes to
/// complete.
pub trait PktMem {
    fn stage_meta(&mut self, loc: CtmLocation, meta: &RawPktMeta);
    fn stage_egress_cmd(&mut self, loc: CtmLocation, csum: CsumFlags);
    fn stage_mod_script(&mut self, loc: CtmLocation, offset: u16);
    fn commit(&mut self);

    fn read_meta(&mut self, loc: CtmLocation) -> RawPktMeta;

    /// Copies one 64-byte chunk from the remote buffer into the local buffer
    /// at `byte_offset`.
    fn copy_chunk(&mut self, mu_handle: u32, loc: CtmLocation, byte_offset: u16);
}

/// Inter-engine work queues.
pub trait WorkQueueIo {
    /// Dequeues one packet handle, suspending the calling context until one
    /// is available.
    fn wq_pop(&mut self, queue: u16, queue_addr: u32) -> WqHandle;

    fn wq_push(&mut self, subsys: u8, queue: u16, handle: WqHandle);
}

/// Opaque metadata handed to the reorder service; its contents are the
/// service's business.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReorderMeta(pub [u32; 4]);

/// The external reorder/sequencing service.
///
/// The `build_*` operations assemble destination-specific delivery metadata;
/// `submit` hands the packet's fate to the service, keyed by its reorder
/// context and sequence number.
pub trait Reorder {
    fn build_wire_meta(
        &mut self,
        loc: CtmLocation,
        subsys: u8,
        queue: u16,
        len: u16,
        offset: u16,
        size: SizeClass,
    ) -> ReorderMeta;
    fn build_host_meta(
        &mut self,
        subsys: u8,
        queue: u16,
        desc: &HostDesc,
    ) -> ReorderMeta;
    fn build_wq_meta(
        &mut self,
        subsys: u8,
        queue: u16,
        handle: WqHandle,
    ) -> ReorderMeta;
    fn build_drop_meta(&mut self) -> ReorderMeta;
    fn build_drop_seq_meta(
        &mut self,
        mu_handle: u32,
        size: SizeClass,
    ) -> ReorderMeta;

    fn submit(&mut self, meta: ReorderMeta, reorder_ctx: u8, seq: u16);
}

/// Cooperative yield, used by retry loops so an exhausted resource parks this
/// context instead of starving the engine.
pub trait Yield {
    fn yield_now(&mut self);
}

/// Everything the dispatch layer needs from the embedding firmware, bundled
/// so [`PktIo`] takes a single environment parameter.
pub trait PktIoEnv:
    WireIo + HostIo + PktBufs + PktMem + WorkQueueIo + Reorder + Yield
{
}

impl<T> PktIoEnv for T where
    T: WireIo + HostIo + PktBufs + PktMem + WorkQueueIo + Reorder + Yield
{
}

/// Receive faults. Neither is fatal: the constructed record rides along in
/// the error so the caller can still route it to the drop path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxError {
    /// The wire ingress descriptor carried an error indication.
    WireIngressFault(PktMeta),
    /// The host descriptor failed validation.
    HostDescriptorInvalid(PktMeta),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxError {
    /// The host egress queue refused a transmit credit; the packet has
    /// already been dropped.
    HostCreditDenied,
}

/// Dispatch events, counted per [`PktIo`] instance.
#[derive(Count)]
pub enum PktEvent {
    WireRx,
    WireRxFault,
    HostRx,
    HostRxInvalid,
    QueueRx,
    WireTx,
    HostTx,
    HostTxError,
    QueueTx,
    SeqDrop,
    HostDrop,
    WireDrop,
}

/// One packet-processing context's view of the dispatch layer.
///
/// The credit pool is shared by every context on the engine; the event
/// counters are per-instance so monitoring can tell contexts apart.
pub struct PktIo<'a, E> {
    env: &'a mut E,
    credits: &'a CreditPool,
    events: PktEventCounts,
}

impl<'a, E: PktIoEnv> PktIo<'a, E> {
    pub fn new(env: &'a mut E, credits: &'a CreditPool) -> Self {
        Self {
            env,
            credits,
            events: PktEvent::NEW_COUNTERS,
        }
    }

    /// Event counters for this context, for monitoring code to read out.
    pub fn counters(&self) -> &PktEventCounts {
        &self.events
    }
}
