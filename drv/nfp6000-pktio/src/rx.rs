// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packet receive paths: wire, host, and work queue.
//!
//! Each entry point builds an owned [`PktMeta`] from scratch and returns it
//! by value; an ingress fault still returns the constructed record inside
//! the error so the caller can drop it.

use counters::count;
use ringbuf::{ringbuf, ringbuf_entry};

use crate::meta::{CtmLocation, PktMeta, PortId, PortType, SizeClass};
use crate::{PktEvent, PktIo, PktIoEnv, RxError};

/// The remote-to-local prefix copy runs in chunks of this many bytes,
/// starting from the chunk-aligned frame offset.
const COPY_CHUNK: u16 = 64;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    WireRx { port: u16, len: u16 },
    WireRxFault { port: u16 },
    HostRx { queue: u16, len: u16 },
    HostRxInvalid { queue: u16 },
    QueueRx { island: u8, pnum: u16 },
}
ringbuf!(Trace, 32, Trace::None);

impl<E: PktIoEnv> PktIo<'_, E> {
    /// Receives one packet from the wire ingress queue, suspending until a
    /// descriptor arrives.
    ///
    /// A non-zero sequencer assignment in the descriptor marks the packet
    /// sequenced and derives its reorder context; sequencer `n` feeds
    /// context `n * 2 - 1` (even contexts belong to the egress direction).
    pub fn recv_wire(&mut self) -> Result<PktMeta, RxError> {
        let desc = self.env.wire_recv();

        let mut pkt = PktMeta::ZERO;
        pkt.loc = Some(CtmLocation {
            island: desc.island,
            pnum: desc.pnum,
        });
        pkt.size = self.env.buffer_size_class();
        pkt.mu_handle = desc.mu_handle;
        pkt.offset = desc.offset;
        pkt.len = desc.len;
        pkt.len_orig = desc.len;
        pkt.split = desc.split;
        pkt.csum = desc.csum;
        pkt.src = PortId::new(PortType::Wire, desc.meta_type, desc.port);
        if desc.seqr != 0 {
            pkt.sequenced = true;
            pkt.reorder_ctx = desc.seqr * 2 - 1;
            pkt.seq = desc.seq;
        }

        if desc.err {
            count!(self.events, PktEvent::WireRxFault);
            ringbuf_entry!(Trace::WireRxFault { port: desc.port });
            return Err(RxError::WireIngressFault(pkt));
        }
        count!(self.events, PktEvent::WireRx);
        ringbuf_entry!(Trace::WireRx {
            port: desc.port,
            len: desc.len
        });
        Ok(pkt)
    }

    /// Receives one packet from a host ingress queue.
    ///
    /// The local buffer is allocated *before* the descriptor is pulled, and
    /// the allocation retries until it succeeds: nothing is in flight yet,
    /// so this is the one place where parking the context on buffer credit
    /// is safe.
    pub fn recv_host(&mut self, queue: u16) -> Result<PktMeta, RxError> {
        let size = self.env.buffer_size_class();
        let loc = self.alloc_local(size);
        let desc = self.env.host_recv(queue);

        let mut pkt = PktMeta::ZERO;
        pkt.loc = Some(loc);
        pkt.size = size;
        pkt.mu_handle = desc.mu_handle;
        pkt.offset = desc.offset;
        pkt.len = desc.len;
        pkt.len_orig = desc.len;
        pkt.csum = desc.csum;
        pkt.app0 = desc.app0;
        pkt.app1 = desc.app1;
        pkt.src = PortId::new(PortType::Host, 0, queue);

        let end = u32::from(desc.len) + u32::from(desc.offset);
        pkt.split = end > u32::from(size.capacity());

        if desc.invalid {
            count!(self.events, PktEvent::HostRxInvalid);
            ringbuf_entry!(Trace::HostRxInvalid { queue });
            return Err(RxError::HostDescriptorInvalid(pkt));
        }

        // Pull the local prefix out of the remote buffer: chunked copy from
        // the aligned frame start up to whatever fits. A split packet's
        // remainder stays addressable in the remote buffer.
        let bound = end.min(u32::from(size.capacity())) as u16;
        let mut off = desc.offset & !(COPY_CHUNK - 1);
        while off < bound {
            self.env.copy_chunk(desc.mu_handle, loc, off);
            off += COPY_CHUNK;
        }

        count!(self.events, PktEvent::HostRx);
        ringbuf_entry!(Trace::HostRx {
            queue,
            len: desc.len
        });
        Ok(pkt)
    }

    /// Adopts one packet from an inter-engine work queue, suspending until a
    /// handle arrives.
    ///
    /// The record comes back exactly as the sender serialized it, except
    /// that it is adopted unsequenced and pre-routed to the drop path; a
    /// caller that wants to forward it overrides `dst`.
    pub fn recv_queue(&mut self, queue: u16, queue_addr: u32) -> PktMeta {
        let handle = self.env.wq_pop(queue, queue_addr);
        let loc = CtmLocation {
            island: handle.island,
            pnum: handle.pnum,
        };
        let raw = self.env.read_meta(loc);
        let mut pkt = PktMeta::from_raw(&raw);
        pkt.sequenced = false;
        pkt.dst = PortId::DROP_HOST;

        count!(self.events, PktEvent::QueueRx);
        ringbuf_entry!(Trace::QueueRx {
            island: handle.island,
            pnum: handle.pnum
        });
        pkt
    }

    /// Allocates a local buffer, retrying with cooperative yield until both
    /// a credit pair and a buffer are obtained.
    fn alloc_local(&mut self, size: SizeClass) -> CtmLocation {
        loop {
            if self.credits.try_take() {
                if let Some(loc) = self.env.alloc_local(size) {
                    return loc;
                }
                // Another engine drained the store between our credit take
                // and the allocation; give the credits back and retry.
                self.credits.put(1, 1);
            }
            self.env.yield_now();
        }
    }
}
