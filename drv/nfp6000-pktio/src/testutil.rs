// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A scripted, recording environment fake shared by the receive and
//! transmit unit tests.
//!
//! Inputs (descriptors, allocation results, queue contents) are loaded into
//! the deques before the test runs; every collaborator call the dispatch
//! layer makes is appended to `calls` for the test to assert on.

use std::collections::{HashMap, VecDeque};

use crate::meta::{
    CsumFlags, CtmLocation, HostDesc, RawPktMeta, SizeClass, WireDesc,
    WqHandle,
};
use crate::{
    HostIo, PktBufs, PktMem, Reorder, ReorderMeta, WireIo, WorkQueueIo, Yield,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WireRecv,
    HostRecv { queue: u16 },
    WqPop { queue: u16 },
    AllocLocal(SizeClass),
    FreeLocal { island: u8, pnum: u16 },
    FreeRemote { mu: u32, size: SizeClass },
    StageMeta(CtmLocation),
    StageEgressCmd(CtmLocation, CsumFlags),
    StageModScript(CtmLocation, u16),
    Commit,
    CopyChunk { mu: u32, off: u16 },
    WireSend { queue: u16, len: u16, offset: u16 },
    NotifyDropSeq { ctx: u8, seq: u16 },
    HostCredit { queue: u16 },
    HostSend { queue: u16, desc: HostDesc },
    WqPush { queue: u16, handle: WqHandle },
    Submit { meta: ReorderMeta, ctx: u8, seq: u16 },
    Yield,
}

pub struct FakeEnv {
    pub size: SizeClass,
    pub wire_rx: VecDeque<WireDesc>,
    pub host_rx: VecDeque<HostDesc>,
    pub wq: VecDeque<WqHandle>,
    pub alloc: VecDeque<Option<CtmLocation>>,
    pub meta_mem: HashMap<(u8, u16), RawPktMeta>,
    pub credit_ok: bool,
    pub calls: Vec<Call>,
}

impl FakeEnv {
    // Tags identifying which `build_*` operation produced a fake
    // `ReorderMeta`, stored in its first word.
    pub const META_WIRE: u32 = 1;
    pub const META_HOST: u32 = 2;
    pub const META_WQ: u32 = 3;
    pub const META_DROP: u32 = 4;
    pub const META_DROP_SEQ: u32 = 5;

    pub fn new() -> Self {
        Self {
            size: SizeClass::C2k,
            wire_rx: VecDeque::new(),
            host_rx: VecDeque::new(),
            wq: VecDeque::new(),
            alloc: VecDeque::new(),
            meta_mem: HashMap::new(),
            credit_ok: true,
            calls: Vec::new(),
        }
    }
}

impl WireIo for FakeEnv {
    fn wire_recv(&mut self) -> WireDesc {
        self.calls.push(Call::WireRecv);
        self.wire_rx.pop_front().expect("no scripted wire descriptor")
    }

    fn buffer_size_class(&mut self) -> SizeClass {
        self.size
    }

    fn wire_send(
        &mut self,
        _loc: CtmLocation,
        _subsys: u8,
        queue: u16,
        len: u16,
        offset: u16,
        _size: SizeClass,
    ) {
        self.calls.push(Call::WireSend { queue, len, offset });
    }

    fn notify_drop_seq(&mut self, reorder_ctx: u8, seq: u16) {
        self.calls.push(Call::NotifyDropSeq {
            ctx: reorder_ctx,
            seq,
        });
    }
}

impl HostIo for FakeEnv {
    fn host_recv(&mut self, queue: u16) -> HostDesc {
        self.calls.push(Call::HostRecv { queue });
        self.host_rx.pop_front().expect("no scripted host descriptor")
    }

    fn host_credit(&mut self, _subsys: u8, queue: u16) -> bool {
        self.calls.push(Call::HostCredit { queue });
        self.credit_ok
    }

    fn host_send(&mut self, _subsys: u8, queue: u16, desc: &HostDesc) {
        self.calls.push(Call::HostSend { queue, desc: *desc });
    }
}

impl PktBufs for FakeEnv {
    fn alloc_local(&mut self, size: SizeClass) -> Option<CtmLocation> {
        self.calls.push(Call::AllocLocal(size));
        self.alloc.pop_front().unwrap_or(Some(CtmLocation {
            island: 32,
            pnum: 0xff,
        }))
    }

    fn free_local(&mut self, island: u8, pnum: u16) {
        self.calls.push(Call::FreeLocal { island, pnum });
    }

    fn free_remote(&mut self, mu_handle: u32, size: SizeClass) {
        self.calls.push(Call::FreeRemote {
            mu: mu_handle,
            size,
        });
    }
}

impl PktMem for FakeEnv {
    fn stage_meta(&mut self, loc: CtmLocation, meta: &RawPktMeta) {
        self.calls.push(Call::StageMeta(loc));
        self.meta_mem.insert((loc.island, loc.pnum), *meta);
    }

    fn stage_egress_cmd(&mut self, loc: CtmLocation, csum: CsumFlags) {
        self.calls.push(Call::StageEgressCmd(loc, csum));
    }

    fn stage_mod_script(&mut self, loc: CtmLocation, offset: u16) {
        self.calls.push(Call::StageModScript(loc, offset));
    }

    fn commit(&mut self) {
        self.calls.push(Call::Commit);
    }

    fn read_meta(&mut self, loc: CtmLocation) -> RawPktMeta {
        self.meta_mem
            .get(&(loc.island, loc.pnum))
            .copied()
            .unwrap_or(RawPktMeta([0; 8]))
    }

    fn copy_chunk(
        &mut self,
        mu_handle: u32,
        _loc: CtmLocation,
        byte_offset: u16,
    ) {
        self.calls.push(Call::CopyChunk {
            mu: mu_handle,
            off: byte_offset,
        });
    }
}

impl WorkQueueIo for FakeEnv {
    fn wq_pop(&mut self, queue: u16, _queue_addr: u32) -> WqHandle {
        self.calls.push(Call::WqPop { queue });
        self.wq.pop_front().expect("no scripted work-queue handle")
    }

    fn wq_push(&mut self, _subsys: u8, queue: u16, handle: WqHandle) {
        self.calls.push(Call::WqPush { queue, handle });
        // Make pushed handles visible to a subsequent pop, so transmit and
        // receive can be exercised back to back.
        self.wq.push_back(handle);
    }
}

impl Reorder for FakeEnv {
    fn build_wire_meta(
        &mut self,
        loc: CtmLocation,
        _subsys: u8,
        _queue: u16,
        len: u16,
        offset: u16,
        _size: SizeClass,
    ) -> ReorderMeta {
        ReorderMeta([
            Self::META_WIRE,
            loc.pnum.into(),
            len.into(),
            offset.into(),
        ])
    }

    fn build_host_meta(
        &mut self,
        _subsys: u8,
        queue: u16,
        desc: &HostDesc,
    ) -> ReorderMeta {
        ReorderMeta([Self::META_HOST, queue.into(), desc.mu_handle, 0])
    }

    fn build_wq_meta(
        &mut self,
        _subsys: u8,
        queue: u16,
        handle: WqHandle,
    ) -> ReorderMeta {
        ReorderMeta([Self::META_WQ, queue.into(), handle.pnum.into(), 0])
    }

    fn build_drop_meta(&mut self) -> ReorderMeta {
        ReorderMeta([Self::META_DROP, 0, 0, 0])
    }

    fn build_drop_seq_meta(
        &mut self,
        mu_handle: u32,
        size: SizeClass,
    ) -> ReorderMeta {
        ReorderMeta([Self::META_DROP_SEQ, mu_handle, size as u32, 0])
    }

    fn submit(&mut self, meta: ReorderMeta, reorder_ctx: u8, seq: u16) {
        self.calls.push(Call::Submit {
            meta,
            ctx: reorder_ctx,
            seq,
        });
    }
}

impl Yield for FakeEnv {
    fn yield_now(&mut self) {
        self.calls.push(Call::Yield);
    }
}
