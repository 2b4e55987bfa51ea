// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packet transmit dispatch and the drop handler.
//!
//! [`PktIo::transmit`] consumes the record and dispatches on the destination
//! type encoded in `dst`. Whatever reorder metadata the destination path
//! assembles is submitted at a single point at the end of dispatch, keyed by
//! the packet's `(reorder_ctx, seq)` pair -- that submission is the hand-off
//! of the packet's fate to the external ordering service.

use counters::count;
use ringbuf::{ringbuf, ringbuf_entry};

use crate::meta::{HostDesc, PktMeta, PortType, WqHandle};
use crate::{PktEvent, PktIo, PktIoEnv, ReorderMeta, TxError};

/// The wire egress script inserts a 4-byte tag ahead of the frame; the
/// offset/length adjustment accounts for it.
const WIRE_TX_PREPEND: u16 = 4;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    WireTx { queue: u16, len: u16 },
    HostTx { queue: u16 },
    HostCreditDenied { queue: u16 },
    WqTx { queue: u16 },
    SeqDrop,
    Drop { island: u8, pnum: u16 },
}
ringbuf!(Trace, 32, Trace::None);

impl<E: PktIoEnv> PktIo<'_, E> {
    /// Dispatches a populated record to its destination, consuming it.
    ///
    /// Dispatching to the undefined destination type panics: that is a
    /// contract violation in the calling code, not a runtime condition.
    pub fn transmit(&mut self, mut pkt: PktMeta) -> Result<(), TxError> {
        let ty = match pkt.dst.ty() {
            Some(ty) => ty,
            None => panic!("invalid destination {:#06x}", pkt.dst.bits()),
        };
        let subsys = pkt.dst.subsys();
        let queue = pkt.dst.queue();

        let mut result = Ok(());
        let meta = match ty {
            // No destination: nothing to send, nothing to free, and the
            // reorder service is not consulted.
            PortType::None => return Ok(()),

            PortType::Wire => {
                let loc = match pkt.loc {
                    Some(loc) => loc,
                    None => panic!("wire tx without local buffer"),
                };
                pkt.offset -= WIRE_TX_PREPEND;
                pkt.len += WIRE_TX_PREPEND;
                // Three writes land in the buffer header: the updated
                // record, the egress command word carrying the checksum
                // offload flags, and the header-modification script at the
                // adjusted offset. All must complete before the packet is
                // handed off.
                self.env.stage_meta(loc, &pkt.to_raw());
                self.env.stage_egress_cmd(loc, pkt.csum);
                self.env.stage_mod_script(loc, pkt.offset);
                self.env.commit();

                count!(self.events, PktEvent::WireTx);
                ringbuf_entry!(Trace::WireTx {
                    queue,
                    len: pkt.len
                });
                if pkt.sequenced {
                    Some(self.env.build_wire_meta(
                        loc, subsys, queue, pkt.len, pkt.offset, pkt.size,
                    ))
                } else {
                    self.env.wire_send(
                        loc, subsys, queue, pkt.len, pkt.offset, pkt.size,
                    );
                    None
                }
            }

            PortType::Host => {
                if !self.env.host_credit(subsys, queue) {
                    // Flow-control rejection: drop immediately. A sequenced
                    // packet's drop notification still reaches the reorder
                    // service through the common submit point below.
                    let meta = self.drop_inner(&pkt);
                    count!(self.events, PktEvent::HostTxError);
                    ringbuf_entry!(Trace::HostCreditDenied { queue });
                    result = Err(TxError::HostCreditDenied);
                    meta
                } else {
                    let desc = HostDesc {
                        mu_handle: pkt.mu_handle,
                        offset: pkt.offset,
                        len: pkt.len,
                        app0: pkt.app0,
                        app1: pkt.app1,
                        csum: pkt.csum,
                        invalid: false,
                    };
                    count!(self.events, PktEvent::HostTx);
                    ringbuf_entry!(Trace::HostTx { queue });
                    if pkt.sequenced {
                        Some(self.env.build_host_meta(subsys, queue, &desc))
                    } else {
                        self.env.host_send(subsys, queue, &desc);
                        None
                    }
                }
            }

            PortType::WorkQ => {
                let loc = match pkt.loc {
                    Some(loc) => loc,
                    None => panic!("work-queue tx without local buffer"),
                };
                // The full record rides in the buffer header; only the
                // lightweight handle goes through the queue.
                self.env.stage_meta(loc, &pkt.to_raw());
                self.env.commit();
                let handle = WqHandle {
                    island: loc.island,
                    pnum: loc.pnum,
                };
                count!(self.events, PktEvent::QueueTx);
                ringbuf_entry!(Trace::WqTx { queue });
                if pkt.sequenced {
                    Some(self.env.build_wq_meta(subsys, queue, handle))
                } else {
                    self.env.wq_push(subsys, queue, handle);
                    None
                }
            }

            PortType::DropSeq => {
                // The reorder service owns the buffers from here; nothing
                // is freed locally.
                count!(self.events, PktEvent::SeqDrop);
                ringbuf_entry!(Trace::SeqDrop);
                Some(self.env.build_drop_seq_meta(pkt.mu_handle, pkt.size))
            }

            PortType::DropHost => {
                count!(self.events, PktEvent::HostDrop);
                self.drop_inner(&pkt)
            }

            PortType::DropWire => {
                // The wire engine has to skip this packet's slot in the
                // sequence space before the buffers go away.
                self.env.notify_drop_seq(pkt.reorder_ctx, pkt.seq);
                count!(self.events, PktEvent::WireDrop);
                self.drop_inner(&pkt)
            }
        };

        if let Some(meta) = meta {
            self.env.submit(meta, pkt.reorder_ctx, pkt.seq);
        }
        result
    }

    /// Discards a record, releasing both of its buffers and notifying the
    /// reorder service if the packet was sequenced.
    pub fn drop_packet(&mut self, pkt: PktMeta) {
        if let Some(meta) = self.drop_inner(&pkt) {
            self.env.submit(meta, pkt.reorder_ctx, pkt.seq);
        }
    }

    /// The shared cleanup path: releases the remote buffer, frees the local
    /// slot if the record has one, and assembles the drop notification for a
    /// sequenced packet. Runs to completion; the frees are fire-and-forget
    /// hardware operations with no failure path.
    fn drop_inner(&mut self, pkt: &PktMeta) -> Option<ReorderMeta> {
        self.env.free_remote(pkt.mu_handle, pkt.size);
        if let Some(loc) = pkt.loc {
            // An unsequenced packet frees through island 0 -- the
            // convention for packets whose buffer lives on a remote
            // ("virtual") island.
            let island = if pkt.sequenced { loc.island } else { 0 };
            self.env.free_local(island, loc.pnum);
            ringbuf_entry!(Trace::Drop {
                island: loc.island,
                pnum: loc.pnum
            });
        }
        if pkt.sequenced {
            Some(self.env.build_drop_meta())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::credit::CreditPool;
    use crate::meta::{
        CsumFlags, CtmLocation, PktMeta, PortId, PortType, SizeClass,
    };
    use crate::testutil::{Call, FakeEnv};
    use crate::{PktIo, ReorderMeta, TxError};
    use core::sync::atomic::Ordering;

    fn wire_pkt() -> PktMeta {
        PktMeta {
            loc: Some(CtmLocation {
                island: 32,
                pnum: 0x10,
            }),
            size: SizeClass::C2k,
            mu_handle: 0xcafe_0000,
            offset: 64,
            len: 1200,
            len_orig: 1200,
            csum: CsumFlags::L4_PRESENT | CsumFlags::L4_OK,
            dst: PortId::new(PortType::Wire, 0, 2),
            ..PktMeta::ZERO
        }
    }

    #[test]
    fn wire_tx_stages_commits_and_sends() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(wire_pkt()).unwrap();
        assert_eq!(io.counters().WireTx.load(Ordering::Relaxed), 1);
        drop(io);

        let loc = CtmLocation {
            island: 32,
            pnum: 0x10,
        };
        // The tag adjustment shows up in the staged script and the send.
        assert_eq!(
            env.calls,
            vec![
                Call::StageMeta(loc),
                Call::StageEgressCmd(
                    loc,
                    CsumFlags::L4_PRESENT | CsumFlags::L4_OK
                ),
                Call::StageModScript(loc, 60),
                Call::Commit,
                Call::WireSend {
                    queue: 2,
                    len: 1204,
                    offset: 60,
                },
            ]
        );
    }

    #[test]
    fn wire_tx_sequenced_defers_to_reorder() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(PktMeta {
            sequenced: true,
            reorder_ctx: 5,
            seq: 0x31,
            ..wire_pkt()
        })
        .unwrap();
        drop(io);

        assert!(!env
            .calls
            .iter()
            .any(|c| matches!(c, Call::WireSend { .. })));
        let Some(Call::Submit { meta, ctx, seq }) = env.calls.last() else {
            panic!("no submission: {:?}", env.calls);
        };
        assert_eq!(meta.0[0], FakeEnv::META_WIRE);
        assert_eq!(*ctx, 5);
        assert_eq!(*seq, 0x31);
    }

    fn host_pkt() -> PktMeta {
        PktMeta {
            loc: Some(CtmLocation {
                island: 32,
                pnum: 0x20,
            }),
            size: SizeClass::C1k,
            mu_handle: 0xd00d_0000,
            offset: 128,
            len: 700,
            len_orig: 700,
            app0: 0xa,
            app1: 0xb,
            dst: PortId::new(PortType::Host, 1, 4),
            ..PktMeta::ZERO
        }
    }

    #[test]
    fn host_tx_copies_app_fields_into_descriptor() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(host_pkt()).unwrap();
        assert_eq!(io.counters().HostTx.load(Ordering::Relaxed), 1);
        drop(io);

        let Some(Call::HostSend { queue, desc }) = env.calls.last() else {
            panic!("no host send: {:?}", env.calls);
        };
        assert_eq!(*queue, 4);
        assert_eq!(desc.app0, 0xa);
        assert_eq!(desc.app1, 0xb);
        assert_eq!(desc.len, 700);
    }

    #[test]
    fn host_tx_credit_denied_drops_and_fails() {
        let mut env = FakeEnv::new();
        env.credit_ok = false;
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        assert_eq!(io.transmit(host_pkt()), Err(TxError::HostCreditDenied));
        assert_eq!(io.counters().HostTxError.load(Ordering::Relaxed), 1);
        assert_eq!(io.counters().HostTx.load(Ordering::Relaxed), 0);
        drop(io);

        // Both buffers released exactly once; nothing sent.
        let frees_remote = env
            .calls
            .iter()
            .filter(|c| matches!(c, Call::FreeRemote { .. }))
            .count();
        let frees_local = env
            .calls
            .iter()
            .filter(|c| matches!(c, Call::FreeLocal { .. }))
            .count();
        assert_eq!(frees_remote, 1);
        assert_eq!(frees_local, 1);
        assert!(!env
            .calls
            .iter()
            .any(|c| matches!(c, Call::HostSend { .. })));
    }

    #[test]
    fn host_tx_credit_denied_sequenced_still_notifies_reorder() {
        let mut env = FakeEnv::new();
        env.credit_ok = false;
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        let r = io.transmit(PktMeta {
            sequenced: true,
            reorder_ctx: 1,
            seq: 9,
            ..host_pkt()
        });
        assert_eq!(r, Err(TxError::HostCreditDenied));
        drop(io);

        let Some(Call::Submit { meta, ctx, seq }) = env.calls.last() else {
            panic!("no submission: {:?}", env.calls);
        };
        assert_eq!(meta.0[0], FakeEnv::META_DROP);
        assert_eq!((*ctx, *seq), (1, 9));
    }

    #[test]
    fn wq_tx_round_trips_through_receive() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);

        let sent = PktMeta {
            loc: Some(CtmLocation {
                island: 33,
                pnum: 0x55,
            }),
            size: SizeClass::C2k,
            mu_handle: 0xfeed_f00d,
            offset: 32,
            len: 256,
            len_orig: 256,
            app0: 1,
            app1: 2,
            dst: PortId::new(PortType::WorkQ, 0, 7),
            ..PktMeta::ZERO
        };

        let mut io = PktIo::new(&mut env, &pool);
        io.transmit(sent).unwrap();
        let got = io.recv_queue(7, 0x8000_0000);
        // Byte-identical except the forced fields.
        assert_eq!(
            got,
            PktMeta {
                sequenced: false,
                dst: PortId::DROP_HOST,
                ..sent
            }
        );
    }

    #[test]
    fn none_destination_is_a_no_op() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(PktMeta {
            dst: PortId::new(PortType::None, 0, 0),
            ..host_pkt()
        })
        .unwrap();
        drop(io);
        assert!(env.calls.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid destination")]
    fn undefined_destination_type_panics() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        let _ = io.transmit(PktMeta {
            dst: PortId::from_bits(7 << 13),
            ..host_pkt()
        });
    }

    #[test]
    fn drop_seq_frees_nothing_and_notifies() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(PktMeta {
            sequenced: true,
            reorder_ctx: 3,
            seq: 2,
            dst: PortId::new(PortType::DropSeq, 0, 0),
            ..host_pkt()
        })
        .unwrap();
        drop(io);

        assert!(!env.calls.iter().any(|c| matches!(
            c,
            Call::FreeRemote { .. } | Call::FreeLocal { .. }
        )));
        let Some(Call::Submit { meta, .. }) = env.calls.last() else {
            panic!("no submission");
        };
        assert_eq!(meta.0[0], FakeEnv::META_DROP_SEQ);
    }

    #[test]
    fn drop_wire_notifies_wire_engine_first() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(PktMeta {
            sequenced: true,
            reorder_ctx: 5,
            seq: 40,
            dst: PortId::new(PortType::DropWire, 0, 0),
            ..wire_pkt()
        })
        .unwrap();
        drop(io);

        assert_eq!(
            env.calls.first(),
            Some(&Call::NotifyDropSeq { ctx: 5, seq: 40 })
        );
    }

    #[test]
    fn unsequenced_drop_frees_local_through_island_zero() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.drop_packet(host_pkt());
        drop(io);

        assert!(env.calls.contains(&Call::FreeLocal {
            island: 0,
            pnum: 0x20
        }));
        // Unsequenced: no reorder notification.
        assert!(!env.calls.iter().any(|c| matches!(c, Call::Submit { .. })));
    }

    #[test]
    fn sequenced_drop_frees_local_through_its_island() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.drop_packet(PktMeta {
            sequenced: true,
            reorder_ctx: 1,
            seq: 8,
            ..host_pkt()
        });
        drop(io);

        assert!(env.calls.contains(&Call::FreeLocal {
            island: 32,
            pnum: 0x20
        }));
        let Some(Call::Submit { meta, ctx, seq }) = env.calls.last() else {
            panic!("no submission");
        };
        assert_eq!(meta.0[0], FakeEnv::META_DROP);
        assert_eq!((*ctx, *seq), (1, 8));
    }

    #[test]
    fn submission_key_is_context_and_sequence() {
        let mut env = FakeEnv::new();
        let pool = CreditPool::new(4, 4);
        let mut io = PktIo::new(&mut env, &pool);

        io.transmit(PktMeta {
            sequenced: true,
            reorder_ctx: 7,
            seq: 0x3ff,
            ..wire_pkt()
        })
        .unwrap();
        drop(io);

        assert!(env.calls.contains(&Call::Submit {
            meta: ReorderMeta([
                FakeEnv::META_WIRE,
                0x10,
                1204,
                60
            ]),
            ctx: 7,
            seq: 0x3ff
        }));
    }
}
