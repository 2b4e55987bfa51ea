// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted [`MacSyncIo`] fake shared by the unit tests.

use crate::{cmd, regs, MacSyncIo, SyncCmd};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Read(u32),
    Write(u32, u32),
    Push(u32),
    Mbox(u8, u8, u8, u32),
    Sleep(u32),
}

/// Register-map fake.  Reads consult `regs` (absent registers read as zero)
/// with two behavioral hooks layered on top:
///
/// - when `mirror_inhibit_done` is set, `EQ_INHIBIT_DONE` reads back the
///   current `EQ_INHIBIT` value, modeling hardware that quiesces instantly;
/// - once a `DisableRx` command has been pushed, `CMD_CONFIG` reads report
///   RX enabled until `rx_disable_latency` reads have elapsed (or forever,
///   for `None`).
#[derive(Default)]
pub struct FakeMac {
    pub regs: HashMap<u32, u32>,
    pub ops: Vec<Op>,
    pub mirror_inhibit_done: bool,
    pub rx_disable_latency: Option<u32>,
    disable_seen: bool,
    cmd_config_reads: u32,
}

impl FakeMac {
    /// A fake whose hardware quiesces instantly and whose agent disables RX
    /// after `latency` confirmation reads.
    pub fn responsive(latency: u32) -> Self {
        Self {
            mirror_inhibit_done: true,
            rx_disable_latency: Some(latency),
            ..Self::default()
        }
    }

    /// A fake whose hardware quiesces but whose agent never disables RX.
    pub fn unresponsive() -> Self {
        Self {
            mirror_inhibit_done: true,
            rx_disable_latency: None,
            ..Self::default()
        }
    }

    pub fn sleeps(&self, ms: u32) -> usize {
        self.ops.iter().filter(|op| **op == Op::Sleep(ms)).count()
    }

    fn is_eth_dev(addr: u32) -> bool {
        let dev = (addr >> 16) & 0xff;
        dev == regs::ETH_CORE_DEV[0] || dev == regs::ETH_CORE_DEV[1]
    }
}

impl MacSyncIo for FakeMac {
    fn xpb_read(&mut self, addr: u32) -> u32 {
        self.ops.push(Op::Read(addr));
        if self.mirror_inhibit_done
            && (addr >> 16) & 0xff == regs::MAC_CSR_DEV
            && addr & 0xffff == regs::EQ_INHIBIT_DONE
        {
            let inhibit = addr - (regs::EQ_INHIBIT_DONE - regs::EQ_INHIBIT);
            return self.regs.get(&inhibit).copied().unwrap_or(0);
        }
        if Self::is_eth_dev(addr) && addr & 0x7f == regs::ETH_CMD_CONFIG {
            if self.disable_seen {
                self.cmd_config_reads += 1;
                if let Some(n) = self.rx_disable_latency {
                    if self.cmd_config_reads > n {
                        return 0;
                    }
                }
            }
            return regs::ETH_CMD_CONFIG_RX_ENA;
        }
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn xpb_write(&mut self, addr: u32, value: u32) {
        self.ops.push(Op::Write(addr, value));
        self.regs.insert(addr, value);
    }

    fn ring_push(&mut self, word: u32) {
        self.ops.push(Op::Push(word));
        if let Some((_, SyncCmd::DisableRx, _)) = cmd::decode(word) {
            self.disable_seen = true;
        }
    }

    fn mailbox_write(&mut self, island: u8, me: u8, mailbox: u8, value: u32) {
        self.ops.push(Op::Mbox(island, me, mailbox, value));
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.ops.push(Op::Sleep(ms));
    }
}
