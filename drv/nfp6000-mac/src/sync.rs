// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Command issue and the RX disable handshake

use crate::{cmd, regs, MacPort, MacSync, MacSyncError, MacSyncIo, SyncCmd};
use ringbuf::{ringbuf, ringbuf_entry};

/// Confirmation polls after asking the agent to disable RX.
const RX_DISABLE_TRIES: u32 = 10;

/// Delay between confirmation polls, in milliseconds.
const RX_DISABLE_POLL_MS: u32 = 10;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Issue(u32),
    InhibitSet { island: u8, mask: u32 },
    InhibitClear { island: u8, mask: u32 },
    RxDisabled { island: u8, core: u8, port: u8 },
    RxDisableTimeout { island: u8, core: u8, port: u8 },
    AgentStart { island: u8, me: u8 },
}

ringbuf!(Trace, 16, Trace::None);

impl<S: MacSyncIo> MacSync<'_, S> {
    /// Pushes one command word onto the agent's ring.
    pub fn issue(&mut self, port: MacPort, cmd: SyncCmd, recache: bool) {
        let word = cmd::encode(port, cmd, recache);
        ringbuf_entry!(Trace::Issue(word));
        self.io.ring_push(word);
    }

    /// Asks the agent to re-read the port's configuration from the MAC CSRs.
    pub fn recache(&mut self, port: MacPort) {
        self.issue(port, SyncCmd::Recache, true);
    }

    pub fn enable_rx(&mut self, port: MacPort) {
        self.issue(port, SyncCmd::EnableRx, false);
    }

    pub fn enable_tx_flush(&mut self, port: MacPort) {
        self.issue(port, SyncCmd::EnableTxFlush, false);
    }

    pub fn disable_tx_flush(&mut self, port: MacPort) {
        self.issue(port, SyncCmd::DisableTxFlush, false);
    }

    /// Disables RX on a port, quiescing its enqueue lanes first so that no
    /// packet is cut off mid-flight.
    ///
    /// `num_lanes` is the number of MAC lanes the port occupies (more than
    /// one for bonded high-speed modes).  The enqueue-inhibit register is
    /// shared by all ports on the island and is updated read-modify-write,
    /// so concurrent callers must serialize around this function.
    pub fn disable_rx(&mut self, port: MacPort, num_lanes: u8) -> Result<(), MacSyncError> {
        let shift = u32::from(port.core) * u32::from(regs::PORTS_PER_CORE) + u32::from(port.port);
        let mask = ((1u32 << num_lanes) - 1) << shift;
        let inhibit = regs::mac_csr(port.island, regs::EQ_INHIBIT);
        let done = regs::mac_csr(port.island, regs::EQ_INHIBIT_DONE);

        // 1.  Inhibit enqueue on the port's lanes.
        let v = self.io.xpb_read(inhibit);
        self.io.xpb_write(inhibit, v | mask);
        ringbuf_entry!(Trace::InhibitSet {
            island: port.island,
            mask
        });

        // 2.  Wait for the hardware to acknowledge that the lanes have
        //     drained.  Unbounded: the acknowledgement is a hardware
        //     guarantee, not an agent response.
        while self.io.xpb_read(done) & mask != mask {
            self.io.sleep_ms(1);
        }

        // 3.  Ask the agent to disable RX, then poll for confirmation.
        self.issue(port, SyncCmd::DisableRx, false);
        let mut confirmed = false;
        for _ in 0..RX_DISABLE_TRIES {
            if !self.rx_enabled(port) {
                confirmed = true;
                break;
            }
            self.io.sleep_ms(RX_DISABLE_POLL_MS);
        }

        // 4.  Drop the inhibit bits whether or not the agent confirmed;
        //     leaving lanes inhibited would wedge every other port sharing
        //     the register.
        let v = self.io.xpb_read(inhibit);
        self.io.xpb_write(inhibit, v & !mask);
        ringbuf_entry!(Trace::InhibitClear {
            island: port.island,
            mask
        });

        if confirmed {
            ringbuf_entry!(Trace::RxDisabled {
                island: port.island,
                core: port.core,
                port: port.port
            });
            Ok(())
        } else {
            ringbuf_entry!(Trace::RxDisableTimeout {
                island: port.island,
                core: port.core,
                port: port.port
            });
            Err(MacSyncError::RxDisableTimeout {
                island: port.island,
                core: port.core,
                port: port.port,
            })
        }
    }

    /// Releases the synchronization agent out of reset: debug configuration
    /// first, then kickstart, then resume.
    pub fn start_agent(&mut self, island: u8, me: u8, disable_gpio_poll: bool) {
        ringbuf_entry!(Trace::AgentStart { island, me });
        let dbg = if disable_gpio_poll {
            regs::AGENT_DBG_DISABLE_GPIO_POLL
        } else {
            0
        };
        self.io.mailbox_write(island, me, regs::MBOX_DEBUG_CFG, dbg);
        self.io
            .mailbox_write(island, me, regs::MBOX_KICKSTART, regs::AGENT_GO);
        self.io
            .mailbox_write(island, me, regs::MBOX_RESUME, regs::AGENT_GO);
    }

    fn rx_enabled(&mut self, port: MacPort) -> bool {
        let addr = regs::eth_port_csr(port.island, port.core, port.port, regs::ETH_CMD_CONFIG);
        self.io.xpb_read(addr) & regs::ETH_CMD_CONFIG_RX_ENA != 0
    }
}
