// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-port link status
//!
//! Link state is derived from two registers: the segment status register,
//! whose fault bits override everything else, and a mode-dependent link
//! indication (SGMII for 1G ports, PCS for everything faster).

use crate::{regs, MacSync, MacSyncIo};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

impl<S: MacSyncIo> MacSync<'_, S> {
    /// Reads the link state of one port.  `port` is island-relative, 0-23,
    /// spanning both Ethernet cores.
    pub fn link_state(&mut self, island: u8, port: u8) -> LinkState {
        let core = port / regs::PORTS_PER_CORE;
        let port = port % regs::PORTS_PER_CORE;

        let sts = self
            .io
            .xpb_read(regs::eth_port_csr(island, core, port, regs::ETH_SEG_STS));
        let faults = regs::ETH_SEG_STS_LOCAL_FAULT
            | regs::ETH_SEG_STS_REMOTE_FAULT
            | regs::ETH_SEG_STS_RX_LOSS;
        if sts & faults != 0 {
            return LinkState::Down;
        }

        let mode = self
            .io
            .xpb_read(regs::eth_port_csr(island, core, port, regs::ETH_PORT_MODE))
            & regs::ETH_PORT_MODE_MASK;
        let up = if mode == regs::ETH_PORT_MODE_1GE {
            self.io
                .xpb_read(regs::eth_port_csr(island, core, port, regs::ETH_SGMII_STS))
                & regs::ETH_SGMII_STS_LINK
                != 0
        } else {
            self.io
                .xpb_read(regs::eth_port_csr(island, core, port, regs::ETH_PCS_STS))
                & regs::ETH_PCS_STS_RX_LINK
                != 0
        };
        if up {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }

    /// Reads the link state of every port named in `port_mask`, returning a
    /// mask of ports that are up.  Bits above the island's port count are
    /// ignored.
    pub fn link_states(&mut self, island: u8, port_mask: u32) -> u32 {
        let mut up = 0;
        for port in 0..2 * regs::PORTS_PER_CORE {
            if port_mask & (1 << port) != 0 && self.link_state(island, port) == LinkState::Up {
                up |= 1 << port;
            }
        }
        up
    }
}
