// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! XPB register addressing for the MAC islands
//!
//! An XPB address packs the chip island into bits 29:24, the device within
//! that island into bits 23:16, and the register offset into bits 15:0.  The
//! two MACs live on chip islands 8 and 9; each hosts a global CSR device and
//! two Ethernet cores of twelve ports apiece.

/// Ports per Ethernet core; each MAC island has two cores.
pub const PORTS_PER_CORE: u8 = 12;

/// Chip island hosting logical MAC `mac` (0 or 1).
pub fn mac_island(mac: u8) -> u8 {
    8 + mac
}

fn xpb(island: u8, device: u32, offset: u32) -> u32 {
    (u32::from(island) << 24) | (device << 16) | offset
}

/// MAC global CSR device.
pub const MAC_CSR_DEV: u32 = 0x03;

/// Ethernet core devices, indexed by core.
pub const ETH_CORE_DEV: [u32; 2] = [0x04, 0x05];

/// Per-lane enqueue inhibit bits, cores 0 and 1 packed at bit offsets 0 and
/// 12.  Shared read-modify-write register.
pub const EQ_INHIBIT: u32 = 0x0278;

/// Hardware acknowledgement of [`EQ_INHIBIT`], same bit layout.
pub const EQ_INHIBIT_DONE: u32 = 0x027c;

/// Address of a MAC global CSR on logical MAC `mac`.
pub fn mac_csr(mac: u8, offset: u32) -> u32 {
    xpb(mac_island(mac), MAC_CSR_DEV, offset)
}

/// Address of a per-port Ethernet CSR.  Each port owns a 0x80-byte block
/// within its core's device.
pub fn eth_port_csr(mac: u8, core: u8, port: u8, offset: u32) -> u32 {
    xpb(
        mac_island(mac),
        ETH_CORE_DEV[usize::from(core)],
        u32::from(port) * 0x80 + offset,
    )
}

// Per-port Ethernet register block
pub const ETH_CMD_CONFIG: u32 = 0x08;
pub const ETH_CMD_CONFIG_RX_ENA: u32 = 1 << 1;

pub const ETH_SEG_STS: u32 = 0x10;
pub const ETH_SEG_STS_LOCAL_FAULT: u32 = 1 << 0;
pub const ETH_SEG_STS_REMOTE_FAULT: u32 = 1 << 1;
pub const ETH_SEG_STS_RX_LOSS: u32 = 1 << 2;

pub const ETH_PORT_MODE: u32 = 0x14;
pub const ETH_PORT_MODE_MASK: u32 = 0x7;
pub const ETH_PORT_MODE_1GE: u32 = 0x5;

pub const ETH_PCS_STS: u32 = 0x20;
pub const ETH_PCS_STS_RX_LINK: u32 = 1 << 12;

pub const ETH_SGMII_STS: u32 = 0x24;
pub const ETH_SGMII_STS_LINK: u32 = 1 << 2;

// Mailbox indices used to bring up the synchronization agent
pub const MBOX_DEBUG_CFG: u8 = 0;
pub const MBOX_KICKSTART: u8 = 1;
pub const MBOX_RESUME: u8 = 2;

/// Debug-config flag telling the agent to skip its GPIO polling loop.
pub const AGENT_DBG_DISABLE_GPIO_POLL: u32 = 1;

/// Value written to the kickstart and resume mailboxes to release the agent.
pub const AGENT_GO: u32 = 1;
