// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, you can obtain one at https://mozilla.org/MPL/2.0/.

//! Command words for the MAC synchronization agent
//!
//! Each command is a single 32-bit word pushed onto the agent's ring:
//!
//! ```text
//!   bit  24     source id (1 = application)
//!   bit  16     recache port configuration first
//!   bit  15     MAC island
//!   bit  14     Ethernet core
//!   bits 13:8   port within the core
//!   bits  7:0   command code
//! ```

use crate::MacPort;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Source-id bit identifying commands issued by this layer, as opposed to
/// the agent's own internally generated commands.
pub const CMD_SOURCE_APP: u32 = 1 << 24;

const CMD_RECACHE_BIT: u32 = 1 << 16;

/// Command codes understood by the synchronization agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum SyncCmd {
    Recache = 0x01,
    EnableRx = 0x02,
    DisableRx = 0x03,
    EnableTxFlush = 0x04,
    DisableTxFlush = 0x05,
}

/// Packs a command word for the given port.
pub fn encode(port: MacPort, cmd: SyncCmd, recache: bool) -> u32 {
    CMD_SOURCE_APP
        | if recache { CMD_RECACHE_BIT } else { 0 }
        | u32::from(port.island & 1) << 15
        | u32::from(port.core & 1) << 14
        | u32::from(port.port & 0x3f) << 8
        | cmd as u32
}

/// Unpacks a command word, returning `None` for an unknown command code.
pub fn decode(word: u32) -> Option<(MacPort, SyncCmd, bool)> {
    let cmd = SyncCmd::from_u32(word & 0xff)?;
    let port = MacPort {
        island: ((word >> 15) & 1) as u8,
        core: ((word >> 14) & 1) as u8,
        port: ((word >> 8) & 0x3f) as u8,
    };
    Some((port, cmd, word & CMD_RECACHE_BIT != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_pins_bit_positions() {
        let p = MacPort {
            island: 1,
            core: 0,
            port: 5,
        };
        assert_eq!(encode(p, SyncCmd::DisableRx, false), 0x0100_8503);

        let p = MacPort {
            island: 0,
            core: 1,
            port: 42,
        };
        assert_eq!(encode(p, SyncCmd::EnableTxFlush, true), 0x0101_6a04);

        let p = MacPort {
            island: 0,
            core: 0,
            port: 0,
        };
        assert_eq!(encode(p, SyncCmd::Recache, false), 0x0100_0001);
    }

    #[test]
    fn decode_round_trips() {
        let p = MacPort {
            island: 1,
            core: 1,
            port: 11,
        };
        for cmd in [
            SyncCmd::Recache,
            SyncCmd::EnableRx,
            SyncCmd::DisableRx,
            SyncCmd::EnableTxFlush,
            SyncCmd::DisableTxFlush,
        ] {
            for recache in [false, true] {
                let word = encode(p, cmd, recache);
                assert_eq!(decode(word), Some((p, cmd, recache)));
            }
        }
    }

    #[test]
    fn decode_rejects_unknown_codes() {
        assert_eq!(decode(0x0100_0000), None);
        assert_eq!(decode(0x0100_0006), None);
        assert_eq!(decode(0x0100_00ff), None);
    }
}
