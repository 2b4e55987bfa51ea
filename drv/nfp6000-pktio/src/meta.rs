// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The packet metadata record and its hardware image.
//!
//! [`PktMeta`] is the canonical in-flight packet descriptor threaded through
//! every dispatch stage. When it has to live in hardware memory verbatim --
//! the work-queue transmit path writes it into the local buffer's header
//! region, and the work-queue receive path reads it back -- it travels as a
//! [`RawPktMeta`], a fixed eight-word image with an explicit pack/unpack
//! pair.

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Identifies the on-chip (CTM) buffer holding a packet's header bytes:
/// island plus packet number within that island's buffer store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CtmLocation {
    pub island: u8,
    pub pnum: u16,
}

/// The lightweight handle that travels through inter-engine work queues in
/// place of the full record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WqHandle {
    pub island: u8,
    pub pnum: u16,
}

/// Local buffer size class. The class fixes the capacity bound for `len`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SizeClass {
    C256 = 0,
    C512 = 1,
    C1k = 2,
    C2k = 3,
}

impl SizeClass {
    pub fn capacity(self) -> u16 {
        256 << (self as u16)
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => SizeClass::C256,
            1 => SizeClass::C512,
            2 => SizeClass::C1k,
            _ => SizeClass::C2k,
        }
    }
}

/// Destination/source class carried in the top bits of a [`PortId`].
///
/// The encoding has room for eight classes but only seven are defined; a
/// packet dispatched with the eighth is a programming error and halts the
/// context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortType {
    Wire = 0,
    Host = 1,
    WorkQ = 2,
    None = 3,
    DropSeq = 4,
    DropHost = 5,
    DropWire = 6,
}

impl PortType {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(PortType::Wire),
            1 => Some(PortType::Host),
            2 => Some(PortType::WorkQ),
            3 => Some(PortType::None),
            4 => Some(PortType::DropSeq),
            5 => Some(PortType::DropHost),
            6 => Some(PortType::DropWire),
            _ => None,
        }
    }
}

/// Encoded (type, subsystem, queue) triple naming a packet origin or
/// destination.
///
/// Bit layout: `[15:13]` type, `[12:10]` subsystem, `[9:0]` queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortId(u16);

impl PortId {
    /// The default destination for packets adopted from a work queue.
    pub const DROP_HOST: PortId = PortId::new(PortType::DropHost, 0, 0);

    pub const fn new(ty: PortType, subsys: u8, queue: u16) -> Self {
        PortId(
            ((ty as u16) << 13)
                | (((subsys & 0b111) as u16) << 10)
                | (queue & 0x3ff),
        )
    }

    pub const fn from_bits(bits: u16) -> Self {
        PortId(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Decodes the type field. `None` for the one undefined code point.
    pub fn ty(self) -> Option<PortType> {
        PortType::from_bits((self.0 >> 13) as u8)
    }

    pub fn subsys(self) -> u8 {
        ((self.0 >> 10) & 0b111) as u8
    }

    pub fn queue(self) -> u16 {
        self.0 & 0x3ff
    }
}

bitflags! {
    /// Per-layer checksum state, set on receive and consulted on wire
    /// transmit when building the egress command word.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CsumFlags: u16 {
        const L3_PRESENT = 1 << 0;
        const L3_OK = 1 << 1;
        const L4_PRESENT = 1 << 2;
        const L4_OK = 1 << 3;
        const L4_TCP = 1 << 4;
    }
}

/// One wire ingress descriptor, as delivered by the NBI engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WireDesc {
    pub island: u8,
    pub pnum: u16,
    pub mu_handle: u32,
    pub offset: u16,
    pub len: u16,
    pub split: bool,
    /// Ingress metadata type, carried into the subsystem field of `src`.
    pub meta_type: u8,
    pub port: u16,
    /// Sequencer assignment; zero means the packet is not sequenced.
    pub seqr: u8,
    pub seq: u16,
    pub csum: CsumFlags,
    /// The engine detected an ingress error on this frame.
    pub err: bool,
}

/// One host descriptor. The same shape travels in both directions: ingress
/// descriptors are read from the host rings, egress descriptors are built
/// from the packet record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostDesc {
    pub mu_handle: u32,
    pub offset: u16,
    pub len: u16,
    /// Opaque application fields, copied through untouched.
    pub app0: u32,
    pub app1: u32,
    pub csum: CsumFlags,
    /// The descriptor failed validation.
    pub invalid: bool,
}

/// The canonical in-flight packet record.
///
/// Created by a receive entry point, mutated by application logic, consumed
/// by exactly one of transmit or drop. `loc` is `Some` iff the packet
/// currently has a local-buffer component; `len` never exceeds
/// `size.capacity()`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PktMeta {
    pub loc: Option<CtmLocation>,
    pub size: SizeClass,
    pub mu_handle: u32,
    pub offset: u16,
    pub len: u16,
    pub len_orig: u16,
    pub seq: u16,
    pub reorder_ctx: u8,
    pub sequenced: bool,
    pub src: PortId,
    pub dst: PortId,
    pub csum: CsumFlags,
    pub app0: u32,
    pub app1: u32,
    pub split: bool,
}

/// The verbatim eight-word image of a [`PktMeta`] in a local buffer's header
/// region. Word layout:
///
/// ```text
/// w0: island[31:24] pnum[23:8] present[7] split[6] sequenced[5] size[1:0]
/// w1: mu_handle
/// w2: offset[31:16] len[15:0]
/// w3: len_orig[31:16] seq[15:0]
/// w4: reorder_ctx[31:24] csum[15:0]
/// w5: src[31:16] dst[15:0]
/// w6: app0
/// w7: app1
/// ```
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable,
    KnownLayout,
)]
#[repr(transparent)]
pub struct RawPktMeta(pub [u32; 8]);

impl PktMeta {
    /// A fully zeroed record: no local buffer, smallest size class, all
    /// fields cleared. Each receive path starts from this.
    pub const ZERO: PktMeta = PktMeta {
        loc: None,
        size: SizeClass::C256,
        mu_handle: 0,
        offset: 0,
        len: 0,
        len_orig: 0,
        seq: 0,
        reorder_ctx: 0,
        sequenced: false,
        src: PortId::from_bits(0),
        dst: PortId::from_bits(0),
        csum: CsumFlags::empty(),
        app0: 0,
        app1: 0,
        split: false,
    };

    /// Packs the record into its hardware image.
    pub fn to_raw(&self) -> RawPktMeta {
        let (island, pnum, present) = match self.loc {
            Some(loc) => (loc.island, loc.pnum, true),
            None => (0, 0, false),
        };
        let w0 = (u32::from(island) << 24)
            | (u32::from(pnum) << 8)
            | (u32::from(present) << 7)
            | (u32::from(self.split) << 6)
            | (u32::from(self.sequenced) << 5)
            | self.size as u32;
        let w2 = (u32::from(self.offset) << 16) | u32::from(self.len);
        let w3 = (u32::from(self.len_orig) << 16) | u32::from(self.seq);
        let w4 =
            (u32::from(self.reorder_ctx) << 24) | u32::from(self.csum.bits());
        let w5 =
            (u32::from(self.src.bits()) << 16) | u32::from(self.dst.bits());
        RawPktMeta([
            w0,
            self.mu_handle,
            w2,
            w3,
            w4,
            w5,
            self.app0,
            self.app1,
        ])
    }

    /// Unpacks a hardware image read back from a local buffer header.
    pub fn from_raw(raw: &RawPktMeta) -> Self {
        let [w0, w1, w2, w3, w4, w5, w6, w7] = raw.0;
        let loc = if w0 & (1 << 7) != 0 {
            Some(CtmLocation {
                island: (w0 >> 24) as u8,
                pnum: (w0 >> 8) as u16,
            })
        } else {
            None
        };
        PktMeta {
            loc,
            size: SizeClass::from_bits(w0 as u8),
            mu_handle: w1,
            offset: (w2 >> 16) as u16,
            len: w2 as u16,
            len_orig: (w3 >> 16) as u16,
            seq: w3 as u16,
            reorder_ctx: (w4 >> 24) as u8,
            sequenced: w0 & (1 << 5) != 0,
            src: PortId::from_bits((w5 >> 16) as u16),
            dst: PortId::from_bits(w5 as u16),
            csum: CsumFlags::from_bits_truncate(w4 as u16),
            app0: w6,
            app1: w7,
            split: w0 & (1 << 6) != 0,
        }
    }
}
