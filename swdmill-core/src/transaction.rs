// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD transaction types
//!
//! A [`Request`] is handed to the transaction engine, which frames it as a
//! [`RequestPacket`] on the wire and eventually produces a [`Response`].

use core::fmt;

use crate::register::Register;
use crate::{DATA_PHASE_MASK, Status, calculate_parity};

// Bit positions of the packet fields, with the first bit on the wire held in
// the most significant bit.
const START_BIT: u8 = 7;
const APNDP_BIT: u8 = 6;
const RNW_BIT: u8 = 5;
const A2_BIT: u8 = 4;
const A3_BIT: u8 = 3;
const PARITY_BIT: u8 = 2;
const STOP_BIT: u8 = 1;
const PARK_BIT: u8 = 0;

/// The 8-bit SWD request header.
///
/// Wire order is start, APnDP, RnW, A\[2\], A\[3\], parity, stop, park.  The
/// packet is stored with the start bit in bit 7, so it is transmitted by
/// shifting out from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RequestPacket(u8);

impl RequestPacket {
    /// Builds the packet for an access to `register`.  Start and park are
    /// always 1, stop is always 0, and parity is even over APnDP, RnW and the
    /// two address bits.
    pub fn new(register: Register, rnw: bool) -> Self {
        let apndp = register.apndp();
        let a2 = register.addr_bit(0);
        let a3 = register.addr_bit(1);
        let parity = apndp ^ rnw ^ a2 ^ a3;

        let mut packet = 1 << START_BIT;
        packet |= (apndp as u8) << APNDP_BIT;
        packet |= (rnw as u8) << RNW_BIT;
        packet |= (a2 as u8) << A2_BIT;
        packet |= (a3 as u8) << A3_BIT;
        packet |= (parity as u8) << PARITY_BIT;
        packet |= 1 << PARK_BIT;
        RequestPacket(packet)
    }

    /// Wraps a raw packet byte, for example one captured off the wire.  No
    /// validation is performed - see [`Self::is_valid()`].
    pub const fn from_raw(raw: u8) -> Self {
        RequestPacket(raw)
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }

    fn bit(&self, bit: u8) -> bool {
        (self.0 >> bit) & 1 == 1
    }

    pub fn start(&self) -> bool {
        self.bit(START_BIT)
    }

    pub fn apndp(&self) -> bool {
        self.bit(APNDP_BIT)
    }

    pub fn rnw(&self) -> bool {
        self.bit(RNW_BIT)
    }

    /// The register address bits, `A[3:2]`.
    pub fn addr(&self) -> u8 {
        (self.bit(A2_BIT) as u8) | ((self.bit(A3_BIT) as u8) << 1)
    }

    pub fn parity(&self) -> bool {
        self.bit(PARITY_BIT)
    }

    pub fn stop(&self) -> bool {
        self.bit(STOP_BIT)
    }

    pub fn park(&self) -> bool {
        self.bit(PARK_BIT)
    }

    /// The register this packet addresses.
    pub fn register(&self) -> Register {
        Register::new(self.apndp(), self.addr())
    }

    /// Checks framing and parity.
    pub fn is_valid(&self) -> bool {
        let parity = self.apndp() ^ self.rnw() ^ (self.addr().count_ones() % 2 == 1);
        self.start() && !self.stop() && self.park() && parity == self.parity()
    }

    /// The 8 bits in the order they are transmitted.
    pub fn wire_bits(&self) -> [bool; 8] {
        let mut bits = [false; 8];
        for (ii, bit) in bits.iter_mut().enumerate() {
            *bit = self.bit(START_BIT - ii as u8);
        }
        bits
    }
}

impl fmt::Display for RequestPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:08b}", self.0)
    }
}

/// A single SWD transaction to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Request {
    Write { register: Register, wdata: u32 },
    Read { register: Register },
}

impl Request {
    pub fn register(&self) -> Register {
        match self {
            Request::Write { register, .. } => *register,
            Request::Read { register } => *register,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Request::Read { .. })
    }

    /// The request packet for this transaction.
    pub fn packet(&self) -> RequestPacket {
        RequestPacket::new(self.register(), self.is_read())
    }

    /// The 33 bits to shift out during the data phase, LSB first: the write
    /// value in bits 0-31 and its parity in bit 32.  Reads return 0.
    pub fn data_phase(&self) -> u64 {
        match self {
            Request::Write { wdata, .. } => {
                let parity = calculate_parity(*wdata) as u64;
                (*wdata as u64) | (parity << 32)
            }
            Request::Read { .. } => 0,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Write { register, wdata } => write!(f, "Write {register} 0x{wdata:08X}"),
            Request::Read { register } => write!(f, "Read {register}"),
        }
    }
}

/// The result of a completed SWD transaction.
///
/// For reads, `rdata` carries all 33 bits received: the data in bits 0-31 and
/// the target's parity bit in bit 32.  The parity is passed through unchecked,
/// so use [`Response::parity_ok()`] to validate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Response {
    Write { status: Status },
    Read { status: Status, rdata: u64 },
}

impl Response {
    pub fn status(&self) -> Status {
        match self {
            Response::Write { status } => *status,
            Response::Read { status, .. } => *status,
        }
    }

    /// The 32 data bits of a read, or `None` for a write.
    pub fn data(&self) -> Option<u32> {
        match self {
            Response::Read { rdata, .. } => Some(*rdata as u32),
            Response::Write { .. } => None,
        }
    }

    /// The received parity bit of a read.
    pub fn parity(&self) -> Option<bool> {
        match self {
            Response::Read { rdata, .. } => Some((rdata >> 32) & 1 == 1),
            Response::Write { .. } => None,
        }
    }

    /// Whether a read's parity bit matches its data.  `None` for writes.
    pub fn parity_ok(&self) -> Option<bool> {
        match self {
            Response::Read { rdata, .. } => Some(!calculate_parity(*rdata & DATA_PHASE_MASK)),
            Response::Write { .. } => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Write { status } => write!(f, "Write {status}"),
            Response::Read { status, rdata } => write!(f, "Read {status} 0x{rdata:09X}"),
        }
    }
}
