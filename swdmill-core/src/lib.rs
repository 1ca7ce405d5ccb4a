// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdmill-core - Core SWD protocol types used by swdmill.
//!
//! Designed to be used in conjunction with the `swdmill-swd` library, which
//! implements the cycle-stepped SWD transaction engine.  This crate holds the
//! objects that cross the engine's boundary:
//!
//! * [`Register`] - a DP or AP register selector.
//! * [`RequestPacket`] - the 8-bit request header sent on the wire.
//! * [`Request`] and [`Response`] - a single SWD transaction and its result.
//! * [`Status`] - the decoded acknowledgement from the target.
//!
//! This library is `no_std` compatible, and requires an `alloc`
//! implementation.

#![no_std]

pub mod register;
pub mod transaction;

extern crate alloc;
use core::fmt;
use static_assertions::const_assert_eq;

#[doc(inline)]
pub use crate::register::Register;
#[doc(inline)]
pub use crate::transaction::{Request, RequestPacket, Response};

/// ACK patterns, as shifted in by the engine.  The first bit received from
/// the target ends up as the most significant bit of the 3-bit pattern.
pub const ACK_OK: u8 = 0b100;
pub const ACK_WAIT: u8 = 0b010;
pub const ACK_FAULT: u8 = 0b001;

const ACK_MASK: u8 = 0b111;

// The three valid patterns must be distinct one-hot values
const_assert_eq!(ACK_OK | ACK_WAIT | ACK_FAULT, ACK_MASK);

/// Number of bits in a data phase - 32 data bits plus a parity bit.
pub const DATA_PHASE_BITS: u32 = 33;

/// Mask covering the full 33-bit data phase.
pub const DATA_PHASE_MASK: u64 = (1 << DATA_PHASE_BITS) - 1;

/// Outcome of a single SWD transaction, as reported by the target's ACK.
///
/// The engine performs no retries.  A [`Status::Wait`] should be retried by
/// the caller, the rest require caller-specific recovery.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum Status {
    /// Transaction succeeded.
    #[strum(serialize = "OK")]
    Ok,

    /// Target asked for the transaction to be retried.
    #[strum(serialize = "WAIT")]
    Wait,

    /// Target reported a fault.
    #[strum(serialize = "FAULT")]
    Fault,

    /// The ACK pattern was not one of the three valid values.  A line held
    /// high by a pull-up, or no target at all, reads as this.
    #[strum(serialize = "ERROR")]
    Error,
}

impl Status {
    /// Decodes a 3-bit ACK pattern.  Bits above the lowest three are ignored.
    pub fn from_ack(ack: u8) -> Self {
        match ack & ACK_MASK {
            ACK_OK => Status::Ok,
            ACK_WAIT => Status::Wait,
            ACK_FAULT => Status::Fault,
            _ => Status::Error,
        }
    }

    /// Returns the ACK pattern a target sends to produce this status, or
    /// `None` for [`Status::Error`], which has no single pattern.
    pub fn ack(&self) -> Option<u8> {
        match self {
            Status::Ok => Some(ACK_OK),
            Status::Wait => Some(ACK_WAIT),
            Status::Fault => Some(ACK_FAULT),
            Status::Error => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Returns a string representation of the status.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Calculate SWD parity - 1 for an odd number of bits set to 1, 0 otherwise.
pub fn calculate_parity<T>(value: T) -> bool
where
    T: Into<u64>,
{
    (value.into().count_ones() % 2) == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    #[test_case(0b100, Status::Ok; "ok")]
    #[test_case(0b010, Status::Wait; "wait")]
    #[test_case(0b001, Status::Fault; "fault")]
    #[test_case(0b000, Status::Error; "line low")]
    #[test_case(0b111, Status::Error; "line high")]
    #[test_case(0b110, Status::Error; "two bits")]
    #[test_case(0b101, Status::Error; "ok and fault")]
    #[test_case(0b011, Status::Error; "wait and fault")]
    fn ack_decode(ack: u8, expected: Status) {
        assert_eq!(Status::from_ack(ack), expected);
    }

    #[test]
    fn ack_ignores_upper_bits() {
        assert_eq!(Status::from_ack(0b1111_1100), Status::Ok);
    }

    #[test]
    fn ack_pattern_decodes_back() {
        for status in Status::iter() {
            match status.ack() {
                Some(ack) => assert_eq!(Status::from_ack(ack), status),
                None => assert_eq!(status, Status::Error),
            }
        }
    }

    #[test]
    fn status_strings() {
        assert_eq!(Status::Ok.as_str(), "OK");
        assert_eq!(alloc::format!("{}", Status::Fault), "FAULT");
    }

    #[test]
    fn parity() {
        assert!(!calculate_parity(0u32));
        assert!(calculate_parity(1u32));
        assert!(!calculate_parity(0b11u8));
        assert!(!calculate_parity(0xDEAD_BEEFu32));
        assert!(calculate_parity(0x1234_5678u32));
    }
}
