// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdmill-swd library
//!
//! Cycle-stepped ARM Serial Wire Debug (SWD) master.
//!
//! Rather than bit-banging with delays, the SWD wire protocol is produced by
//! a synchronous state machine which is advanced exactly once per reference
//! clock tick.  The caller owns the tick source - a timer interrupt, a PIO
//! loop, or a simulation - and feeds the sampled SWDIO level in on each tick.
//!
//! The following diagram shows the key `swdmill-swd` concepts.
//!
//! ```text
//!       Caller / driver       submit() / collect() / reset() / ready()
//! ----------------------
//!        SwdServer         \
//! ----------------------    \
//!          Engine            |--  SwdError
//! ----------------------    /
//!   Prescaler  |  Pins     /
//! ----------------------
//!   SWCLK / SWDIO / OE    >======================<       SWD Target
//! ```
//!
//! * [`SwdServer`] is the request/response boundary.  One transaction may be
//!   outstanding at a time, and calls made at the wrong time fail with
//!   [`SwdError::Busy`] or [`SwdError::NotReady`] rather than blocking.
//! * [`Engine`] is the transaction state machine.
//! * [`Prescaler`] divides the reference tick into SWCLK edge events.
//! * [`Pins`] is the engine's view of the SWCLK and SWDIO lines.
//!
//! The [`sim`] module contains a simulated SWD target and a blocking bench
//! which drive a server to completion, for testing and experimentation.
//!
//! Protocol level outcomes (OK, WAIT, FAULT, and malformed ACKs) are not
//! errors at this level - they are reported as a [`Status`] in the
//! [`Response`].  No retries are performed, and the parity of read data is
//! passed through unchecked.
//!
//! `swdmill-swd` uses, and is designed to be used alongside, the
//! [`swdmill_core`] library, which provides the protocol types.

#![no_std]

pub mod config;
pub mod engine;
pub mod pins;
pub mod prescaler;
pub mod server;
pub mod sim;

#[doc(inline)]
pub use crate::config::ClockConfig;
#[doc(inline)]
pub use crate::engine::{Engine, EngineState};
#[doc(inline)]
pub use crate::pins::{Level, Pins};
#[doc(inline)]
pub use crate::prescaler::{Edges, Prescaler};
#[doc(inline)]
pub use crate::server::{SharedServer, SwdServer};

#[doc(inline)]
pub use swdmill_core::{Register, Request, RequestPacket, Response, Status};

extern crate alloc;
use alloc::format;
use alloc::string::String;
use core::fmt;
use serde::Serialize;

/// Core error type used by all swdmill-swd objects
///
/// None of these represent a failed SWD transaction - those are reported via
/// [`Status`].  [`SwdError::is_transient()`] identifies the errors which
/// simply mean "try again later".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwdError {
    /// A transaction or reset is in flight, or a completed transaction has
    /// not yet been collected.  Keep ticking the engine, collect any pending
    /// response, and retry.
    Busy,

    /// There is no completed transaction to collect.
    NotReady,

    /// The clock divisor must be even and at least 2.  The rejected value is
    /// included.
    InvalidDivisor(u32),

    /// The requested SWD clock is too fast for the reference clock.
    FrequencyTooHigh,

    /// The requested SWD clock is too slow for the largest supported
    /// divisor.
    FrequencyTooLow,

    /// No divisor gets within 1% of the requested SWD clock.
    FrequencyAccuracy,

    /// A register byte address other than 0x0, 0x4, 0x8 or 0xC was used.
    InvalidAddress(u8),

    /// A driver gave up waiting for the engine.
    Timeout,
}

impl SwdError {
    /// Returns true if the call can simply be retried once the engine has
    /// been ticked further.
    pub fn is_transient(&self) -> bool {
        matches!(self, SwdError::Busy | SwdError::NotReady)
    }

    /// Returns true if the error is a configuration error, which no amount
    /// of retrying will fix.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SwdError::InvalidDivisor(_)
                | SwdError::FrequencyTooHigh
                | SwdError::FrequencyTooLow
                | SwdError::FrequencyAccuracy
                | SwdError::InvalidAddress(_)
        )
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwdError::Busy => "Busy",
            SwdError::NotReady => "Not Ready",
            SwdError::InvalidDivisor(_) => "Invalid Divisor",
            SwdError::FrequencyTooHigh => "Frequency Too High",
            SwdError::FrequencyTooLow => "Frequency Too Low",
            SwdError::FrequencyAccuracy => "Frequency Not Achievable",
            SwdError::InvalidAddress(_) => "Invalid Register Address",
            SwdError::Timeout => "Timeout",
        }
    }
}

impl Serialize for SwdError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SwdError", 2)?;

        let kind = match self {
            SwdError::Busy => "busy",
            SwdError::NotReady => "not ready",
            SwdError::InvalidDivisor(_) => "invalid divisor",
            SwdError::FrequencyTooHigh => "frequency too high",
            SwdError::FrequencyTooLow => "frequency too low",
            SwdError::FrequencyAccuracy => "frequency accuracy",
            SwdError::InvalidAddress(_) => "invalid address",
            SwdError::Timeout => "timeout",
        };

        state.serialize_field("kind", kind)?;

        let detail = match self {
            SwdError::InvalidDivisor(divisor) => format!("{divisor}"),
            SwdError::InvalidAddress(address) => format!("0x{address:02X}"),
            _ => String::new(),
        };
        state.serialize_field("detail", &detail)?;
        state.end()
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdError::InvalidDivisor(divisor) => write!(f, "{}: {divisor}", self.as_str()),
            SwdError::InvalidAddress(address) => {
                write!(f, "{}: 0x{address:02X}", self.as_str())
            }
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// Builds a register selector from an ADIv5 byte address, as used in the ARM
/// documentation (for example 0x4 for DP CTRL/STAT).
pub fn register_from_address(apndp: bool, address: u8) -> Result<Register, SwdError> {
    Register::from_byte_address(apndp, address).ok_or(SwdError::InvalidAddress(address))
}
