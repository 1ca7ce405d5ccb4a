// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD Transaction Engine
//!
//! This module implements the SWD wire protocol as a synchronous state
//! machine, advanced once per reference tick by [`Engine::tick()`].
//!
//! Every tick works like a clocked register file: all decisions are made
//! from a snapshot of the registers taken at the start of the tick, and all
//! new values are committed together at the end.  Nothing is partially
//! applied, and the order the per-state actions are evaluated in is not
//! observable.
//!
//! Within a state, bits are shifted or sampled on the prescaler's `rising`
//! event (SWCLK going low).  State transitions are committed on `pre_rising`,
//! one tick earlier, so the new state is already live when `rising` happens.
//!
//! A transaction runs:
//!
//! ```text
//!  write:  Packet -> PTrn -> Ack -> ATrn -> WData -> Done -> Idle
//!  read:   Packet -> PTrn -> Ack ---------> RData -> Done -> Idle
//!  non-OK: Packet -> PTrn -> Ack -> ATrn ----------> Done -> Idle
//! ```
//!
//! and a line reset runs `Reset -> Idle`.
//!
//! Applications use this via [`crate::SwdServer`], which guards when
//! transactions may be started and collected.

use static_assertions::const_assert;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdmill_core::{ACK_OK, DATA_PHASE_BITS, DATA_PHASE_MASK, Request, Response, Status};

use crate::SwdError;
use crate::config::ClockConfig;
use crate::pins::{Level, Pins};
use crate::prescaler::{Edges, Prescaler};

/// JTAG-to-SWD switch sequence, transmitted LSB first.  On the wire this is
/// the documented 0111100111100111.
pub const JTAG_TO_SWD_SEQUENCE: u16 = 0xE79E;

// Reset counter layout.  The counter counts down from RESET_CYCLES, sending
// high bits, then the switch sequence, then high bits again.
const RESET_CYCLES: u32 = 126;
const RESET_SEQUENCE_TOP: u32 = 71;
const RESET_SEQUENCE_BOTTOM: u32 = 55;

/// Line reset cycles either side of the switch sequence.
pub const LINE_RESET_HIGH_CYCLES: u32 = RESET_SEQUENCE_BOTTOM;

// SWD needs at least 50 high cycles for a line reset, on both sides
const_assert!(RESET_CYCLES - RESET_SEQUENCE_TOP >= 50);
const_assert!(RESET_SEQUENCE_BOTTOM >= 50);
const_assert!(RESET_SEQUENCE_TOP - RESET_SEQUENCE_BOTTOM == u16::BITS);

// Packet counter.  Two low cycles are sent ahead of the 8 packet bits.
const PACKET_CYCLES: u32 = 10;
const PACKET_BITS: u32 = 8;
const_assert!(PACKET_CYCLES > PACKET_BITS);

const ACK_BITS: u32 = 3;
const ACK_MASK: u8 = 0b111;
const DONE_CYCLES: u32 = 1;

/// Transaction engine states.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum EngineState {
    /// Waiting for a transaction or reset.  SWCLK is parked high.
    #[default]
    #[strum(serialize = "IDLE")]
    Idle,

    /// Sending the request packet.
    #[strum(serialize = "PACKET")]
    Packet,

    /// Turnaround after the packet, line released.
    #[strum(serialize = "P_TRN")]
    PTrn,

    /// Sampling the 3 ACK bits.
    #[strum(serialize = "ACK")]
    Ack,

    /// Turnaround after the ACK, line released.
    #[strum(serialize = "A_TRN")]
    ATrn,

    /// Sampling 33 bits of read data.
    #[strum(serialize = "RDATA")]
    RData,

    /// Sending 33 bits of write data.
    #[strum(serialize = "WDATA")]
    WData,

    /// Trailing clock cycle, decoding the status.
    #[strum(serialize = "DONE")]
    Done,

    /// Line reset and JTAG-to-SWD switch sequence.
    #[strum(serialize = "RESET")]
    Reset,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Whether the engine drives SWDIO in this state.
    pub fn drives_swdio(&self) -> bool {
        matches!(
            self,
            EngineState::Reset | EngineState::Packet | EngineState::WData
        )
    }
}

impl core::fmt::Display for EngineState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Single-tick pulse raised by the server, consumed by the next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Transaction,
    Reset,
}

// The in-flight transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Context {
    packet: u8,
    data: u64,
    rnw: bool,
    ack: u8,
}

// Everything committed at the end of a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Registers {
    state: EngineState,
    cnt: u32,
    context: Context,
    status: Option<Status>,
    pins: Pins,
}

/// SWD transaction engine.
///
/// Created using [`Engine::new()`] and advanced with [`Engine::tick()`].  It
/// is not normally used directly - use [`crate::SwdServer`], which adds the
/// submit/collect guards.
#[derive(Debug)]
pub struct Engine {
    prescaler: Prescaler,
    regs: Registers,
    trigger: Option<Trigger>,
    ticks: u64,
}

impl Engine {
    /// Creates a new engine in the idle state.
    ///
    /// Returns:
    /// - `Ok(Engine)` on success.
    /// - `Err(SwdError::InvalidDivisor)` if the configured divisor is odd,
    ///   less than 2, or too large.
    pub fn new(config: &ClockConfig) -> Result<Self, SwdError> {
        config.validate()?;
        let prescaler = Prescaler::new(config.divisor)?;
        debug!("SWD engine created, divisor {}", config.divisor);
        Ok(Self {
            prescaler,
            regs: Registers::default(),
            trigger: None,
            ticks: 0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.regs.state
    }

    pub fn pins(&self) -> Pins {
        self.regs.pins
    }

    /// Number of ticks since the engine was created.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn divisor(&self) -> u32 {
        self.prescaler.divisor()
    }

    /// The status of the last completed transaction, if it has not been
    /// collected.
    pub fn completed(&self) -> Option<Status> {
        self.regs.status
    }

    // Whether a new transaction or reset can be started this tick
    pub(crate) fn can_start(&self) -> bool {
        self.regs.state == EngineState::Idle && self.trigger.is_none()
    }

    // Loads a new transaction and raises the request pulse.  Callers must
    // check can_start() and that no status is pending first.
    pub(crate) fn start(&mut self, request: &Request) {
        let packet = request.packet();
        self.regs.context = Context {
            packet: packet.raw(),
            data: request.data_phase(),
            rnw: request.is_read(),
            ack: 0,
        };
        self.trigger = Some(Trigger::Transaction);
        debug!("Exec:  {request} (packet {packet})");
    }

    // Raises the reset pulse.  Callers must check can_start() first.
    pub(crate) fn start_reset(&mut self) {
        self.trigger = Some(Trigger::Reset);
        debug!("Exec:  Line reset");
    }

    // Builds the response for the completed transaction and clears it.
    pub(crate) fn take_response(&mut self) -> Option<Response> {
        let status = self.regs.status.take()?;
        let context = core::mem::take(&mut self.regs.context);
        let response = if context.rnw {
            Response::Read {
                status,
                rdata: context.data & DATA_PHASE_MASK,
            }
        } else {
            Response::Write { status }
        };
        Some(response)
    }

    /// Advances the engine by one reference tick.
    ///
    /// Arguments:
    /// - `swdio_in`: the level on SWDIO this tick.  Pass [`Level::Low`] when
    ///   nothing is driving the line.
    ///
    /// Returns:
    /// - The prescaler events this tick produced.
    pub fn tick(&mut self, swdio_in: Level) -> Edges {
        let edges = self.prescaler.tick();
        let trigger = self.trigger.take();
        let cur = self.regs;
        let mut next = cur;

        next.pins.set_swdio_in(swdio_in);

        // Output enable is registered, following the state one tick behind
        next.pins.set_swdio_oe(cur.state.drives_swdio());

        if cur.state == EngineState::Idle {
            next.pins.set_swclk(Level::High);
        } else if edges.rising {
            next.pins.set_swclk(Level::Low);
        } else if edges.falling {
            next.pins.set_swclk(Level::High);
        }

        if edges.rising {
            Self::on_rising(&cur, &mut next, swdio_in);
        }
        if edges.pre_rising {
            Self::on_pre_rising(&cur, &mut next);
        }
        if cur.state == EngineState::Idle {
            match trigger {
                Some(Trigger::Transaction) => {
                    next.state = EngineState::Packet;
                    next.cnt = PACKET_CYCLES;
                }
                Some(Trigger::Reset) => {
                    next.state = EngineState::Reset;
                    next.cnt = RESET_CYCLES;
                }
                None => (),
            }
        }

        if next.state != cur.state {
            trace!("Exec:  {} -> {} (tick {})", cur.state, next.state, self.ticks);
        }
        if let (None, Some(status)) = (cur.status, next.status) {
            debug!("Value: Transaction complete: {status}");
        }

        self.regs = next;
        self.ticks += 1;
        edges
    }

    // Per-state action on the rising event - shift out or sample one bit
    fn on_rising(cur: &Registers, next: &mut Registers, swdio_in: Level) {
        let sample = swdio_in.is_high();
        match cur.state {
            EngineState::Idle => {
                next.pins.set_swdio_out(Level::High);
            }
            EngineState::Reset => {
                let bit = if cur.cnt > RESET_SEQUENCE_TOP || cur.cnt <= RESET_SEQUENCE_BOTTOM {
                    true
                } else {
                    (JTAG_TO_SWD_SEQUENCE >> (RESET_SEQUENCE_TOP - cur.cnt)) & 1 == 1
                };
                next.pins.set_swdio_out(bit.into());
                next.cnt = cur.cnt.saturating_sub(1);
            }
            EngineState::Packet => {
                if cur.cnt > PACKET_BITS {
                    next.pins.set_swdio_out(Level::Low);
                } else {
                    next.pins.set_swdio_out((cur.context.packet & 0x80 != 0).into());
                    next.context.packet = cur.context.packet << 1;
                }
                next.cnt = cur.cnt.saturating_sub(1);
            }
            EngineState::PTrn | EngineState::ATrn => (),
            EngineState::Ack => {
                next.context.ack = ((cur.context.ack << 1) | sample as u8) & ACK_MASK;
                next.cnt = cur.cnt.saturating_sub(1);
            }
            EngineState::RData => {
                next.context.data =
                    (cur.context.data >> 1) | ((sample as u64) << (DATA_PHASE_BITS - 1));
                next.cnt = cur.cnt.saturating_sub(1);
            }
            EngineState::WData => {
                next.pins.set_swdio_out((cur.context.data & 1 == 1).into());
                next.context.data = cur.context.data >> 1;
                next.cnt = cur.cnt.saturating_sub(1);
            }
            EngineState::Done => {
                next.cnt = cur.cnt.saturating_sub(1);
                next.status = Some(Status::from_ack(cur.context.ack));
            }
        }
    }

    // Per-state transition on the pre_rising event
    fn on_pre_rising(cur: &Registers, next: &mut Registers) {
        match cur.state {
            EngineState::Idle => (),
            EngineState::Reset => {
                if cur.cnt == 0 {
                    next.state = EngineState::Idle;
                }
            }
            EngineState::Packet => {
                if cur.cnt == 0 {
                    next.state = EngineState::PTrn;
                }
            }
            EngineState::PTrn => {
                next.state = EngineState::Ack;
                next.cnt = ACK_BITS;
            }
            EngineState::Ack => {
                if cur.cnt == 0 {
                    if cur.context.rnw && cur.context.ack == ACK_OK {
                        next.state = EngineState::RData;
                        next.cnt = DATA_PHASE_BITS;
                    } else {
                        next.state = EngineState::ATrn;
                    }
                }
            }
            EngineState::ATrn => {
                if cur.context.ack == ACK_OK {
                    next.state = EngineState::WData;
                    next.cnt = DATA_PHASE_BITS;
                } else {
                    next.state = EngineState::Done;
                    next.cnt = DONE_CYCLES;
                }
            }
            EngineState::RData | EngineState::WData => {
                if cur.cnt == 0 {
                    next.state = EngineState::Done;
                    next.cnt = DONE_CYCLES;
                }
            }
            EngineState::Done => {
                if cur.cnt == 0 {
                    next.state = EngineState::Idle;
                }
            }
        }
    }
}
