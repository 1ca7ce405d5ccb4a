// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated SWD target and bench
//!
//! [`SimTarget`] models the target end of the wire closely enough to run
//! real transactions against the engine: it watches SWCLK for rising edges,
//! samples the host's bits, answers request packets with an ACK and read
//! data, and stores written data in a small DP/AP register file.
//!
//! [`Bench`] connects an [`SwdServer`] to a [`SimTarget`] and ticks them in
//! lock-step, offering blocking `read()`, `write()` and `line_reset()`
//! helpers.  Blocking calls give up after a tick budget with
//! [`SwdError::Timeout`].
//!
//! ```rust
//! use swdmill_core::Register;
//! use swdmill_swd::ClockConfig;
//! use swdmill_swd::sim::{Bench, SimTarget};
//!
//! let mut bench = Bench::new(ClockConfig::default(), SimTarget::new()).unwrap();
//! bench.line_reset().unwrap();
//! let response = bench.read(Register::dp(0)).unwrap();
//! assert_eq!(response.data(), Some(swdmill_swd::sim::DEFAULT_IDCODE));
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdmill_core::{
    ACK_OK, DATA_PHASE_BITS, DATA_PHASE_MASK, Register, Request, RequestPacket, Response,
    calculate_parity,
};

use crate::SwdError;
use crate::config::ClockConfig;
use crate::engine::JTAG_TO_SWD_SEQUENCE;
use crate::pins::{Level, Pins};
use crate::prescaler::Edges;
use crate::server::SwdServer;

/// IDCODE reported by a [`SimTarget`] unless overridden (a Cortex-M4 SW-DP).
pub const DEFAULT_IDCODE: u32 = 0x2BA0_1477;

/// Consecutive high bits a target needs to see to recognise a line reset.
pub const LINE_RESET_MIN_BITS: u32 = 50;

/// SWD clock periods a [`Bench`] allows each blocking operation, unless
/// changed with [`Bench::with_tick_budget()`].
pub const DEFAULT_BUDGET_PERIODS: u64 = 256;

const ACK_BITS: u32 = 3;

// What the target does on the next SWCLK rising edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Packet { bits: u8, count: u32 },
    Ack { packet: RequestPacket, ack: u8, index: u32 },
    ReadData { data: u64, index: u32 },
    WriteRelease { register: Register },
    WriteTurnaround { register: Register },
    WriteData { register: Register, data: u64, index: u32 },
    Release,
}

/// A data phase written to a [`SimTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub register: Register,
    pub wdata: u32,
    pub parity_ok: bool,
}

/// A simulated SWD target.
#[derive(Debug, Clone)]
pub struct SimTarget {
    pull: Level,
    drive: Option<Level>,
    last_swclk: Level,
    phase: Phase,

    // Line monitor
    prev_bit: bool,
    high_run: u32,
    window: u16,
    armed: bool,
    switched: bool,
    connected: bool,
    line_resets: u32,

    default_ack: u8,
    acks: VecDeque<u8>,
    reads: VecDeque<u64>,
    dp: [u32; 4],
    ap: [u32; 4],

    packets: Vec<RequestPacket>,
    writes: Vec<WriteRecord>,
    host_bits: Vec<bool>,
    contention: u32,
}

impl Default for SimTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTarget {
    /// Creates a target which responds to packets immediately, with the line
    /// pulled low and every transaction acknowledged OK.
    pub fn new() -> Self {
        Self {
            pull: Level::Low,
            drive: None,
            last_swclk: Level::High,
            phase: Phase::Idle,
            prev_bit: false,
            high_run: 0,
            window: 0,
            armed: false,
            switched: false,
            connected: true,
            line_resets: 0,
            default_ack: ACK_OK,
            acks: VecDeque::new(),
            reads: VecDeque::new(),
            dp: [DEFAULT_IDCODE, 0, 0, 0],
            ap: [0; 4],
            packets: Vec::new(),
            writes: Vec::new(),
            host_bits: Vec::new(),
            contention: 0,
        }
    }

    /// Creates a target which ignores all packets until it has seen a line
    /// reset, the JTAG-to-SWD switch sequence, and another line reset.
    pub fn requiring_switch() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Sets the level the line floats to when nobody drives it.
    pub fn with_pull(mut self, pull: Level) -> Self {
        self.pull = pull;
        self
    }

    /// Sets the ACK pattern sent when none is queued.
    pub fn with_ack(mut self, ack: u8) -> Self {
        self.default_ack = ack;
        self
    }

    /// Queues an ACK pattern for the next transaction only.
    pub fn queue_ack(&mut self, ack: u8) {
        self.acks.push_back(ack);
    }

    /// Queues a raw 33-bit data phase, sent as-is by the next OK read in
    /// place of the register value.  Use this to send bad parity.
    pub fn queue_read(&mut self, raw: u64) {
        self.reads.push_back(raw & DATA_PHASE_MASK);
    }

    pub fn set_register(&mut self, register: Register, value: u32) {
        let addr = register.addr() as usize;
        if register.apndp() {
            self.ap[addr] = value;
        } else {
            self.dp[addr] = value;
        }
    }

    pub fn register(&self, register: Register) -> u32 {
        let addr = register.addr() as usize;
        if register.apndp() {
            self.ap[addr]
        } else {
            self.dp[addr]
        }
    }

    /// Whether the target is responding to packets.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Whether the JTAG-to-SWD switch sequence has been seen.
    pub fn switched(&self) -> bool {
        self.switched
    }

    pub fn line_resets(&self) -> u32 {
        self.line_resets
    }

    /// Every packet received, valid or not.
    pub fn packets(&self) -> &[RequestPacket] {
        &self.packets
    }

    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Every bit sampled while the host was driving SWDIO.
    pub fn host_bits(&self) -> &[bool] {
        &self.host_bits
    }

    pub fn clear_host_bits(&mut self) {
        self.host_bits.clear();
    }

    /// Ticks on which the host and the target drove SWDIO at once.
    pub fn contention(&self) -> u32 {
        self.contention
    }

    /// The level on SWDIO given the host's pins.
    pub fn line(&self, pins: &Pins) -> Level {
        pins.resolve(self.drive).unwrap_or(self.pull)
    }

    /// Advances the target after an engine tick.
    ///
    /// Arguments:
    /// - `pins`: the engine's pins after the tick.
    ///
    /// Returns:
    /// - The level on SWDIO, to be passed to the next engine tick.
    pub fn clock(&mut self, pins: &Pins) -> Level {
        if pins.swdio_oe() && self.drive.is_some() {
            self.contention += 1;
            warn!("Error: SWDIO contention");
        }

        let edge = self.last_swclk.is_low() && pins.swclk().is_high();
        self.last_swclk = pins.swclk();
        if edge {
            let sample = self.line(pins).is_high();
            if pins.swdio_oe() {
                self.monitor(sample);
            }
            self.on_edge(sample, pins.swdio_oe());
            if pins.swdio_oe() {
                self.prev_bit = sample;
            }
        }

        self.line(pins)
    }

    // Watches host bits for line resets and the switch sequence
    fn monitor(&mut self, bit: bool) {
        self.host_bits.push(bit);
        self.high_run = if bit { self.high_run.saturating_add(1) } else { 0 };
        self.window = (self.window >> 1) | ((bit as u16) << 15);

        if self.high_run == LINE_RESET_MIN_BITS {
            self.line_resets += 1;
            self.phase = Phase::Idle;
            self.drive = None;
            self.armed = true;
            if self.switched {
                self.connected = true;
            }
            debug!("Note:  Target line reset (connected {})", self.connected);
        }

        if self.armed && self.window == JTAG_TO_SWD_SEQUENCE {
            self.switched = true;
            debug!("Note:  Target saw JTAG-to-SWD sequence");
        }
    }

    fn on_edge(&mut self, sample: bool, host_driving: bool) {
        self.phase = match self.phase {
            Phase::Idle => {
                if host_driving && sample && !self.prev_bit {
                    Phase::Packet { bits: 1, count: 1 }
                } else {
                    Phase::Idle
                }
            }
            Phase::Packet { bits, count } => {
                let bits = (bits << 1) | sample as u8;
                if count + 1 < 8 {
                    Phase::Packet {
                        bits,
                        count: count + 1,
                    }
                } else {
                    self.on_packet(RequestPacket::from_raw(bits))
                }
            }
            Phase::Ack { packet, ack, index } => {
                let bit = (ack >> (ACK_BITS - 1 - index)) & 1 == 1;
                self.drive = Some(bit.into());
                if index + 1 < ACK_BITS {
                    Phase::Ack {
                        packet,
                        ack,
                        index: index + 1,
                    }
                } else if ack != ACK_OK {
                    Phase::Release
                } else if packet.rnw() {
                    Phase::ReadData {
                        data: self.read_data(packet.register()),
                        index: 0,
                    }
                } else {
                    Phase::WriteRelease {
                        register: packet.register(),
                    }
                }
            }
            Phase::ReadData { data, index } => {
                if index < DATA_PHASE_BITS {
                    self.drive = Some(((data >> index) & 1 == 1).into());
                    Phase::ReadData {
                        data,
                        index: index + 1,
                    }
                } else {
                    self.drive = None;
                    Phase::Idle
                }
            }
            Phase::WriteRelease { register } => {
                self.drive = None;
                Phase::WriteTurnaround { register }
            }
            Phase::WriteTurnaround { register } => Phase::WriteData {
                register,
                data: 0,
                index: 0,
            },
            Phase::WriteData {
                register,
                data,
                index,
            } => {
                let data = data | ((sample as u64) << index);
                if index + 1 < DATA_PHASE_BITS {
                    Phase::WriteData {
                        register,
                        data,
                        index: index + 1,
                    }
                } else {
                    self.on_write(register, data);
                    Phase::Idle
                }
            }
            Phase::Release => {
                self.drive = None;
                Phase::Idle
            }
        };
    }

    fn on_packet(&mut self, packet: RequestPacket) -> Phase {
        self.packets.push(packet);
        if !self.connected {
            trace!("Note:  Target not connected, ignoring packet {packet}");
            return Phase::Idle;
        }
        if !packet.is_valid() {
            debug!("Note:  Target ignoring malformed packet {packet}");
            return Phase::Idle;
        }
        let ack = self.acks.pop_front().unwrap_or(self.default_ack);
        trace!(
            "Value: Target packet {packet} {} ACK 0b{ack:03b}",
            packet.register()
        );
        Phase::Ack {
            packet,
            ack,
            index: 0,
        }
    }

    fn read_data(&mut self, register: Register) -> u64 {
        if let Some(raw) = self.reads.pop_front() {
            return raw;
        }
        let value = self.register(register);
        (value as u64) | ((calculate_parity(value) as u64) << 32)
    }

    fn on_write(&mut self, register: Register, data: u64) {
        let wdata = data as u32;
        let parity_ok = !calculate_parity(data & DATA_PHASE_MASK);
        if !parity_ok {
            warn!("Error: Target write parity error {register} 0x{wdata:08X}");
        }
        self.writes.push(WriteRecord {
            register,
            wdata,
            parity_ok,
        });

        // DP address 0 is ABORT when written, so leave IDCODE alone
        if parity_ok && (register.apndp() || register.addr() != 0) {
            self.set_register(register, wdata);
        }
    }
}

/// One tick as seen by a [`Bench`] with tracing enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub edges: Edges,
    pub pins: Pins,
    pub line: Level,
}

/// Drives an [`SwdServer`] against a [`SimTarget`].
#[derive(Debug)]
pub struct Bench {
    server: SwdServer,
    target: SimTarget,
    line: Level,
    budget: u64,
    trace: Option<Vec<TraceEntry>>,
}

impl Bench {
    /// Creates a bench with an idle server.
    pub fn new(config: ClockConfig, target: SimTarget) -> Result<Self, SwdError> {
        let server = SwdServer::new(config)?;
        let line = target.line(&server.pins());
        Ok(Self {
            server,
            target,
            line,
            budget: DEFAULT_BUDGET_PERIODS * config.divisor as u64,
            trace: None,
        })
    }

    /// Sets the number of ticks each blocking operation may take.
    pub fn with_tick_budget(mut self, ticks: u64) -> Self {
        self.budget = ticks;
        self
    }

    /// Records every tick, see [`Self::trace()`].
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    pub fn server(&self) -> &SwdServer {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut SwdServer {
        &mut self.server
    }

    pub fn target(&self) -> &SimTarget {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut SimTarget {
        &mut self.target
    }

    /// The recorded ticks, empty unless created [`Self::with_trace()`].
    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.as_deref().unwrap_or_default()
    }

    pub fn clear_trace(&mut self) {
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
    }

    /// Ticks the engine then the target once.
    pub fn step(&mut self) -> Edges {
        let edges = self.server.tick(self.line);
        let pins = self.server.pins();
        self.line = self.target.clock(&pins);
        if let Some(trace) = &mut self.trace {
            trace.push(TraceEntry {
                edges,
                pins,
                line: self.line,
            });
        }
        edges
    }

    /// Ticks `ticks` times.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Submits a transaction and ticks until its response can be collected.
    ///
    /// Returns:
    /// - `Ok(Response)` when the transaction completes, whatever its status.
    /// - `Err(SwdError::Busy)` if the server would not accept the request,
    ///   for example because an earlier response was never collected.
    /// - `Err(SwdError::Timeout)` if the tick budget ran out.  The
    ///   transaction is left in flight.
    pub fn transact(&mut self, request: Request) -> Result<Response, SwdError> {
        self.server.submit(request)?;
        for _ in 0..self.budget {
            self.step();
            match self.server.collect() {
                Ok(response) => {
                    debug!("OK:    {request}: {response}");
                    return Ok(response);
                }
                Err(SwdError::NotReady) => (),
                Err(e) => return Err(e),
            }
        }
        warn!("Error: {request} timed out after {} ticks", self.budget);
        Err(SwdError::Timeout)
    }

    pub fn read(&mut self, register: Register) -> Result<Response, SwdError> {
        self.transact(Request::Read { register })
    }

    pub fn write(&mut self, register: Register, wdata: u32) -> Result<Response, SwdError> {
        self.transact(Request::Write { register, wdata })
    }

    /// Sends a line reset and switch sequence, ticking until the engine is
    /// idle again.
    pub fn line_reset(&mut self) -> Result<(), SwdError> {
        self.server.reset()?;
        for _ in 0..self.budget {
            self.step();
            if self.server.ready() {
                return Ok(());
            }
        }
        warn!("Error: Line reset timed out after {} ticks", self.budget);
        Err(SwdError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use swdmill_core::{ACK_WAIT, Status};

    fn bench(target: SimTarget) -> Bench {
        Bench::new(ClockConfig::new(4).unwrap(), target).unwrap()
    }

    #[test]
    fn reads_idcode() {
        let mut bench = bench(SimTarget::new());
        let response = bench.read(Register::dp(0)).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.data(), Some(DEFAULT_IDCODE));
        assert_eq!(response.parity_ok(), Some(true));
        assert_eq!(bench.target().contention(), 0);
    }

    #[test]
    fn ignores_packets_until_switched() {
        let mut bench = bench(SimTarget::requiring_switch());
        let response = bench.read(Register::dp(0)).unwrap();
        assert_eq!(response.status(), Status::Error);
        assert_eq!(bench.target().packets().len(), 1);

        bench.line_reset().unwrap();
        assert!(bench.target().switched());
        assert!(bench.target().connected());
        assert_eq!(bench.target().line_resets(), 2);

        let response = bench.read(Register::dp(0)).unwrap();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn write_then_read_back() {
        let mut bench = bench(SimTarget::new());
        let select = Register::dp(0b10);
        assert_eq!(
            bench.write(select, 0x0100_00F0).unwrap(),
            Response::Write { status: Status::Ok }
        );
        assert_eq!(bench.target().register(select), 0x0100_00F0);
        assert_eq!(
            bench.target().writes(),
            [WriteRecord {
                register: select,
                wdata: 0x0100_00F0,
                parity_ok: true
            }]
        );
        assert_eq!(bench.read(select).unwrap().data(), Some(0x0100_00F0));
    }

    #[test]
    fn queued_ack_is_used_once() {
        let mut bench = bench(SimTarget::new());
        bench.target_mut().queue_ack(ACK_WAIT);
        let ap = Register::ap(0b11);
        assert_eq!(bench.read(ap).unwrap().status(), Status::Wait);
        assert_eq!(bench.read(ap).unwrap().status(), Status::Ok);
    }

    #[test]
    fn abort_write_leaves_idcode() {
        let mut bench = bench(SimTarget::new());
        bench.write(Register::dp(0), 0x1E).unwrap();
        assert_eq!(
            bench.read(Register::dp(0)).unwrap().data(),
            Some(DEFAULT_IDCODE)
        );
    }

    #[test]
    fn budget_exhausted() {
        let mut bench = bench(SimTarget::new()).with_tick_budget(10);
        assert_eq!(bench.read(Register::dp(0)), Err(SwdError::Timeout));
        assert_eq!(bench.read(Register::dp(0)), Err(SwdError::Busy));
    }
}
