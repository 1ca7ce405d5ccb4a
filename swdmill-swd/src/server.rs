// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD Transaction Server
//!
//! [`SwdServer`] is the request/response boundary in front of the
//! [`Engine`].  It enforces the single outstanding transaction rule:
//!
//! * [`SwdServer::submit()`] only accepts a request when the engine is idle
//!   and the previous response has been collected.
//! * [`SwdServer::collect()`] only returns a response once the transaction
//!   has finished and the engine is idle again.  A response is returned
//!   exactly once.
//! * [`SwdServer::reset()`] only starts a line reset from idle.
//!
//! None of these block.  Calls made at the wrong time return
//! [`SwdError::Busy`] or [`SwdError::NotReady`], and the caller keeps calling
//! [`SwdServer::tick()`] until they succeed.
//!
//! Where the tick source and the caller run in different contexts (for
//! example a timer interrupt and a task) wrap the server in a
//! [`SharedServer`].

use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use swdmill_core::{Request, Response, Status};

use crate::SwdError;
use crate::config::ClockConfig;
use crate::engine::{Engine, EngineState};
use crate::pins::{Level, Pins};
use crate::prescaler::Edges;

/// SWD transaction server.
///
/// ```rust
/// use swdmill_core::{Register, Request};
/// use swdmill_swd::{ClockConfig, Level, SwdServer};
///
/// let mut server = SwdServer::new(ClockConfig::default()).unwrap();
/// server
///     .submit(Request::Read { register: Register::dp(0) })
///     .unwrap();
///
/// // Nothing is driving SWDIO, so the ACK reads as all zeros
/// let response = loop {
///     server.tick(Level::Low);
///     if let Ok(response) = server.collect() {
///         break response;
///     }
/// };
/// assert!(!response.status().is_ok());
/// ```
#[derive(Debug)]
pub struct SwdServer {
    engine: Engine,
}

impl SwdServer {
    /// Creates a server with a new, idle, engine.
    pub fn new(config: ClockConfig) -> Result<Self, SwdError> {
        let engine = Engine::new(&config)?;
        Ok(Self { engine })
    }

    /// Submits a transaction.
    ///
    /// Arguments:
    /// - `request`: the transaction to perform.
    ///
    /// Returns:
    /// - `Ok(())` if the transaction was accepted.  It starts on the next
    ///   tick.
    /// - `Err(SwdError::Busy)` if a transaction or reset is in progress, or
    ///   the last response has not been collected.  The request is dropped.
    pub fn submit(&mut self, request: Request) -> Result<(), SwdError> {
        if !self.engine.can_start() || self.engine.completed().is_some() {
            trace!("Note:  Rejected {request}, engine busy");
            return Err(SwdError::Busy);
        }
        self.engine.start(&request);
        Ok(())
    }

    /// Collects the response to the last transaction.
    ///
    /// Returns:
    /// - `Ok(Response)` once the transaction has finished.  Subsequent calls
    ///   return `NotReady` until another transaction completes.
    /// - `Err(SwdError::NotReady)` if there is nothing to collect.
    pub fn collect(&mut self) -> Result<Response, SwdError> {
        if self.engine.state() != EngineState::Idle {
            return Err(SwdError::NotReady);
        }
        self.engine.take_response().ok_or(SwdError::NotReady)
    }

    /// Starts a line reset and JTAG-to-SWD switch sequence.
    ///
    /// An uncollected response survives the reset.
    ///
    /// Returns:
    /// - `Ok(())` if the reset was accepted.  It starts on the next tick.
    /// - `Err(SwdError::Busy)` if a transaction or reset is in progress.
    pub fn reset(&mut self) -> Result<(), SwdError> {
        if !self.engine.can_start() {
            return Err(SwdError::Busy);
        }
        self.engine.start_reset();
        Ok(())
    }

    /// Whether the engine is idle.  This does not take into account whether
    /// a response is waiting to be collected - use [`Self::pending()`] for
    /// that.
    pub fn ready(&self) -> bool {
        self.engine.state() == EngineState::Idle
    }

    /// Status of a completed, uncollected transaction, if any.
    pub fn pending(&self) -> Option<Status> {
        self.engine.completed()
    }

    /// Advances the engine one reference tick.  See [`Engine::tick()`].
    pub fn tick(&mut self, swdio_in: Level) -> Edges {
        self.engine.tick(swdio_in)
    }

    pub fn pins(&self) -> Pins {
        self.engine.pins()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// An [`SwdServer`] shareable between a tick source and its callers.
///
/// Each call takes the mutex for its duration only, so a tick can never
/// observe a half-submitted request.  The mutex type is chosen by the
/// application - `CriticalSectionRawMutex` when ticking from an interrupt,
/// `NoopRawMutex` when everything runs in one context.
pub struct SharedServer<M: RawMutex> {
    inner: Mutex<M, RefCell<SwdServer>>,
}

impl<M: RawMutex> SharedServer<M> {
    pub const fn new(server: SwdServer) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(server)),
        }
    }

    /// Runs `f` with exclusive access to the server.
    ///
    /// Must not be called re-entrantly from within `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut SwdServer) -> R) -> R {
        self.inner.lock(|server| f(&mut server.borrow_mut()))
    }

    pub fn submit(&self, request: Request) -> Result<(), SwdError> {
        self.lock(|server| server.submit(request))
    }

    pub fn collect(&self) -> Result<Response, SwdError> {
        self.lock(|server| server.collect())
    }

    pub fn reset(&self) -> Result<(), SwdError> {
        self.lock(|server| server.reset())
    }

    pub fn ready(&self) -> bool {
        self.lock(|server| server.ready())
    }

    pub fn tick(&self, swdio_in: Level) -> Edges {
        self.lock(|server| server.tick(swdio_in))
    }

    pub fn pins(&self) -> Pins {
        self.lock(|server| server.pins())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use pretty_assertions::assert_eq;
    use swdmill_core::Register;

    fn read_idcode() -> Request {
        Request::Read {
            register: Register::dp(0),
        }
    }

    fn run_until_pending(server: &mut SwdServer) {
        for _ in 0..1_000 {
            if server.pending().is_some() && server.ready() {
                return;
            }
            server.tick(Level::Low);
        }
        panic!("transaction did not complete");
    }

    #[test]
    fn rejects_bad_divisor() {
        assert_eq!(
            SwdServer::new(ClockConfig { divisor: 3 }).map(|_| ()),
            Err(SwdError::InvalidDivisor(3))
        );
    }

    #[test]
    fn submit_while_busy() {
        let mut server = SwdServer::new(ClockConfig::default()).unwrap();
        assert!(server.ready());
        assert_eq!(server.submit(read_idcode()), Ok(()));

        // Trigger pending, not yet ticked
        assert_eq!(server.submit(read_idcode()), Err(SwdError::Busy));
        assert_eq!(server.reset(), Err(SwdError::Busy));

        server.tick(Level::Low);
        assert!(!server.ready());
        assert_eq!(server.submit(read_idcode()), Err(SwdError::Busy));
        assert_eq!(server.collect(), Err(SwdError::NotReady));
    }

    #[test]
    fn uncollected_response_blocks_submit() {
        let mut server = SwdServer::new(ClockConfig::default()).unwrap();
        server.submit(read_idcode()).unwrap();
        run_until_pending(&mut server);

        assert!(server.ready());
        assert_eq!(server.pending(), Some(Status::Error));
        assert_eq!(server.submit(read_idcode()), Err(SwdError::Busy));

        let response = server.collect().unwrap();
        assert_eq!(response.status(), Status::Error);
        assert_eq!(server.collect(), Err(SwdError::NotReady));
        assert_eq!(server.submit(read_idcode()), Ok(()));
    }

    #[test]
    fn reset_keeps_pending_response() {
        let mut server = SwdServer::new(ClockConfig::default()).unwrap();
        server.submit(read_idcode()).unwrap();
        run_until_pending(&mut server);

        assert_eq!(server.reset(), Ok(()));
        server.tick(Level::Low);
        assert_eq!(server.state(), EngineState::Reset);
        assert_eq!(server.reset(), Err(SwdError::Busy));
        assert_eq!(server.collect(), Err(SwdError::NotReady));

        while !server.ready() {
            server.tick(Level::Low);
        }
        assert_eq!(
            server.collect(),
            Ok(Response::Read {
                status: Status::Error,
                rdata: 0
            })
        );
    }

    #[test]
    fn collect_with_nothing_submitted() {
        let mut server = SwdServer::new(ClockConfig::default()).unwrap();
        assert_eq!(server.collect(), Err(SwdError::NotReady));
        for _ in 0..10 {
            server.tick(Level::Low);
        }
        assert_eq!(server.collect(), Err(SwdError::NotReady));
    }

    #[test]
    fn shared_server() {
        let server = SwdServer::new(ClockConfig::new(4).unwrap()).unwrap();
        let shared: SharedServer<NoopRawMutex> = SharedServer::new(server);

        shared.submit(read_idcode()).unwrap();
        assert_eq!(shared.submit(read_idcode()), Err(SwdError::Busy));

        let response = loop {
            shared.tick(Level::Low);
            if let Ok(response) = shared.collect() {
                break response;
            }
        };
        assert_eq!(response.status(), Status::Error);
        assert!(shared.ready());
        assert_eq!(shared.lock(|server| server.engine().divisor()), 4);
    }
}
