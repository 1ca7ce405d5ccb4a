// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Driving a shared server from separate tick and caller loops.

mod common;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use pretty_assertions::assert_eq;

use swdmill_swd::sim::SimTarget;
use swdmill_swd::{
    ClockConfig, Level, Register, Request, Response, SharedServer, Status, SwdError, SwdServer,
};

struct Rig {
    shared: SharedServer<NoopRawMutex>,
    target: SimTarget,
    line: Level,
}

impl Rig {
    fn new(divisor: u32) -> Self {
        common::init_logging();
        let server = SwdServer::new(ClockConfig::new(divisor).unwrap()).unwrap();
        Self {
            shared: SharedServer::new(server),
            target: SimTarget::new(),
            line: Level::Low,
        }
    }

    fn tick(&mut self) {
        self.shared.tick(self.line);
        self.line = self.target.clock(&self.shared.pins());
    }

    fn poll(&mut self) -> Response {
        for _ in 0..10_000 {
            self.tick();
            match self.shared.collect() {
                Ok(response) => return response,
                Err(e) => assert!(e.is_transient()),
            }
        }
        panic!("no response");
    }
}

#[test]
fn write_then_read() {
    let mut rig = Rig::new(4);
    let register = Register::ap(0b01);

    rig.shared
        .submit(Request::Write {
            register,
            wdata: 0xCAFE_F00D,
        })
        .unwrap();
    assert_eq!(
        rig.shared.submit(Request::Read { register }),
        Err(SwdError::Busy)
    );
    assert_eq!(rig.poll(), Response::Write { status: Status::Ok });

    rig.shared.submit(Request::Read { register }).unwrap();
    let response = rig.poll();
    assert_eq!(response.data(), Some(0xCAFE_F00D));
    assert_eq!(response.parity_ok(), Some(true));
    assert!(rig.shared.ready());
}

#[test]
fn reset_through_lock() {
    let mut rig = Rig::new(2);
    rig.shared.reset().unwrap();
    rig.tick();
    assert!(!rig.shared.ready());
    while !rig.shared.ready() {
        rig.tick();
    }
    assert_eq!(rig.target.line_resets(), 2);
    assert_eq!(rig.shared.lock(|server| server.pending()), None);
}
