// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![allow(dead_code)]

use swdmill_swd::sim::{Bench, SimTarget};
use swdmill_swd::{ClockConfig, EngineState, Request, Response};

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn bench(divisor: u32, target: SimTarget) -> Bench {
    init_logging();
    Bench::new(ClockConfig::new(divisor).unwrap(), target).unwrap()
}

/// Runs a transaction by hand, returning the response and every engine state
/// passed through, in order.
pub fn transact_states(bench: &mut Bench, request: Request) -> (Response, Vec<EngineState>) {
    bench.server_mut().submit(request).unwrap();
    let mut states = vec![bench.server().state()];
    for _ in 0..100_000 {
        bench.step();
        let state = bench.server().state();
        if states.last() != Some(&state) {
            states.push(state);
        }
        if let Ok(response) = bench.server_mut().collect() {
            return (response, states);
        }
    }
    panic!("{request} did not complete");
}
