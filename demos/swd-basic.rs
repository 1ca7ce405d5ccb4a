// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! swdmill example - Basic SWD operations
//!
//! This example connects an SWD engine to a simulated target, resets the
//! line, reads the target's IDCODE, powers up the debug domain via
//! CTRL/STAT, and reads the AP's IDR.
//!
//! To run this example:
//! - run the example with `RUST_LOG=info cargo run --example swd-basic`
//! - use `RUST_LOG=trace` to see every engine state transition

use log::{error, info};

use swdmill_core::{Register, register};
use swdmill_swd::sim::{Bench, SimTarget};
use swdmill_swd::{ClockConfig, Status, SwdError};

// Reference tick and target SWD clock
const REFERENCE_HZ: u32 = 48_000_000;
const SWCLK_HZ: u32 = 4_000_000;

// CTRL/STAT power up requests and acknowledgements
const CSYSPWRUPREQ: u32 = 1 << 30;
const CDBGPWRUPREQ: u32 = 1 << 28;
const CSYSPWRUPACK: u32 = 1 << 31;
const CDBGPWRUPACK: u32 = 1 << 29;

// SELECT value for AP 0, bank 0xF - the bank holding IDR
const SELECT_IDR_BANK: u32 = 0xF0;

// IDR is at 0xFC in the AP, so A[3:2] of 0b11 within bank 0xF
const AP_IDR: Register = Register::ap(0b11);

// A Cortex-M AHB-AP
const AHB_AP_IDR: u32 = 0x2477_0011;

fn main() -> Result<(), SwdError> {
    // Set up the logger - use RUST_LOG env variable to control log level
    pretty_env_logger::init();

    let config = ClockConfig::from_frequency(REFERENCE_HZ, SWCLK_HZ)?;
    info!(
        "SWCLK {}Hz from {}Hz reference, divisor {}",
        config.swclk_hz(REFERENCE_HZ),
        REFERENCE_HZ,
        config.divisor
    );

    // The target only answers after the switch sequence
    let mut target = SimTarget::requiring_switch();
    target.set_register(AP_IDR, AHB_AP_IDR);
    let mut bench = Bench::new(config, target)?;

    bench.line_reset()?;
    info!(
        "Line reset complete after {} ticks",
        bench.server().engine().ticks()
    );

    let idcode = bench.read(Register::dp(register::DP_IDCODE))?;
    if idcode.status() != Status::Ok {
        error!("Failed to read IDCODE: {idcode}");
        return Ok(());
    }
    info!("IDCODE: 0x{:08X}", idcode.data().unwrap_or_default());

    let response = bench.write(
        Register::dp(register::DP_CTRL_STAT),
        CSYSPWRUPREQ | CDBGPWRUPREQ,
    )?;
    info!("Power up request: {}", response.status());

    // The simulated target has no power controller, so acknowledge by hand
    bench.target_mut().set_register(
        Register::dp(register::DP_CTRL_STAT),
        CSYSPWRUPREQ | CDBGPWRUPREQ | CSYSPWRUPACK | CDBGPWRUPACK,
    );
    let ctrl_stat = bench.read(Register::dp(register::DP_CTRL_STAT))?;
    info!("CTRL/STAT: 0x{:08X}", ctrl_stat.data().unwrap_or_default());

    bench.write(Register::dp(register::DP_SELECT), SELECT_IDR_BANK)?;
    let idr = bench.read(AP_IDR)?;
    match idr.parity_ok() {
        Some(true) => info!("AP IDR: 0x{:08X}", idr.data().unwrap_or_default()),
        _ => error!("AP IDR parity error: {idr}"),
    }

    info!(
        "Example completed successfully in {} ticks",
        bench.server().engine().ticks()
    );
    Ok(())
}
