// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD register selector
//!
//! A request packet addresses one of four registers in either the Debug Port
//! or the currently selected Access Port bank.  [`Register`] captures that
//! selection.

use core::fmt;

/// Well known Debug Port register addresses (`A[3:2]`)
pub const DP_IDCODE: u8 = 0b00;
pub const DP_ABORT: u8 = 0b00;
pub const DP_CTRL_STAT: u8 = 0b01;
pub const DP_SELECT: u8 = 0b10;
pub const DP_RDBUFF: u8 = 0b11;

/// Selects a DP or AP register.
///
/// `addr` holds the two address bits `A[3:2]` as sent on the wire, where bit 0
/// of `addr` is `A[2]`.  Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Register {
    apndp: bool,
    addr: u8,
}

impl Register {
    /// Creates a register selector.  `addr` is masked to two bits.
    pub const fn new(apndp: bool, addr: u8) -> Self {
        Register {
            apndp,
            addr: addr & 0b11,
        }
    }

    /// Debug Port register `addr`.
    pub const fn dp(addr: u8) -> Self {
        Self::new(false, addr)
    }

    /// Access Port register `addr`, within the bank chosen by DP SELECT.
    pub const fn ap(addr: u8) -> Self {
        Self::new(true, addr)
    }

    /// Creates a register selector from an ADIv5 byte address, such as `0x4`
    /// for DP CTRL/STAT.
    ///
    /// Returns:
    /// - `Some(Register)` for addresses 0x0, 0x4, 0x8 and 0xC.
    /// - `None` for anything else.
    pub const fn from_byte_address(apndp: bool, address: u8) -> Option<Self> {
        if address & !0x0C != 0 {
            return None;
        }
        Some(Self::new(apndp, address >> 2))
    }

    /// `true` for an Access Port register, `false` for a Debug Port one.
    pub const fn apndp(&self) -> bool {
        self.apndp
    }

    /// The two address bits, `A[3:2]`.
    pub const fn addr(&self) -> u8 {
        self.addr
    }

    /// Address bit `n` (0 or 1) as sent on the wire.
    pub const fn addr_bit(&self, n: u8) -> bool {
        (self.addr >> n) & 1 == 1
    }

    /// The ADIv5 byte address of this register.
    pub const fn byte_address(&self) -> u8 {
        self.addr << 2
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = if self.apndp { "AP" } else { "DP" };
        write!(f, "{port} 0x{:X}", self.byte_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use pretty_assertions::assert_eq;

    #[test]
    fn addr_is_masked() {
        let reg = Register::dp(0b1110);
        assert_eq!(reg.addr(), 0b10);
        assert!(!reg.apndp());
    }

    #[test]
    fn addr_bits() {
        let reg = Register::ap(0b01);
        assert!(reg.addr_bit(0));
        assert!(!reg.addr_bit(1));
    }

    #[test]
    fn byte_address() {
        assert_eq!(
            Register::from_byte_address(false, 0x4),
            Some(Register::dp(DP_CTRL_STAT))
        );
        assert_eq!(
            Register::from_byte_address(true, 0xC),
            Some(Register::ap(0b11))
        );
        assert_eq!(Register::from_byte_address(false, 0x2), None);
        assert_eq!(Register::from_byte_address(false, 0x10), None);
        assert_eq!(Register::dp(DP_RDBUFF).byte_address(), 0xC);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Register::dp(DP_SELECT)), "DP 0x8");
        assert_eq!(format!("{}", Register::ap(0)), "AP 0x0");
    }
}
