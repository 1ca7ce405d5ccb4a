// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD pin abstraction
//!
//! The engine does not touch hardware.  Instead it exposes the levels it
//! wants on its outputs, and accepts a sampled SWDIO level on every tick.
//! SWDIO is bidirectional, so it is split into an output level, an input
//! sample, and an output enable for an external tri-state or open-drain
//! buffer.

use core::fmt;

/// Logic level of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn is_high(&self) -> bool {
        matches!(self, Level::High)
    }

    pub fn is_low(&self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}

impl From<Level> for bool {
    fn from(value: Level) -> Self {
        value.is_high()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "0"),
            Level::High => write!(f, "1"),
        }
    }
}

/// Snapshot of the engine's SWD pins, as of the end of the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pins {
    swclk: Level,
    swdio_out: Level,
    swdio_in: Level,
    swdio_oe: bool,
}

impl Default for Pins {
    // Idle: clock parked high, output high but not driven, and nothing sampled
    fn default() -> Self {
        Self {
            swclk: Level::High,
            swdio_out: Level::High,
            swdio_in: Level::Low,
            swdio_oe: false,
        }
    }
}

impl Pins {
    /// The generated SWD clock.
    pub fn swclk(&self) -> Level {
        self.swclk
    }

    /// The level the engine puts on SWDIO when [`Self::swdio_oe()`] is set.
    pub fn swdio_out(&self) -> Level {
        self.swdio_out
    }

    /// The SWDIO level sampled on the last tick.  Reads low when nothing was
    /// driving the line.
    pub fn swdio_in(&self) -> Level {
        self.swdio_in
    }

    /// Whether the engine is driving SWDIO.
    pub fn swdio_oe(&self) -> bool {
        self.swdio_oe
    }

    /// The level the engine is actively driving onto SWDIO, if any.
    pub fn driven(&self) -> Option<Level> {
        self.swdio_oe.then_some(self.swdio_out)
    }

    /// Resolves the bidirectional line given what the target is driving.
    ///
    /// The engine's output wins when enabled, then the target's.  `None`
    /// means the line is floating and its level is down to any pull.
    pub fn resolve(&self, target: Option<Level>) -> Option<Level> {
        self.driven().or(target)
    }

    /// As [`Self::resolve()`], with a floating line reading low.
    pub fn line(&self, target: Option<Level>) -> Level {
        self.resolve(target).unwrap_or_default()
    }

    pub(crate) fn set_swclk(&mut self, level: Level) {
        self.swclk = level;
    }

    pub(crate) fn set_swdio_out(&mut self, level: Level) {
        self.swdio_out = level;
    }

    pub(crate) fn set_swdio_in(&mut self, level: Level) {
        self.swdio_in = level;
    }

    pub(crate) fn set_swdio_oe(&mut self, enable: bool) {
        self.swdio_oe = enable;
    }
}

impl fmt::Display for Pins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.swdio_oe { "out" } else { "in" };
        write!(
            f,
            "SWCLK={} SWDIO={}/{} ({dir})",
            self.swclk, self.swdio_out, self.swdio_in
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn idle_defaults() {
        let pins = Pins::default();
        assert_eq!(pins.swclk(), Level::High);
        assert_eq!(pins.swdio_in(), Level::Low);
        assert!(!pins.swdio_oe());
        assert_eq!(pins.driven(), None);
    }

    #[test]
    fn resolve_prefers_host() {
        let mut pins = Pins::default();
        assert_eq!(pins.resolve(None), None);
        assert_eq!(pins.line(None), Level::Low);
        assert_eq!(pins.resolve(Some(Level::High)), Some(Level::High));

        pins.set_swdio_oe(true);
        pins.set_swdio_out(Level::Low);
        assert_eq!(pins.resolve(None), Some(Level::Low));
        assert_eq!(pins.resolve(Some(Level::High)), Some(Level::Low));
    }

    #[test]
    fn level_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert!(!bool::from(Level::Low));
        assert_eq!(Level::default(), Level::Low);
    }
}
