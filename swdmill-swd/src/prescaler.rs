// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWCLK Prescaler
//!
//! Divides the reference tick into the edge events the engine uses to
//! generate SWCLK.  With a divisor of `D` one SWCLK period lasts `D` ticks,
//! with the clock driven low on `rising` and high on `falling`, half a
//! period apart.
//!
//! ```text
//!  tick       0   1   2   3   4   5   6   7      (D = 4)
//!  counter    3   2   1   0   3   2   1   0
//!  event          F   P   R       F   P   R
//!  SWCLK          H   H   L   L   H   H   L
//! ```
//!
//! `rising` and `falling` are named after the internal counter rather than
//! SWCLK, so the target samples on the SWCLK edge produced by `falling`, while
//! the engine shifts on `rising`.  `pre_rising` fires one tick before
//! `rising`, and is where the engine commits the state that must be live when
//! the `rising` edge happens.

use crate::SwdError;

/// Edge events produced by a single prescaler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edges {
    /// SWCLK goes low.  The engine shifts out or samples a bit.
    pub rising: bool,

    /// SWCLK goes high.  The target samples or shifts a bit.
    pub falling: bool,

    /// The next tick is `rising`.
    pub pre_rising: bool,
}

/// Clock divider producing [`Edges`] from a reference tick.
#[derive(Debug, Clone)]
pub struct Prescaler {
    divisor: u32,
    counter: u32,
}

impl Prescaler {
    /// Creates a prescaler with the given divisor.
    ///
    /// Returns:
    /// - `Ok(Prescaler)` if `divisor` is even and at least 2.
    /// - `Err(SwdError::InvalidDivisor)` otherwise.
    pub fn new(divisor: u32) -> Result<Self, SwdError> {
        validate_divisor(divisor)?;
        Ok(Self {
            divisor,
            counter: divisor - 1,
        })
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Returns the events the next call to [`Self::tick()`] will produce,
    /// without advancing.
    pub fn peek(&self) -> Edges {
        Edges {
            rising: self.counter == 0,
            falling: self.counter == self.divisor / 2,
            pre_rising: self.counter == 1,
        }
    }

    /// Advances one reference tick, returning the events for this tick.
    /// Events are decoded from the counter before it is decremented.
    pub fn tick(&mut self) -> Edges {
        let edges = self.peek();
        self.counter = if self.counter > 0 {
            self.counter - 1
        } else {
            self.divisor - 1
        };
        edges
    }
}

pub(crate) fn validate_divisor(divisor: u32) -> Result<(), SwdError> {
    if divisor < 2 || !divisor.is_multiple_of(2) {
        return Err(SwdError::InvalidDivisor(divisor));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(3)]
    #[test_case(7)]
    fn rejects_bad_divisor(divisor: u32) {
        assert_eq!(
            Prescaler::new(divisor).map(|p| p.divisor()),
            Err(SwdError::InvalidDivisor(divisor))
        );
    }

    #[test]
    fn starts_at_top() {
        let prescaler = Prescaler::new(8).unwrap();
        assert_eq!(prescaler.counter(), 7);
    }

    #[test]
    fn divisor_four_sequence() {
        let mut prescaler = Prescaler::new(4).unwrap();
        let events: Vec<Edges> = (0..8).map(|_| prescaler.tick()).collect();

        let rising: Vec<usize> = (0..8).filter(|&ii| events[ii].rising).collect();
        let falling: Vec<usize> = (0..8).filter(|&ii| events[ii].falling).collect();
        let pre: Vec<usize> = (0..8).filter(|&ii| events[ii].pre_rising).collect();

        // Counter runs 3, 2, 1, 0, 3, 2, 1, 0
        assert_eq!(rising, [3, 7]);
        assert_eq!(falling, [1, 5]);
        assert_eq!(pre, [2, 6]);
    }

    #[test]
    fn divisor_two_overlaps_falling_and_pre_rising() {
        let mut prescaler = Prescaler::new(2).unwrap();
        let first = prescaler.tick();
        assert!(first.falling && first.pre_rising && !first.rising);
        let second = prescaler.tick();
        assert!(second.rising && !second.falling && !second.pre_rising);
    }

    #[test_case(2)]
    #[test_case(4)]
    #[test_case(6)]
    #[test_case(10)]
    #[test_case(64)]
    fn one_of_each_per_period(divisor: u32) {
        let mut prescaler = Prescaler::new(divisor).unwrap();
        let mut last_rising = None;
        for tick in 0..(divisor * 5) as usize {
            let peeked = prescaler.peek();
            let edges = prescaler.tick();
            assert_eq!(peeked, edges);

            if edges.pre_rising {
                assert!(prescaler.peek().rising, "pre_rising must precede rising");
            }
            if edges.rising {
                if let Some(last) = last_rising {
                    assert_eq!(tick - last, divisor as usize);
                }
                last_rising = Some(tick);
            }
        }
        assert!(last_rising.is_some());
    }
}
