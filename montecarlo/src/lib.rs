//! # montecarlo
//!
//! A small Monte Carlo toolkit for weighted dice : )
//!
//! ## Explanation
//!
//! There are three pieces, each feeding the next:
//!
//! * [`WeightedDie`]: a set of unique faces with a mutable weight per face.
//!   Rolling samples faces with replacement, with
//!   `Pr[face] = weight(face) / sum(weights)`.
//! * [`MultiDieGame`]: rolls a fixed list of dice together and keeps the most
//!   recent play as a table, one row per roll and one column per die.
//! * [`ResultAnalyzer`]: snapshots a game's table and computes jackpots, face
//!   counts per roll, and combination / permutation counts.
//!
//! ```
//! use montecarlo::{seeded_rng, MultiDieGame, ResultAnalyzer, WeightedDie};
//!
//! let mut rng = seeded_rng(42);
//! let fair = WeightedDie::new(1..=6).unwrap();
//! let mut loaded = WeightedDie::new(1..=6).unwrap();
//! loaded.set_weight(&6, 5.0).unwrap();
//!
//! let mut game = MultiDieGame::new([&fair, &loaded]);
//! game.play(&mut rng, 100).unwrap();
//!
//! let analyzer = ResultAnalyzer::new(&game).unwrap();
//! assert_eq!(analyzer.combo_counts().total(), 100);
//! ```

#[macro_use]
mod macros;

pub mod analyzer;
pub mod cli;
pub mod die;
pub mod game;
pub mod parse;
pub mod stats;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fmt;
use thiserror::Error;

pub use analyzer::{FaceCounts, ResultAnalyzer, TupleCounts};
pub use die::{FaceDistr, WeightedDie};
pub use game::{MultiDieGame, NarrowResults, NarrowRow, ResultFormat, Results, WideResults};

/// A die face label. Faces only need to be cloneable and totally ordered, so
/// integers, chars, and strings all work. A single die never mixes types.
pub trait Face: Clone + Ord + fmt::Debug {}

impl<T> Face for T where T: Clone + Ord + fmt::Debug {}

////////////
// Errors //
////////////

#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("duplicate face: {0}")]
    DuplicateFace(String),
    #[error("unknown face: {0}")]
    UnknownFace(String),
    #[error("invalid weight: {0} (weights must be finite numbers)")]
    InvalidWeight(f64),
    #[error("invalid format '{0}': expected 'wide' or 'narrow'")]
    InvalidFormat(String),
    #[error("no results yet: the game has not been played")]
    NotPlayed,
    #[error("cannot roll: total weight is {0}, must be positive")]
    ZeroTotalWeight(f64),
    #[error("cannot roll: total weight overflows to {0}, must be finite")]
    TotalWeightOverflow(f64),
    #[error("cannot roll: face {face} has negative weight {weight}")]
    NegativeWeight { face: String, weight: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Render a face for an error message.
pub(crate) fn face_label<F: fmt::Debug + ?Sized>(face: &F) -> String {
    format!("{:?}", face)
}

/////////
// RNG //
/////////

/// The RNG used by the command line and recommended for library callers.
pub type DefaultRng = Xoshiro256PlusPlus;

/// An RNG seeded from OS entropy.
pub fn default_rng() -> DefaultRng {
    DefaultRng::from_entropy()
}

/// A reproducible RNG; the same `seed` always yields the same rolls.
pub fn seeded_rng(seed: u64) -> DefaultRng {
    DefaultRng::seed_from_u64(seed)
}

//////////
// util //
//////////

/// Returns the first value in `xs` that also appears earlier in `xs`, if any.
pub(crate) fn first_duplicate<T: Ord>(xs: &[T]) -> Option<&T> {
    let mut sorted = xs.iter().collect::<Vec<_>>();
    sorted.sort_unstable();

    sorted
        .windows(2)
        .find(|pair| pair[0] == pair[1])
        .map(|pair| pair[0])
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_first_duplicate() {
        assert_eq!(None, first_duplicate::<u8>(&[]));
        assert_eq!(None, first_duplicate(&[3, 1, 2]));
        assert_eq!(Some(&2), first_duplicate(&[1, 2, 2]));
        assert_eq!(Some(&"b"), first_duplicate(&["b", "a", "b", "c"]));
    }

    #[test]
    fn test_seeded_rng_reproducible() {
        let mut rng1 = seeded_rng(0xd15c0);
        let mut rng2 = seeded_rng(0xd15c0);
        for _ in 0..16 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_error_display() {
        let err = Error::NegativeWeight {
            face: face_label(&3),
            weight: -1.5,
        };
        assert_eq!("cannot roll: face 3 has negative weight -1.5", err.to_string());
        assert_eq!(
            "invalid format 'tall': expected 'wide' or 'narrow'",
            Error::InvalidFormat("tall".to_owned()).to_string()
        );
    }
}
