//! Decorative layout decisions: the cyclic left-offset sequence applied
//! to each fetched batch, and the display font drawn once per visit.
//!
//! All randomness flows through [`LayoutRandomness`] so tests can pin the
//! draws and assert exact assignments.

use crate::models::ContentItem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Base left offsets in percent, cycled over each batch in fetch order
pub const BASE_OFFSETS: [u8; 6] = [0, 10, 20, 30, 40, 50];

/// Fonts shipped with the site; one is drawn per visit
pub const DISPLAY_FONTS: [&str; 8] = [
    "Cooper Black",
    "Boecklins Universe",
    "Brush Script",
    "Davida Bold",
    "Papyrus",
    "Comic Sans Bold",
    "Choc",
    "Alte Haas Grotesk",
];

/// The three single-swap variations of the base sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPattern {
    /// Swap 10% and 20%
    MiddlePair,
    /// Swap 40% and 50%
    TailPair,
    /// Swap 0% and 10%
    HeadPair,
}

impl SwapPattern {
    fn indices(self) -> (usize, usize) {
        match self {
            SwapPattern::MiddlePair => (1, 2),
            SwapPattern::TailPair => (4, 5),
            SwapPattern::HeadPair => (0, 1),
        }
    }
}

/// Random decisions the layout engine needs, injected so callers control
/// determinism.
pub trait LayoutRandomness: Send {
    /// Swap applied to the base sequence for one batch; `None` keeps the
    /// base order. Drawn per batch: probability 0.5 of a swap, uniform
    /// over the three patterns.
    fn swap_decision(&mut self) -> Option<SwapPattern>;

    /// Index into a font table of the given size
    fn font_index(&mut self, len: usize) -> usize;
}

/// Production randomness backed by a seedable generator
pub struct RngRandomness {
    rng: StdRng,
}

impl RngRandomness {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl LayoutRandomness for RngRandomness {
    fn swap_decision(&mut self) -> Option<SwapPattern> {
        if !self.rng.gen_bool(0.5) {
            return None;
        }
        Some(match self.rng.gen_range(0..3) {
            0 => SwapPattern::MiddlePair,
            1 => SwapPattern::TailPair,
            _ => SwapPattern::HeadPair,
        })
    }

    fn font_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Assigns offsets batch by batch and picks the visit font
pub struct LayoutEngine {
    randomness: Box<dyn LayoutRandomness>,
}

impl LayoutEngine {
    pub fn new(randomness: Box<dyn LayoutRandomness>) -> Self {
        Self { randomness }
    }

    /// Decorate one fetched batch. The sequence index restarts at 0 for
    /// every batch, and the swap decision is drawn once per batch.
    pub fn assign_offsets(&mut self, items: &mut [ContentItem]) {
        let mut sequence = BASE_OFFSETS;
        if let Some(pattern) = self.randomness.swap_decision() {
            let (i, j) = pattern.indices();
            sequence.swap(i, j);
        }
        for (index, item) in items.iter_mut().enumerate() {
            item.layout_offset_pct = sequence[index % sequence.len()];
        }
    }

    pub fn pick_font(&mut self) -> &'static str {
        DISPLAY_FONTS[self.randomness.font_index(DISPLAY_FONTS.len())]
    }
}
