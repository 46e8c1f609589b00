//! Placement strategies.
//!
//! Each strategy only *selects* a block; [`Ledger::place`](crate::memory::ledger::Ledger)
//! applies the choice. Ties always resolve to the lowest address because the scan runs in
//! address order and only a strictly better candidate replaces the current one.

use crate::memory::block::MemoryBlock;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStrategy {
    #[default]
    First,
    Best,
    Worst,
}

impl FitStrategy {
    pub const ALL: [FitStrategy; 3] = [FitStrategy::First, FitStrategy::Best, FitStrategy::Worst];

    /// Index of the block this strategy picks for `requested` KB, if any.
    pub fn select(self, requested: usize, blocks: &[MemoryBlock]) -> Option<usize> {
        match self {
            FitStrategy::First => first_fit(requested, blocks),
            FitStrategy::Best => best_fit(requested, blocks),
            FitStrategy::Worst => worst_fit(requested, blocks),
        }
    }
}

impl fmt::Display for FitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStrategy::First => write!(f, "first"),
            FitStrategy::Best => write!(f, "best"),
            FitStrategy::Worst => write!(f, "worst"),
        }
    }
}

impl FromStr for FitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first-fit" | "firstfit" => Ok(FitStrategy::First),
            "best" | "best-fit" | "bestfit" => Ok(FitStrategy::Best),
            "worst" | "worst-fit" | "worstfit" => Ok(FitStrategy::Worst),
            other => Err(format!("unknown strategy '{}' (first|best|worst)", other)),
        }
    }
}

fn fits(block: &MemoryBlock, requested: usize) -> bool {
    block.is_free() && block.size >= requested
}

/// Lowest-address free block that is large enough.
pub fn first_fit(requested: usize, blocks: &[MemoryBlock]) -> Option<usize> {
    blocks.iter().position(|b| fits(b, requested))
}

/// Smallest free block that is large enough.
pub fn best_fit(requested: usize, blocks: &[MemoryBlock]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, block) in blocks.iter().enumerate() {
        if !fits(block, requested) {
            continue;
        }
        match best {
            Some((_, size)) if block.size >= size => {}
            _ => best = Some((i, block.size)),
        }
    }
    best.map(|(i, _)| i)
}

/// Largest free block that is large enough.
pub fn worst_fit(requested: usize, blocks: &[MemoryBlock]) -> Option<usize> {
    let mut worst: Option<(usize, usize)> = None;
    for (i, block) in blocks.iter().enumerate() {
        if !fits(block, requested) {
            continue;
        }
        match worst {
            Some((_, size)) if block.size <= size => {}
            _ => worst = Some((i, block.size)),
        }
    }
    worst.map(|(i, _)| i)
}
