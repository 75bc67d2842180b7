//! Render parameters: seed and iteration number.
//!
//! Both arrive as free-form text from the host page. Parsing is explicit and
//! typed; every failure has a documented fallback of 0.

use std::fmt;

use crate::error::{IterationParseError, SeedParseError};

/// Longest seed the programmatic `seed` setter keeps.
pub const SEED_INPUT_MAX_DIGITS: usize = 6;

/// Seed for one render. Displays as its exact decimal value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seed(pub u64);

impl Seed {
    /// Strip every non-digit and parse the rest.
    pub fn parse(input: &str) -> Result<Self, SeedParseError> {
        let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse::<u64>().map(Seed).map_err(|_| SeedParseError {
            input: input.to_string(),
        })
    }

    /// Like [`Seed::parse`], falling back to seed 0.
    pub fn normalize(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|err| {
            log::debug!("{}, using seed 0", err);
            Seed(0)
        })
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Clean an edited seed field: digits only, at most six of them.
///
/// The result may be empty; it still normalises to seed 0 at render time.
pub fn normalize_seed_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(SEED_INPUT_MAX_DIGITS)
        .collect()
}

/// Iteration number passed through to the sketch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IterationNumber(pub u32);

impl IterationNumber {
    /// Parse numeric text, floor it and clamp it at 0.
    ///
    /// Surrounding whitespace is ignored and empty text means 0. Values past
    /// `u32::MAX` saturate.
    pub fn parse(input: &str) -> Result<Self, IterationParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(IterationNumber(0));
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(IterationNumber(v.floor().max(0.0) as u32)),
            _ => Err(IterationParseError {
                input: input.to_string(),
            }),
        }
    }

    /// Like [`IterationNumber::parse`], falling back to 0.
    pub fn normalize(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|err| {
            log::debug!("{}, using 0", err);
            IterationNumber(0)
        })
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IterationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
