//! The object handed to sketch code for one render.
//!
//! Sketches see it as `BTLDR` with the fields `rnd`, `seed`, `iterationNumber`,
//! `isPreview`, `svg` and `v`. Those names are the sketch-facing ABI.

use serde::Serialize;

use crate::params::{IterationNumber, Seed};
use crate::rng::{self, RandomStream};

/// Version tag sketches can check before relying on contract fields.
pub const CONTRACT_VERSION: &str = "svg-js:0.0.1";

/// Name of the contract parameter inside the sketch wrapper.
pub const CONTRACT_BINDING: &str = "BTLDR";

/// Everything a sketch receives for one render.
///
/// `S` is whatever reference the active isolation strategy uses for the
/// drawing surface. The contract is consumed by the strategy; once the
/// surface is detached the stream must not be reachable anymore.
#[derive(Debug)]
pub struct ExecutionContract<S> {
    pub rnd: RandomStream,
    pub seed: Seed,
    pub iteration_number: IterationNumber,
    pub is_preview: bool,
    pub surface: S,
    pub version: &'static str,
}

impl<S> ExecutionContract<S> {
    /// Build a fresh contract. The stream always starts at its first draw.
    pub fn build(seed: Seed, iteration_number: IterationNumber, surface: S) -> Self {
        Self {
            rnd: rng::derive(seed.value()),
            seed,
            iteration_number,
            is_preview: is_preview_default(seed, iteration_number),
            surface,
            version: CONTRACT_VERSION,
        }
    }

    /// The serialisable part of the contract.
    pub fn data(&self) -> ContractData {
        ContractData::new(self.seed, self.iteration_number)
    }
}

/// True only for the "no parameters supplied" preview.
pub fn is_preview_default(seed: Seed, iteration_number: IterationNumber) -> bool {
    seed.value() == 0 && iteration_number.value() == 0
}

/// Contract fields that can cross a serialisation boundary.
///
/// Serialise with `serialize_large_number_types_as_bigints` so `seed` keeps
/// full precision on the JavaScript side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractData {
    pub seed: u64,
    pub iteration_number: u32,
    pub is_preview: bool,
    #[serde(rename = "v")]
    pub version: &'static str,
}

impl ContractData {
    pub fn new(seed: Seed, iteration_number: IterationNumber) -> Self {
        Self {
            seed: seed.value(),
            iteration_number: iteration_number.value(),
            is_preview: is_preview_default(seed, iteration_number),
            version: CONTRACT_VERSION,
        }
    }
}
