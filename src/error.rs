//! Error types for the preview sandbox.
//!
//! Only the render controller turns these into user-visible output: the
//! `Display` of a [`SandboxError`] is exactly the text of the error panel.

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
}

/// Both the primary and the fallback source location failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch source: {primary} ({primary_cause}) AND {fallback} ({fallback_cause})")]
pub struct SourceFetchError {
    pub primary: String,
    pub primary_cause: FetchFailure,
    pub fallback: String,
    pub fallback_cause: FetchFailure,
}

/// Seed text that does not denote a `u64`. Normalised to seed 0 by callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid seed {input:?}")]
pub struct SeedParseError {
    pub input: String,
}

/// Iteration text that is not a finite number. Normalised to 0 by callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid iteration number {input:?}")]
pub struct IterationParseError {
    pub input: String,
}

/// Failure while running sketch code through an isolation strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The sketch threw; carries the thrown value's description.
    #[error("{0}")]
    Threw(String),
    /// The wrapper never reached its completion marker, usually a syntax error.
    #[error("sketch did not run (check the console for a syntax error)")]
    DidNotRun,
    /// The surface was detached before execution finished.
    #[error("surface detached before the sketch finished loading")]
    Detached,
    /// The host document refused an operation.
    #[error("DOM error: {0}")]
    Dom(String),
}

/// Invalid `createSandbox` input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid sandbox config: {0}")]
    Invalid(String),
    #[error("no mount point found for selector {0:?}")]
    MissingMount(String),
    #[error("browser environment unavailable: {0}")]
    Environment(String),
}

/// Anything that can end a render in the failed state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error(transparent)]
    SourceFetch(#[from] SourceFetchError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
