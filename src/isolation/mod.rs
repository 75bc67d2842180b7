//! Ways of running untrusted sketch code against an execution contract.
//!
//! Two strategies exist, chosen by `SandboxConfig::isolation`:
//!
//! - [`IsolationKind::Inline`]: the sketch runs inside an `<svg>` in the host
//!   document. It gets the literal surface node and a random stream backed by
//!   Rust, and its exceptions reach the controller. It also has the host
//!   page's full privileges.
//! - [`IsolationKind::Sandboxed`]: the sketch runs in an opaque-origin
//!   `<iframe sandbox="allow-scripts">` loaded from a `data:` SVG document. It
//!   cannot touch the host page, and the host only learns that the frame
//!   finished loading. Exceptions inside the frame are never reported.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ExecutionError;
use crate::params::{IterationNumber, Seed};

pub mod inline;
pub mod sandboxed;

#[cfg(target_arch = "wasm32")]
pub use inline::InlineSvgStrategy;
#[cfg(target_arch = "wasm32")]
pub use sandboxed::SandboxedFrameStrategy;

/// SVG namespace for created surfaces.
pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationKind {
    #[default]
    Inline,
    Sandboxed,
}

impl fmt::Display for IsolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationKind::Inline => f.write_str("inline"),
            IsolationKind::Sandboxed => f.write_str("sandboxed"),
        }
    }
}

/// Parameters of one render, tagged with the generation that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub generation: u64,
    pub seed: Seed,
    pub iteration: IterationNumber,
}

#[async_trait(?Send)]
pub trait IsolationStrategy {
    fn kind(&self) -> IsolationKind;

    /// Attach a fresh surface and run `source` against a new contract.
    ///
    /// Inline execution finishes before this returns; sandboxed execution
    /// resolves on the frame's load signal.
    async fn execute(&self, request: &RenderRequest, source: &str) -> Result<(), ExecutionError>;

    /// Drop the live surface, if any. Anything the previous sketch retained
    /// from its contract stops working.
    fn detach(&self);
}

/// Put `source` inside a closure taking the contract as its only parameter.
pub(crate) fn wrap_in_closure(source: &str, argument: &str) -> String {
    format!(
        "(function ({binding}) {{\n{source}\n}})({argument});",
        binding = crate::contract::CONTRACT_BINDING,
        source = source,
        argument = argument,
    )
}
