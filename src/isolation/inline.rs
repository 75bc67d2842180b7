//! Same-document execution inside an inline `<svg>`.
//!
//! The contract object is built on the Rust side and parked on the new
//! `<svg>` node under [`CONTRACT_SLOT`]. The generated `<script>` picks it up
//! (and deletes it) when the node is inserted, runs the sketch, and leaves
//! either [`ERROR_SLOT`] or [`DONE_SLOT`] behind for the strategy to read.

use super::wrap_in_closure;

/// Property carrying the contract from Rust to the wrapper script.
pub const CONTRACT_SLOT: &str = "__sketchContract";
/// Set by the wrapper once the sketch returned or threw.
pub const DONE_SLOT: &str = "__sketchDone";
/// Set by the wrapper to the description of a thrown value.
pub const ERROR_SLOT: &str = "__sketchError";

/// Script text for an inline surface.
pub fn wrapper_script(source: &str) -> String {
    let call = wrap_in_closure(source, "contract");
    format!(
        r#"(() => {{
const svg = document.currentScript && document.currentScript.ownerSVGElement;
if (!svg) return;
const contract = svg.{contract_slot};
delete svg.{contract_slot};
try {{
{call}
}} catch (e) {{
svg.{error_slot} = String(e);
}}
svg.{done_slot} = true;
}})();"#,
        contract_slot = CONTRACT_SLOT,
        error_slot = ERROR_SLOT,
        done_slot = DONE_SLOT,
        call = call,
    )
}

#[cfg(target_arch = "wasm32")]
pub use dom::InlineSvgStrategy;

#[cfg(target_arch = "wasm32")]
mod dom {
    use std::cell::RefCell;

    use async_trait::async_trait;
    use js_sys::Reflect;
    use serde::Serialize;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, Element};

    use super::{wrapper_script, CONTRACT_SLOT, DONE_SLOT, ERROR_SLOT};
    use crate::contract::ExecutionContract;
    use crate::error::ExecutionError;
    use crate::isolation::{IsolationKind, IsolationStrategy, RenderRequest, SVG_NS};
    use crate::web::{describe_js, dom_error};

    /// What must stay alive while a surface is attached.
    struct LiveSurface {
        svg: Element,
        _rnd: Closure<dyn FnMut() -> f64>,
    }

    pub struct InlineSvgStrategy {
        document: Document,
        stage: Element,
        live: RefCell<Option<LiveSurface>>,
    }

    impl InlineSvgStrategy {
        pub fn new(document: Document, stage: Element) -> Self {
            Self {
                document,
                stage,
                live: RefCell::new(None),
            }
        }

        /// Turn the contract into the JavaScript object the sketch sees.
        fn contract_object(
            contract: ExecutionContract<Element>,
        ) -> Result<(JsValue, Closure<dyn FnMut() -> f64>), ExecutionError> {
            let serializer =
                serde_wasm_bindgen::Serializer::new().serialize_large_number_types_as_bigints(true);
            let object = contract
                .data()
                .serialize(&serializer)
                .map_err(|e| ExecutionError::Dom(e.to_string()))?;

            let ExecutionContract { mut rnd, surface, .. } = contract;
            let draw = Closure::<dyn FnMut() -> f64>::new(move || rnd.next_f64());

            Reflect::set(&object, &"rnd".into(), draw.as_ref()).map_err(dom_error)?;
            Reflect::set(&object, &"svg".into(), &surface).map_err(dom_error)?;
            Ok((object, draw))
        }
    }

    #[async_trait(?Send)]
    impl IsolationStrategy for InlineSvgStrategy {
        fn kind(&self) -> IsolationKind {
            IsolationKind::Inline
        }

        async fn execute(&self, request: &RenderRequest, source: &str) -> Result<(), ExecutionError> {
            let svg = self
                .document
                .create_element_ns(Some(SVG_NS), "svg")
                .map_err(dom_error)?;
            svg.set_attribute("data-generation", &request.generation.to_string())
                .map_err(dom_error)?;

            let contract = ExecutionContract::build(request.seed, request.iteration, svg.clone());
            let (object, draw) = Self::contract_object(contract)?;
            Reflect::set(&svg, &CONTRACT_SLOT.into(), &object).map_err(dom_error)?;

            let script = self
                .document
                .create_element_ns(Some(SVG_NS), "script")
                .map_err(dom_error)?;
            script
                .set_attribute("type", "application/javascript")
                .map_err(dom_error)?;
            script.set_text_content(Some(&wrapper_script(source)));
            svg.append_child(&script).map_err(dom_error)?;

            self.live.replace(Some(LiveSurface {
                svg: svg.clone(),
                _rnd: draw,
            }));

            // Inserting the surface into the document runs the script.
            self.stage.append_child(&svg).map_err(dom_error)?;

            let thrown = Reflect::get(&svg, &ERROR_SLOT.into()).unwrap_or(JsValue::UNDEFINED);
            if !thrown.is_undefined() {
                return Err(ExecutionError::Threw(describe_js(&thrown)));
            }
            let done = Reflect::get(&svg, &DONE_SLOT.into())
                .map(|v| v.is_truthy())
                .unwrap_or(false);
            if !done {
                return Err(ExecutionError::DidNotRun);
            }
            Ok(())
        }

        fn detach(&self) {
            if let Some(live) = self.live.take() {
                live.svg.remove();
            }
        }
    }
}
