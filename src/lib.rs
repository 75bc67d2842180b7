//! WebAssembly preview sandbox for seeded generative SVG sketches.
//!
//! A sketch is untrusted JavaScript that draws into an SVG surface using a
//! seeded random stream. This crate fetches the sketch, derives the stream
//! from the seed, runs the sketch under one of two isolation strategies and
//! keeps the preview in step with the latest seed/iteration edits.
//!
//! Everything except `web` and the `wasm_exports` below is host-independent
//! and tested natively.

pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod host;
pub mod isolation;
pub mod params;
pub mod rng;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// ─── WASM Exports (only compiled for wasm32 target) ─────────────────────────

#[cfg(target_arch = "wasm32")]
mod wasm_exports {
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;

    use crate::config::SandboxConfig;
    use crate::contract::CONTRACT_VERSION;
    use crate::controller::RenderController;
    use crate::error::ConfigError;
    use crate::params::Seed;
    use crate::{rng, web};

    /// Text for a seed/iteration value coming from JavaScript.
    fn js_text(value: &JsValue) -> String {
        if let Some(text) = value.as_string() {
            return text;
        }
        if let Some(n) = value.as_f64() {
            return n.to_string();
        }
        String::new()
    }

    /// Handle returned by `createSandbox`.
    #[wasm_bindgen]
    pub struct SandboxHandle {
        controller: Rc<RenderController>,
    }

    #[wasm_bindgen]
    impl SandboxHandle {
        /// Render now with the current values.
        pub fn render(&self) {
            self.controller.request_render();
        }

        /// Persist the current values and render now.
        pub fn reload(&self) {
            self.controller.reload();
        }

        /// Pick a six-digit seed and render now. Returns the new seed.
        #[wasm_bindgen(js_name = "randomizeSeed")]
        pub fn randomize_seed(&self) -> String {
            self.controller.randomize_seed()
        }

        #[wasm_bindgen(getter)]
        pub fn seed(&self) -> String {
            self.controller.seed()
        }

        #[wasm_bindgen(setter)]
        pub fn set_seed(&self, value: JsValue) {
            self.controller.set_seed(&js_text(&value));
        }

        #[wasm_bindgen(getter)]
        pub fn iter(&self) -> String {
            self.controller.iter()
        }

        #[wasm_bindgen(setter)]
        pub fn set_iter(&self, value: JsValue) {
            self.controller.set_iter(&js_text(&value));
        }

        #[wasm_bindgen(js_name = "resetSeed")]
        pub fn reset_seed(&self) {
            self.controller.reset_seed();
        }

        #[wasm_bindgen(js_name = "resetIter")]
        pub fn reset_iter(&self) {
            self.controller.reset_iter();
        }

        #[wasm_bindgen(getter)]
        pub fn loading(&self) -> bool {
            self.controller.state().loading()
        }

        /// `"inline"` or `"sandboxed"`.
        #[wasm_bindgen(getter)]
        pub fn isolation(&self) -> String {
            self.controller.isolation_kind().to_string()
        }

        /// Remove the surface and stop reacting to anything.
        pub fn dispose(&self) {
            self.controller.dispose();
        }
    }

    /// Mount a sandbox. Calling it twice mounts two; keep the handle.
    #[wasm_bindgen(js_name = "createSandbox")]
    pub fn wasm_create_sandbox(config: JsValue) -> Result<SandboxHandle, JsValue> {
        let config: SandboxConfig = if config.is_undefined() || config.is_null() {
            SandboxConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?
        };
        let controller = web::create_sandbox(config)?;
        Ok(SandboxHandle { controller })
    }

    /// First `count` draws for `seed`, for checking a sketch runtime against
    /// the reference stream.
    #[wasm_bindgen(js_name = "sampleStream")]
    pub fn wasm_sample_stream(seed: &str, count: usize) -> Vec<f64> {
        let mut stream = rng::derive(Seed::normalize(seed).value());
        (0..count).map(|_| stream.next_f64()).collect()
    }

    #[wasm_bindgen(js_name = "contractVersion")]
    pub fn wasm_contract_version() -> String {
        CONTRACT_VERSION.to_string()
    }
}
