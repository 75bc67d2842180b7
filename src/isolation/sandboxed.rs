//! Cross-origin execution inside a sandboxed frame.
//!
//! The sketch, seed and iteration number are baked into one standalone SVG
//! document. Nothing crosses the frame boundary afterwards except the load
//! event, so the random stream is re-implemented in the document itself with
//! `BigInt` arithmetic. It must match `rng::derive` draw for draw.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{wrap_in_closure, SVG_NS};
use crate::contract::{ContractData, CONTRACT_BINDING};

/// Sandbox flags for the frame: scripts yes, same-origin access no.
pub const FRAME_SANDBOX: &str = "allow-scripts";

const GENERATOR_JS: &str = r#"function splitmix64(n0) {
  let n = n0;
  return function () {
    let z = n = (n + 0x9e3779b97f4a7c15n) & 0xffffffffffffffffn;
    z = (z ^ (z >> 30n)) * 0xbf58476d1ce4e5b9n & 0xffffffffffffffffn;
    z = (z ^ (z >> 27n)) * 0x94d049bb133111ebn & 0xffffffffffffffffn;
    return Number((z ^ (z >> 31n)) & 0xffffffffn) >>> 0;
  };
}
function sfc32(a, b, c, d) {
  return function () {
    d |= 0;
    let t = (a |= 0) + (b |= 0) | 0;
    t = (t + d) | 0;
    d = (d + 1) | 0;
    a = b ^ (b >>> 9);
    b = (c + (c << 3)) | 0;
    c = (c << 21) | (c >>> 11);
    c = (c + t) | 0;
    return (t >>> 0) / 4294967296;
  };
}
"#;

/// Script that sets up the contract inside the frame and calls the sketch.
pub fn frame_script(data: &ContractData, source: &str) -> String {
    let mut script = String::with_capacity(GENERATOR_JS.len() + source.len() + 512);
    script.push_str("(() => {\n");
    script.push_str(GENERATOR_JS);
    script.push_str(&format!(
        "const SEED = {seed}n;\n\
         const sm = splitmix64(SEED), a = sm(), b = sm(), c = sm(), d = sm();\n\
         const {binding} = {{\n  \
           rnd: sfc32(a, b, c, d),\n  \
           seed: SEED,\n  \
           iterationNumber: {iteration},\n  \
           isPreview: {preview},\n  \
           svg: document.documentElement,\n  \
           v: '{version}'\n\
         }};\n",
        seed = data.seed,
        binding = CONTRACT_BINDING,
        iteration = data.iteration_number,
        preview = data.is_preview,
        version = data.version,
    ));
    script.push_str(&wrap_in_closure(source, CONTRACT_BINDING));
    script.push_str("\n})();");
    script
}

/// Make `text` safe inside a CDATA section by splitting every `]]>`.
pub fn escape_cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

/// The whole SVG document loaded by the frame.
pub fn frame_document(data: &ContractData, source: &str) -> String {
    format!(
        "<svg xmlns=\"{ns}\" width=\"100%\" height=\"100%\">\
         <script type=\"application/javascript\"><![CDATA[\n{script}\n]]></script>\
         </svg>",
        ns = SVG_NS,
        script = escape_cdata(&frame_script(data, source)),
    )
}

/// Opaque `data:` reference for a frame document.
pub fn data_uri(document: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(document.as_bytes()))
}

#[cfg(target_arch = "wasm32")]
pub use dom::SandboxedFrameStrategy;

#[cfg(target_arch = "wasm32")]
mod dom {
    use std::cell::RefCell;

    use async_trait::async_trait;
    use futures::channel::oneshot;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{Document, Element, HtmlIFrameElement};

    use super::{data_uri, frame_document, FRAME_SANDBOX};
    use crate::contract::ContractData;
    use crate::error::ExecutionError;
    use crate::isolation::{IsolationKind, IsolationStrategy, RenderRequest};
    use crate::web::dom_error;

    struct LiveFrame {
        frame: HtmlIFrameElement,
        _onload: Closure<dyn FnMut()>,
    }

    pub struct SandboxedFrameStrategy {
        document: Document,
        stage: Element,
        live: RefCell<Option<LiveFrame>>,
    }

    impl SandboxedFrameStrategy {
        pub fn new(document: Document, stage: Element) -> Self {
            Self {
                document,
                stage,
                live: RefCell::new(None),
            }
        }
    }

    #[async_trait(?Send)]
    impl IsolationStrategy for SandboxedFrameStrategy {
        fn kind(&self) -> IsolationKind {
            IsolationKind::Sandboxed
        }

        async fn execute(&self, request: &RenderRequest, source: &str) -> Result<(), ExecutionError> {
            let data = ContractData::new(request.seed, request.iteration);
            let src = data_uri(&frame_document(&data, source));

            let frame: HtmlIFrameElement = self
                .document
                .create_element("iframe")
                .map_err(dom_error)?
                .dyn_into()
                .map_err(|_| ExecutionError::Dom("created element is not an iframe".into()))?;
            frame.set_attribute("sandbox", FRAME_SANDBOX).map_err(dom_error)?;
            frame.set_attribute("title", "Sketch preview").map_err(dom_error)?;
            frame
                .set_attribute("style", "width:100%;height:100%;border:0;display:block")
                .map_err(dom_error)?;

            let (tx, rx) = oneshot::channel::<()>();
            let mut tx = Some(tx);
            let onload = Closure::<dyn FnMut()>::new(move || {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            });
            frame.set_onload(Some(onload.as_ref().unchecked_ref()));
            frame.set_src(&src);

            self.stage.append_child(&frame).map_err(dom_error)?;
            self.live.replace(Some(LiveFrame {
                frame,
                _onload: onload,
            }));

            // Detaching drops the closure and with it the sender.
            rx.await.map_err(|_| ExecutionError::Detached)
        }

        fn detach(&self) {
            if let Some(live) = self.live.take() {
                live.frame.set_onload(None);
                live.frame.remove();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{IterationNumber, Seed};
    use base64::Engine as _;

    #[test]
    fn test_seed_is_bigint_literal() {
        let data = ContractData::new(Seed(u64::MAX), IterationNumber(7));
        let script = frame_script(&data, "");
        assert!(script.contains("const SEED = 18446744073709551615n;"));
        assert!(script.contains("iterationNumber: 7,"));
        assert!(script.contains("isPreview: false,"));
        assert!(script.contains("v: 'svg-js:0.0.1'"));
    }

    #[test]
    fn test_surface_discovered_inside_frame() {
        let data = ContractData::new(Seed(0), IterationNumber(0));
        let script = frame_script(&data, "draw(BTLDR);");
        assert!(script.contains("svg: document.documentElement,"));
        assert!(script.contains("isPreview: true,"));
        assert!(script.contains("(function (BTLDR) {\ndraw(BTLDR);\n})(BTLDR);"));
    }

    #[test]
    fn test_cdata_terminator_in_source_is_split() {
        let data = ContractData::new(Seed(1), IterationNumber(0));
        let doc = frame_document(&data, "const s = 'a]]>b';");
        assert_eq!(doc.matches("]]>").count(), 2);
        assert!(doc.contains("'a]]]]><![CDATA[>b'"));
        assert!(doc.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(doc.ends_with("]]></script></svg>"));
    }

    #[test]
    fn test_data_uri_round_trips_document() {
        let data = ContractData::new(Seed(894_188), IterationNumber(2));
        let doc = frame_document(&data, "// ünïcode sketch");
        let uri = data_uri(&doc);
        let payload = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let decoded = STANDARD.decode(payload).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), doc);
    }

    #[test]
    fn test_generator_uses_native_mixing_constants() {
        use crate::rng::{GOLDEN_GAMMA, MIX_1, MIX_2};

        for constant in [GOLDEN_GAMMA, MIX_1, MIX_2] {
            let literal = format!("{:#x}n", constant);
            assert!(GENERATOR_JS.contains(&literal), "missing {}", literal);
        }
        for shift in ["(z >> 30n)", "(z >> 27n)", "(z >> 31n)"] {
            assert!(GENERATOR_JS.contains(shift), "missing {}", shift);
        }
        assert!(GENERATOR_JS.contains("& 0xffffffffn) >>> 0;"));
    }

    #[test]
    fn test_generator_sfc32_steps() {
        for line in [
            "let t = (a |= 0) + (b |= 0) | 0;",
            "t = (t + d) | 0;",
            "d = (d + 1) | 0;",
            "a = b ^ (b >>> 9);",
            "b = (c + (c << 3)) | 0;",
            "c = (c << 21) | (c >>> 11);",
            "c = (c + t) | 0;",
            "return (t >>> 0) / 4294967296;",
        ] {
            assert!(GENERATOR_JS.contains(line), "missing {:?}", line);
        }
    }

    #[test]
    fn test_frame_flags_withhold_same_origin() {
        assert!(!FRAME_SANDBOX.contains("allow-same-origin"));
        assert!(FRAME_SANDBOX.contains("allow-scripts"));
    }
}
