//! Browser implementations of the host seams, plus sandbox construction.

use std::rc::Rc;

use async_trait::async_trait;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use js_sys::Promise;
use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    console, Document, Element, Request, RequestCache, RequestInit, Response, Storage,
    UrlSearchParams, Window,
};

use crate::config::SandboxConfig;
use crate::controller::{Collaborators, RenderController};
use crate::error::{ConfigError, ExecutionError, FetchFailure};
use crate::host::{KeyValueStore, QueryParams, SourceFetcher, Stage, Timer};
use crate::isolation::{
    InlineSvgStrategy, IsolationKind, IsolationStrategy, SandboxedFrameStrategy,
};

/// Best-effort text for a thrown or rejected JavaScript value.
pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.to_string());
    }
    format!("{:?}", value)
}

pub(crate) fn dom_error(value: JsValue) -> ExecutionError {
    ExecutionError::Dom(describe_js(&value))
}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

// ─── Logging ────────────────────────────────────────────────────────────────

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Route `log` records to the browser console. Safe to call more than once.
pub fn init_logging(level: LevelFilter) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

// ─── Source fetch ───────────────────────────────────────────────────────────

pub struct FetchSource {
    window: Window,
}

impl FetchSource {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

#[async_trait(?Send)]
impl SourceFetcher for FetchSource {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure> {
        let network = |e: JsValue| FetchFailure::Network(describe_js(&e));

        let init = RequestInit::new();
        init.set_method("GET");
        init.set_cache(RequestCache::NoStore);
        let request = Request::new_with_str_and_init(url, &init).map_err(network)?;

        let response: Response = JsFuture::from(self.window.fetch_with_request(&request))
            .await
            .map_err(network)?
            .dyn_into()
            .map_err(network)?;
        if !response.ok() {
            return Err(FetchFailure::Status(response.status()));
        }

        let body = JsFuture::from(response.text().map_err(network)?)
            .await
            .map_err(network)?;
        body.as_string()
            .ok_or_else(|| FetchFailure::Network("response body is not text".into()))
    }
}

// ─── Stage ──────────────────────────────────────────────────────────────────

const LOADING_CLASS: &str = "is-loading";
const ERROR_PANEL_STYLE: &str =
    "color:#333;background:#fafafa;padding:16px;margin:0;white-space:pre-wrap;overflow:auto;";

/// `#stage-wrap` holding the `#stage` surface slot and the `#stage-mask`
/// veil. The wrapper gets `is-loading` while a render is in progress; the
/// host stylesheet decides what that looks like.
pub struct DomStage {
    document: Document,
    wrap: Element,
    stage: Element,
}

impl DomStage {
    pub fn build(document: &Document, mount: &Element) -> Result<Self, JsValue> {
        let wrap = document.create_element("div")?;
        wrap.set_id("stage-wrap");

        let stage = document.create_element("div")?;
        stage.set_id("stage");
        stage.set_attribute("role", "img")?;
        stage.set_attribute("aria-label", "Preview Area")?;

        let mask = document.create_element("div")?;
        mask.set_id("stage-mask");
        mask.set_attribute("aria-hidden", "true")?;

        wrap.append_child(&stage)?;
        wrap.append_child(&mask)?;
        mount.prepend_with_node_1(&wrap)?;

        Ok(Self {
            document: document.clone(),
            wrap,
            stage,
        })
    }

    /// Element that isolation strategies attach surfaces to.
    pub fn surface_slot(&self) -> Element {
        self.stage.clone()
    }
}

impl Stage for DomStage {
    fn begin_loading(&self) {
        if let Err(err) = self.wrap.class_list().add_1(LOADING_CLASS) {
            log::warn!("could not show loading mask: {}", describe_js(&err));
        }
    }

    fn end_loading(&self) {
        if let Err(err) = self.wrap.class_list().remove_1(LOADING_CLASS) {
            log::warn!("could not hide loading mask: {}", describe_js(&err));
        }
    }

    fn clear(&self) {
        self.stage.set_text_content(None);
    }

    fn show_error(&self, message: &str) {
        self.clear();
        let panel = match self.document.create_element("pre") {
            Ok(panel) => panel,
            Err(err) => {
                log::error!("could not create error panel: {}", describe_js(&err));
                return;
            }
        };
        let _ = panel.set_attribute("style", ERROR_PANEL_STYLE);
        panel.set_text_content(Some(message));
        if let Err(err) = self.stage.append_child(&panel) {
            log::error!("could not show error panel: {}", describe_js(&err));
        }
    }

    fn unmount(&self) {
        self.wrap.remove();
    }
}

// ─── Timer ──────────────────────────────────────────────────────────────────

pub struct BrowserTimer {
    window: Window,
}

impl BrowserTimer {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

#[async_trait(?Send)]
impl Timer for BrowserTimer {
    async fn sleep(&self, ms: u32) {
        let window = &self.window;
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                &resolve,
                ms.min(i32::MAX as u32) as i32,
            );
            if scheduled.is_err() {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }

    async fn next_frame(&self) {
        let window = &self.window;
        let promise = Promise::new(&mut |resolve, _reject| {
            if window.request_animation_frame(&resolve).is_err() {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

// ─── Persistence ────────────────────────────────────────────────────────────

/// `localStorage`, or nothing if the page may not use it.
pub struct LocalStore {
    storage: Option<Storage>,
}

impl LocalStore {
    pub fn new(window: &Window) -> Self {
        let storage = window.local_storage().ok().flatten();
        if storage.is_none() {
            log::warn!("localStorage unavailable, seed and iteration will not persist");
        }
        Self { storage }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.set_item(key, value) {
                log::warn!("could not persist {}: {}", key, describe_js(&err));
            }
        }
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.remove_item(key) {
                log::warn!("could not remove {}: {}", key, describe_js(&err));
            }
        }
    }
}

// ─── Spawning ───────────────────────────────────────────────────────────────

/// Runs controller tasks on the browser microtask queue.
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

/// `seed` and `iter` from the page URL.
pub fn query_params(window: &Window) -> QueryParams {
    let search = window.location().search().unwrap_or_default();
    match UrlSearchParams::new_with_str(&search) {
        Ok(params) => QueryParams {
            seed: params.get("seed"),
            iter: params.get("iter"),
        },
        Err(_) => QueryParams::default(),
    }
}

/// The configured mount point, else `<main>`, else `<body>`.
fn find_mount(document: &Document, selector: Option<&str>) -> Result<Element, ConfigError> {
    let env = |e: JsValue| ConfigError::Environment(describe_js(&e));
    if let Some(selector) = selector {
        return document
            .query_selector(selector)
            .map_err(env)?
            .ok_or_else(|| ConfigError::MissingMount(selector.to_string()));
    }
    if let Some(main) = document.query_selector("main").map_err(env)? {
        return Ok(main);
    }
    document
        .body()
        .map(Element::from)
        .ok_or_else(|| ConfigError::MissingMount("body".to_string()))
}

/// Build the stage, wire every browser seam into a controller and start the
/// first render.
pub fn create_sandbox(config: SandboxConfig) -> Result<Rc<RenderController>, ConfigError> {
    init_logging(config.log_level);
    let env = |e: JsValue| ConfigError::Environment(describe_js(&e));

    let window = web_sys::window()
        .ok_or_else(|| ConfigError::Environment("no window".to_string()))?;
    let document = window
        .document()
        .ok_or_else(|| ConfigError::Environment("no document".to_string()))?;
    let mount = find_mount(&document, config.mount.as_deref())?;
    let stage = DomStage::build(&document, &mount).map_err(env)?;

    let isolation: Box<dyn IsolationStrategy> = match config.isolation {
        IsolationKind::Inline => {
            Box::new(InlineSvgStrategy::new(document.clone(), stage.surface_slot()))
        }
        IsolationKind::Sandboxed => {
            Box::new(SandboxedFrameStrategy::new(document.clone(), stage.surface_slot()))
        }
    };

    let query = query_params(&window);
    let store = LocalStore::new(&window);
    let controller = RenderController::new(
        config,
        Collaborators {
            fetcher: Box::new(FetchSource::new(window.clone())),
            isolation,
            stage: Box::new(stage),
            timer: Box::new(BrowserTimer::new(window)),
            spawner: Box::new(BrowserSpawner),
            store: Box::new(store),
        },
        &query,
    );
    controller.mount();
    Ok(controller)
}
