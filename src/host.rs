//! Seams between the render controller and the page it runs in.
//!
//! The controller only talks to these traits, so the state machine runs the
//! same against the browser bindings in `web.rs` and against test fakes.

use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::params::IterationNumber;

/// Retrieves sketch source text.
#[async_trait(?Send)]
pub trait SourceFetcher {
    /// GET `url` and return the body as UTF-8 text. Non-success statuses are
    /// failures.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure>;
}

/// The visible region around the drawing surface.
pub trait Stage {
    /// Show the loading mask.
    fn begin_loading(&self);
    /// Hide the loading mask.
    fn end_loading(&self);
    /// Remove whatever the stage currently displays.
    fn clear(&self);
    /// Replace the stage content with a plain-text error panel.
    fn show_error(&self, message: &str);
    /// Take the stage out of the host page for good.
    fn unmount(&self);
}

/// Cooperative time source.
#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, ms: u32);
    /// Resolve at the next animation frame.
    async fn next_frame(&self);
}

/// Minimal string key-value store (browser: `localStorage`).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

pub const SEED_KEY: &str = "sketch-sandbox.seed";
pub const ITER_KEY: &str = "sketch-sandbox.iter";

/// Which persisted value an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Seed,
    Iteration,
}

impl Field {
    fn key(self) -> &'static str {
        match self {
            Field::Seed => SEED_KEY,
            Field::Iteration => ITER_KEY,
        }
    }
}

/// Last-used seed and iteration, stored only when caching is enabled.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
    enabled: bool,
}

impl Persistence {
    pub fn new(store: Box<dyn KeyValueStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }

    pub fn load(&self, field: Field) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.store.get(field.key()).filter(|v| !v.is_empty())
    }

    pub fn save(&self, seed_input: &str, iteration: IterationNumber) {
        if !self.enabled {
            return;
        }
        self.store.set(SEED_KEY, seed_input);
        self.store.set(ITER_KEY, &iteration.to_string());
    }

    /// Store a single value, leaving the other one alone.
    pub fn save_field(&self, field: Field, value: &str) {
        if self.enabled {
            self.store.set(field.key(), value);
        }
    }

    pub fn forget(&self, field: Field) {
        if self.enabled {
            self.store.remove(field.key());
        }
    }
}

/// `seed` and `iter` from the page URL, already extracted by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub seed: Option<String>,
    pub iter: Option<String>,
}

/// Values to start with. Query parameters win over persisted values, which
/// win over the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialParams {
    pub seed_input: String,
    pub iteration: IterationNumber,
}

impl InitialParams {
    pub fn resolve(query: &QueryParams, persistence: &Persistence) -> Self {
        let seed_text = query
            .seed
            .clone()
            .or_else(|| persistence.load(Field::Seed))
            .unwrap_or_else(|| "0".to_string());
        let iter_text = query
            .iter
            .clone()
            .or_else(|| persistence.load(Field::Iteration))
            .unwrap_or_default();

        let seed_input: String = seed_text.chars().filter(|c| c.is_ascii_digit()).collect();
        Self {
            seed_input: if seed_input.is_empty() { "0".to_string() } else { seed_input },
            iteration: IterationNumber::normalize(&iter_text),
        }
    }
}
