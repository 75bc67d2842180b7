//! Render controller: drives one sketch preview for the lifetime of the page.
//!
//! Each render goes `Loading -> Ready | Failed`; any trigger starts over.
//! Every render takes a new generation number when it starts. After each
//! suspension point (source fetch, frame load, animation frame) it checks that
//! its generation is still the newest and, if not, leaves the stage alone.
//! Fetches themselves are never cancelled.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::config::SandboxConfig;
use crate::error::{SandboxError, SourceFetchError};
use crate::host::{
    Field, InitialParams, KeyValueStore, Persistence, QueryParams, SourceFetcher, Stage, Timer,
};
use crate::isolation::{IsolationKind, IsolationStrategy, RenderRequest};
use crate::params::{normalize_seed_input, IterationNumber, Seed};
use crate::rng::SeedPicker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Snapshot of the controller's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    /// Seed text as last entered; normalised to a [`Seed`] per render.
    pub seed_input: String,
    pub iteration: IterationNumber,
    pub phase: Phase,
    /// Generation of the newest render started so far.
    pub generation: u64,
}

impl RenderState {
    pub fn seed(&self) -> Seed {
        Seed::normalize(&self.seed_input)
    }

    pub fn loading(&self) -> bool {
        self.phase == Phase::Loading
    }
}

/// How one render ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Ready,
    /// Carries the text shown in the error panel.
    Failed(String),
    /// A newer render started first; this one did not touch the stage.
    Superseded,
}

/// Host implementations the controller runs against.
pub struct Collaborators {
    pub fetcher: Box<dyn SourceFetcher>,
    pub isolation: Box<dyn IsolationStrategy>,
    pub stage: Box<dyn Stage>,
    pub timer: Box<dyn Timer>,
    pub spawner: Box<dyn LocalSpawn>,
    pub store: Box<dyn KeyValueStore>,
}

pub struct RenderController {
    config: SandboxConfig,
    fetcher: Box<dyn SourceFetcher>,
    isolation: Box<dyn IsolationStrategy>,
    stage: Box<dyn Stage>,
    timer: Box<dyn Timer>,
    spawner: Box<dyn LocalSpawn>,
    persistence: Persistence,
    picker: RefCell<SeedPicker>,
    state: RefCell<RenderState>,
    debounce_ticket: Cell<u64>,
    disposed: Cell<bool>,
}

impl RenderController {
    /// Build a controller; initial values come from `query`, then from the
    /// persisted values, then default to 0. Nothing renders until [`mount`].
    ///
    /// [`mount`]: RenderController::mount
    pub fn new(config: SandboxConfig, parts: Collaborators, query: &QueryParams) -> Rc<Self> {
        let persistence = Persistence::new(parts.store, config.cache);
        let initial = InitialParams::resolve(query, &persistence);
        Rc::new(Self {
            config,
            fetcher: parts.fetcher,
            isolation: parts.isolation,
            stage: parts.stage,
            timer: parts.timer,
            spawner: parts.spawner,
            persistence,
            picker: RefCell::new(SeedPicker::new()),
            state: RefCell::new(RenderState {
                seed_input: initial.seed_input,
                iteration: initial.iteration,
                phase: Phase::Idle,
                generation: 0,
            }),
            debounce_ticket: Cell::new(0),
            disposed: Cell::new(false),
        })
    }

    pub fn state(&self) -> RenderState {
        self.state.borrow().clone()
    }

    pub fn isolation_kind(&self) -> IsolationKind {
        self.isolation.kind()
    }

    /// Initial render.
    pub fn mount(self: &Rc<Self>) {
        log::info!(
            "sketch sandbox mounted ({} isolation, source {})",
            self.isolation.kind(),
            self.config.primary_source()
        );
        self.request_render();
    }

    /// Run one full render cycle. Never fails; the outcome says what happened.
    pub async fn render(self: Rc<Self>) -> RenderOutcome {
        if self.disposed.get() {
            return RenderOutcome::Superseded;
        }
        let request = self.begin();
        log::debug!(
            "render #{} started (seed {}, iteration {})",
            request.generation,
            request.seed,
            request.iteration
        );

        let source = match self.fetch_source().await {
            Ok(source) => source,
            Err(err) => return self.fail(request.generation, err.into()),
        };
        if !self.is_current(request.generation) {
            return self.superseded(request.generation);
        }

        if let Err(err) = self.isolation.execute(&request, &source).await {
            return self.fail(request.generation, err.into());
        }
        if self.isolation.kind() == IsolationKind::Inline {
            // Let the sketch's first paint land before the mask goes.
            self.timer.next_frame().await;
        }
        if !self.is_current(request.generation) {
            return self.superseded(request.generation);
        }

        self.state.borrow_mut().phase = Phase::Ready;
        self.stage.end_loading();
        log::debug!("render #{} ready", request.generation);
        RenderOutcome::Ready
    }

    /// Render after `debounce_ms` unless another edit arrives first.
    ///
    /// The ticket is taken when this is called, not when the future is first
    /// polled.
    pub fn schedule_render(self: &Rc<Self>) -> impl Future<Output = Option<RenderOutcome>> + 'static {
        let ticket = self.debounce_ticket.get() + 1;
        self.debounce_ticket.set(ticket);
        let this = Rc::clone(self);
        async move {
            this.timer.sleep(this.config.debounce_ms).await;
            if this.debounce_ticket.get() != ticket || this.disposed.get() {
                return None;
            }
            Some(this.render().await)
        }
    }

    /// Start a render right away.
    pub fn request_render(self: &Rc<Self>) {
        let this = Rc::clone(self);
        self.spawn(async move {
            this.render().await;
        });
    }

    /// Persist the current values and render right away.
    pub fn reload(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        self.persist();
        self.request_render();
    }

    /// Pick a new six-digit seed, persist it and render right away. A
    /// disposed controller returns its current seed unchanged.
    pub fn randomize_seed(self: &Rc<Self>) -> String {
        if self.disposed.get() {
            return self.seed();
        }
        let seed = self.picker.borrow_mut().six_digit().to_string();
        self.state.borrow_mut().seed_input = seed.clone();
        self.persist();
        self.request_render();
        seed
    }

    pub fn seed(&self) -> String {
        self.state.borrow().seed_input.clone()
    }

    /// Keep only digits (at most six), persist, render after the debounce.
    pub fn set_seed(self: &Rc<Self>, input: &str) {
        let seed_input = normalize_seed_input(input);
        self.edit(move |state| state.seed_input = seed_input);
    }

    pub fn iter(&self) -> String {
        self.state.borrow().iteration.to_string()
    }

    /// Floor and clamp at 0, persist, render after the debounce.
    pub fn set_iter(self: &Rc<Self>, input: &str) {
        let iteration = IterationNumber::normalize(input);
        self.edit(move |state| state.iteration = iteration);
    }

    /// Seed back to 0 and forget the persisted seed.
    pub fn reset_seed(self: &Rc<Self>) {
        self.reset(Field::Seed);
    }

    /// Iteration back to 0 and forget the persisted iteration.
    pub fn reset_iter(self: &Rc<Self>) {
        self.reset(Field::Iteration);
    }

    /// Detach the surface, remove the stage from the page and ignore
    /// everything still in flight. The controller does nothing afterwards.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.debounce_ticket.set(self.debounce_ticket.get() + 1);
        {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.phase = Phase::Idle;
        }
        self.isolation.detach();
        self.stage.end_loading();
        self.stage.unmount();
        log::debug!("sketch sandbox disposed");
    }

    fn begin(&self) -> RenderRequest {
        // An explicit render makes any pending debounced one redundant.
        self.debounce_ticket.set(self.debounce_ticket.get() + 1);
        let request = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.phase = Phase::Loading;
            RenderRequest {
                generation: state.generation,
                seed: state.seed(),
                iteration: state.iteration,
            }
        };
        self.stage.begin_loading();
        self.isolation.detach();
        self.stage.clear();
        request
    }

    async fn fetch_source(&self) -> Result<String, SourceFetchError> {
        let primary = self.config.primary_source();
        let primary_cause = match self.fetcher.fetch_text(primary).await {
            Ok(source) => return Ok(source),
            Err(cause) => cause,
        };

        let fallback = self.config.fallback_source.as_str();
        log::warn!("could not fetch {} ({}), trying {}", primary, primary_cause, fallback);
        self.fetcher
            .fetch_text(fallback)
            .await
            .map_err(|fallback_cause| SourceFetchError {
                primary: primary.to_string(),
                primary_cause,
                fallback: fallback.to_string(),
                fallback_cause,
            })
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.disposed.get() && self.state.borrow().generation == generation
    }

    fn superseded(&self, generation: u64) -> RenderOutcome {
        log::debug!("render #{} superseded, result dropped", generation);
        RenderOutcome::Superseded
    }

    fn fail(&self, generation: u64, err: SandboxError) -> RenderOutcome {
        if !self.is_current(generation) {
            return self.superseded(generation);
        }
        let message = err.to_string();
        self.isolation.detach();
        self.stage.show_error(&message);
        self.stage.end_loading();
        self.state.borrow_mut().phase = Phase::Failed;
        log::error!("render #{} failed: {}", generation, message);
        RenderOutcome::Failed(message)
    }

    fn edit(self: &Rc<Self>, apply: impl FnOnce(&mut RenderState)) {
        if self.disposed.get() {
            return;
        }
        apply(&mut *self.state.borrow_mut());
        self.persist();
        self.request_debounced();
    }

    fn reset(self: &Rc<Self>, field: Field) {
        if self.disposed.get() {
            return;
        }
        let (seed_input, iteration) = {
            let mut state = self.state.borrow_mut();
            match field {
                Field::Seed => state.seed_input = "0".to_string(),
                Field::Iteration => state.iteration = IterationNumber(0),
            }
            (state.seed_input.clone(), state.iteration)
        };
        self.persistence.forget(field);
        match field {
            Field::Seed => self
                .persistence
                .save_field(Field::Iteration, &iteration.to_string()),
            Field::Iteration => self.persistence.save_field(Field::Seed, &seed_input),
        }
        self.request_debounced();
    }

    fn persist(&self) {
        let state = self.state.borrow();
        self.persistence.save(&state.seed_input, state.iteration);
    }

    fn request_debounced(self: &Rc<Self>) {
        let pending = self.schedule_render();
        self.spawn(async move {
            pending.await;
        });
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(task) {
            log::error!("could not start render task: {}", err);
        }
    }
}
