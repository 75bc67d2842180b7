//! In-memory stand-ins for the host seams, used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::error::{ExecutionError, FetchFailure};
use crate::host::{KeyValueStore, SourceFetcher, Stage, Timer};
use crate::isolation::{IsolationKind, IsolationStrategy, RenderRequest};

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.borrow().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.insert(key, value);
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Fetcher answering from a route table. Calls can be held back with gates.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    routes: Rc<RefCell<HashMap<String, Result<String, FetchFailure>>>>,
    gates: Rc<RefCell<VecDeque<oneshot::Receiver<()>>>>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl ScriptedFetcher {
    pub fn route(&self, url: &str, response: Result<&str, FetchFailure>) {
        self.routes
            .borrow_mut()
            .insert(url.to_string(), response.map(str::to_string));
    }

    /// Hold the next fetch call until the returned sender fires.
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push_back(rx);
        tx
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure> {
        self.requests.borrow_mut().push(url.to_string());
        let gate = self.gates.borrow_mut().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.routes
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchFailure::Network(format!("no route for {}", url))))
    }
}

/// Isolation strategy that records what it was asked to run.
#[derive(Clone)]
pub struct RecordingIsolation {
    kind: IsolationKind,
    executions: Rc<RefCell<Vec<(RenderRequest, String)>>>,
    live: Rc<Cell<Option<u64>>>,
    detaches: Rc<Cell<usize>>,
    fail_with: Rc<RefCell<Option<ExecutionError>>>,
}

impl RecordingIsolation {
    pub fn new(kind: IsolationKind) -> Self {
        Self {
            kind,
            executions: Rc::default(),
            live: Rc::default(),
            detaches: Rc::default(),
            fail_with: Rc::default(),
        }
    }

    pub fn executions(&self) -> Vec<(RenderRequest, String)> {
        self.executions.borrow().clone()
    }

    /// Generation of the attached surface.
    pub fn live(&self) -> Option<u64> {
        self.live.get()
    }

    pub fn detaches(&self) -> usize {
        self.detaches.get()
    }

    pub fn fail_next(&self, err: ExecutionError) {
        self.fail_with.replace(Some(err));
    }
}

#[async_trait(?Send)]
impl IsolationStrategy for RecordingIsolation {
    fn kind(&self) -> IsolationKind {
        self.kind
    }

    async fn execute(&self, request: &RenderRequest, source: &str) -> Result<(), ExecutionError> {
        assert_eq!(self.live.get(), None, "surface attached twice");
        self.executions
            .borrow_mut()
            .push((*request, source.to_string()));
        self.live.set(Some(request.generation));
        match self.fail_with.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn detach(&self) {
        self.live.set(None);
        self.detaches.set(self.detaches.get() + 1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    BeginLoading,
    EndLoading,
    Clear,
    Error(String),
    Unmount,
}

#[derive(Clone, Default)]
pub struct RecordingStage {
    events: Rc<RefCell<Vec<StageEvent>>>,
}

impl RecordingStage {
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.borrow().clone()
    }

    pub fn loading(&self) -> bool {
        self.events.borrow().iter().fold(false, |loading, e| match e {
            StageEvent::BeginLoading => true,
            StageEvent::EndLoading => false,
            _ => loading,
        })
    }
}

impl Stage for RecordingStage {
    fn begin_loading(&self) {
        self.events.borrow_mut().push(StageEvent::BeginLoading);
    }

    fn end_loading(&self) {
        self.events.borrow_mut().push(StageEvent::EndLoading);
    }

    fn clear(&self) {
        self.events.borrow_mut().push(StageEvent::Clear);
    }

    fn show_error(&self, message: &str) {
        self.events
            .borrow_mut()
            .push(StageEvent::Error(message.to_string()));
    }

    fn unmount(&self) {
        self.events.borrow_mut().push(StageEvent::Unmount);
    }
}

/// Virtual clock; sleepers wake only when the test advances it. Animation
/// frames are immediate unless [`ManualClock::hold_frames`] was called.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    sleepers: Rc<RefCell<Vec<(u64, oneshot::Sender<()>)>>>,
    hold_frames: Rc<Cell<bool>>,
    frame_waiters: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
}

impl ManualClock {
    /// From now on `next_frame` waits for [`ManualClock::tick_frame`].
    pub fn hold_frames(&self) {
        self.hold_frames.set(true);
    }

    /// Number of callers waiting for the next frame.
    pub fn frame_waiters(&self) -> usize {
        self.frame_waiters.borrow().len()
    }

    /// Deliver one animation frame to everyone waiting for it.
    pub fn tick_frame(&self) {
        let waiting = std::mem::take(&mut *self.frame_waiters.borrow_mut());
        for tx in waiting {
            let _ = tx.send(());
        }
    }

    pub fn advance(&self, ms: u64) {
        let now = self.now.get() + ms;
        self.now.set(now);
        let pending = std::mem::take(&mut *self.sleepers.borrow_mut());
        let (due, waiting): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|(deadline, _)| *deadline <= now);
        self.sleepers.borrow_mut().extend(waiting);
        for (_, tx) in due {
            let _ = tx.send(());
        }
    }
}

#[async_trait(?Send)]
impl Timer for ManualClock {
    async fn sleep(&self, ms: u32) {
        let (tx, rx) = oneshot::channel();
        self.sleepers
            .borrow_mut()
            .push((self.now.get() + ms as u64, tx));
        let _ = rx.await;
    }

    async fn next_frame(&self) {
        if !self.hold_frames.get() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.frame_waiters.borrow_mut().push(tx);
        let _ = rx.await;
    }
}
