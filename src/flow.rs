//! Cooperative scheduling between out-of-band loads and the frame tick.
//!
//! Loads run as spawned tasks. When one finishes it does not touch its owner;
//! it sends a completion over a channel that the owner drains at the start of
//! its next frame tick. Frame ticks and completion handling therefore never
//! interleave, and no locks are needed.
//!
//! Each load carries a [`Liveness`] flag. Tearing an owner down revokes the
//! flag first, so completions that arrive afterwards are dropped instead of
//! being delivered to a disposed owner.
//!
//! # Spawners
//!
//! - natively, a `tokio` runtime handle
//! - headless hosts and tests, a `futures` [`LocalSpawner`](futures::executor::LocalSpawner)
//! - in the browser, [`BrowserSpawner`]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
#[cfg(not(target_arch = "wasm32"))]
use futures::future::BoxFuture;
#[cfg(target_arch = "wasm32")]
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

#[cfg(not(target_arch = "wasm32"))]
pub type Task = BoxFuture<'static, ()>;
#[cfg(target_arch = "wasm32")]
pub type Task = LocalBoxFuture<'static, ()>;

/// Runs loads outside the frame tick.
pub trait Spawner {
    fn spawn(&self, task: Task);
}

#[cfg(not(target_arch = "wasm32"))]
impl Spawner for tokio::runtime::Handle {
    fn spawn(&self, task: Task) {
        // completions report through their channel, the join handle is not needed
        drop(tokio::runtime::Handle::spawn(self, task));
    }
}

impl Spawner for futures::executor::LocalSpawner {
    fn spawn(&self, task: Task) {
        if let Err(e) = self.spawn_local(task) {
            log::error!("could not spawn load: {}", e);
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserSpawner;

#[cfg(target_arch = "wasm32")]
impl Spawner for BrowserSpawner {
    fn spawn(&self, task: Task) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// Shared flag telling in-flight loads whether their owner still wants them.
#[derive(Clone, Debug)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion queue of one owner. Loads hold a [`CompletionSender`], the
/// owner drains the queue during its frame tick.
#[derive(Debug)]
pub struct Completions<T> {
    tx: UnboundedSender<T>,
    rx: UnboundedReceiver<T>,
}

impl<T> Completions<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self, liveness: &Liveness) -> CompletionSender<T> {
        CompletionSender {
            tx: self.tx.clone(),
            liveness: liveness.clone(),
        }
    }

    /// Everything that completed since the last drain, in arrival order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut completed = Vec::new();
        while let Ok(Some(value)) = self.rx.try_next() {
            completed.push(value);
        }
        completed
    }
}

impl<T> Default for Completions<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CompletionSender<T> {
    tx: UnboundedSender<T>,
    liveness: Liveness,
}

impl<T> Clone for CompletionSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            liveness: self.liveness.clone(),
        }
    }
}

impl<T> CompletionSender<T> {
    /// Deliver `value` unless the owner revoked this load. Returns whether it
    /// was delivered.
    pub fn send(&self, value: T) -> bool {
        if !self.liveness.is_alive() {
            log::warn!("discarding completion of a revoked load");
            return false;
        }
        self.tx.unbounded_send(value).is_ok()
    }
}

/// Install the platform logger. Safe to call more than once.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("logger already initialized: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("logger already initialized: {}", e);
        }
    }
}
