//! Load controller for a single embed mount.
//!
//! A mount issues at most one store fetch, on first activation, and owns the
//! resulting [`ViewState`]. Results that arrive after [`EmbedMount::unmount`]
//! are dropped without touching state or notifying anyone.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use shared::{domain::MemoId, protocol::Memo};
use tokio::{
    runtime::Handle,
    sync::{watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    notify::{Notification, Notifier},
    render::RenderGate,
    resolver::resolve_memo_id,
    store::MemoStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Pending,
    Loaded(Memo),
    /// The fetch failed with this user-facing message.
    Failed(String),
}

impl ViewState {
    /// Only a loaded memo finishes the lifecycle; a failure leaves it pending.
    pub fn phase(&self) -> LoadPhase {
        match self {
            Self::Loaded(_) => LoadPhase::Finished,
            Self::Pending | Self::Failed(_) => LoadPhase::Pending,
        }
    }

    pub fn memo(&self) -> Option<&Memo> {
        match self {
            Self::Loaded(memo) => Some(memo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Pending,
    Finished,
}

#[derive(Debug)]
pub enum Activation {
    Fetching { memo_id: MemoId, task: JoinHandle<()> },
    /// The route segment did not name a memo; nothing was fetched.
    NoIdentifier,
    /// No Tokio runtime was available to run the fetch; the mount stays pending.
    NoRuntime,
    AlreadyActivated,
}

struct MountShared {
    state: RwLock<ViewState>,
    generation: AtomicU64,
    activated: AtomicBool,
    settled: watch::Sender<bool>,
}

impl MountShared {
    fn settle(&self) {
        self.settled.send_replace(true);
    }
}

/// Marks the mount settled even if the fetch task unwinds.
struct SettleOnDrop(Arc<MountShared>);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        self.0.settle();
    }
}

pub struct EmbedMount {
    store: Arc<dyn MemoStore>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<MountShared>,
}

impl EmbedMount {
    pub fn new(store: Arc<dyn MemoStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            shared: Arc::new(MountShared {
                state: RwLock::new(ViewState::Pending),
                generation: AtomicU64::new(0),
                activated: AtomicBool::new(false),
                settled: watch::channel(false).0,
            }),
        }
    }

    /// Resolves the route segment and starts the fetch. Only the first call on
    /// a mount does anything.
    pub fn activate(&self, raw_memo_id: Option<&str>) -> Activation {
        if self.shared.activated.swap(true, Ordering::SeqCst) {
            return Activation::AlreadyActivated;
        }

        let Some(memo_id) = resolve_memo_id(raw_memo_id) else {
            debug!(raw_memo_id, "no memo id in route; embed stays empty");
            self.shared.settle();
            return Activation::NoIdentifier;
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(memo_id = memo_id.0, "no tokio runtime; memo fetch not issued");
            self.shared.settle();
            return Activation::NoRuntime;
        };

        let generation = self.shared.generation.load(Ordering::SeqCst);
        debug!(memo_id = memo_id.0, generation, "issuing memo fetch");
        let task = runtime.spawn(run_load(
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            Arc::clone(&self.shared),
            memo_id,
            generation,
        ));
        Activation::Fetching { memo_id, task }
    }

    /// Activates and waits for the fetch to settle, including a fetch started
    /// by an earlier activation.
    pub async fn load(&self, raw_memo_id: Option<&str>) -> ViewState {
        match self.activate(raw_memo_id) {
            Activation::Fetching { memo_id, task } => {
                if let Err(error) = task.await {
                    warn!(memo_id = memo_id.0, %error, "memo load task did not complete");
                }
            }
            Activation::AlreadyActivated => self.settled().await,
            Activation::NoIdentifier | Activation::NoRuntime => {}
        }
        self.state().await
    }

    async fn settled(&self) {
        let mut settled = self.shared.settled.subscribe();
        // The sender lives in `shared`, so this only errs if the mount is gone.
        let _ = settled.wait_for(|done| *done).await;
    }

    pub async fn state(&self) -> ViewState {
        self.shared.state.read().await.clone()
    }

    pub async fn phase(&self) -> LoadPhase {
        self.shared.state.read().await.phase()
    }

    pub fn is_activated(&self) -> bool {
        self.shared.activated.load(Ordering::SeqCst)
    }

    pub async fn render(&self, gate: &RenderGate) -> String {
        gate.render(&*self.shared.state.read().await)
    }

    /// Detaches any in-flight fetch from this mount.
    pub fn unmount(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for EmbedMount {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn run_load(
    store: Arc<dyn MemoStore>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<MountShared>,
    memo_id: MemoId,
    generation: u64,
) {
    let _settle = SettleOnDrop(Arc::clone(&shared));
    let result = store.fetch_memo_by_id(memo_id).await;

    let mut state = shared.state.write().await;
    if shared.generation.load(Ordering::SeqCst) != generation {
        debug!(memo_id = memo_id.0, "mount gone; discarding memo fetch result");
        return;
    }

    match result {
        Ok(memo) => {
            info!(memo_id = memo_id.0, creator_id = memo.creator_id.0, "memo loaded");
            *state = ViewState::Loaded(memo);
        }
        Err(error) => {
            warn!(memo_id = memo_id.0, status = ?error.status, %error, "memo fetch failed");
            let message = error.message().to_string();
            notifier.notify(Notification::error(message.clone()));
            *state = ViewState::Failed(message);
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
