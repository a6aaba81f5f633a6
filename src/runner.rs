//! Debounce-buffered persistence wrapper.
//!
//! Not part of the core library: the core never touches storage, it only
//! defines the record shapes. This is the reference "runner" a caller
//! would build around the core's output: it batches attempt records and
//! buffers `mark_used` intents behind a 30-second debounce window with a
//! 50-item force-flush, structured around an `Arc<Mutex<..>>` the same way
//! the web demonstration layer shares its own state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant as TokioInstant;

use crate::curriculum::SkillId;
use crate::registry::TemplateId;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(30);
pub const FORCE_FLUSH_THRESHOLD: usize = 50;

/// One pending write the buffer will eventually flush to a real store.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    AttemptRecorded {
        skill_id: SkillId,
        correct: bool,
    },
    TemplateUsed {
        template_id: TemplateId,
    },
}

struct BufferState {
    pending: Vec<PendingWrite>,
    window_started_at: Option<TokioInstant>,
}

/// Batches writes the embedding runner would otherwise issue against its
/// progress store on every attempt. `should_flush` reports when the
/// debounce window has elapsed or the force-flush threshold is hit; the
/// caller is responsible for actually persisting `drain()`'s output
/// (the core never touches a store).
#[derive(Clone)]
pub struct DebounceBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl Default for DebounceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceBuffer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                pending: Vec::new(),
                window_started_at: None,
            })),
        }
    }

    /// Enqueues a write. Starts the debounce window on the first pending
    /// item since the last flush.
    pub async fn push(&self, write: PendingWrite) {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            state.window_started_at = Some(TokioInstant::now());
        }
        state.pending.push(write);
    }

    /// True once the debounce window has elapsed or the buffer has grown
    /// past the force-flush threshold.
    pub async fn should_flush(&self) -> bool {
        let state = self.state.lock().await;
        if state.pending.len() >= FORCE_FLUSH_THRESHOLD {
            return true;
        }
        match state.window_started_at {
            Some(started) => started.elapsed() >= DEBOUNCE_WINDOW,
            None => false,
        }
    }

    /// Drains and returns every pending write, resetting the window.
    pub async fn drain(&self) -> Vec<PendingWrite> {
        let mut state = self.state.lock().await;
        state.window_started_at = None;
        std::mem::take(&mut state.pending)
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}
