//! Keystroke debouncing for the prefetch trigger.
//!
//! Debounced, not throttled: only the last keystroke inside a quiet window
//! fires. Superseded windows are cancelled before firing, but an action
//! already in flight is never cancelled — an abandoned prefetch still
//! completes and caches its result (wasted but harmless work).

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;

/// The debounced action; receives the query that survived the quiet window.
pub type DebouncedAction = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct Debouncer {
    window: Duration,
    /// Queries shorter than this never fire. Deliberately above the
    /// suggestion threshold so near-empty queries are never prefetched.
    min_query_length: usize,
    action: DebouncedAction,
    pending: Mutex<Option<AbortHandle>>,
}

impl Debouncer {
    pub fn new(window: Duration, min_query_length: usize, action: DebouncedAction) -> Self {
        Self {
            window,
            min_query_length,
            action,
            pending: Mutex::new(None),
        }
    }

    /// Register a keystroke. Resets the quiet window; when it elapses
    /// undisturbed the action fires with this query.
    pub fn keystroke(&self, query: &str) {
        let trimmed = query.trim();
        if trimmed.chars().count() < self.min_query_length {
            // Too short to be worth warming — also cancel any pending fire
            // for a longer query the user has since deleted.
            self.cancel();
            return;
        }

        let window = self.window;
        let action = self.action.clone();
        let query = trimmed.to_owned();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action(query).await;
        });

        let mut pending = self.pending.lock().expect("debounce lock");
        if let Some(previous) = pending.replace(handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Cancel a pending (not yet fired) action.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().expect("debounce lock").take() {
            handle.abort();
        }
    }
}
