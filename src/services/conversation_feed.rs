//! Live, time-ordered view of one user's support messages.
//!
//! The store is queried by user id only and the result is sorted here, so no
//! composite index is needed. Every change for the user re-emits the whole
//! conversation. After each emission a scroll tick is published once the
//! configured delay has passed, giving the view time to render first.

use crate::database::SupportStore;
use crate::error::{Error, Result};
use crate::models::support_message::SupportMessage;
use crate::utils::time::epoch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Ascending by `created_at`; records without a timestamp sort as epoch 0.
/// The sort is stable, so ties keep store order.
pub fn sort_by_created_at(messages: &mut [SupportMessage]) {
    messages.sort_by_key(|m| m.created_at.unwrap_or_else(epoch));
}

pub struct ConversationFeed {
    user_id: String,
    messages: watch::Receiver<Vec<SupportMessage>>,
    scroll: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl ConversationFeed {
    pub fn start(store: Arc<dyn SupportStore>, user_id: &str, scroll_delay: Duration) -> Result<Self> {
        if user_id.trim().is_empty() {
            return Err(Error::BadRequest("user id is required".to_string()));
        }
        let user_id = user_id.to_string();

        let (messages_tx, messages) = watch::channel(Vec::new());
        let (scroll_tx, scroll) = watch::channel(0u64);
        let scroll_tx = Arc::new(scroll_tx);

        // Subscribe before the first load so no change slips in between.
        let mut changes = store.subscribe_support_changes();
        let task_user = user_id.clone();

        let task = tokio::spawn(async move {
            reload(&*store, &task_user, &messages_tx, &scroll_tx, scroll_delay).await;
            loop {
                match changes.recv().await {
                    Ok(change) if change.user_id == task_user => {
                        reload(&*store, &task_user, &messages_tx, &scroll_tx, scroll_delay).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(user_id = %task_user, skipped, "Conversation feed lagged; reloading");
                        reload(&*store, &task_user, &messages_tx, &scroll_tx, scroll_delay).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if messages_tx.is_closed() {
                    break;
                }
            }
        });

        Ok(Self {
            user_id,
            messages,
            scroll,
            task,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Latest emitted conversation.
    pub fn current(&self) -> Vec<SupportMessage> {
        self.messages.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SupportMessage>> {
        self.messages.clone()
    }

    /// Incremented once per emission, after the scroll delay.
    pub fn scroll_ticks(&self) -> watch::Receiver<u64> {
        self.scroll.clone()
    }

    /// Waits for the next emission.
    pub async fn changed(&mut self) -> Result<Vec<SupportMessage>> {
        self.messages
            .changed()
            .await
            .map_err(|_| Error::Internal("conversation feed stopped".to_string()))?;
        Ok(self.messages.borrow_and_update().clone())
    }
}

impl Drop for ConversationFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload(
    store: &dyn SupportStore,
    user_id: &str,
    messages_tx: &watch::Sender<Vec<SupportMessage>>,
    scroll_tx: &Arc<watch::Sender<u64>>,
    scroll_delay: Duration,
) {
    match store.list_support_messages_for_user(user_id).await {
        Ok(mut messages) => {
            sort_by_created_at(&mut messages);
            messages_tx.send_replace(messages);

            let scroll_tx = Arc::clone(scroll_tx);
            tokio::spawn(async move {
                tokio::time::sleep(scroll_delay).await;
                scroll_tx.send_modify(|tick| *tick += 1);
            });
        }
        Err(e) => {
            // Keep the last emitted value; the next change triggers a fresh load.
            tracing::warn!(error = %e, %user_id, "Failed to load conversation");
        }
    }
}
