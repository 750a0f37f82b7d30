use crate::database::{SupportStore, UserStore};
use crate::error::{Error, Result};
use crate::models::support_message::{
    timeline, AdminResponse, MessageStatus, NewSupportMessage, SupportMessage, TimelineEntry,
};
use crate::models::user::InboxUser;
use crate::services::conversation_feed::{sort_by_created_at, ConversationFeed};
use crate::services::storage_service::{BlobNamespace, StorageService, StoredObject, Upload};
use crate::services::unread_tracker::{PendingRef, UnreadTracker};
use crate::utils::validation::non_blank;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Who is sending a client message.
#[derive(Debug, Clone)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Text and attachments being composed, by a client or by staff.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub message: Option<String>,
    pub file: Option<Upload>,
    pub image: Option<Upload>,
}

impl MessageDraft {
    pub fn is_empty(&self) -> bool {
        non_blank(self.message.clone()).is_none() && self.file.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkReadReport {
    pub marked: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

struct Attachments {
    file: Option<StoredObject>,
    image: Option<StoredObject>,
}

#[derive(Clone)]
pub struct SupportService {
    store: Arc<dyn SupportStore>,
    users: Arc<dyn UserStore>,
    storage: StorageService,
    scroll_delay: Duration,
}

impl SupportService {
    pub fn new(
        store: Arc<dyn SupportStore>,
        users: Arc<dyn UserStore>,
        storage: StorageService,
        scroll_delay: Duration,
    ) -> Self {
        Self {
            store,
            users,
            storage,
            scroll_delay,
        }
    }

    /// Uploads the file, then the image. The first failure aborts.
    async fn upload_attachments(&self, owner: &str, draft: &MessageDraft) -> Result<Attachments> {
        let file = match &draft.file {
            Some(upload) => Some(self.storage.upload(BlobNamespace::SupportFiles, owner, upload).await?),
            None => None,
        };
        let image = match &draft.image {
            Some(upload) => Some(self.storage.upload(BlobNamespace::SupportImages, owner, upload).await?),
            None => None,
        };
        Ok(Attachments { file, image })
    }

    pub async fn send_client_message(&self, author: &Author, draft: MessageDraft) -> Result<SupportMessage> {
        if draft.is_empty() {
            return Err(Error::BadRequest("Please enter a message or attach a file".to_string()));
        }
        let attachments = self.upload_attachments(&author.id, &draft).await?;

        let message = self
            .store
            .insert_support_message(NewSupportMessage {
                user_id: author.id.clone(),
                user_name: author.name.clone(),
                user_email: author.email.clone(),
                message: non_blank(draft.message),
                image_url: attachments.image.map(|i| i.url),
                file_url: attachments.file.as_ref().map(|f| f.url.clone()),
                file_name: attachments.file.map(|f| f.file_name),
                status: MessageStatus::Pending,
                admin_response: None,
            })
            .await?;

        info!(user_id = %author.id, message_id = %message.id, "Support message received");
        Ok(message)
    }

    /// Creates a new record holding only the staff response. Earlier records
    /// of the conversation are never modified.
    pub async fn send_admin_reply(&self, user_id: &str, draft: MessageDraft) -> Result<SupportMessage> {
        if draft.is_empty() {
            return Err(Error::BadRequest("Please enter a reply or attach a file".to_string()));
        }
        let client = self.recipient(user_id).await?;

        let attachments = self.upload_attachments(user_id, &draft).await?;

        let response = AdminResponse {
            message: non_blank(draft.message),
            image_url: attachments.image.map(|i| i.url),
            file_url: attachments.file.as_ref().map(|f| f.url.clone()),
            file_name: attachments.file.map(|f| f.file_name),
            created_at: crate::utils::time::now(),
        };

        let message = self
            .store
            .insert_support_message(NewSupportMessage {
                user_id: client.id.clone(),
                user_name: client.name.clone(),
                user_email: client.email.clone(),
                message: None,
                image_url: None,
                file_url: None,
                file_name: None,
                status: MessageStatus::Responded,
                admin_response: Some(response),
            })
            .await?;

        info!(user_id = %client.id, message_id = %message.id, "Support reply sent");
        Ok(message)
    }

    /// Addressee of a staff reply: the stored profile, or else the identity
    /// recorded on the user's latest message.
    async fn recipient(&self, user_id: &str) -> Result<Author> {
        if let Some(user) = self.users.get_user(user_id).await? {
            return Ok(Author {
                id: user.id,
                name: user.display_name,
                email: user.email,
            });
        }
        self.conversation(user_id)
            .await?
            .into_iter()
            .rev()
            .find(SupportMessage::has_client_content)
            .map(|m| Author {
                id: m.user_id,
                name: m.user_name,
                email: m.user_email,
            })
            .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))
    }

    /// One-shot, time-ordered conversation.
    pub async fn conversation(&self, user_id: &str) -> Result<Vec<SupportMessage>> {
        let mut messages = self.store.list_support_messages_for_user(user_id).await?;
        sort_by_created_at(&mut messages);
        Ok(messages)
    }

    pub fn watch_conversation(&self, user_id: &str) -> Result<ConversationFeed> {
        ConversationFeed::start(Arc::clone(&self.store), user_id, self.scroll_delay)
    }

    /// Sets every pending message of the user to `read`. Updates run
    /// concurrently and are not retried; failures are reported, not raised.
    pub async fn mark_as_read(&self, user_id: &str) -> Result<MarkReadReport> {
        let pending = self.store.list_pending_support_messages(Some(user_id)).await?;
        let expected: Vec<Uuid> = pending.iter().map(|m| m.id).collect();

        let mut updates = JoinSet::new();
        for id in expected.iter().copied() {
            let store = Arc::clone(&self.store);
            updates.spawn(async move { (id, store.update_support_message_status(id, MessageStatus::Read).await) });
        }

        let mut marked = Vec::with_capacity(expected.len());
        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((id, Ok(()))) => marked.push(id),
                Ok((id, Err(e))) => warn!(error = %e, %user_id, message_id = %id, "Failed to mark message as read"),
                Err(e) => warn!(error = %e, %user_id, "Mark-as-read task failed"),
            }
        }

        let marked_set: HashSet<Uuid> = marked.iter().copied().collect();
        let failed = expected.into_iter().filter(|id| !marked_set.contains(id)).collect();

        debug!(%user_id, marked = marked.len(), "Marked support messages as read");
        Ok(MarkReadReport { marked, failed })
    }

    /// Seeds the unread set and starts the live pending feed.
    pub async fn open_inbox(&self) -> Result<InboxSession> {
        InboxSession::open(self.clone()).await
    }
}

/// Staff inbox: the user list with unread flags plus the live pending feed.
/// Dropping the session stops the feed.
pub struct InboxSession {
    service: SupportService,
    tracker: Arc<watch::Sender<UnreadTracker>>,
    pending_feed: JoinHandle<()>,
}

impl InboxSession {
    async fn open(service: SupportService) -> Result<Self> {
        let (tracker, _) = watch::channel(UnreadTracker::new());
        let tracker = Arc::new(tracker);

        let changes = service.store.subscribe_support_changes();
        seed_unread(&service, &tracker).await?;

        let pending_feed = tokio::spawn(run_pending_feed(
            Arc::clone(&service.store),
            Arc::clone(&tracker),
            changes,
        ));

        Ok(Self {
            service,
            tracker,
            pending_feed,
        })
    }

    pub fn is_unread(&self, user_id: &str) -> bool {
        self.tracker.borrow().is_unread(user_id)
    }

    pub fn unread_users(&self) -> Vec<String> {
        self.tracker.borrow().users()
    }

    pub fn subscribe(&self) -> watch::Receiver<UnreadTracker> {
        self.tracker.subscribe()
    }

    pub async fn users(&self) -> Result<Vec<InboxUser>> {
        let users = self.service.users.list_users().await?;
        let tracker = self.tracker.borrow();
        Ok(users
            .into_iter()
            .map(|user| {
                let has_unread_messages = tracker.is_unread(&user.id);
                InboxUser {
                    user,
                    has_unread_messages,
                }
            })
            .collect())
    }

    /// Clears the indicator at once, then runs the status updates and
    /// reconciles with their outcome.
    pub async fn mark_as_read(&self, user_id: &str) -> Result<MarkReadReport> {
        self.tracker.send_if_modified(|t| t.begin_clear(user_id));

        match self.service.mark_as_read(user_id).await {
            Ok(report) => {
                self.tracker
                    .send_if_modified(|t| t.finish_clear(user_id, &report.marked, &report.failed));
                Ok(report)
            }
            Err(e) => {
                self.tracker.send_if_modified(|t| t.abort_clear(user_id));
                Err(e)
            }
        }
    }

    /// Opens a conversation: starts its live feed and marks it read.
    pub async fn select(&self, user_id: &str) -> Result<Conversation> {
        let feed = self.service.watch_conversation(user_id)?;
        let was_unread = self.is_unread(user_id);
        let mut conversation = Conversation {
            service: self.service.clone(),
            feed,
            state: ConversationState::Selected { unread: was_unread },
            draft: MessageDraft::default(),
            read_report: None,
        };

        match self.mark_as_read(user_id).await {
            Ok(report) => conversation.read_report = Some(report),
            Err(e) => warn!(error = %e, %user_id, "Mark-as-read failed"),
        }
        conversation.state = ConversationState::Selected {
            unread: self.is_unread(user_id),
        };
        Ok(conversation)
    }

    /// Drops all derived state and seeds it again.
    pub async fn remount(&self) -> Result<()> {
        self.tracker.send_modify(UnreadTracker::reset);
        seed_unread(&self.service, &self.tracker).await
    }
}

impl Drop for InboxSession {
    fn drop(&mut self) {
        self.pending_feed.abort();
    }
}

async fn seed_unread(service: &SupportService, tracker: &watch::Sender<UnreadTracker>) -> Result<()> {
    let users = service.users.list_users().await?;

    let mut checks = JoinSet::new();
    for user in users {
        let store = Arc::clone(&service.store);
        checks.spawn(async move {
            let pending = store.has_pending_support_messages(&user.id).await;
            (user.id, pending)
        });
    }

    let mut unread = Vec::new();
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok((user_id, Ok(true))) => unread.push(user_id),
            Ok((_, Ok(false))) => {}
            Ok((user_id, Err(e))) => warn!(error = %e, %user_id, "Pending check failed"),
            Err(e) => warn!(error = %e, "Pending check task failed"),
        }
    }

    tracker.send_if_modified(|t| t.seed(unread));
    Ok(())
}

async fn run_pending_feed(
    store: Arc<dyn SupportStore>,
    tracker: Arc<watch::Sender<UnreadTracker>>,
    mut changes: broadcast::Receiver<crate::database::SupportMessageChanged>,
) {
    refresh_pending(&*store, &tracker).await;
    loop {
        match changes.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => refresh_pending(&*store, &tracker).await,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn refresh_pending(store: &dyn SupportStore, tracker: &watch::Sender<UnreadTracker>) {
    match store.list_pending_support_messages(None).await {
        Ok(messages) => {
            let pending: Vec<PendingRef> = messages
                .into_iter()
                .map(|m| PendingRef {
                    user_id: m.user_id,
                    message_id: m.id,
                })
                .collect();
            tracker.send_if_modified(|t| t.observe_pending(&pending));
        }
        Err(e) => warn!(error = %e, "Failed to load pending support messages"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    Selected { unread: bool },
    Composing,
    Sent { message_id: Uuid },
}

/// A selected conversation in the staff inbox.
pub struct Conversation {
    service: SupportService,
    feed: ConversationFeed,
    state: ConversationState,
    draft: MessageDraft,
    pub read_report: Option<MarkReadReport>,
}

impl Conversation {
    pub fn user_id(&self) -> &str {
        self.feed.user_id()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn feed(&self) -> &ConversationFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut ConversationFeed {
        &mut self.feed
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        timeline(&self.feed.current())
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft.message = Some(text.into());
        self.state = ConversationState::Composing;
    }

    pub fn attach_file(&mut self, upload: Upload) {
        self.draft.file = Some(upload);
        self.state = ConversationState::Composing;
    }

    pub fn attach_image(&mut self, upload: Upload) {
        self.draft.image = Some(upload);
        self.state = ConversationState::Composing;
    }

    /// Sends the draft as a staff reply. On failure the draft is kept and
    /// the conversation stays in `Composing`.
    pub async fn send(&mut self) -> Result<SupportMessage> {
        if self.state != ConversationState::Composing || self.draft.is_empty() {
            return Err(Error::BadRequest("Nothing to send".to_string()));
        }
        let draft = std::mem::take(&mut self.draft);
        let user_id = self.user_id().to_string();
        match self.service.send_admin_reply(&user_id, draft.clone()).await {
            Ok(message) => {
                self.state = ConversationState::Sent { message_id: message.id };
                Ok(message)
            }
            Err(e) => {
                self.draft = draft;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::SupportMessageChanged;
    use crate::models::user::UpsertUser;
    use crate::services::storage_service::{BlobStorage, MemoryBlobStorage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Semaphore;

    /// Delegates to a memory store but holds status updates until released.
    struct GatedStore {
        inner: Arc<MemoryStore>,
        gate: Semaphore,
    }

    #[async_trait]
    impl SupportStore for GatedStore {
        async fn insert_support_message(&self, new: NewSupportMessage) -> Result<SupportMessage> {
            self.inner.insert_support_message(new).await
        }

        async fn get_support_message(&self, id: Uuid) -> Result<Option<SupportMessage>> {
            self.inner.get_support_message(id).await
        }

        async fn list_support_messages_for_user(&self, user_id: &str) -> Result<Vec<SupportMessage>> {
            self.inner.list_support_messages_for_user(user_id).await
        }

        async fn has_pending_support_messages(&self, user_id: &str) -> Result<bool> {
            self.inner.has_pending_support_messages(user_id).await
        }

        async fn list_pending_support_messages(&self, user_id: Option<&str>) -> Result<Vec<SupportMessage>> {
            self.inner.list_pending_support_messages(user_id).await
        }

        async fn update_support_message_status(&self, id: Uuid, status: MessageStatus) -> Result<()> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            self.inner.update_support_message_status(id, status).await
        }

        fn subscribe_support_changes(&self) -> broadcast::Receiver<SupportMessageChanged> {
            self.inner.subscribe_support_changes()
        }
    }

    struct BrokenBlobs;

    #[async_trait]
    impl BlobStorage for BrokenBlobs {
        async fn put_object(&self, _key: &str, _body: Bytes, _content_type: &str) -> Result<String> {
            Err(Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)))
        }
    }

    fn author() -> Author {
        Author {
            id: "client-1".into(),
            name: "Client One".into(),
            email: "client@example.com".into(),
        }
    }

    fn text(message: &str) -> MessageDraft {
        MessageDraft {
            message: Some(message.into()),
            ..MessageDraft::default()
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(UpsertUser {
                id: "client-1".into(),
                display_name: "Client One".into(),
                email: "client@example.com".into(),
                photo_url: None,
            })
            .await
            .unwrap();
        store
    }

    fn service_over(store: Arc<dyn SupportStore>, users: Arc<MemoryStore>, blobs: Arc<dyn BlobStorage>) -> SupportService {
        SupportService::new(store, users, StorageService::new(blobs), Duration::from_millis(1))
    }

    async fn wait_until_unread(session: &InboxSession, user_id: &str, expected: bool) {
        let mut rx = session.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while rx.borrow_and_update().is_unread(user_id) != expected {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("unread flag never reached the expected value");
    }

    #[tokio::test]
    async fn empty_drafts_are_rejected() {
        let store = seeded_store().await;
        let svc = service_over(store.clone(), store.clone(), Arc::new(MemoryBlobStorage::new()));
        let err = svc.send_client_message(&author(), text("   ")).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(store.list_support_messages_for_user("client-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn indicator_clears_before_updates_land() {
        let memory = seeded_store().await;
        let gated = Arc::new(GatedStore {
            inner: memory.clone(),
            gate: Semaphore::new(0),
        });
        let svc = service_over(gated.clone(), memory.clone(), Arc::new(MemoryBlobStorage::new()));
        for n in 0..3 {
            svc.send_client_message(&author(), text(&format!("question {n}"))).await.unwrap();
        }

        let session = Arc::new(svc.open_inbox().await.unwrap());
        assert!(session.is_unread("client-1"));

        let marking = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.mark_as_read("client-1").await })
        };
        wait_until_unread(&session, "client-1", false).await;
        assert!(memory.has_pending_support_messages("client-1").await.unwrap());

        gated.gate.add_permits(3);
        let report = marking.await.unwrap().unwrap();
        assert_eq!(report.marked.len(), 3);
        assert!(report.failed.is_empty());
        assert!(!memory.has_pending_support_messages("client-1").await.unwrap());
        assert!(!session.is_unread("client-1"));
    }

    #[tokio::test]
    async fn mark_as_read_is_idempotent() {
        let store = seeded_store().await;
        let svc = service_over(store.clone(), store.clone(), Arc::new(MemoryBlobStorage::new()));
        svc.send_client_message(&author(), text("hello")).await.unwrap();

        let first = svc.mark_as_read("client-1").await.unwrap();
        let second = svc.mark_as_read("client-1").await.unwrap();
        assert_eq!(first.marked.len(), 1);
        assert_eq!(second, MarkReadReport::default());

        let statuses: Vec<_> = svc
            .conversation("client-1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.status)
            .collect();
        assert_eq!(statuses, vec![MessageStatus::Read]);
    }

    #[tokio::test]
    async fn new_message_relights_a_cleared_user() {
        let store = seeded_store().await;
        let svc = service_over(store.clone(), store.clone(), Arc::new(MemoryBlobStorage::new()));
        svc.send_client_message(&author(), text("first")).await.unwrap();
        let session = svc.open_inbox().await.unwrap();

        session.mark_as_read("client-1").await.unwrap();
        assert!(!session.is_unread("client-1"));

        svc.send_client_message(&author(), text("second")).await.unwrap();
        wait_until_unread(&session, "client-1", true).await;
    }

    #[tokio::test]
    async fn reply_creates_a_separate_record() {
        let store = seeded_store().await;
        let svc = service_over(store.clone(), store.clone(), Arc::new(MemoryBlobStorage::new()));
        let original = svc.send_client_message(&author(), text("when is the call?")).await.unwrap();
        let session = svc.open_inbox().await.unwrap();

        let mut conversation = session.select("client-1").await.unwrap();
        assert_eq!(conversation.state(), &ConversationState::Selected { unread: false });

        conversation.set_text("Tomorrow at 10.");
        assert_eq!(conversation.state(), &ConversationState::Composing);
        let reply = conversation.send().await.unwrap();
        assert_eq!(conversation.state(), &ConversationState::Sent { message_id: reply.id });

        assert_ne!(reply.id, original.id);
        assert_eq!(reply.status, MessageStatus::Responded);
        assert!(!reply.has_client_content());
        let stored_original = store.get_support_message(original.id).await.unwrap().unwrap();
        assert_eq!(stored_original.admin_response, None);
        assert_eq!(stored_original.message.as_deref(), Some("when is the call?"));
    }

    #[tokio::test]
    async fn reply_reaches_a_client_without_a_profile() {
        let store = Arc::new(MemoryStore::new());
        let svc = service_over(store.clone(), store.clone(), Arc::new(MemoryBlobStorage::new()));
        svc.send_client_message(&author(), text("no account yet")).await.unwrap();

        let reply = svc.send_admin_reply("client-1", text("Happy to help.")).await.unwrap();
        assert_eq!(reply.user_name, "Client One");
        assert_eq!(reply.user_email, "client@example.com");
        assert_eq!(reply.status, MessageStatus::Responded);

        let err = svc.send_admin_reply("nobody", text("hello?")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_upload_keeps_the_draft_and_writes_nothing() {
        let store = seeded_store().await;
        let svc = service_over(store.clone(), store.clone(), Arc::new(BrokenBlobs));
        let session = svc.open_inbox().await.unwrap();

        let mut conversation = session.select("client-1").await.unwrap();
        conversation.set_text("See attached.");
        conversation.attach_file(Upload {
            file_name: "terms.pdf".into(),
            content_type: "application/pdf".into(),
            body: Bytes::from_static(b"%PDF"),
        });

        let err = conversation.send().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(conversation.state(), &ConversationState::Composing);
        assert!(store.list_support_messages_for_user("client-1").await.unwrap().is_empty());

        // The kept draft can be sent again.
        let err = conversation.send().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
