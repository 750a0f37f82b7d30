use crate::database::CommunityStore;
use crate::error::{Error, Result};
use crate::models::community_message::{CommunityMessage, NewCommunityMessage};
use crate::models::user::User;
use crate::services::storage_service::{BlobNamespace, StorageService};
use crate::services::support_service::MessageDraft;
use crate::utils::validation::non_blank;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RECENT_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn CommunityStore>,
    storage: StorageService,
}

impl CommunityService {
    pub fn new(store: Arc<dyn CommunityStore>, storage: StorageService) -> Self {
        Self { store, storage }
    }

    /// Posting is open to members holding at least one status tag.
    pub async fn post(&self, author: &User, draft: MessageDraft) -> Result<CommunityMessage> {
        if author.statuses.is_empty() {
            return Err(Error::Forbidden("Community access requires a membership status".to_string()));
        }
        if draft.is_empty() {
            return Err(Error::BadRequest("Please enter a message or attach a file".to_string()));
        }

        let mut uploads = Vec::new();
        if let Some(file) = &draft.file {
            uploads.push((BlobNamespace::CommunityFiles, file));
        }
        if let Some(image) = &draft.image {
            uploads.push((BlobNamespace::CommunityImages, image));
        }
        let mut stored = self.storage.upload_sequential(uploads, &author.id).await?.into_iter();

        let file = draft.file.as_ref().and_then(|_| stored.next());
        let image = draft.image.as_ref().and_then(|_| stored.next());

        let message = self
            .store
            .insert_community_message(NewCommunityMessage {
                user_id: author.id.clone(),
                user_name: author.display_name.clone(),
                message: non_blank(draft.message),
                image_url: image.map(|i| i.url),
                file_url: file.as_ref().map(|f| f.url.clone()),
                file_name: file.map(|f| f.file_name),
            })
            .await?;

        info!(user_id = %author.id, message_id = %message.id, "Community message posted");
        Ok(message)
    }

    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<CommunityMessage>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, 500);
        self.store.list_recent_community_messages(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::models::user::UserStatus;
    use crate::services::storage_service::{BlobStorage, MemoryBlobStorage, Upload};
    use async_trait::async_trait;
    use bytes::Bytes;

    /// Stores everything except community images.
    struct NoImages(Arc<MemoryBlobStorage>);

    #[async_trait]
    impl BlobStorage for NoImages {
        async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<String> {
            if key.starts_with("community-images/") {
                return Err(Error::Storage("image bucket unavailable".into()));
            }
            self.0.put_object(key, body, content_type).await
        }
    }

    fn with_attachments() -> MessageDraft {
        MessageDraft {
            message: None,
            image: Some(Upload {
                file_name: "chart.png".into(),
                content_type: "image/png".into(),
                body: Bytes::from_static(b"png"),
            }),
            file: Some(Upload {
                file_name: "notes.txt".into(),
                content_type: "text/plain".into(),
                body: Bytes::from_static(b"txt"),
            }),
        }
    }

    fn member(statuses: Vec<UserStatus>) -> User {
        User {
            id: "uid-3".into(),
            display_name: "Riley".into(),
            email: "riley@example.com".into(),
            photo_url: None,
            statuses,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn members_without_status_cannot_post() {
        let svc = CommunityService::new(
            Arc::new(MemoryStore::new()),
            StorageService::new(Arc::new(MemoryBlobStorage::new())),
        );
        let draft = MessageDraft {
            message: Some("hi".into()),
            ..MessageDraft::default()
        };
        let err = svc.post(&member(vec![]), draft).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn attachments_go_to_community_namespaces() {
        let blobs = Arc::new(MemoryBlobStorage::new());
        let svc = CommunityService::new(Arc::new(MemoryStore::new()), StorageService::new(blobs.clone()));
        let draft = with_attachments();

        let posted = svc.post(&member(vec![UserStatus::Learner]), draft).await.unwrap();
        assert!(posted.image_url.unwrap().starts_with("memory://community-images/uid-3/"));
        assert!(posted.file_url.unwrap().starts_with("memory://community-files/uid-3/"));
        assert_eq!(posted.file_name.as_deref(), Some("notes.txt"));
        assert_eq!(svc.list_recent(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_uploads_before_image_and_failure_aborts() {
        let blobs = Arc::new(MemoryBlobStorage::new());
        let store = Arc::new(MemoryStore::new());
        let svc = CommunityService::new(store.clone(), StorageService::new(Arc::new(NoImages(blobs.clone()))));

        let err = svc
            .post(&member(vec![UserStatus::Learner]), with_attachments())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let keys = blobs.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("community-files/uid-3/"));
        assert!(svc.list_recent(None).await.unwrap().is_empty());
    }
}
