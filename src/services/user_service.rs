use crate::database::UserStore;
use crate::error::{Error, Result};
use crate::models::user::{UpsertUser, User, UserStatus};
use crate::services::email_service::{EmailSender, OutboundEmail};
use crate::services::storage_service::{BlobNamespace, StorageService, Upload};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    storage: StorageService,
    mailer: Arc<dyn EmailSender>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, storage: StorageService, mailer: Arc<dyn EmailSender>) -> Self {
        Self { store, storage, mailer }
    }

    /// Creates or refreshes the caller's profile. Only the first creation
    /// sends the account confirmation, and its failure is not surfaced.
    pub async fn sign_up(&self, profile: UpsertUser) -> Result<(User, bool)> {
        if profile.id.trim().is_empty() || profile.email.trim().is_empty() {
            return Err(Error::BadRequest("Profile requires an id and an email".to_string()));
        }

        let (user, created) = self.store.upsert_user(profile).await?;
        if created {
            info!(user_id = %user.id, "User signed up");
            let outcome = self.mailer.send(OutboundEmail::account_confirmation(&user)).await;
            if !outcome.success {
                warn!(
                    user_id = %user.id,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Account confirmation email failed"
                );
            }
        }
        Ok((user, created))
    }

    /// Stores a profile for a caller known only from token claims, without
    /// the sign-up confirmation.
    pub async fn record_profile(&self, profile: UpsertUser) -> Result<User> {
        let (user, created) = self.store.upsert_user(profile).await?;
        if created {
            debug!(user_id = %user.id, "Profile recorded from token claims");
        }
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn upload_photo(&self, user_id: &str, upload: &Upload) -> Result<User> {
        if !upload.content_type.starts_with("image/") {
            return Err(Error::BadRequest("Profile photo must be an image".to_string()));
        }
        let stored = self.storage.upload(BlobNamespace::ProfileImages, user_id, upload).await?;
        self.store.set_user_photo(user_id, &stored.url).await
    }

    /// Replaces the user's status tags. Duplicates are collapsed.
    pub async fn set_statuses(&self, user_id: &str, statuses: Vec<UserStatus>) -> Result<User> {
        let mut statuses = statuses;
        statuses.sort();
        statuses.dedup();
        let user = self.store.set_user_statuses(user_id, &statuses).await?;
        info!(%user_id, statuses = ?user.statuses, "User statuses updated");
        Ok(user)
    }
}
