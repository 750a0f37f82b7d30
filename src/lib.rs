pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::database::{CommunityStore, ConsultationStore, PublishingStore, SupportStore, UserStore};
use crate::error::Result;
use crate::services::{
    community_service::CommunityService,
    consultation_service::ConsultationService,
    email_service::EmailSender,
    publishing_service::PublishingService,
    storage_service::{BlobStorage, StorageService},
    support_service::{InboxSession, SupportService},
    user_service::UserService,
};
use std::sync::Arc;

/// A backend able to hold every collection.
pub trait Store: SupportStore + UserStore + ConsultationStore + PublishingStore + CommunityStore + 'static {}

impl<T> Store for T where T: SupportStore + UserStore + ConsultationStore + PublishingStore + CommunityStore + 'static {}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: UserService,
    pub support: SupportService,
    pub inbox: Arc<InboxSession>,
    pub consultations: ConsultationService,
    pub publishing: PublishingService,
    pub community: CommunityService,
}

impl AppState {
    /// Wires the services over one store and opens the staff inbox session,
    /// which seeds the unread set and starts its live feed.
    pub async fn new<S: Store>(
        config: Config,
        store: Arc<S>,
        blobs: Arc<dyn BlobStorage>,
        mailer: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        let storage = StorageService::new(blobs);

        let users = UserService::new(store.clone(), storage.clone(), Arc::clone(&mailer));
        let support = SupportService::new(store.clone(), store.clone(), storage.clone(), config.scroll_delay);
        let consultations = ConsultationService::new(store.clone(), Arc::clone(&mailer), config.consultation.clone());
        let publishing = PublishingService::new(store.clone(), store.clone(), storage.clone(), mailer);
        let community = CommunityService::new(store, storage);

        let inbox = Arc::new(support.open_inbox().await?);

        Ok(Self {
            config: Arc::new(config),
            users,
            support,
            inbox,
            consultations,
            publishing,
            community,
        })
    }
}
