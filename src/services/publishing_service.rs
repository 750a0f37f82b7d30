use crate::database::{PublishingStore, UserStore};
use crate::dto::publishing_dto::{CreateTradeAlertPayload, PublishResponse};
use crate::error::{Error, Result};
use crate::models::{
    trade_alert::{NewTradeAlert, TradeAlert},
    user::{User, UserStatus},
    weekly_report::{NewWeeklyReport, WeeklyReport},
};
use crate::services::email_service::{EmailSender, OutboundEmail};
use crate::services::storage_service::{BlobNamespace, StorageService, Upload};
use crate::utils::validation::{is_blank, non_blank, validate};
use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Form fields of a weekly report upload.
#[derive(Debug, Clone)]
pub struct WeeklyReportDraft {
    pub title: String,
    pub summary: Option<String>,
    pub week_of: NaiveDate,
    pub file: Upload,
}

#[derive(Clone)]
pub struct PublishingService {
    store: Arc<dyn PublishingStore>,
    users: Arc<dyn UserStore>,
    storage: StorageService,
    mailer: Arc<dyn EmailSender>,
}

impl PublishingService {
    pub fn new(
        store: Arc<dyn PublishingStore>,
        users: Arc<dyn UserStore>,
        storage: StorageService,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            store,
            users,
            storage,
            mailer,
        }
    }

    pub async fn create_trade_alert(
        &self,
        author: &User,
        payload: CreateTradeAlertPayload,
    ) -> Result<PublishResponse<TradeAlert>> {
        validate(&payload)?;
        if is_blank(&payload.title) || is_blank(&payload.symbol) {
            return Err(Error::BadRequest("Title and symbol are required".to_string()));
        }

        let alert = self
            .store
            .insert_trade_alert(NewTradeAlert {
                title: payload.title.trim().to_string(),
                symbol: payload.symbol.trim().to_uppercase(),
                action: payload.action,
                entry_price: payload.entry_price,
                target_price: payload.target_price,
                stop_loss: payload.stop_loss,
                notes: non_blank(payload.notes),
                created_by: author.id.clone(),
            })
            .await?;
        info!(alert_id = %alert.id, symbol = %alert.symbol, "Trade alert published");

        let (notified, notification_failures) = self
            .notify_investors(|investor| OutboundEmail::trade_alert(investor, &alert))
            .await;

        Ok(PublishResponse {
            item: alert,
            notified,
            notification_failures,
        })
    }

    pub async fn list_trade_alerts(&self) -> Result<Vec<TradeAlert>> {
        self.store.list_trade_alerts().await
    }

    /// Uploads the report file under the report's own prefix, then writes
    /// the record. An upload failure leaves no record behind.
    pub async fn create_weekly_report(
        &self,
        author: &User,
        draft: WeeklyReportDraft,
    ) -> Result<PublishResponse<WeeklyReport>> {
        if is_blank(&draft.title) {
            return Err(Error::BadRequest("Title is required".to_string()));
        }

        let id = Uuid::new_v4();
        let stored = self
            .storage
            .upload(BlobNamespace::WeeklyReports, &id.to_string(), &draft.file)
            .await?;

        let report = self
            .store
            .insert_weekly_report(NewWeeklyReport {
                id,
                title: draft.title.trim().to_string(),
                summary: non_blank(draft.summary),
                week_of: draft.week_of,
                file_url: stored.url,
                file_name: stored.file_name,
                created_by: author.id.clone(),
            })
            .await?;
        info!(report_id = %report.id, week_of = %report.week_of, "Weekly report published");

        let (notified, notification_failures) = self
            .notify_investors(|investor| OutboundEmail::weekly_report(investor, &report))
            .await;

        Ok(PublishResponse {
            item: report,
            notified,
            notification_failures,
        })
    }

    pub async fn list_weekly_reports(&self) -> Result<Vec<WeeklyReport>> {
        self.store.list_weekly_reports().await
    }

    /// Best-effort fan-out to every investor. Returns (sent, failed).
    async fn notify_investors<F>(&self, build: F) -> (usize, usize)
    where
        F: Fn(&User) -> OutboundEmail,
    {
        let investors = match self.users.list_users_with_status(UserStatus::Investor).await {
            Ok(investors) => investors,
            Err(e) => {
                warn!(error = %e, "Could not load investors; skipping notifications");
                return (0, 0);
            }
        };

        let outcomes = join_all(investors.iter().map(|investor| self.mailer.send(build(investor)))).await;
        let sent = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - sent;
        if failed > 0 {
            warn!(sent, failed, "Some investor notifications failed");
        }
        (sent, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::models::trade_alert::TradeAction;
    use crate::models::user::UpsertUser;
    use crate::services::email_service::{EmailKind, EmailOutcome, MockEmailSender};
    use crate::services::storage_service::MemoryBlobStorage;
    use bytes::Bytes;

    async fn user(store: &MemoryStore, id: &str, statuses: &[UserStatus]) -> User {
        store
            .upsert_user(UpsertUser {
                id: id.into(),
                display_name: id.into(),
                email: format!("{}@example.com", id),
                photo_url: None,
            })
            .await
            .unwrap();
        store.set_user_statuses(id, statuses).await.unwrap()
    }

    fn alert_payload() -> CreateTradeAlertPayload {
        CreateTradeAlertPayload {
            title: "Rotate into energy".into(),
            symbol: "xle".into(),
            action: TradeAction::Buy,
            entry_price: Some(88.5),
            target_price: Some(97.0),
            stop_loss: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn trade_alert_notifies_investors_only() {
        let store = Arc::new(MemoryStore::new());
        let admin = user(&store, "admin", &[UserStatus::Admin]).await;
        user(&store, "inv-1", &[UserStatus::Investor]).await;
        user(&store, "inv-2", &[UserStatus::Investor, UserStatus::Learner]).await;
        user(&store, "learner", &[UserStatus::Learner]).await;

        let mut mailer = MockEmailSender::new();
        mailer
            .expect_send()
            .withf(|email| email.kind == EmailKind::TradeAlert && email.to.starts_with("inv-"))
            .times(2)
            .returning(|email| {
                if email.to == "inv-2@example.com" {
                    EmailOutcome::failed("bounced")
                } else {
                    EmailOutcome::sent()
                }
            });

        let blobs = Arc::new(MemoryBlobStorage::new());
        let svc = PublishingService::new(store.clone(), store.clone(), StorageService::new(blobs), Arc::new(mailer));

        let published = svc.create_trade_alert(&admin, alert_payload()).await.unwrap();
        assert_eq!(published.item.symbol, "XLE");
        assert_eq!(published.notified, 1);
        assert_eq!(published.notification_failures, 1);
        assert_eq!(svc.list_trade_alerts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weekly_report_lands_under_its_own_prefix() {
        let store = Arc::new(MemoryStore::new());
        let admin = user(&store, "admin", &[UserStatus::Admin]).await;
        let blobs = Arc::new(MemoryBlobStorage::new());
        let mut mailer = MockEmailSender::new();
        mailer.expect_send().never();
        let svc = PublishingService::new(
            store.clone(),
            store.clone(),
            StorageService::new(blobs.clone()),
            Arc::new(mailer),
        );

        let published = svc
            .create_weekly_report(
                &admin,
                WeeklyReportDraft {
                    title: "Week 23".into(),
                    summary: Some("".into()),
                    week_of: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                    file: Upload {
                        file_name: "week 23.pdf".into(),
                        content_type: "application/pdf".into(),
                        body: Bytes::from_static(b"%PDF"),
                    },
                },
            )
            .await
            .unwrap();

        let keys = blobs.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with(&format!("weekly-reports/{}/", published.item.id)));
        assert!(keys[0].ends_with("_week_23.pdf"));
        assert_eq!(published.item.summary, None);
        assert_eq!(published.notified, 0);
    }
}
