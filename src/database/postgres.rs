use super::{
    CommunityStore, ConsultationStore, PublishingStore, SupportMessageChanged, SupportStore, UserStore,
    CHANGE_CHANNEL_CAPACITY,
};
use crate::error::{Error, Result};
use crate::models::{
    community_message::{CommunityMessage, NewCommunityMessage},
    consultation::{ConsultationRequest, ConsultationStatus, NewConsultationRequest, CONSULTATION_TYPE},
    support_message::{AdminResponse, MessageStatus, NewSupportMessage, SupportMessage},
    trade_alert::{NewTradeAlert, TradeAlert},
    user::{UpsertUser, User, UserStatus},
    weekly_report::{NewWeeklyReport, WeeklyReport},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

const SUPPORT_CHANNEL: &str = "support_messages_changed";

const SUPPORT_COLUMNS: &str = "id, user_id, user_name, user_email, message, image_url, file_url, file_name, status, created_at, admin_response";
const USER_COLUMNS: &str = "id, display_name, email, photo_url, statuses, created_at";
const CONSULTATION_COLUMNS: &str = "id, user_name, user_email, company, date, time, message, status, request_type, created_at, user_id, google_meet_link, link_sent_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    support_tx: broadcast::Sender<SupportMessageChanged>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let (support_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, support_tx }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Relays `support_messages_changed` notifications (raised by the table
    /// trigger) to in-process subscribers, so writes from any instance reach
    /// every live feed.
    pub async fn spawn_change_listener(&self) -> Result<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(SUPPORT_CHANNEL).await?;
        let tx = self.support_tx.clone();

        Ok(tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<SupportMessageChanged>(notification.payload()) {
                            Ok(change) => {
                                // No receivers is fine: nobody is watching yet.
                                let _ = tx.send(change);
                            }
                            Err(e) => tracing::warn!(error = %e, payload = notification.payload(), "Malformed change notification"),
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Support change listener error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        }))
    }
}

#[derive(FromRow)]
struct SupportMessageRow {
    id: Uuid,
    user_id: String,
    user_name: String,
    user_email: String,
    message: Option<String>,
    image_url: Option<String>,
    file_url: Option<String>,
    file_name: Option<String>,
    status: String,
    created_at: Option<DateTime<Utc>>,
    admin_response: Option<Json<AdminResponse>>,
}

impl TryFrom<SupportMessageRow> for SupportMessage {
    type Error = Error;

    fn try_from(row: SupportMessageRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            user_email: row.user_email,
            message: row.message,
            image_url: row.image_url,
            file_url: row.file_url,
            file_name: row.file_name,
            status: row.status.parse().map_err(Error::Internal)?,
            created_at: row.created_at,
            admin_response: row.admin_response.map(|Json(r)| r),
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    email: String,
    photo_url: Option<String>,
    statuses: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let statuses = row
            .statuses
            .iter()
            .map(|s| s.parse::<UserStatus>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Internal)?;
        Ok(Self {
            id: row.id,
            display_name: row.display_name,
            email: row.email,
            photo_url: row.photo_url,
            statuses,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ConsultationRow {
    id: Uuid,
    user_name: String,
    user_email: String,
    company: Option<String>,
    date: NaiveDate,
    time: String,
    message: Option<String>,
    status: String,
    request_type: String,
    created_at: DateTime<Utc>,
    user_id: Option<String>,
    google_meet_link: Option<String>,
    link_sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConsultationRow> for ConsultationRequest {
    type Error = Error;

    fn try_from(row: ConsultationRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_name: row.user_name,
            user_email: row.user_email,
            company: row.company,
            date: row.date,
            time: row.time,
            message: row.message,
            status: row.status.parse().map_err(Error::Internal)?,
            request_type: row.request_type,
            created_at: row.created_at,
            user_id: row.user_id,
            google_meet_link: row.google_meet_link,
            link_sent_at: row.link_sent_at,
        })
    }
}

#[derive(FromRow)]
struct TradeAlertRow {
    id: Uuid,
    title: String,
    symbol: String,
    action: String,
    entry_price: Option<f64>,
    target_price: Option<f64>,
    stop_loss: Option<f64>,
    notes: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TradeAlertRow> for TradeAlert {
    type Error = Error;

    fn try_from(row: TradeAlertRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            symbol: row.symbol,
            action: row.action.parse().map_err(Error::Internal)?,
            entry_price: row.entry_price,
            target_price: row.target_price,
            stop_loss: row.stop_loss,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct WeeklyReportRow {
    id: Uuid,
    title: String,
    summary: Option<String>,
    week_of: NaiveDate,
    file_url: String,
    file_name: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<WeeklyReportRow> for WeeklyReport {
    fn from(row: WeeklyReportRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            summary: row.summary,
            week_of: row.week_of,
            file_url: row.file_url,
            file_name: row.file_name,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CommunityMessageRow {
    id: Uuid,
    user_id: String,
    user_name: String,
    message: Option<String>,
    image_url: Option<String>,
    file_url: Option<String>,
    file_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CommunityMessageRow> for CommunityMessage {
    fn from(row: CommunityMessageRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            message: row.message,
            image_url: row.image_url,
            file_url: row.file_url,
            file_name: row.file_name,
            created_at: row.created_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl SupportStore for PgStore {
    async fn insert_support_message(&self, new: NewSupportMessage) -> Result<SupportMessage> {
        let row = sqlx::query_as::<_, SupportMessageRow>(&format!(
            r#"
            INSERT INTO support_messages
                (id, user_id, user_name, user_email, message, image_url, file_url, file_name, status, admin_response)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SUPPORT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.user_id)
        .bind(&new.user_name)
        .bind(&new.user_email)
        .bind(&new.message)
        .bind(&new.image_url)
        .bind(&new.file_url)
        .bind(&new.file_name)
        .bind(new.status.as_str())
        .bind(new.admin_response.map(Json))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_support_message(&self, id: Uuid) -> Result<Option<SupportMessage>> {
        let row = sqlx::query_as::<_, SupportMessageRow>(&format!(
            "SELECT {} FROM support_messages WHERE id = $1",
            SUPPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SupportMessage::try_from).transpose()
    }

    async fn list_support_messages_for_user(&self, user_id: &str) -> Result<Vec<SupportMessage>> {
        let rows = sqlx::query_as::<_, SupportMessageRow>(&format!(
            "SELECT {} FROM support_messages WHERE user_id = $1",
            SUPPORT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn has_pending_support_messages(&self, user_id: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM support_messages
                WHERE user_id = $1 AND status = 'pending'
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn list_pending_support_messages(&self, user_id: Option<&str>) -> Result<Vec<SupportMessage>> {
        let rows = sqlx::query_as::<_, SupportMessageRow>(&format!(
            r#"
            SELECT {} FROM support_messages
            WHERE status = 'pending' AND ($1::TEXT IS NULL OR user_id = $1)
            "#,
            SUPPORT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn update_support_message_status(&self, id: Uuid, status: MessageStatus) -> Result<()> {
        let result = sqlx::query("UPDATE support_messages SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Support message {} not found", id)));
        }
        Ok(())
    }

    fn subscribe_support_changes(&self) -> broadcast::Receiver<SupportMessageChanged> {
        self.support_tx.subscribe()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_user(&self, user: UpsertUser) -> Result<(User, bool)> {
        // xmax = 0 only for freshly inserted tuples.
        let row: (String, String, String, Option<String>, Vec<String>, DateTime<Utc>, bool) = sqlx::query_as(
            r#"
            INSERT INTO users (id, display_name, email, photo_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET display_name = EXCLUDED.display_name,
                    email = EXCLUDED.email,
                    photo_url = COALESCE(EXCLUDED.photo_url, users.photo_url)
            RETURNING id, display_name, email, photo_url, statuses, created_at, (xmax = 0) AS inserted
            "#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.photo_url)
        .fetch_one(&self.pool)
        .await?;

        let (id, display_name, email, photo_url, statuses, created_at, inserted) = row;
        let user = User::try_from(UserRow {
            id,
            display_name,
            email,
            photo_url,
            statuses,
            created_at,
        })?;
        Ok((user, inserted))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY display_name ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_users_with_status(&self, status: UserStatus) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE $1 = ANY(statuses) ORDER BY display_name ASC",
            USER_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn set_user_statuses(&self, id: &str, statuses: &[UserStatus]) -> Result<User> {
        let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET statuses = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&values)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;

        row.try_into()
    }

    async fn set_user_photo(&self, id: &str, photo_url: &str) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET photo_url = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(photo_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;

        row.try_into()
    }
}

#[async_trait]
impl ConsultationStore for PgStore {
    async fn insert_consultation(&self, new: NewConsultationRequest) -> Result<ConsultationRequest> {
        let row = sqlx::query_as::<_, ConsultationRow>(&format!(
            r#"
            INSERT INTO support_requests
                (id, user_name, user_email, company, date, time, message, status, request_type, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CONSULTATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.user_name)
        .bind(&new.user_email)
        .bind(&new.company)
        .bind(new.date)
        .bind(&new.time)
        .bind(&new.message)
        .bind(ConsultationStatus::Pending.as_str())
        .bind(CONSULTATION_TYPE)
        .bind(&new.user_id)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_consultation(&self, id: Uuid) -> Result<Option<ConsultationRequest>> {
        let row = sqlx::query_as::<_, ConsultationRow>(&format!(
            "SELECT {} FROM support_requests WHERE id = $1",
            CONSULTATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConsultationRequest::try_from).transpose()
    }

    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> Result<Vec<ConsultationRequest>> {
        let rows = sqlx::query_as::<_, ConsultationRow>(&format!(
            r#"
            SELECT {} FROM support_requests
            WHERE request_type = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            CONSULTATION_COLUMNS
        ))
        .bind(CONSULTATION_TYPE)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn complete_consultation(
        &self,
        id: Uuid,
        meet_link: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<ConsultationRequest>> {
        let row = sqlx::query_as::<_, ConsultationRow>(&format!(
            r#"
            UPDATE support_requests
            SET status = 'completed', google_meet_link = $1, link_sent_at = $2
            WHERE id = $3 AND status = 'pending'
            RETURNING {}
            "#,
            CONSULTATION_COLUMNS
        ))
        .bind(meet_link)
        .bind(sent_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ConsultationRequest::try_from).transpose()
    }
}

#[async_trait]
impl PublishingStore for PgStore {
    async fn insert_trade_alert(&self, new: NewTradeAlert) -> Result<TradeAlert> {
        let row = sqlx::query_as::<_, TradeAlertRow>(
            r#"
            INSERT INTO trade_alerts
                (id, title, symbol, action, entry_price, target_price, stop_loss, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.symbol)
        .bind(new.action.as_str())
        .bind(new.entry_price)
        .bind(new.target_price)
        .bind(new.stop_loss)
        .bind(&new.notes)
        .bind(&new.created_by)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_trade_alerts(&self) -> Result<Vec<TradeAlert>> {
        let rows = sqlx::query_as::<_, TradeAlertRow>("SELECT * FROM trade_alerts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn insert_weekly_report(&self, new: NewWeeklyReport) -> Result<WeeklyReport> {
        let row = sqlx::query_as::<_, WeeklyReportRow>(
            r#"
            INSERT INTO weekly_reports (id, title, summary, week_of, file_url, file_name, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(&new.title)
        .bind(&new.summary)
        .bind(new.week_of)
        .bind(&new.file_url)
        .bind(&new.file_name)
        .bind(&new.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_weekly_reports(&self) -> Result<Vec<WeeklyReport>> {
        let rows = sqlx::query_as::<_, WeeklyReportRow>("SELECT * FROM weekly_reports ORDER BY week_of DESC, created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(WeeklyReport::from).collect())
    }
}

#[async_trait]
impl CommunityStore for PgStore {
    async fn insert_community_message(&self, new: NewCommunityMessage) -> Result<CommunityMessage> {
        let row = sqlx::query_as::<_, CommunityMessageRow>(
            r#"
            INSERT INTO community_messages (id, user_id, user_name, message, image_url, file_url, file_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.user_id)
        .bind(&new.user_name)
        .bind(&new.message)
        .bind(&new.image_url)
        .bind(&new.file_url)
        .bind(&new.file_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_recent_community_messages(&self, limit: i64) -> Result<Vec<CommunityMessage>> {
        let rows = sqlx::query_as::<_, CommunityMessageRow>(
            r#"
            SELECT * FROM (
                SELECT * FROM community_messages ORDER BY created_at DESC LIMIT $1
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommunityMessage::from).collect())
    }
}
