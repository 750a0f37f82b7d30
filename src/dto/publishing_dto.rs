use crate::models::trade_alert::TradeAction;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTradeAlertPayload {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 12, message = "Symbol must be 1-12 characters"))]
    pub symbol: String,
    pub action: TradeAction,
    #[validate(range(min = 0.0))]
    pub entry_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub target_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub stop_loss: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse<T> {
    #[serde(flatten)]
    pub item: T,
    pub notified: usize,
    pub notification_failures: usize,
}
