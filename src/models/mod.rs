pub mod community_message;
pub mod consultation;
pub mod support_message;
pub mod trade_alert;
pub mod user;
pub mod weekly_report;
