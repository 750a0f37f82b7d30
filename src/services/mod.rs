pub mod community_service;
pub mod consultation_service;
pub mod conversation_feed;
pub mod email_service;
pub mod publishing_service;
pub mod storage_service;
pub mod support_service;
pub mod unread_tracker;
pub mod user_service;
