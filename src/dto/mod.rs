pub mod consultation_dto;
pub mod publishing_dto;
pub mod support_dto;
pub mod user_dto;
