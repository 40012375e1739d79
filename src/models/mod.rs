//! 数据模型

pub mod user_id;
