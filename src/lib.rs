//! lightpub 认证子系统
//! 签名密钥对生命周期、令牌签发与验证、请求认证闸门

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod store;
pub mod telemetry;
