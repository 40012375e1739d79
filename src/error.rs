//! 统一错误模型
//! 定义 HTTP 边界错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{jwt::TokenError, key_store::KeyStoreError};

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// Bearer token failed verification, whatever the reason
    #[error("invalid authentication")]
    InvalidAuthentication,

    /// Handler needs a principal and the request carries none
    #[error("authentication required")]
    Unauthorized,

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidAuthentication | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::KeyStore(_) | AppError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::InvalidAuthentication => "invalid authentication",
            AppError::Unauthorized => "authentication required",
            AppError::KeyStore(_) | AppError::Token(_) => "internal server error",
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 记录错误日志；内部细节只进日志
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Application error");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                message: self.user_message(),
            }),
        )
            .into_response()
    }
}
