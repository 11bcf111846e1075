use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    /// 手机号 / Aadhar / PAN 与已有账户冲突
    #[error("Account already exists with this {field}")]
    DuplicateIdentity { field: String },

    #[error("Insufficient points: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    /// 新账户已落库，但推荐人侧计数更新失败（只记录日志，不返回给调用方）
    #[error("Failed to link referral on referrer {referrer}: {reason}")]
    ReferralLinkFailure { referrer: String, reason: String },

    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),

    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] mongodb::error::Error),

    #[error(transparent)]
    BsonSerialization(#[from] mongodb::bson::ser::Error),

    #[error("{0}")]
    InternalServerErrorWithContext(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::ValidationError(_) | AppError::JsonRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) | AppError::DuplicateIdentity { .. } => StatusCode::CONFLICT,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ReferralLinkFailure { .. }
            | AppError::StorageFailure(_)
            | AppError::BsonSerialization(_)
            | AppError::InternalServerErrorWithContext(_)
            | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DuplicateIdentity { .. } => "DUPLICATE_IDENTITY",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::ReferralLinkFailure { .. } => "REFERRAL_LINK_FAILURE",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::JsonRejection(_) => "INVALID_JSON",
            AppError::StorageFailure(_) | AppError::BsonSerialization(_) => "STORAGE_FAILURE",
            AppError::InternalServerErrorWithContext(_) | AppError::Anyhow(_) => "INTERNAL_ERROR",
        }
    }

    fn messages(&self) -> Vec<String> {
        match self {
            AppError::ValidationError(errors) => errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |e| match &e.message {
                        Some(message) => format!("{}: {}", field, message),
                        None => format!("{}: invalid value ({})", field, e.code),
                    })
                })
                .collect(),
            // 存储层细节不暴露给调用方
            AppError::StorageFailure(_) | AppError::BsonSerialization(_) => {
                vec![String::from("The storage layer is currently unavailable")]
            }
            other => vec![other.to_string()],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("❌ {:?}", self);
        }

        let body = Json(json!({
            "errors": {
                "code": self.code(),
                "message": self.messages(),
            }
        }));

        (status, body).into_response()
    }
}
