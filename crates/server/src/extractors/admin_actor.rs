use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use mongodb::bson::oid::ObjectId;
use utils::{AppError, AppResult};

/// 携带操作管理员ID的请求头
pub const ADMIN_HEADER: &str = "x-admin-id";

/// 当前操作的管理员，写入 createdBy / updatedBy / verifiedBy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminActor(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for AdminActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", ADMIN_HEADER)))?;

        let id = ObjectId::parse_str(value.trim())
            .map_err(|_| AppError::Unauthorized(format!("Invalid {} header", ADMIN_HEADER)))?;

        Ok(AdminActor(id))
    }
}

/// 解析路径中的十六进制ObjectId
pub fn parse_object_id(value: &str, what: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(value.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {} id: {}", what, value)))
}
