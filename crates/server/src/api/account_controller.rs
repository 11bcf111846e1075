use crate::{
    dtos::account_dto::{
        AccountResponse, AdjustPointsDto, AttachDocumentsDto, CreateAccountDto, DocumentsResponse, MessageResponse,
        PointsResponse, UpdateAccountDto, VerificationDto,
    },
    extractors::{
        admin_actor::{parse_object_id, AdminActor},
        validation_extractor::ValidationExtractor,
    },
    services::Services,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use database::account::{document::AccountDocument, statistics::StatisticsOverview};
use utils::AppResult;

/// 创建账户（可携带推荐码）
#[utoipa::path(
    post,
    path = "/api/v1/user-executive",
    tag = "user-executive",
    request_body = CreateAccountDto,
    params(
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 201, description = "账户创建成功", body = AccountResponse),
        (status = 400, description = "请求参数错误"),
        (status = 409, description = "手机号 / Aadhar / PAN 已存在")
    )
)]
pub async fn create_account(
    Extension(services): Extension<Services>,
    AdminActor(admin): AdminActor,
    ValidationExtractor(req): ValidationExtractor<CreateAccountDto>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let account = services.account.create_account(req.into(), admin).await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// 获取账户详情
#[utoipa::path(
    get,
    path = "/api/v1/user-executive/{id}",
    tag = "user-executive",
    params(
        ("id" = String, Path, description = "账户ID")
    ),
    responses(
        (status = 200, description = "账户详情", body = AccountResponse),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn get_account(
    Extension(services): Extension<Services>,
    Path(id): Path<String>,
) -> AppResult<Json<AccountResponse>> {
    let id = parse_object_id(&id, "account")?;
    let account = services.account.get_account(&id).await?;

    Ok(Json(account.into()))
}

/// 更新账户资料
#[utoipa::path(
    put,
    path = "/api/v1/user-executive/{id}",
    tag = "user-executive",
    request_body = UpdateAccountDto,
    params(
        ("id" = String, Path, description = "账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "更新成功", body = AccountResponse),
        (status = 404, description = "账户不存在"),
        (status = 409, description = "身份字段冲突")
    )
)]
pub async fn update_account(
    Extension(services): Extension<Services>,
    AdminActor(admin): AdminActor,
    Path(id): Path<String>,
    ValidationExtractor(req): ValidationExtractor<UpdateAccountDto>,
) -> AppResult<Json<AccountResponse>> {
    let id = parse_object_id(&id, "account")?;
    let account = services.account.update_account(&id, req.into(), admin).await?;

    Ok(Json(account.into()))
}

/// 删除账户（解除推荐关系并删除文件）
#[utoipa::path(
    delete,
    path = "/api/v1/user-executive/{id}",
    tag = "user-executive",
    params(
        ("id" = String, Path, description = "账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "删除成功", body = MessageResponse),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn delete_account(
    Extension(services): Extension<Services>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_object_id(&id, "account")?;
    services.account.delete_account(&id).await?;

    Ok(Json(MessageResponse {
        message: "User/Executive deleted successfully".to_string(),
    }))
}

/// 调整积分（add / deduct / set）
#[utoipa::path(
    patch,
    path = "/api/v1/user-executive/{id}/points",
    tag = "user-executive",
    request_body = AdjustPointsDto,
    params(
        ("id" = String, Path, description = "账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "调整后的积分", body = PointsResponse),
        (status = 404, description = "账户不存在"),
        (status = 422, description = "可用积分不足")
    )
)]
pub async fn adjust_points(
    Extension(services): Extension<Services>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
    ValidationExtractor(req): ValidationExtractor<AdjustPointsDto>,
) -> AppResult<Json<PointsResponse>> {
    let id = parse_object_id(&id, "account")?;
    let amount = req.amount()?;
    let balances = services.account.adjust_points(&id, req.operation, amount, req.kind).await?;

    Ok(Json(PointsResponse {
        id: id.to_hex(),
        balances,
    }))
}

/// 认证 / 取消认证
#[utoipa::path(
    patch,
    path = "/api/v1/user-executive/{id}/verification",
    tag = "user-executive",
    request_body = VerificationDto,
    params(
        ("id" = String, Path, description = "账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "认证状态已更新", body = AccountResponse),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn set_verification(
    Extension(services): Extension<Services>,
    AdminActor(admin): AdminActor,
    Path(id): Path<String>,
    ValidationExtractor(req): ValidationExtractor<VerificationDto>,
) -> AppResult<Json<AccountResponse>> {
    let id = parse_object_id(&id, "account")?;
    let account = services
        .account
        .set_verification(&id, req.is_verified, req.reason, admin)
        .await?;

    Ok(Json(account.into()))
}

/// 挂载KYC文件（同类型替换）
#[utoipa::path(
    post,
    path = "/api/v1/user-executive/{id}/documents",
    tag = "user-executive",
    request_body = AttachDocumentsDto,
    params(
        ("id" = String, Path, description = "账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "最新文件列表", body = DocumentsResponse),
        (status = 400, description = "文件类型或大小不合法"),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn attach_documents(
    Extension(services): Extension<Services>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
    ValidationExtractor(req): ValidationExtractor<AttachDocumentsDto>,
) -> AppResult<Json<DocumentsResponse>> {
    let id = parse_object_id(&id, "account")?;
    let documents: Vec<AccountDocument> = req.documents.into_iter().map(Into::into).collect();
    let documents = services.account.attach_documents(&id, documents).await?;

    Ok(Json(DocumentsResponse::new(&id, documents)))
}

/// 删除单个KYC文件
#[utoipa::path(
    delete,
    path = "/api/v1/user-executive/{id}/documents/{doc_id}",
    tag = "user-executive",
    params(
        ("id" = String, Path, description = "账户ID"),
        ("doc_id" = String, Path, description = "文件ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "最新文件列表", body = DocumentsResponse),
        (status = 404, description = "账户或文件不存在")
    )
)]
pub async fn detach_document(
    Extension(services): Extension<Services>,
    AdminActor(_admin): AdminActor,
    Path((id, doc_id)): Path<(String, String)>,
) -> AppResult<Json<DocumentsResponse>> {
    let id = parse_object_id(&id, "account")?;
    let doc_id = parse_object_id(&doc_id, "document")?;
    let documents = services.account.detach_document(&id, &doc_id).await?;

    Ok(Json(DocumentsResponse::new(&id, documents)))
}

/// 按 referredBy 重建推荐索引
#[utoipa::path(
    post,
    path = "/api/v1/user-executive/{id}/referrals/reconcile",
    tag = "user-executive",
    params(
        ("id" = String, Path, description = "推荐人账户ID"),
        ("x-admin-id" = String, Header, description = "操作管理员ID")
    ),
    responses(
        (status = 200, description = "修复后的账户", body = AccountResponse),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn reconcile_referrals(
    Extension(services): Extension<Services>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
) -> AppResult<Json<AccountResponse>> {
    let id = parse_object_id(&id, "account")?;
    let account = services.account.reconcile_referrals(&id).await?;

    Ok(Json(account.into()))
}

/// 账户统计（总览 / 等级分布 / 近180天注册趋势）
#[utoipa::path(
    get,
    path = "/api/v1/user-executive/stats/overview",
    tag = "user-executive",
    responses(
        (status = 200, description = "统计数据", body = StatisticsOverview)
    )
)]
pub async fn statistics(Extension(services): Extension<Services>) -> AppResult<Json<StatisticsOverview>> {
    let stats = services.account.statistics().await?;

    Ok(Json(stats))
}

pub struct AccountController;
impl AccountController {
    pub fn app() -> Router {
        Router::new()
            .route("/", post(create_account))
            .route("/stats/overview", get(statistics))
            .route("/:id", get(get_account).put(update_account).delete(delete_account))
            .route("/:id/points", patch(adjust_points))
            .route("/:id/verification", patch(set_verification))
            .route("/:id/documents", post(attach_documents))
            .route("/:id/documents/:doc_id", axum::routing::delete(detach_document))
            .route("/:id/referrals/reconcile", post(reconcile_referrals))
    }
}
