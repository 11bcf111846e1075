use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FASTAGCAB Admin API",
        description = "基于 Rust 和 Axum 的积分奖励管理后台 API 文档",
        version = "1.0.0"
    ),
    paths(
        // System health check
        crate::api::health,
        // User / Executive endpoints
        crate::api::account_controller::create_account,
        crate::api::account_controller::get_account,
        crate::api::account_controller::update_account,
        crate::api::account_controller::delete_account,
        crate::api::account_controller::adjust_points,
        crate::api::account_controller::set_verification,
        crate::api::account_controller::attach_documents,
        crate::api::account_controller::detach_document,
        crate::api::account_controller::reconcile_referrals,
        crate::api::account_controller::statistics,
    ),
    components(
        schemas(
            // Database models
            database::account::model::Account,
            database::account::model::AccountTier,
            database::account::model::AccountStatus,
            database::account::model::RelationshipStatus,
            database::account::model::PointKind,
            database::account::model::PointOperation,
            database::account::model::PointBalances,
            database::account::document::AccountDocument,
            database::account::document::DocumentType,
            database::account::statistics::AccountStatistics,
            database::account::statistics::TierCount,
            database::account::statistics::MonthlyCount,
            database::account::statistics::StatisticsOverview,
            // DTOs
            crate::dtos::account_dto::CreateAccountDto,
            crate::dtos::account_dto::UpdateAccountDto,
            crate::dtos::account_dto::AdjustPointsDto,
            crate::dtos::account_dto::VerificationDto,
            crate::dtos::account_dto::DocumentInputDto,
            crate::dtos::account_dto::AttachDocumentsDto,
            crate::dtos::account_dto::AccountResponse,
            crate::dtos::account_dto::PointsResponse,
            crate::dtos::account_dto::DocumentResponse,
            crate::dtos::account_dto::DocumentsResponse,
            crate::dtos::account_dto::MessageResponse,
        )
    ),
    tags(
        (name = "系统状态", description = "系统健康检查和状态监控"),
        (name = "user-executive", description = "用户 / 执行人账户、积分、认证与KYC文件管理")
    )
)]
pub struct ApiDoc;
