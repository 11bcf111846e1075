use chrono::{DateTime, NaiveDate, Utc};
use database::account::{
    document::{AccountDocument, DocumentType},
    model::{
        Account, AccountStatus, AccountTier, AccountUpdate, NewAccount, PointBalances, PointKind, PointOperation,
        RelationshipStatus,
    },
};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utils::{AppError, AppResult};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

lazy_static! {
    static ref MOBILE_REGEX: Regex = Regex::new(r"^[6-9]\d{9}$").expect("invalid mobile pattern");
    static ref AADHAR_REGEX: Regex = Regex::new(r"^\d{12}$").expect("invalid Aadhar pattern");
    static ref PAN_REGEX: Regex = Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("invalid PAN pattern");
    static ref PIN_CODE_REGEX: Regex = Regex::new(r"^\d{6}$").expect("invalid pin code pattern");
}

fn default_point_percentage() -> u8 {
    100
}

pub fn validate_mobile(value: &str) -> Result<(), ValidationError> {
    if MOBILE_REGEX.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_mobile"))
    }
}

pub fn validate_aadhar(value: &str) -> Result<(), ValidationError> {
    if AADHAR_REGEX.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_aadhar_number"))
    }
}

/// PAN 入库前统一转大写，这里同样按大写校验
pub fn validate_pan(value: &str) -> Result<(), ValidationError> {
    if PAN_REGEX.is_match(&value.trim().to_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_pan_number"))
    }
}

pub fn validate_pin_code(value: &str) -> Result<(), ValidationError> {
    if PIN_CODE_REGEX.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_pin_code"))
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

/// 创建账户请求体
#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountDto {
    pub user_type: AccountTier,

    #[validate(custom = "validate_not_blank")]
    pub name: String,

    /// YYYY-MM-DD
    #[schema(value_type = String, example = "1990-06-15")]
    pub date_of_birth: NaiveDate,

    #[serde(default)]
    pub relationship_status: RelationshipStatus,

    #[validate(custom = "validate_mobile")]
    pub mobile: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(custom = "validate_aadhar")]
    pub aadhar_number: String,

    #[validate(custom = "validate_pan")]
    pub pan_number: String,

    #[validate(custom = "validate_pin_code")]
    pub pin_code: String,

    #[validate(custom = "validate_not_blank")]
    pub state: String,

    #[validate(custom = "validate_not_blank")]
    pub city: String,

    #[validate(custom = "validate_not_blank")]
    pub address: String,

    #[serde(default = "default_point_percentage")]
    #[validate(range(max = 100))]
    pub point_percentage: u8,

    /// 推荐人的手机号 / Aadhar / PAN
    pub refer_code: Option<String>,

    pub dealer_code: Option<String>,
}

impl From<CreateAccountDto> for NewAccount {
    fn from(dto: CreateAccountDto) -> Self {
        NewAccount {
            user_type: dto.user_type,
            name: dto.name,
            date_of_birth: dto.date_of_birth,
            relationship_status: dto.relationship_status,
            mobile: dto.mobile,
            email: dto.email,
            aadhar_number: dto.aadhar_number,
            pan_number: dto.pan_number,
            pin_code: dto.pin_code,
            state: dto.state,
            city: dto.city,
            address: dto.address,
            point_percentage: dto.point_percentage,
            refer_code: dto.refer_code,
            dealer_code: dto.dealer_code,
        }
    }
}

/// 更新账户请求体，未提供的字段保持不变
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountDto {
    pub user_type: Option<AccountTier>,

    #[validate(custom = "validate_not_blank")]
    pub name: Option<String>,

    #[schema(value_type = Option<String>, example = "1990-06-15")]
    pub date_of_birth: Option<NaiveDate>,

    pub relationship_status: Option<RelationshipStatus>,

    #[validate(custom = "validate_mobile")]
    pub mobile: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(custom = "validate_aadhar")]
    pub aadhar_number: Option<String>,

    #[validate(custom = "validate_pan")]
    pub pan_number: Option<String>,

    #[validate(custom = "validate_pin_code")]
    pub pin_code: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub state: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub city: Option<String>,

    #[validate(custom = "validate_not_blank")]
    pub address: Option<String>,

    #[validate(range(max = 100))]
    pub point_percentage: Option<u8>,

    pub dealer_code: Option<String>,

    pub status: Option<AccountStatus>,
}

impl From<UpdateAccountDto> for AccountUpdate {
    fn from(dto: UpdateAccountDto) -> Self {
        AccountUpdate {
            user_type: dto.user_type,
            name: dto.name,
            date_of_birth: dto.date_of_birth,
            relationship_status: dto.relationship_status,
            mobile: dto.mobile,
            email: dto.email,
            aadhar_number: dto.aadhar_number,
            pan_number: dto.pan_number,
            pin_code: dto.pin_code,
            state: dto.state,
            city: dto.city,
            address: dto.address,
            point_percentage: dto.point_percentage,
            dealer_code: dto.dealer_code,
            status: dto.status,
        }
    }
}

/// 积分调整请求体
#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
pub struct AdjustPointsDto {
    /// add / deduct 时必须大于0，set 时可以为0
    pub points: i64,
    pub operation: PointOperation,
    #[serde(rename = "type", default)]
    pub kind: PointKind,
}

impl AdjustPointsDto {
    pub fn amount(&self) -> AppResult<u64> {
        u64::try_from(self.points)
            .map_err(|_| AppError::BadRequest(format!("Points must not be negative, got {}", self.points)))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDto {
    pub is_verified: bool,
    /// 取消认证原因，可选
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// 已由上传层写入存储目录的文件元数据
#[derive(Clone, Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInputDto {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
}

impl From<DocumentInputDto> for AccountDocument {
    fn from(dto: DocumentInputDto) -> Self {
        AccountDocument::new(dto.doc_type, dto.filename, dto.original_name, dto.mimetype, dto.size)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Validate, ToSchema)]
pub struct AttachDocumentsDto {
    #[validate(length(min = 1, max = 4))]
    pub documents: Vec<DocumentInputDto>,
}

fn hex(id: &ObjectId) -> String {
    id.to_hex()
}

/// KYC文件返回体，ID 以十六进制字符串输出
#[derive(Clone, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub url: String,
}

impl From<AccountDocument> for DocumentResponse {
    fn from(document: AccountDocument) -> Self {
        Self {
            id: hex(&document.id),
            doc_type: document.doc_type,
            filename: document.filename,
            original_name: document.original_name,
            mimetype: document.mimetype,
            size: document.size,
            upload_date: document.upload_date,
            url: document.url,
        }
    }
}

/// 账户返回体：十六进制ID与实时计算的年龄
#[derive(Clone, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub age: u32,

    pub user_type: AccountTier,
    pub name: String,
    #[schema(value_type = String, example = "1990-06-15")]
    pub date_of_birth: NaiveDate,
    pub relationship_status: RelationshipStatus,
    pub mobile: String,
    pub email: Option<String>,
    pub aadhar_number: String,
    pub pan_number: String,
    pub pin_code: String,
    pub state: String,
    pub city: String,
    pub address: String,
    pub point_percentage: u8,
    pub refer_code: Option<String>,
    pub dealer_code: Option<String>,

    pub total_earned_points: u64,
    pub available_points: u64,
    pub refer_points: u64,
    pub redeem_amount: u64,

    pub referred_by: Option<String>,
    pub referred_users: Vec<String>,
    pub total_referred_users: u64,

    pub status: AccountStatus,
    pub is_verified: bool,
    pub verification_date: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub unverify_reason: String,

    pub documents: Vec<DocumentResponse>,

    pub registration_date: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        let age = account.age_on(Utc::now().date_naive());
        Self {
            id: hex(&account.id),
            age,
            user_type: account.user_type,
            name: account.name,
            date_of_birth: account.date_of_birth,
            relationship_status: account.relationship_status,
            mobile: account.mobile,
            email: account.email,
            aadhar_number: account.aadhar_number,
            pan_number: account.pan_number,
            pin_code: account.pin_code,
            state: account.state,
            city: account.city,
            address: account.address,
            point_percentage: account.point_percentage,
            refer_code: account.refer_code,
            dealer_code: account.dealer_code,
            total_earned_points: account.total_earned_points,
            available_points: account.available_points,
            refer_points: account.refer_points,
            redeem_amount: account.redeem_amount,
            referred_by: account.referred_by.as_ref().map(hex),
            referred_users: account.referred_users.iter().map(hex).collect(),
            total_referred_users: account.total_referred_users,
            status: account.status,
            is_verified: account.is_verified,
            verification_date: account.verification_date,
            verified_by: account.verified_by.as_ref().map(hex),
            unverify_reason: account.unverify_reason,
            documents: account.documents.into_iter().map(Into::into).collect(),
            registration_date: account.registration_date,
            created_by: hex(&account.created_by),
            updated_by: account.updated_by.as_ref().map(hex),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Clone, Serialize, Debug, ToSchema)]
pub struct PointsResponse {
    pub id: String,
    #[serde(flatten)]
    pub balances: PointBalances,
}

#[derive(Clone, Serialize, Debug, ToSchema)]
pub struct DocumentsResponse {
    pub id: String,
    pub documents: Vec<DocumentResponse>,
}

impl DocumentsResponse {
    pub fn new(id: &ObjectId, documents: Vec<AccountDocument>) -> Self {
        Self {
            id: hex(id),
            documents: documents.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Serialize, Debug, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_formats() {
        assert!(validate_mobile("9876543210").is_ok());
        assert!(validate_mobile("5876543210").is_err());
        assert!(validate_mobile("98765").is_err());

        assert!(validate_aadhar("123412341234").is_ok());
        assert!(validate_aadhar("12341234123").is_err());

        assert!(validate_pan("ABCDE1234F").is_ok());
        assert!(validate_pan("abcde1234f").is_ok());
        assert!(validate_pan("ABCD12345F").is_err());

        assert!(validate_pin_code("560001").is_ok());
        assert!(validate_pin_code("56001").is_err());
    }

    #[test]
    fn test_create_dto_defaults_and_validation() {
        let json = serde_json::json!({
            "userType": "Retailer",
            "name": "Ravi Kumar",
            "dateOfBirth": "1990-06-15",
            "mobile": "9876543210",
            "aadharNumber": "123412341234",
            "panNumber": "ABCDE1234F",
            "pinCode": "560001",
            "state": "Karnataka",
            "city": "Bengaluru",
            "address": "12 MG Road"
        });
        let dto: CreateAccountDto = serde_json::from_value(json).unwrap();
        assert_eq!(dto.point_percentage, 100);
        assert_eq!(dto.relationship_status, RelationshipStatus::Single);
        assert!(dto.validate().is_ok());

        let mut bad = dto.clone();
        bad.mobile = "12345".to_string();
        bad.point_percentage = 101;
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("mobile"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_adjust_points_amount() {
        let dto: AdjustPointsDto =
            serde_json::from_value(serde_json::json!({ "points": 40, "operation": "deduct" })).unwrap();
        assert_eq!(dto.amount().unwrap(), 40);
        assert_eq!(dto.kind, PointKind::Earned);

        let dto: AdjustPointsDto =
            serde_json::from_value(serde_json::json!({ "points": -5, "operation": "add", "type": "refer" })).unwrap();
        assert!(matches!(dto.amount(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_account_response_uses_hex_ids() {
        let dto: CreateAccountDto = serde_json::from_value(serde_json::json!({
            "userType": "Dealer",
            "name": "Meera Nair",
            "dateOfBirth": "1992-01-10",
            "mobile": "9123456780",
            "aadharNumber": "567856785678",
            "panNumber": "PQRST6789K",
            "pinCode": "682001",
            "state": "Kerala",
            "city": "Kochi",
            "address": "7 Marine Drive"
        }))
        .unwrap();
        let admin = ObjectId::new();
        let referrer = ObjectId::new();
        let mut account = Account::new(dto.into(), admin, Some(referrer));
        account.attach_document(AccountDocument::new(
            DocumentType::PanCard,
            "pan.pdf".to_string(),
            "pan.pdf".to_string(),
            "application/pdf".to_string(),
            10,
        ));
        let id = account.id.to_hex();

        let body = serde_json::to_value(AccountResponse::from(account)).unwrap();
        assert_eq!(body["id"], id);
        assert!(body.get("_id").is_none());
        assert_eq!(body["createdBy"], admin.to_hex());
        assert_eq!(body["referredBy"], referrer.to_hex());
        assert!(body["documents"][0]["id"].is_string());
        assert_eq!(body["documents"][0]["type"], "pan_card");
    }
}
