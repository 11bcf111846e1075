use super::document::{AccountDocument, DocumentSet};
use crate::serde_helpers::{flexible_datetime, flexible_datetime_option, serialize_u64_as_number};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utils::{AppError, AppResult};
use utoipa::ToSchema;

/// 取消认证时未填写原因的占位文本
pub const DEFAULT_UNVERIFY_REASON: &str = "No reason provided";

/// BSON 只能存储有符号64位整数，积分上限随之收紧
pub const MAX_POINTS: u64 = i64::MAX as u64;

/// 账户等级（仅用于分类，不影响积分规则）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum AccountTier {
    #[default]
    Promoter,
    Retailer,
    Dealer,
    Distributor,
    Executive,
}

impl AccountTier {
    pub const ALL: [AccountTier; 5] = [
        AccountTier::Promoter,
        AccountTier::Retailer,
        AccountTier::Dealer,
        AccountTier::Distributor,
        AccountTier::Executive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::Promoter => "Promoter",
            AccountTier::Retailer => "Retailer",
            AccountTier::Dealer => "Dealer",
            AccountTier::Distributor => "Distributor",
            AccountTier::Executive => "Executive",
        }
    }
}

impl fmt::Display for AccountTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown account tier: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RelationshipStatus {
    #[default]
    Single,
    Married,
    Divorced,
    Widowed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// 积分入账类别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    #[default]
    Earned,
    Refer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PointOperation {
    #[default]
    Add,
    Deduct,
    /// 管理员直接修正某一类积分
    Set,
}

/// 账户积分快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointBalances {
    pub total_earned_points: u64,
    pub available_points: u64,
    pub refer_points: u64,
    pub redeem_amount: u64,
}

/// 身份唯一键：手机号、Aadhar、PAN
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityKeys {
    pub mobile: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
}

impl IdentityKeys {
    pub fn is_empty(&self) -> bool {
        self.mobile.is_none() && self.aadhar_number.is_none() && self.pan_number.is_none()
    }

    /// 返回与 `account` 冲突的第一个字段（对外展示名）
    pub fn colliding_field(&self, account: &Account) -> Option<&'static str> {
        if self.mobile.as_deref() == Some(account.mobile.as_str()) {
            return Some("mobile");
        }
        if self.aadhar_number.as_deref() == Some(account.aadhar_number.as_str()) {
            return Some("Aadhar number");
        }
        if self.pan_number.as_deref() == Some(account.pan_number.as_str()) {
            return Some("PAN number");
        }
        None
    }
}

/// 创建账户的输入（已经过格式校验）
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub user_type: AccountTier,
    pub name: String,
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
}

impl NewAccount {
    /// 去除首尾空白，邮箱转小写，PAN转大写，空串视为未填写
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            email: normalize_email(self.email),
            aadhar_number: self.aadhar_number.trim().to_string(),
            pan_number: self.pan_number.trim().to_uppercase(),
            pin_code: self.pin_code.trim().to_string(),
            state: self.state.trim().to_string(),
            city: self.city.trim().to_string(),
            address: self.address.trim().to_string(),
            refer_code: non_blank(self.refer_code),
            dealer_code: non_blank(self.dealer_code),
            ..self
        }
    }

    pub fn identity(&self) -> IdentityKeys {
        IdentityKeys {
            mobile: Some(self.mobile.clone()),
            aadhar_number: Some(self.aadhar_number.clone()),
            pan_number: Some(self.pan_number.clone()),
        }
    }
}

/// 部分更新；推荐关系与积分不在此处修改
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountUpdate {
    pub user_type: Option<AccountTier>,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub relationship_status: Option<RelationshipStatus>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub aadhar_number: Option<String>,
    pub pan_number: Option<String>,
    pub pin_code: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub point_percentage: Option<u8>,
    pub dealer_code: Option<String>,
    pub status: Option<AccountStatus>,
}

impl AccountUpdate {
    pub fn normalized(self) -> Self {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            name: trim(self.name),
            mobile: trim(self.mobile),
            email: self.email.map(|e| e.trim().to_lowercase()),
            aadhar_number: trim(self.aadhar_number),
            pan_number: self.pan_number.map(|p| p.trim().to_uppercase()),
            pin_code: trim(self.pin_code),
            state: trim(self.state),
            city: trim(self.city),
            address: trim(self.address),
            dealer_code: trim(self.dealer_code),
            ..self
        }
    }

    pub fn identity(&self) -> IdentityKeys {
        IdentityKeys {
            mobile: self.mobile.clone(),
            aadhar_number: self.aadhar_number.clone(),
            pan_number: self.pan_number.clone(),
        }
    }
}

/// 用户 / 执行人账户（UserExecutive）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// MongoDB文档ID
    #[serde(rename = "_id")]
    #[schema(value_type = String)]
    pub id: ObjectId,

    // 基本信息
    pub user_type: AccountTier,
    pub name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub relationship_status: RelationshipStatus,

    // 联系方式
    pub mobile: String,
    #[serde(default)]
    pub email: Option<String>,

    // 证件号
    pub aadhar_number: String,
    pub pan_number: String,

    // 地址
    pub pin_code: String,
    pub state: String,
    pub city: String,
    pub address: String,

    pub point_percentage: u8,
    #[serde(default)]
    pub refer_code: Option<String>,
    #[serde(default)]
    pub dealer_code: Option<String>,

    // 积分
    #[serde(default, serialize_with = "serialize_u64_as_number")]
    pub total_earned_points: u64,
    #[serde(default, serialize_with = "serialize_u64_as_number")]
    pub available_points: u64,
    #[serde(default, serialize_with = "serialize_u64_as_number")]
    pub refer_points: u64,
    #[serde(default, serialize_with = "serialize_u64_as_number")]
    pub redeem_amount: u64,

    // 推荐关系：referredBy 是唯一事实来源，referredUsers 为派生索引
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub referred_by: Option<ObjectId>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub referred_users: Vec<ObjectId>,
    #[serde(default, serialize_with = "serialize_u64_as_number")]
    pub total_referred_users: u64,

    // 状态与认证
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, with = "flexible_datetime_option")]
    pub verification_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub verified_by: Option<ObjectId>,
    #[serde(default)]
    pub unverify_reason: String,

    #[serde(default)]
    #[schema(value_type = Vec<AccountDocument>)]
    pub documents: DocumentSet,

    // 元数据
    #[serde(with = "flexible_datetime")]
    pub registration_date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub created_by: ObjectId,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub updated_by: Option<ObjectId>,
    #[serde(with = "flexible_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "flexible_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// 由管理员创建新账户，推荐人在创建时一次性确定
    pub fn new(input: NewAccount, created_by: ObjectId, referred_by: Option<ObjectId>) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            user_type: input.user_type,
            name: input.name,
            date_of_birth: input.date_of_birth,
            relationship_status: input.relationship_status,
            mobile: input.mobile,
            email: input.email,
            aadhar_number: input.aadhar_number,
            pan_number: input.pan_number,
            pin_code: input.pin_code,
            state: input.state,
            city: input.city,
            address: input.address,
            point_percentage: input.point_percentage,
            refer_code: input.refer_code,
            dealer_code: input.dealer_code,
            total_earned_points: 0,
            available_points: 0,
            refer_points: 0,
            redeem_amount: 0,
            referred_by,
            referred_users: Vec::new(),
            total_referred_users: 0,
            status: AccountStatus::Active,
            is_verified: false,
            verification_date: None,
            verified_by: None,
            unverify_reason: String::new(),
            documents: DocumentSet::default(),
            registration_date: now,
            created_by,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> IdentityKeys {
        IdentityKeys {
            mobile: Some(self.mobile.clone()),
            aadhar_number: Some(self.aadhar_number.clone()),
            pan_number: Some(self.pan_number.clone()),
        }
    }

    pub fn balances(&self) -> PointBalances {
        PointBalances {
            total_earned_points: self.total_earned_points,
            available_points: self.available_points,
            refer_points: self.refer_points,
            redeem_amount: self.redeem_amount,
        }
    }

    fn apply_balances(&mut self, balances: PointBalances) -> PointBalances {
        self.total_earned_points = balances.total_earned_points;
        self.available_points = balances.available_points;
        self.refer_points = balances.refer_points;
        self.redeem_amount = balances.redeem_amount;
        self.updated_at = Utc::now();
        balances
    }

    /// 积分入账：earned 计入累计获得，refer 计入推荐积分，两者都进入可用余额
    pub fn add_points(&mut self, amount: u64, kind: PointKind) -> AppResult<PointBalances> {
        if amount == 0 {
            return Err(AppError::BadRequest("Points to add must be greater than zero".to_string()));
        }

        let mut next = self.balances();
        match kind {
            PointKind::Earned => next.total_earned_points = checked_add(next.total_earned_points, amount)?,
            PointKind::Refer => next.refer_points = checked_add(next.refer_points, amount)?,
        }
        next.available_points = checked_add(next.available_points, amount)?;

        Ok(self.apply_balances(next))
    }

    /// 积分扣减（兑换），余额不足时不做任何修改
    pub fn deduct_points(&mut self, amount: u64) -> AppResult<PointBalances> {
        if amount == 0 {
            return Err(AppError::BadRequest("Points to deduct must be greater than zero".to_string()));
        }
        if self.available_points < amount {
            return Err(AppError::InsufficientBalance {
                available: self.available_points,
                requested: amount,
            });
        }

        let mut next = self.balances();
        next.available_points -= amount;
        next.redeem_amount = checked_add(next.redeem_amount, amount)?;

        Ok(self.apply_balances(next))
    }

    /// 直接设置某一类积分，可用余额按 earned + refer 重新计算
    pub fn set_points(&mut self, amount: u64, kind: PointKind) -> AppResult<PointBalances> {
        if amount > MAX_POINTS {
            return Err(points_limit_error());
        }

        let mut next = self.balances();
        match kind {
            PointKind::Earned => next.total_earned_points = amount,
            PointKind::Refer => next.refer_points = amount,
        }
        next.available_points = checked_add(next.total_earned_points, next.refer_points)?;

        Ok(self.apply_balances(next))
    }

    pub fn adjust_points(&mut self, operation: PointOperation, amount: u64, kind: PointKind) -> AppResult<PointBalances> {
        match operation {
            PointOperation::Add => self.add_points(amount, kind),
            PointOperation::Deduct => self.deduct_points(amount),
            PointOperation::Set => self.set_points(amount, kind),
        }
    }

    /// 认证通过（可重复调用，覆盖时间与操作人）
    pub fn verify(&mut self, actor: ObjectId) {
        let now = Utc::now();
        self.is_verified = true;
        self.verification_date = Some(now);
        self.verified_by = Some(actor);
        self.unverify_reason.clear();
        self.updated_at = now;
    }

    pub fn unverify(&mut self, reason: Option<&str>, actor: ObjectId) {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_UNVERIFY_REASON);
        self.is_verified = false;
        self.verification_date = None;
        self.verified_by = Some(actor);
        self.unverify_reason = reason.to_string();
        self.updated_at = Utc::now();
    }

    /// 挂载文件，同类型旧文件被替换并返回
    pub fn attach_document(&mut self, document: AccountDocument) -> Option<AccountDocument> {
        self.updated_at = Utc::now();
        self.documents.upsert(document)
    }

    pub fn detach_document(&mut self, document_id: &ObjectId) -> Option<AccountDocument> {
        let removed = self.documents.remove_by_id(document_id)?;
        self.updated_at = Utc::now();
        Some(removed)
    }

    pub fn apply_update(&mut self, update: AccountUpdate, actor: ObjectId) {
        if let Some(v) = update.user_type {
            self.user_type = v;
        }
        if let Some(v) = update.name {
            self.name = v;
        }
        if let Some(v) = update.date_of_birth {
            self.date_of_birth = v;
        }
        if let Some(v) = update.relationship_status {
            self.relationship_status = v;
        }
        if let Some(v) = update.mobile {
            self.mobile = v;
        }
        if let Some(v) = update.email {
            self.email = Some(v).filter(|e| !e.is_empty());
        }
        if let Some(v) = update.aadhar_number {
            self.aadhar_number = v;
        }
        if let Some(v) = update.pan_number {
            self.pan_number = v;
        }
        if let Some(v) = update.pin_code {
            self.pin_code = v;
        }
        if let Some(v) = update.state {
            self.state = v;
        }
        if let Some(v) = update.city {
            self.city = v;
        }
        if let Some(v) = update.address {
            self.address = v;
        }
        if let Some(v) = update.point_percentage {
            self.point_percentage = v;
        }
        if let Some(v) = update.dealer_code {
            self.dealer_code = Some(v).filter(|c| !c.is_empty());
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        self.updated_by = Some(actor);
        self.updated_at = Utc::now();
    }

    /// 推荐码可以是手机号、Aadhar 或 PAN（PAN 不区分大小写）
    pub fn matches_referral_code(&self, code: &str) -> bool {
        let code = code.trim();
        !code.is_empty() && (self.mobile == code || self.aadhar_number == code || self.pan_number == code.to_uppercase())
    }

    /// 追加被推荐人，计数始终等于集合长度
    pub fn link_referred_user(&mut self, referred: ObjectId) -> bool {
        if self.referred_users.contains(&referred) {
            return false;
        }
        self.referred_users.push(referred);
        self.total_referred_users = self.referred_users.len() as u64;
        true
    }

    pub fn unlink_referred_user(&mut self, referred: &ObjectId) -> bool {
        let before = self.referred_users.len();
        self.referred_users.retain(|id| id != referred);
        self.total_referred_users = self.referred_users.len() as u64;
        before != self.referred_users.len()
    }

    pub fn set_referred_users(&mut self, referred: Vec<ObjectId>) {
        self.referred_users = referred;
        self.total_referred_users = self.referred_users.len() as u64;
    }

    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let birth = self.date_of_birth;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }
}

fn checked_add(current: u64, amount: u64) -> AppResult<u64> {
    current
        .checked_add(amount)
        .filter(|total| *total <= MAX_POINTS)
        .ok_or_else(points_limit_error)
}

fn points_limit_error() -> AppError {
    AppError::BadRequest(format!("Point total would exceed the maximum of {}", MAX_POINTS))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn normalize_email(value: Option<String>) -> Option<String> {
    non_blank(value).map(|v| v.to_lowercase())
}
