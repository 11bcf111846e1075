use super::{
    model::{Account, AccountTier, IdentityKeys},
    statistics::{AccountStatistics, MonthlyCount, StatisticsOverview, TierCount},
};
use crate::{serde_helpers::to_sortable_string, Database};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::FindOptions,
};
use std::sync::Arc;
use tracing::{debug, info};
use utils::{AppError, AppResult};

pub type DynAccountRepository = Arc<dyn AccountRepositoryTrait + Send + Sync>;

/// 单次写入只覆盖对应的一组字段，避免不同操作互相覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Profile,
    Points,
    Verification,
    Documents,
}

impl FieldGroup {
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            FieldGroup::Profile => &[
                "userType",
                "name",
                "dateOfBirth",
                "relationshipStatus",
                "mobile",
                "email",
                "aadharNumber",
                "panNumber",
                "pinCode",
                "state",
                "city",
                "address",
                "pointPercentage",
                "dealerCode",
                "status",
                "updatedBy",
                "updatedAt",
            ],
            FieldGroup::Points => &[
                "totalEarnedPoints",
                "availablePoints",
                "referPoints",
                "redeemAmount",
                "updatedAt",
            ],
            FieldGroup::Verification => &[
                "isVerified",
                "verificationDate",
                "verifiedBy",
                "unverifyReason",
                "updatedAt",
            ],
            FieldGroup::Documents => &["documents", "updatedAt"],
        }
    }

    /// 从账户中取出本组字段组成 `$set` 文档
    pub fn set_document(&self, account: &Account) -> AppResult<Document> {
        let full = bson::to_document(account)?;
        let mut set = Document::new();
        for field in self.fields() {
            set.insert(*field, full.get(*field).cloned().unwrap_or(Bson::Null));
        }
        Ok(set)
    }
}

// 主要用于Service中，表示提供了该Trait功能
#[async_trait]
pub trait AccountRepositoryTrait {
    /// 插入新账户，身份字段冲突时返回 DuplicateIdentity
    async fn insert_account(&self, account: &Account) -> AppResult<ObjectId>;

    async fn find_account(&self, id: &ObjectId) -> AppResult<Option<Account>>;

    /// 查找与给定身份键冲突的账户（可排除自身）
    async fn find_identity_conflict(&self, keys: &IdentityKeys, exclude: Option<ObjectId>) -> AppResult<Option<Account>>;

    /// 按推荐码（手机号 / Aadhar / PAN）查找推荐人
    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<Account>>;

    /// 写回某一组字段，账户不存在时返回 NotFound
    async fn update_fields(&self, account: &Account, group: FieldGroup) -> AppResult<()>;

    async fn delete_account(&self, id: &ObjectId) -> AppResult<bool>;

    /// 单文档原子更新：追加被推荐人并把计数设为集合长度
    async fn link_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()>;

    async fn unlink_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()>;

    /// 所有 referredBy 指向 `referrer` 的账户ID
    async fn find_referred_ids(&self, referrer: &ObjectId) -> AppResult<Vec<ObjectId>>;

    async fn replace_referred_users(&self, referrer: &ObjectId, referred: &[ObjectId]) -> AppResult<()>;

    async fn statistics(&self, since: DateTime<Utc>) -> AppResult<StatisticsOverview>;
}

fn duplicate_key_field(err: &mongodb::error::Error) -> Option<&'static str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000 => {
            let message = &write_error.message;
            Some(if message.contains("aadharNumber") {
                "Aadhar number"
            } else if message.contains("panNumber") {
                "PAN number"
            } else {
                "mobile"
            })
        }
        _ => None,
    }
}

/// 聚合结果中的数值可能是 Int32 / Int64 / Double
fn read_u64(document: &Document, key: &str) -> u64 {
    match document.get(key) {
        Some(Bson::Int32(v)) => (*v).max(0) as u64,
        Some(Bson::Int64(v)) => (*v).max(0) as u64,
        Some(Bson::Double(v)) if *v > 0.0 => *v as u64,
        _ => 0,
    }
}

fn not_found(id: &ObjectId) -> AppError {
    AppError::NotFound(format!("Account with id {} not found.", id))
}

#[async_trait]
impl AccountRepositoryTrait for Database {
    async fn insert_account(&self, account: &Account) -> AppResult<ObjectId> {
        match self.accounts.insert_one(account, None).await {
            Ok(_) => Ok(account.id),
            Err(e) => match duplicate_key_field(&e) {
                Some(field) => Err(AppError::DuplicateIdentity { field: field.to_string() }),
                None => Err(e.into()),
            },
        }
    }

    async fn find_account(&self, id: &ObjectId) -> AppResult<Option<Account>> {
        let account = self.accounts.find_one(doc! { "_id": *id }, None).await?;

        Ok(account)
    }

    async fn find_identity_conflict(&self, keys: &IdentityKeys, exclude: Option<ObjectId>) -> AppResult<Option<Account>> {
        let mut clauses = Vec::new();
        if let Some(mobile) = &keys.mobile {
            clauses.push(doc! { "mobile": mobile.as_str() });
        }
        if let Some(aadhar) = &keys.aadhar_number {
            clauses.push(doc! { "aadharNumber": aadhar.as_str() });
        }
        if let Some(pan) = &keys.pan_number {
            clauses.push(doc! { "panNumber": pan.as_str() });
        }
        if clauses.is_empty() {
            return Ok(None);
        }

        let mut filter = doc! { "$or": clauses };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id });
        }

        let existing = self.accounts.find_one(filter, None).await?;

        Ok(existing)
    }

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<Account>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        let filter = doc! {
            "$or": [
                { "mobile": code },
                { "aadharNumber": code },
                { "panNumber": code.to_uppercase() },
            ]
        };
        let referrer = self.accounts.find_one(filter, None).await?;

        Ok(referrer)
    }

    async fn update_fields(&self, account: &Account, group: FieldGroup) -> AppResult<()> {
        let set = group.set_document(account)?;
        let result = self
            .accounts
            .update_one(doc! { "_id": account.id }, doc! { "$set": set }, None)
            .await
            .map_err(|e| match duplicate_key_field(&e) {
                Some(field) => AppError::DuplicateIdentity { field: field.to_string() },
                None => AppError::StorageFailure(e),
            })?;

        if result.matched_count == 0 {
            return Err(not_found(&account.id));
        }
        debug!("📝 account {} updated ({:?})", account.id, group);

        Ok(())
    }

    async fn delete_account(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.accounts.delete_one(doc! { "_id": *id }, None).await?;

        Ok(result.deleted_count > 0)
    }

    async fn link_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()> {
        let pipeline = vec![
            doc! { "$set": { "referredUsers": { "$ifNull": ["$referredUsers", []] } } },
            doc! {
                "$set": {
                    "referredUsers": {
                        "$cond": [
                            { "$in": [*referred, "$referredUsers"] },
                            "$referredUsers",
                            { "$concatArrays": ["$referredUsers", [*referred]] },
                        ]
                    }
                }
            },
            doc! {
                "$set": {
                    "totalReferredUsers": { "$size": "$referredUsers" },
                    "updatedAt": to_sortable_string(&Utc::now()),
                }
            },
        ];

        let result = self.accounts.update_one(doc! { "_id": *referrer }, pipeline, None).await?;
        if result.matched_count == 0 {
            return Err(not_found(referrer));
        }

        Ok(())
    }

    async fn unlink_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()> {
        let pipeline = vec![
            doc! {
                "$set": {
                    "referredUsers": {
                        "$filter": {
                            "input": { "$ifNull": ["$referredUsers", []] },
                            "as": "id",
                            "cond": { "$ne": ["$$id", *referred] },
                        }
                    }
                }
            },
            doc! {
                "$set": {
                    "totalReferredUsers": { "$size": "$referredUsers" },
                    "updatedAt": to_sortable_string(&Utc::now()),
                }
            },
        ];

        let result = self.accounts.update_one(doc! { "_id": *referrer }, pipeline, None).await?;
        if result.matched_count == 0 {
            return Err(not_found(referrer));
        }

        Ok(())
    }

    async fn find_referred_ids(&self, referrer: &ObjectId) -> AppResult<Vec<ObjectId>> {
        let options = FindOptions::builder()
            .projection(doc! { "_id": 1 })
            .sort(doc! { "registrationDate": 1 })
            .build();
        let mut cursor = self
            .accounts
            .clone_with_type::<Document>()
            .find(doc! { "referredBy": *referrer }, options)
            .await?;

        let mut ids = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            if let Ok(id) = document.get_object_id("_id") {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    async fn replace_referred_users(&self, referrer: &ObjectId, referred: &[ObjectId]) -> AppResult<()> {
        let update = doc! {
            "$set": {
                "referredUsers": referred.to_vec(),
                "totalReferredUsers": referred.len() as i64,
                "updatedAt": to_sortable_string(&Utc::now()),
            }
        };

        let result = self.accounts.update_one(doc! { "_id": *referrer }, update, None).await?;
        if result.matched_count == 0 {
            return Err(not_found(referrer));
        }

        Ok(())
    }

    async fn statistics(&self, since: DateTime<Utc>) -> AppResult<StatisticsOverview> {
        // 1. 汇总
        let overview_pipeline = vec![doc! {
            "$group": {
                "_id": Bson::Null,
                "totalUsers": { "$sum": 1 },
                "verifiedUsers": { "$sum": { "$cond": [{ "$eq": ["$isVerified", true] }, 1, 0] } },
                "unverifiedUsers": { "$sum": { "$cond": [{ "$eq": ["$isVerified", false] }, 1, 0] } },
                "activeUsers": { "$sum": { "$cond": [{ "$eq": ["$status", "Active"] }, 1, 0] } },
                "executives": { "$sum": { "$cond": [{ "$eq": ["$userType", "Executive"] }, 1, 0] } },
                "totalPoints": { "$sum": "$totalEarnedPoints" },
                "totalAvailablePoints": { "$sum": "$availablePoints" },
            }
        }];

        let mut cursor = self.accounts.aggregate(overview_pipeline, None).await?;
        let overview = match cursor.try_next().await? {
            Some(document) => AccountStatistics {
                total_users: read_u64(&document, "totalUsers"),
                verified_users: read_u64(&document, "verifiedUsers"),
                unverified_users: read_u64(&document, "unverifiedUsers"),
                active_users: read_u64(&document, "activeUsers"),
                executives: read_u64(&document, "executives"),
                total_points: read_u64(&document, "totalPoints"),
                total_available_points: read_u64(&document, "totalAvailablePoints"),
            },
            None => AccountStatistics::default(),
        };

        // 2. 等级分布
        let tier_pipeline = vec![doc! { "$group": { "_id": "$userType", "count": { "$sum": 1 } } }];
        let mut cursor = self.accounts.aggregate(tier_pipeline, None).await?;
        let mut user_type_distribution = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            if let Some(user_type) = document.get_str("_id").ok().and_then(|t| t.parse::<AccountTier>().ok()) {
                user_type_distribution.push(TierCount {
                    user_type,
                    count: read_u64(&document, "count"),
                });
            }
        }
        user_type_distribution.sort_by_key(|t| t.user_type);

        // 3. 月度注册趋势（registrationDate 为定宽字符串，前7位即 YYYY-MM）
        let trend_pipeline = vec![
            doc! { "$match": { "registrationDate": { "$gte": to_sortable_string(&since) } } },
            doc! {
                "$group": {
                    "_id": { "$substrBytes": ["$registrationDate", 0, 7] },
                    "count": { "$sum": 1 },
                }
            },
            doc! { "$sort": { "_id": 1 } },
        ];
        let mut cursor = self.accounts.aggregate(trend_pipeline, None).await?;
        let mut monthly_trend = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            let Ok(key) = document.get_str("_id") else { continue };
            let mut parts = key.splitn(2, '-');
            let year = parts.next().and_then(|y| y.parse::<i32>().ok());
            let month = parts.next().and_then(|m| m.parse::<u32>().ok());
            if let (Some(year), Some(month)) = (year, month) {
                monthly_trend.push(MonthlyCount {
                    year,
                    month,
                    count: read_u64(&document, "count"),
                });
            }
        }

        info!("📊 statistics computed: {} accounts", overview.total_users);

        Ok(StatisticsOverview {
            overview,
            user_type_distribution,
            monthly_trend,
        })
    }
}
