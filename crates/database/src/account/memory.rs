use super::{
    model::{Account, IdentityKeys},
    repository::{AccountRepositoryTrait, FieldGroup},
    statistics::{StatisticsAccumulator, StatisticsOverview},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use utils::{AppError, AppResult};

/// 进程内账户仓库，语义与 MongoDB 实现保持一致（含唯一索引约束）
#[derive(Debug, Default)]
pub struct MemoryAccountRepository {
    accounts: RwLock<BTreeMap<ObjectId, Account>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

fn not_found(id: &ObjectId) -> AppError {
    AppError::NotFound(format!("Account with id {} not found.", id))
}

fn find_conflict<'a>(
    accounts: &'a BTreeMap<ObjectId, Account>,
    keys: &IdentityKeys,
    exclude: Option<ObjectId>,
) -> Option<&'a Account> {
    accounts
        .values()
        .filter(|a| Some(a.id) != exclude)
        .find(|a| keys.colliding_field(a).is_some())
}

#[async_trait]
impl AccountRepositoryTrait for MemoryAccountRepository {
    async fn insert_account(&self, account: &Account) -> AppResult<ObjectId> {
        let mut accounts = self.accounts.write().await;
        let keys = account.identity();
        if let Some(existing) = find_conflict(&accounts, &keys, None) {
            let field = keys.colliding_field(existing).unwrap_or("mobile");
            return Err(AppError::DuplicateIdentity { field: field.to_string() });
        }

        accounts.insert(account.id, account.clone());

        Ok(account.id)
    }

    async fn find_account(&self, id: &ObjectId) -> AppResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_identity_conflict(&self, keys: &IdentityKeys, exclude: Option<ObjectId>) -> AppResult<Option<Account>> {
        if keys.is_empty() {
            return Ok(None);
        }
        let accounts = self.accounts.read().await;

        Ok(find_conflict(&accounts, keys, exclude).cloned())
    }

    async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<Account>> {
        let accounts = self.accounts.read().await;

        Ok(accounts.values().find(|a| a.matches_referral_code(code)).cloned())
    }

    async fn update_fields(&self, account: &Account, group: FieldGroup) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;

        if group == FieldGroup::Profile {
            let keys = account.identity();
            if let Some(existing) = find_conflict(&accounts, &keys, Some(account.id)) {
                let field = keys.colliding_field(existing).unwrap_or("mobile");
                return Err(AppError::DuplicateIdentity { field: field.to_string() });
            }
        }

        let stored = accounts.get_mut(&account.id).ok_or_else(|| not_found(&account.id))?;

        // 与 `$set` 相同：只覆盖本组字段
        let mut merged = bson::to_document(&*stored)?;
        for (field, value) in group.set_document(account)? {
            merged.insert(field, value);
        }
        *stored = bson::from_document(merged)
            .map_err(|e| AppError::InternalServerErrorWithContext(format!("Failed to merge account fields: {}", e)))?;

        Ok(())
    }

    async fn delete_account(&self, id: &ObjectId) -> AppResult<bool> {
        Ok(self.accounts.write().await.remove(id).is_some())
    }

    async fn link_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(referrer).ok_or_else(|| not_found(referrer))?;
        account.link_referred_user(*referred);
        account.updated_at = Utc::now();

        Ok(())
    }

    async fn unlink_referral(&self, referrer: &ObjectId, referred: &ObjectId) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(referrer).ok_or_else(|| not_found(referrer))?;
        account.unlink_referred_user(referred);
        account.updated_at = Utc::now();

        Ok(())
    }

    async fn find_referred_ids(&self, referrer: &ObjectId) -> AppResult<Vec<ObjectId>> {
        let accounts = self.accounts.read().await;
        let mut referred: Vec<&Account> = accounts.values().filter(|a| a.referred_by.as_ref() == Some(referrer)).collect();
        referred.sort_by_key(|a| a.registration_date);

        Ok(referred.into_iter().map(|a| a.id).collect())
    }

    async fn replace_referred_users(&self, referrer: &ObjectId, referred: &[ObjectId]) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(referrer).ok_or_else(|| not_found(referrer))?;
        account.set_referred_users(referred.to_vec());
        account.updated_at = Utc::now();

        Ok(())
    }

    async fn statistics(&self, since: DateTime<Utc>) -> AppResult<StatisticsOverview> {
        let accounts = self.accounts.read().await;
        let mut accumulator = StatisticsAccumulator::new(since);
        for account in accounts.values() {
            accumulator.push(account);
        }

        Ok(accumulator.finish())
    }
}
