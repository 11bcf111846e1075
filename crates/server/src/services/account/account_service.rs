use super::{document_store::DocumentStore, locks::AccountLocks};
use async_trait::async_trait;
use chrono::Utc;
use database::account::{
    document::AccountDocument,
    model::{Account, AccountUpdate, IdentityKeys, NewAccount, PointBalances, PointKind, PointOperation},
    repository::{DynAccountRepository, FieldGroup},
    statistics::{trend_start, StatisticsOverview},
};
use futures::future::join_all;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{error, info, warn};
use utils::{AppError, AppResult};

pub type DynAccountService = Arc<dyn AccountServiceTrait + Send + Sync>;

#[async_trait]
pub trait AccountServiceTrait {
    /// 创建账户；推荐码命中时尽力建立推荐关系
    async fn create_account(&self, input: NewAccount, actor: ObjectId) -> AppResult<Account>;

    async fn get_account(&self, id: &ObjectId) -> AppResult<Account>;

    async fn update_account(&self, id: &ObjectId, update: AccountUpdate, actor: ObjectId) -> AppResult<Account>;

    /// 删除账户，同时解除推荐关系并删除已存储的文件
    async fn delete_account(&self, id: &ObjectId) -> AppResult<()>;

    async fn adjust_points(
        &self,
        id: &ObjectId,
        operation: PointOperation,
        amount: u64,
        kind: PointKind,
    ) -> AppResult<PointBalances>;

    async fn set_verification(
        &self,
        id: &ObjectId,
        verified: bool,
        reason: Option<String>,
        actor: ObjectId,
    ) -> AppResult<Account>;

    /// 按类型替换挂载的文件，返回最新文件列表
    async fn attach_documents(&self, id: &ObjectId, documents: Vec<AccountDocument>) -> AppResult<Vec<AccountDocument>>;

    async fn detach_document(&self, id: &ObjectId, document_id: &ObjectId) -> AppResult<Vec<AccountDocument>>;

    async fn statistics(&self) -> AppResult<StatisticsOverview>;

    /// 以 referredBy 为准重建推荐人的 referredUsers 索引
    async fn reconcile_referrals(&self, id: &ObjectId) -> AppResult<Account>;
}

#[derive(Clone)]
pub struct AccountService {
    repository: DynAccountRepository,
    documents: DocumentStore,
    locks: AccountLocks,
}

impl AccountService {
    pub fn new(repository: DynAccountRepository, documents: DocumentStore) -> Self {
        Self::with_locks(repository, documents, AccountLocks::new())
    }

    pub fn with_locks(repository: DynAccountRepository, documents: DocumentStore, locks: AccountLocks) -> Self {
        Self {
            repository,
            documents,
            locks,
        }
    }

    async fn load(&self, id: &ObjectId) -> AppResult<Account> {
        self.repository
            .find_account(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account with id {} not found.", id)))
    }

    async fn ensure_unique(&self, keys: &IdentityKeys, exclude: Option<ObjectId>) -> AppResult<()> {
        if let Some(existing) = self.repository.find_identity_conflict(keys, exclude).await? {
            let field = keys.colliding_field(&existing).unwrap_or("mobile");
            return Err(AppError::DuplicateIdentity { field: field.to_string() });
        }
        Ok(())
    }

    /// 推荐人计数更新失败只记日志，新账户保持创建成功
    async fn link_referrer(&self, referrer: &ObjectId, referred: &ObjectId) {
        if let Err(e) = self.repository.link_referral(referrer, referred).await {
            let failure = AppError::ReferralLinkFailure {
                referrer: referrer.to_hex(),
                reason: e.to_string(),
            };
            error!("❌ {} (new account {})", failure, referred);
        }
    }

    async fn remove_files<'a>(&self, filenames: impl IntoIterator<Item = &'a str>) {
        let removals = filenames.into_iter().map(|name| async move { (name, self.documents.remove(name).await) });
        for (name, result) in join_all(removals).await {
            if let Err(e) = result {
                warn!("⚠️ failed to remove document file {}: {}", name, e);
            }
        }
    }
}

#[async_trait]
impl AccountServiceTrait for AccountService {
    async fn create_account(&self, input: NewAccount, actor: ObjectId) -> AppResult<Account> {
        let input = input.normalized();
        self.ensure_unique(&input.identity(), None).await?;

        let referrer = match input.refer_code.as_deref() {
            Some(code) => {
                let referrer = self.repository.find_by_referral_code(code).await?;
                if referrer.is_none() {
                    info!("🔍 referral code {} matched no account, creating without referrer", code);
                }
                referrer.map(|r| r.id)
            }
            None => None,
        };

        let account = Account::new(input, actor, referrer);
        self.repository.insert_account(&account).await?;
        info!("✅ account {} created by {}", account.id, actor);

        if let Some(referrer) = referrer {
            self.link_referrer(&referrer, &account.id).await;
        }

        Ok(account)
    }

    async fn get_account(&self, id: &ObjectId) -> AppResult<Account> {
        self.load(id).await
    }

    async fn update_account(&self, id: &ObjectId, update: AccountUpdate, actor: ObjectId) -> AppResult<Account> {
        let update = update.normalized();
        let _guard = self.locks.acquire(*id).await;

        let mut account = self.load(id).await?;
        self.ensure_unique(&update.identity(), Some(*id)).await?;

        account.apply_update(update, actor);
        self.repository.update_fields(&account, FieldGroup::Profile).await?;
        info!("📝 account {} updated by {}", id, actor);

        Ok(account)
    }

    async fn delete_account(&self, id: &ObjectId) -> AppResult<()> {
        let _guard = self.locks.acquire(*id).await;

        let account = self.load(id).await?;
        if !self.repository.delete_account(id).await? {
            return Err(AppError::NotFound(format!("Account with id {} not found.", id)));
        }

        if let Some(referrer) = account.referred_by {
            if let Err(e) = self.repository.unlink_referral(&referrer, id).await {
                warn!("⚠️ failed to unlink {} from referrer {}: {}", id, referrer, e);
            }
        }

        self.remove_files(account.documents.iter().map(|d| d.filename.as_str())).await;

        info!("🗑️ account {} deleted", id);

        Ok(())
    }

    async fn adjust_points(
        &self,
        id: &ObjectId,
        operation: PointOperation,
        amount: u64,
        kind: PointKind,
    ) -> AppResult<PointBalances> {
        let _guard = self.locks.acquire(*id).await;

        let mut account = self.load(id).await?;
        let balances = account.adjust_points(operation, amount, kind)?;
        self.repository.update_fields(&account, FieldGroup::Points).await?;

        info!(
            "💰 points {:?} {} ({:?}) on {}: available {}",
            operation, amount, kind, id, balances.available_points
        );

        Ok(balances)
    }

    async fn set_verification(
        &self,
        id: &ObjectId,
        verified: bool,
        reason: Option<String>,
        actor: ObjectId,
    ) -> AppResult<Account> {
        let _guard = self.locks.acquire(*id).await;

        let mut account = self.load(id).await?;
        if verified {
            account.verify(actor);
        } else {
            account.unverify(reason.as_deref(), actor);
        }
        self.repository.update_fields(&account, FieldGroup::Verification).await?;
        info!("🛂 account {} verification set to {} by {}", id, verified, actor);

        Ok(account)
    }

    async fn attach_documents(&self, id: &ObjectId, documents: Vec<AccountDocument>) -> AppResult<Vec<AccountDocument>> {
        if documents.is_empty() {
            return Err(AppError::BadRequest("No documents provided".to_string()));
        }
        for document in &documents {
            self.documents.validate(document)?;
        }

        let _guard = self.locks.acquire(*id).await;
        let mut account = self.load(id).await?;

        let mut replaced = Vec::new();
        for document in documents {
            if let Some(previous) = account.attach_document(document) {
                replaced.push(previous);
            }
        }
        self.repository.update_fields(&account, FieldGroup::Documents).await?;

        // 同一请求内重复类型时，被替换的也可能是本次刚挂载的文件
        let superseded: Vec<&str> = replaced
            .iter()
            .map(|d| d.filename.as_str())
            .filter(|name| account.documents.iter().all(|d| d.filename != *name))
            .collect();
        self.remove_files(superseded).await;

        info!("📎 {} document(s) on account {}", account.documents.len(), id);

        Ok(account.documents.to_vec())
    }

    async fn detach_document(&self, id: &ObjectId, document_id: &ObjectId) -> AppResult<Vec<AccountDocument>> {
        let _guard = self.locks.acquire(*id).await;

        let mut account = self.load(id).await?;
        let removed = account
            .detach_document(document_id)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found on account {}.", document_id, id)))?;
        self.repository.update_fields(&account, FieldGroup::Documents).await?;

        self.remove_files([removed.filename.as_str()]).await;

        Ok(account.documents.to_vec())
    }

    async fn statistics(&self) -> AppResult<StatisticsOverview> {
        self.repository.statistics(trend_start(Utc::now())).await
    }

    async fn reconcile_referrals(&self, id: &ObjectId) -> AppResult<Account> {
        let _guard = self.locks.acquire(*id).await;

        let account = self.load(id).await?;
        let referred = self.repository.find_referred_ids(id).await?;
        if referred != account.referred_users {
            warn!(
                "🔧 referral index of {} drifted: {} stored, {} actual",
                id,
                account.referred_users.len(),
                referred.len()
            );
        }
        self.repository.replace_referred_users(id, &referred).await?;

        self.load(id).await
    }
}
