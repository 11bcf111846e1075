////////////////////////////////////////////////////////////////////////
//
// 1. 每个Domain(Entity)单独一个文件夹
// 2. 每个Domain由以下部分组成:
//    - model: 定义Schema以及纯内存的业务变更
//    - repository: 实际的数据库底层操作
//
//////////////////////////////////////////////////////////////////////

use mongodb::{bson::doc, options::IndexOptions, Client, Collection, IndexModel};
use std::sync::Arc;
use tracing::{error, info};
use utils::{AppConfig, AppResult};

pub mod account;
pub mod serde_helpers;

pub use account::{
    document::{AccountDocument, DocumentSet, DocumentType},
    memory::MemoryAccountRepository,
    model::{
        Account, AccountStatus, AccountTier, AccountUpdate, IdentityKeys, NewAccount, PointBalances, PointKind,
        PointOperation, RelationshipStatus,
    },
    repository::{AccountRepositoryTrait, DynAccountRepository, FieldGroup},
    statistics::{AccountStatistics, MonthlyCount, StatisticsOverview, TierCount},
};

#[derive(Clone, Debug)]
pub struct Database {
    pub accounts: Collection<Account>,
}

impl Database {
    pub async fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let db: mongodb::Database = client.database(&config.mongo_db);

        let accounts = db.collection("UserExecutive");

        info!("🧱 database({:#}) connected.", &config.mongo_db);

        Ok(Database { accounts })
    }

    /// 初始化账户集合索引（手机号 / Aadhar / PAN 唯一）
    pub async fn init_indexes(&self) -> AppResult<()> {
        let unique = |name: &str| IndexOptions::builder().unique(true).name(name.to_string()).build();
        let named = |name: &str| IndexOptions::builder().name(name.to_string()).build();

        let indexes = vec![
            IndexModel::builder().keys(doc! { "mobile": 1 }).options(unique("mobile_unique")).build(),
            IndexModel::builder()
                .keys(doc! { "aadharNumber": 1 })
                .options(unique("aadharNumber_unique"))
                .build(),
            IndexModel::builder().keys(doc! { "panNumber": 1 }).options(unique("panNumber_unique")).build(),
            IndexModel::builder().keys(doc! { "userType": 1 }).options(named("userType")).build(),
            IndexModel::builder().keys(doc! { "isVerified": 1 }).options(named("isVerified")).build(),
            IndexModel::builder().keys(doc! { "status": 1 }).options(named("status")).build(),
            IndexModel::builder().keys(doc! { "referredBy": 1 }).options(named("referredBy")).build(),
            IndexModel::builder()
                .keys(doc! { "registrationDate": -1 })
                .options(named("registrationDate_desc"))
                .build(),
        ];

        match self.accounts.create_indexes(indexes, None).await {
            Ok(results) => {
                info!("✅ 账户索引创建成功: {:?}", results.index_names);
                Ok(())
            }
            Err(e) => {
                error!("❌ 账户索引创建失败: {}", e);
                Err(e.into())
            }
        }
    }
}
