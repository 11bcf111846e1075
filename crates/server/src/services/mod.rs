////////////////////////////////////////////////////////////////////////
//
// 1. 每个Domain单独一个文件夹
// 2. Service 只依赖 database 中的 Repository Trait，
//    MongoDB 与内存实现可以互换
//
//////////////////////////////////////////////////////////////////////

pub mod account;

use account::{AccountService, DocumentStore, DynAccountService};
use database::{account::repository::DynAccountRepository, Database};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use utils::AppConfig;

#[derive(Clone)]
pub struct Services {
    pub account: DynAccountService,
    /// 对外只读提供的KYC文件目录
    pub upload_dir: PathBuf,
}

impl Services {
    pub fn new(db: Database, config: Arc<AppConfig>) -> Self {
        let repository = Arc::new(db) as DynAccountRepository;

        Self::from_parts(repository, DocumentStore::new(config.upload_dir.clone()))
    }

    /// 由任意仓库实现组装（测试中使用内存仓库）
    pub fn from_parts(repository: DynAccountRepository, documents: DocumentStore) -> Self {
        let upload_dir = documents.root().to_path_buf();
        let account = Arc::new(AccountService::new(repository, documents)) as DynAccountService;

        info!("🧠 Services initialized (uploads: {})", upload_dir.display());

        Self { account, upload_dir }
    }
}
