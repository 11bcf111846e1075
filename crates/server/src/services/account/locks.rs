use dashmap::DashMap;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = Arc<DashMap<ObjectId, Arc<Mutex<()>>>>;

/// 按账户ID串行化所有写操作（积分 / 认证 / 文件 / 资料 / 删除）
///
/// 表项只在有持有者或等待者时存在，最后一个守卫释放时移除
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: LockTable,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: ObjectId) -> AccountLockGuard {
        // 先克隆出Arc再等待，避免持有分片锁跨越 await
        let lock = self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).value().clone();
        let guard = lock.lock_owned().await;

        AccountLockGuard {
            id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// 账户写锁守卫
#[derive(Debug)]
pub struct AccountLockGuard {
    id: ObjectId,
    locks: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountLockGuard {
    fn drop(&mut self) {
        // 内层守卫也持有一份Arc，必须先释放再判断引用计数
        drop(self.guard.take());
        // 判断与移除在同一分片写锁内完成，新的 acquire 只能在此之前或之后克隆
        self.locks.remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
