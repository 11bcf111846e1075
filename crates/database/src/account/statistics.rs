use super::model::{Account, AccountStatus, AccountTier};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// 注册趋势统计窗口（天）
pub const TREND_WINDOW_DAYS: i64 = 180;

/// 账户汇总统计，每次请求实时计算
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatistics {
    pub total_users: u64,
    pub verified_users: u64,
    pub unverified_users: u64,
    pub active_users: u64,
    pub executives: u64,
    /// totalEarnedPoints 之和
    pub total_points: u64,
    /// availablePoints 之和
    pub total_available_points: u64,
}

impl AccountStatistics {
    pub fn push(&mut self, account: &Account) {
        self.total_users += 1;
        if account.is_verified {
            self.verified_users += 1;
        } else {
            self.unverified_users += 1;
        }
        if account.status == AccountStatus::Active {
            self.active_users += 1;
        }
        if account.user_type == AccountTier::Executive {
            self.executives += 1;
        }
        self.total_points = self.total_points.saturating_add(account.total_earned_points);
        self.total_available_points = self.total_available_points.saturating_add(account.available_points);
    }

    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut stats = Self::default();
        for account in accounts {
            stats.push(account);
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TierCount {
    pub user_type: AccountTier,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsOverview {
    pub overview: AccountStatistics,
    pub user_type_distribution: Vec<TierCount>,
    pub monthly_trend: Vec<MonthlyCount>,
}

pub fn trend_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(TREND_WINDOW_DAYS)
}

/// 单次遍历完成全部统计
#[derive(Debug, Clone)]
pub struct StatisticsAccumulator {
    overview: AccountStatistics,
    tiers: BTreeMap<AccountTier, u64>,
    months: BTreeMap<(i32, u32), u64>,
    since: DateTime<Utc>,
}

impl StatisticsAccumulator {
    pub fn new(since: DateTime<Utc>) -> Self {
        Self {
            overview: AccountStatistics::default(),
            tiers: BTreeMap::new(),
            months: BTreeMap::new(),
            since,
        }
    }

    pub fn push(&mut self, account: &Account) {
        self.overview.push(account);
        *self.tiers.entry(account.user_type).or_default() += 1;
        if account.registration_date >= self.since {
            let key = (account.registration_date.year(), account.registration_date.month());
            *self.months.entry(key).or_default() += 1;
        }
    }

    pub fn finish(self) -> StatisticsOverview {
        StatisticsOverview {
            overview: self.overview,
            user_type_distribution: self
                .tiers
                .into_iter()
                .map(|(user_type, count)| TierCount { user_type, count })
                .collect(),
            monthly_trend: self
                .months
                .into_iter()
                .map(|((year, month), count)| MonthlyCount { year, month, count })
                .collect(),
        }
    }
}
