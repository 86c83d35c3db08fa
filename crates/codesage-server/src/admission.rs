//! 访客每日配额
//!
//! 自带 key 的调用方不受限制；其余请求共用一个按 UTC 日期重置的计数器。

use chrono::{NaiveDate, Utc};
use codesage_core::AdmissionConfig;
use tokio::sync::Mutex;

/// 调用方自带 API key 的请求头
pub const USER_API_KEY_HEADER: &str = "x-user-api-key";

/// 准入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// 使用调用方的 key, 不计数
    OwnKey(String),
    /// 使用服务端 key, 已计入当日配额
    Guest,
}

#[derive(Debug)]
struct DailyCount {
    day: NaiveDate,
    count: u64,
}

pub struct DailyUsageLimiter {
    limit: u64,
    enabled: bool,
    state: Mutex<DailyCount>,
}

impl DailyUsageLimiter {
    pub fn new(limit: u64, enabled: bool) -> Self {
        Self {
            limit,
            enabled,
            state: Mutex::new(DailyCount {
                day: Utc::now().date_naive(),
                count: 0,
            }),
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new(config.daily_guest_limit, config.guest_enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 决定是否放行; `user_key` 为请求头中的 key
    pub async fn admit(&self, user_key: Option<&str>) -> Option<Admission> {
        match user_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(Admission::OwnKey(key.to_string())),
            None => self.try_acquire().await.then_some(Admission::Guest),
        }
    }

    pub async fn try_acquire(&self) -> bool {
        self.try_acquire_at(Utc::now().date_naive()).await
    }

    /// 在给定日期消耗一次访客配额
    pub async fn try_acquire_at(&self, today: NaiveDate) -> bool {
        if !self.enabled {
            return false;
        }

        let mut state = self.state.lock().await;
        if state.day != today {
            state.day = today;
            state.count = 0;
        }

        if state.count >= self.limit {
            tracing::warn!("Guest quota exhausted for {} ({} requests)", today, state.count);
            return false;
        }

        state.count += 1;
        tracing::debug!("Guest request {}/{} for {}", state.count, self.limit, today);
        true
    }

    /// 当日已使用次数
    pub async fn used(&self) -> u64 {
        let state = self.state.lock().await;
        if state.day == Utc::now().date_naive() {
            state.count
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_past_limit() {
        let limiter = DailyUsageLimiter::new(2, true);
        assert!(limiter.try_acquire_at(day(1)).await);
        assert!(limiter.try_acquire_at(day(1)).await);
        assert!(!limiter.try_acquire_at(day(1)).await);
    }

    #[tokio::test]
    async fn test_resets_on_new_utc_day() {
        let limiter = DailyUsageLimiter::new(1, true);
        assert!(limiter.try_acquire_at(day(1)).await);
        assert!(!limiter.try_acquire_at(day(1)).await);
        assert!(limiter.try_acquire_at(day(2)).await);
    }

    #[tokio::test]
    async fn test_disabled_guest_tier() {
        let limiter = DailyUsageLimiter::new(450, false);
        assert!(!limiter.try_acquire().await);
        assert_eq!(limiter.admit(None).await, None);
    }

    #[tokio::test]
    async fn test_own_key_bypasses_quota() {
        let limiter = DailyUsageLimiter::new(0, true);
        assert_eq!(
            limiter.admit(Some(" user-key ")).await,
            Some(Admission::OwnKey("user-key".to_string()))
        );
        assert_eq!(limiter.admit(Some("")).await, None);
        assert_eq!(limiter.used().await, 0);
    }

    #[tokio::test]
    async fn test_guest_admission_counts() {
        let limiter = DailyUsageLimiter::from_config(&AdmissionConfig::default());
        assert_eq!(limiter.admit(None).await, Some(Admission::Guest));
        assert_eq!(limiter.used().await, 1);
    }
}
