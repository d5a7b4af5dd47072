// ==========================================
// 发票导入系统 - 写后可见性轮询
// ==========================================
// 职责: 有界指数退避轮询，直到刚写入的数据可读
// 约束: 最多 max_attempts 次探测；间隔从 initial_delay 起翻倍，上限 max_delay
// ==========================================

use crate::config::{defaults, ConfigResult, IntakeConfigReader};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPoller {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for VisibilityPoller {
    fn default() -> Self {
        Self::new(
            defaults::REFRESH_MAX_ATTEMPTS,
            Duration::from_millis(defaults::REFRESH_INITIAL_DELAY_MS),
            Duration::from_millis(defaults::REFRESH_MAX_DELAY_MS),
        )
    }
}

impl VisibilityPoller {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// 从配置读取轮询参数
    pub async fn from_config(config: &dyn IntakeConfigReader) -> ConfigResult<Self> {
        Ok(Self::new(
            config.get_refresh_max_attempts().await?,
            Duration::from_millis(config.get_refresh_initial_delay_ms().await?),
            Duration::from_millis(config.get_refresh_max_delay_ms().await?),
        ))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 attempt 次失败后的等待时间（attempt 从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// 轮询直到探测返回 true
    ///
    /// # 返回
    /// - true: 数据已可见
    /// - false: 达到最大次数仍不可见
    pub async fn wait_until<F, Fut>(&self, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 0..self.max_attempts {
            if check().await {
                debug!(attempt = attempt + 1, "写入已可见");
                return true;
            }
            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.delay_for(attempt)).await;
            }
        }

        warn!(max_attempts = self.max_attempts, "轮询结束，写入仍不可见");
        false
    }
}
