//! 本体服务调用限流
//!
//! 同时限制每秒与每分钟的调用次数，可在多个任务间共享。

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct WindowState {
    last_call: Option<Instant>,
    calls: VecDeque<Instant>,
}

impl WindowState {
    /// 在 `now` 时刻发起调用前需要等待的时长
    fn required_wait(&mut self, now: Instant, min_interval: Duration, per_minute: usize) -> Duration {
        while let Some(front) = self.calls.front() {
            if now.duration_since(*front) >= WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        let mut wait = Duration::ZERO;
        if per_minute > 0 && self.calls.len() >= per_minute {
            if let Some(oldest) = self.calls.front() {
                wait = WINDOW.saturating_sub(now.duration_since(*oldest));
            }
        }
        if let Some(last) = self.last_call {
            let since_last = now.duration_since(last);
            wait = wait.max(min_interval.saturating_sub(since_last));
        }
        wait
    }

    fn record(&mut self, at: Instant) {
        self.last_call = Some(at);
        self.calls.push_back(at);
    }
}

/// 滑动窗口限流器
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    per_minute: usize,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// 创建限流器；BioPortal免费额度为每秒1次、每分钟60次
    pub fn new(calls_per_second: f64, calls_per_minute: usize) -> Self {
        let min_interval = if calls_per_second > 0.0 && calls_per_second.is_finite() {
            Duration::from_secs_f64(1.0 / calls_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            per_minute: calls_per_minute,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// 等待直到允许下一次调用，返回实际等待时长
    pub async fn acquire(&self) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let wait = state.required_wait(now, self.min_interval, self.per_minute);
        if wait > Duration::from_secs(1) {
            info!("Rate limit reached. Waiting {:.2} seconds...", wait.as_secs_f64());
        } else if !wait.is_zero() {
            debug!("Rate limiting: waiting {:.3} seconds", wait.as_secs_f64());
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        state.record(Instant::now());
        wait
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(1.0, 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_minute_window_blocks_after_limit() {
        let mut state = WindowState::default();
        let start = Instant::now();
        for i in 0..3 {
            state.record(start + Duration::from_millis(i * 10));
        }
        let wait = state.required_wait(start + Duration::from_millis(30), Duration::ZERO, 3);
        assert!(wait >= Duration::from_secs(59));

        let wait = state.required_wait(start + Duration::from_secs(61), Duration::ZERO, 3);
        assert_eq!(wait, Duration::ZERO);
        assert!(state.calls.is_empty());
    }

    #[test]
    fn test_per_second_interval() {
        let mut state = WindowState::default();
        let start = Instant::now();
        state.record(start);
        let wait = state.required_wait(start + Duration::from_millis(200), Duration::from_secs(1), 60);
        assert_eq!(wait, Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_acquire_spaces_calls() {
        let limiter = RateLimiter::new(50.0, 1000);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let limiter = Arc::new(RateLimiter::new(100.0, 1000));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(limiter.state.lock().await.calls.len(), 4);
    }
}
