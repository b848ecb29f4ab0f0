//! 连接监视器
//!
//! 记录最近一次收到有效观测帧的时间，用于判断 Hub 是否仍在发送。
//! 时间基准是进程内单调时钟，不受系统时间调整影响。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 反馈新鲜度监视器
pub struct ConnectionMonitor {
    last_feedback: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// `timeout`: 超过该时长没有反馈即视为不在接收
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_feedback: AtomicU64::new(monotonic_micros()),
            timeout,
        }
    }

    /// 最近 `timeout` 内是否收到过反馈
    pub fn check_connection(&self) -> bool {
        self.time_since_last_feedback() < self.timeout
    }

    /// 接收线程每应用一帧调用一次
    pub fn register_feedback(&self) {
        self.last_feedback.store(monotonic_micros(), Ordering::Relaxed);
    }

    pub fn time_since_last_feedback(&self) -> Duration {
        let last_us = self.last_feedback.load(Ordering::Relaxed);
        Duration::from_micros(monotonic_micros().saturating_sub(last_us))
    }
}
