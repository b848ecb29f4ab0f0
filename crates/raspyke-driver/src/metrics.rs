//! 链路指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 串口链路实时指标
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 同步器发起的读取次数（每次尝试同步一帧）
    pub rx_reads: AtomicU64,
    /// 未找到帧头、整段丢弃的次数
    pub rx_sync_misses: AtomicU64,
    /// Base64 解码或长度错误
    pub rx_decode_errors: AtomicU64,
    /// 校验失败
    pub rx_parity_errors: AtomicU64,
    /// 成功写入共享状态的帧数
    pub rx_frames_applied: AtomicU64,
    /// 已发送的命令数
    pub tx_commands: AtomicU64,
    /// 命令写入失败次数
    pub tx_errors: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取全部计数器
    ///
    /// 不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_reads: self.rx_reads.load(Ordering::Relaxed),
            rx_sync_misses: self.rx_sync_misses.load(Ordering::Relaxed),
            rx_decode_errors: self.rx_decode_errors.load(Ordering::Relaxed),
            rx_parity_errors: self.rx_parity_errors.load(Ordering::Relaxed),
            rx_frames_applied: self.rx_frames_applied.load(Ordering::Relaxed),
            tx_commands: self.tx_commands.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.rx_reads.store(0, Ordering::Relaxed);
        self.rx_sync_misses.store(0, Ordering::Relaxed);
        self.rx_decode_errors.store(0, Ordering::Relaxed);
        self.rx_parity_errors.store(0, Ordering::Relaxed);
        self.rx_frames_applied.store(0, Ordering::Relaxed);
        self.tx_commands.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_reads: u64,
    pub rx_sync_misses: u64,
    pub rx_decode_errors: u64,
    pub rx_parity_errors: u64,
    pub rx_frames_applied: u64,
    pub tx_commands: u64,
    pub tx_errors: u64,
}

impl MetricsSnapshot {
    /// 被丢弃的帧总数（同步失败、解码失败、校验失败）
    pub fn rx_dropped(&self) -> u64 {
        self.rx_sync_misses + self.rx_decode_errors + self.rx_parity_errors
    }

    /// 有效帧占比（百分比），没有读取时返回 0.0
    pub fn valid_frame_rate(&self) -> f64 {
        if self.rx_reads == 0 {
            return 0.0;
        }
        (self.rx_frames_applied as f64 / self.rx_reads as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = LinkMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.valid_frame_rate(), 0.0);
    }

    #[test]
    fn test_metrics_rates() {
        let metrics = LinkMetrics::new();
        metrics.rx_reads.fetch_add(10, Ordering::Relaxed);
        metrics.rx_frames_applied.fetch_add(7, Ordering::Relaxed);
        metrics.rx_sync_misses.fetch_add(1, Ordering::Relaxed);
        metrics.rx_parity_errors.fetch_add(2, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_dropped(), 3);
        assert!((snapshot.valid_frame_rate() - 70.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_updates() {
        let metrics = Arc::new(LinkMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.tx_commands.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tx_commands, 4000);
    }
}
