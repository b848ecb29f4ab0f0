//! 接收循环
//!
//! 后台线程：同步 → 解码 → 校验 → 写入共享状态。

use crate::heartbeat::ConnectionMonitor;
use crate::metrics::LinkMetrics;
use crate::state::{ClearOnDrop, LinkFlags, Telemetry};
use crate::sync::FrameSynchronizer;
use raspyke_protocol::{ProtocolError, REPORT_ENCODED_LEN, decode_report};
use raspyke_serial::{RxPort, SerialError};
use std::sync::atomic::Ordering;
use tracing::{error, info, trace};

/// 接收线程配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 每帧编码后的字节数
    pub frame_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_capacity: REPORT_ENCODED_LEN,
        }
    }
}

/// 接收线程共享的状态
pub struct RxShared<'a> {
    pub telemetry: &'a Telemetry,
    pub flags: &'a LinkFlags,
    pub metrics: &'a LinkMetrics,
    pub monitor: &'a ConnectionMonitor,
}

#[cfg(feature = "realtime")]
fn raise_priority() {
    use thread_priority::{ThreadPriority, set_current_thread_priority};

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => info!("RX thread priority set to MAX (realtime)"),
        Err(e) => tracing::warn!(
            "Failed to set RX thread priority: {:?}. \
            On Linux, run with CAP_SYS_NICE or use rtkit.",
            e
        ),
    }
}

/// 接收循环
///
/// `running` 为真时持续读取。同步失败、解码失败、校验失败只丢弃当前帧；
/// 读超时或 IO 错误视为链路断开，循环结束并返回该错误。
/// 如果出错时 `running` 已被其他线程清除，按正常退出处理。
///
/// 任何退出路径都会清除 `running` 和 `ready`。
pub fn rx_loop(
    mut rx: impl RxPort,
    shared: RxShared<'_>,
    config: &PipelineConfig,
) -> Result<(), SerialError> {
    let RxShared {
        telemetry,
        flags,
        metrics,
        monitor,
    } = shared;
    let _clear = ClearOnDrop(flags);

    #[cfg(feature = "realtime")]
    raise_priority();

    let mut sync = FrameSynchronizer::new(config.frame_capacity);

    while flags.is_running() {
        metrics.rx_reads.fetch_add(1, Ordering::Relaxed);

        let frame = match sync.next_frame(&mut rx) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                metrics.rx_sync_misses.fetch_add(1, Ordering::Relaxed);
                trace!("RX: no frame marker in read, discarded");
                continue;
            },
            Err(e) => {
                if !flags.is_running() {
                    trace!("RX: {} after stop request, exiting", e);
                    return Ok(());
                }
                error!("RX: serial link lost: {}", e);
                return Err(e);
            },
        };

        match decode_report(frame) {
            Ok(report) => {
                telemetry.apply(&report);
                if !flags.is_ready() {
                    info!("RX: first valid frame received (hub time {} ms)", report.time_ms);
                }
                flags.set_ready();
                monitor.register_feedback();
                metrics.rx_frames_applied.fetch_add(1, Ordering::Relaxed);
            },
            Err(e @ ProtocolError::ParityMismatch { .. }) => {
                metrics.rx_parity_errors.fetch_add(1, Ordering::Relaxed);
                trace!("RX: frame dropped: {}", e);
            },
            Err(e) => {
                metrics.rx_decode_errors.fetch_add(1, Ordering::Relaxed);
                trace!("RX: frame dropped: {}", e);
            },
        }
    }

    trace!("RX: running flag cleared, exiting");
    Ok(())
}
