//! 定周期调度
//!
//! 以固定间隔调用用户回调，周期边界与墙钟对齐：
//! `slot = floor(now_ms / interval) * interval`。
//!
//! - 同一个 slot 内最多调用一次
//! - 收到第一帧有效观测之前不调用，也不推进 slot
//! - 第一次调用发生在 ready 之后立即执行，可能落在某个 slot 的中间；之后的调用都在边界上
//! - 回调在当前线程同步执行；执行时间超过一个周期时，被跳过的 slot 不补调

use crate::error::DriverError;
use crate::state::{ClearOnDrop, LinkFlags};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// 墙钟抽象
pub trait Clock {
    /// 自 UNIX 纪元以来的时间
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// 系统时钟
///
/// 睡眠使用 `spin_sleep`，周期边界的唤醒误差在微秒级。
#[derive(Default)]
pub struct SystemClock {
    sleeper: spin_sleep::SpinSleeper,
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        // 系统时间早于纪元时按 0 处理
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }
}

/// 调度配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// 调用间隔（毫秒精度）
    pub interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}

impl DispatchConfig {
    pub(crate) fn interval_ms(&self) -> Result<u64, DriverError> {
        let ms = self.interval.as_millis();
        if ms == 0 {
            return Err(DriverError::Config(format!(
                "dispatch interval must be at least 1 ms, got {:?}",
                self.interval
            )));
        }
        u64::try_from(ms).map_err(|_| {
            DriverError::Config(format!("dispatch interval too large: {:?}", self.interval))
        })
    }
}

/// 回调返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// 调度结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// 回调返回了 [`Flow::Stop`]
    Stopped,
    /// `running` 被外部清除（中断请求或链路断开）
    Shutdown,
}

/// 周期回调
///
/// 闭包 `FnMut() -> Result<Flow, E>` 自动实现该 trait。
pub trait Handler {
    type Error;

    fn on_tick(&mut self) -> Result<Flow, Self::Error>;
}

impl<F, E> Handler for F
where
    F: FnMut() -> Result<Flow, E>,
{
    type Error = E;

    fn on_tick(&mut self) -> Result<Flow, E> {
        self()
    }
}

/// 定周期调度器
pub struct CadenceDispatcher<C: Clock = SystemClock> {
    clock: C,
    interval_ms: u64,
}

impl CadenceDispatcher<SystemClock> {
    pub fn new(config: &DispatchConfig) -> Result<Self, DriverError> {
        Self::with_clock(config, SystemClock::default())
    }
}

impl<C: Clock> CadenceDispatcher<C> {
    pub fn with_clock(config: &DispatchConfig, clock: C) -> Result<Self, DriverError> {
        Ok(Self {
            clock,
            interval_ms: config.interval_ms()?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 运行调度循环，直到回调停止、`running` 被清除或回调出错
    ///
    /// 返回时 `running` 和 `ready` 均已清除。
    ///
    /// 进入时若已经 ready，第一次回调立即执行而不等待下一个边界，
    /// 例如间隔 40 ms、当前 7 ms 时调用时刻为 7, 40, 80, ...
    pub fn run<H: Handler + ?Sized>(
        &self,
        flags: &LinkFlags,
        handler: &mut H,
    ) -> Result<DispatchExit, H::Error> {
        let _clear = ClearOnDrop(flags);
        let interval = self.interval_ms;
        let mut previous_slot: Option<u64> = None;

        debug!("Dispatcher started (interval {} ms)", interval);

        loop {
            if !flags.is_running() {
                debug!("Dispatcher: running flag cleared, shutting down");
                return Ok(DispatchExit::Shutdown);
            }

            let now = self.clock.now();
            let now_ms = now.as_millis() as u64;
            let current_slot = now_ms / interval * interval;

            if previous_slot == Some(current_slot) || !flags.is_ready() {
                let next_boundary = Duration::from_millis(current_slot + interval);
                self.clock.sleep(next_boundary.saturating_sub(now));
                continue;
            }

            if let Some(previous) = previous_slot
                && current_slot > previous + interval
            {
                warn!(
                    "Handler overran its slot: {} slot(s) skipped",
                    (current_slot - previous) / interval - 1
                );
            }

            previous_slot = Some(current_slot);
            if handler.on_tick()? == Flow::Stop {
                debug!("Dispatcher: handler requested stop");
                return Ok(DispatchExit::Stopped);
            }
        }
    }
}
