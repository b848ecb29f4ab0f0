//! Mock 串口（无硬件依赖）
//!
//! - 读：按脚本顺序返回预置字节；脚本耗尽后，如设置了重复块则无限循环发送，
//!   否则返回不足的字节数（等价于端口超时）
//! - 写：记录每一次写入，供测试断言
//!
//! 所有克隆共享同一份状态，因此 `split()` 之后仍可通过原句柄查看写入记录。

use crate::{RxPort, SerialAdapter, SerialError, SplittablePort, TxPort};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    rx: VecDeque<u8>,
    repeat: Option<Vec<u8>>,
    written: Vec<Vec<u8>>,
    read_delay: Duration,
    fail_writes: bool,
}

/// 脚本化的 Mock 串口
#[derive(Clone, Default)]
pub struct MockPort {
    shared: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一段待读取的字节
    pub fn push_bytes(&self, bytes: impl AsRef<[u8]>) {
        self.shared.lock().rx.extend(bytes.as_ref());
    }

    /// 脚本耗尽后无限重复发送 `chunk`
    pub fn repeat(&self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        self.shared.lock().repeat = (!chunk.is_empty()).then_some(chunk);
    }

    /// 停止重复发送（之后的读取会在脚本耗尽时超时）
    pub fn stop_repeat(&self) {
        self.shared.lock().repeat = None;
    }

    /// 每次读取前的延迟（模拟波特率）
    pub fn set_read_delay(&self, delay: Duration) {
        self.shared.lock().read_delay = delay;
    }

    /// 让后续写入返回错误
    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.lock().fail_writes = fail;
    }

    /// 已写入的全部数据（按写入顺序）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.lock().written.clone()
    }

    fn read_impl(&self, buf: &mut [u8]) -> usize {
        let delay = self.shared.lock().read_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.shared.lock();
        let mut filled = 0;
        while filled < buf.len() {
            if state.rx.is_empty() {
                match state.repeat.clone() {
                    Some(chunk) => state.rx.extend(chunk),
                    None => break,
                }
            }
            let n = state.rx.len().min(buf.len() - filled);
            for (slot, byte) in buf[filled..filled + n].iter_mut().zip(state.rx.drain(..n)) {
                *slot = byte;
            }
            filled += n;
        }
        filled
    }

    fn write_impl(&self, data: &[u8]) -> Result<(), SerialError> {
        let mut state = self.shared.lock();
        if state.fail_writes {
            return Err(SerialError::Closed);
        }
        state.written.push(data.to_vec());
        Ok(())
    }
}

impl SerialAdapter for MockPort {
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        Ok(self.read_impl(buf))
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.write_impl(data)
    }
}

impl RxPort for MockPort {
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        Ok(self.read_impl(buf))
    }
}

impl TxPort for MockPort {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.write_impl(data)
    }
}

impl SplittablePort for MockPort {
    type Rx = MockPort;
    type Tx = MockPort;

    fn split(self) -> Result<(MockPort, MockPort), SerialError> {
        Ok((self.clone(), self))
    }
}
