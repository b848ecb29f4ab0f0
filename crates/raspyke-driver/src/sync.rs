//! 帧同步器
//!
//! 从串口字节流中切出一帧完整的 Base64 文本：
//!
//! 1. 读取 `capacity` 字节；读不满即超时（致命）
//! 2. 查找帧头 `"f3"`；找不到则整段丢弃（非致命，下次重试）。
//!    最后一个字节是 `'f'` 时视为帧头被读取边界截断，从该字节开始补读，
//!    补读后不以帧头开始的同样丢弃
//! 3. 从帧头开始只保留 Base64 字母表中的字节
//! 4. 不足 `capacity` 时按缺少的字节数继续读取，直到填满
//!
//! 不在两次调用之间保留数据。

use raspyke_protocol::REPORT_MARKER;
use raspyke_serial::{RxPort, SerialError};

/// 是否属于 Base64 字母表（含填充符 `=`）
pub fn is_base64_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'/' | b'=')
}

/// 帧同步器（复用内部缓冲区）
pub struct FrameSynchronizer {
    capacity: usize,
    frame: Vec<u8>,
    scratch: Vec<u8>,
}

impl FrameSynchronizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frame: Vec::with_capacity(capacity),
            scratch: vec![0u8; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 读取下一帧
    ///
    /// - `Ok(Some(frame))`: 恰好 `capacity` 个 Base64 字节，以帧头开始
    /// - `Ok(None)`: 本次读取中没有帧头（或从末尾 `'f'` 补读后不是帧头），数据已丢弃
    /// - `Err(SerialError::Timeout)`: 端口在读满之前超时
    pub fn next_frame<R: RxPort + ?Sized>(
        &mut self,
        rx: &mut R,
    ) -> Result<Option<&[u8]>, SerialError> {
        self.frame.clear();

        let n = self.capacity;
        read_exact(rx, &mut self.scratch[..n])?;

        let start = match self.scratch[..n]
            .windows(REPORT_MARKER.len())
            .position(|w| w == REPORT_MARKER)
        {
            Some(start) => start,
            // 读取恰好停在帧头首字节上：从这里开始补读，否则定长流会永远错位
            None if self.scratch[..n].last() == Some(&REPORT_MARKER[0]) => n - 1,
            None => return Ok(None),
        };
        self.frame.extend(self.scratch[start..].iter().copied().filter(|&b| is_base64_byte(b)));

        while self.frame.len() < self.capacity {
            let missing = self.capacity - self.frame.len();
            read_exact(rx, &mut self.scratch[..missing])?;
            self.frame
                .extend(self.scratch[..missing].iter().copied().filter(|&b| is_base64_byte(b)));
        }

        // 假起点：补读之后不以帧头开始，按同步失败处理
        if !self.frame.starts_with(&REPORT_MARKER) {
            return Ok(None);
        }
        Ok(Some(self.frame.as_slice()))
    }
}

fn read_exact<R: RxPort + ?Sized>(rx: &mut R, buf: &mut [u8]) -> Result<(), SerialError> {
    let actual = rx.read_full(buf)?;
    if actual < buf.len() {
        return Err(SerialError::Timeout {
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raspyke_protocol::{REPORT_ENCODED_LEN, Report, decode_report};
    use raspyke_serial::MockPort;

    fn encoded_frame() -> Vec<u8> {
        Report {
            time_ms: 5000,
            motor_counts: [10, 20, 30],
            ..Default::default()
        }
        .encode()
        .into_bytes()
    }

    #[test]
    fn test_clean_frame() {
        let mut port = MockPort::new();
        port.push_bytes(encoded_frame());

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        let frame = sync.next_frame(&mut port).unwrap().unwrap();
        assert_eq!(frame, encoded_frame().as_slice());
    }

    #[test]
    fn test_leading_noise_is_skipped() {
        let mut port = MockPort::new();
        port.push_bytes(b"\r\nxyz");
        port.push_bytes(encoded_frame());

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        let frame = sync.next_frame(&mut port).unwrap().unwrap();
        assert_eq!(decode_report(frame).unwrap().time_ms, 5000);
    }

    #[test]
    fn test_non_alphabet_bytes_inside_frame_are_filtered() {
        let frame = encoded_frame();
        let mut noisy = frame[..10].to_vec();
        noisy.extend_from_slice(b"\r\n\0");
        noisy.extend_from_slice(&frame[10..]);

        let mut port = MockPort::new();
        port.push_bytes(noisy);

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        assert_eq!(sync.next_frame(&mut port).unwrap().unwrap(), frame.as_slice());
    }

    #[test]
    fn test_missing_marker_is_a_sync_miss() {
        let mut port = MockPort::new();
        port.push_bytes([b'A'; REPORT_ENCODED_LEN]);
        port.push_bytes(encoded_frame());

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        assert!(sync.next_frame(&mut port).unwrap().is_none());
        // 下一次读取恢复同步
        assert!(sync.next_frame(&mut port).unwrap().is_some());
    }

    #[test]
    fn test_short_first_read_is_timeout() {
        let mut port = MockPort::new();
        port.push_bytes(b"f3AAAA");

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        match sync.next_frame(&mut port) {
            Err(SerialError::Timeout { expected, actual }) => {
                assert_eq!(expected, REPORT_ENCODED_LEN);
                assert_eq!(actual, 6);
            },
            other => panic!("Expected timeout, got {:?}", other.map(|f| f.map(<[u8]>::to_vec))),
        }
    }

    #[test]
    fn test_short_completion_read_is_timeout() {
        let frame = encoded_frame();
        let mut port = MockPort::new();
        port.push_bytes(b"....");
        port.push_bytes(&frame[..30]);

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        // 第一次读取得到 28 个有效字节，补读 4 字节时只剩 2 字节
        assert!(matches!(
            sync.next_frame(&mut port),
            Err(SerialError::Timeout {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_read_ending_on_marker_head_recovers() {
        // 从第 1 个字节开始接入连续帧流：第一次读取的最后一个字节正好是下一帧的 'f'
        let frame = encoded_frame();
        let mut port = MockPort::new();
        port.push_bytes(&frame[1..]);
        port.repeat(frame.clone());

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        for _ in 0..100 {
            let got = sync.next_frame(&mut port).unwrap().unwrap();
            assert_eq!(got, frame.as_slice());
        }
    }

    #[test]
    fn test_false_marker_head_is_a_sync_miss() {
        let frame = encoded_frame();
        let mut stream = vec![b'A'; REPORT_ENCODED_LEN - 1];
        stream.push(b'f');
        stream.extend_from_slice(&[b'B'; REPORT_ENCODED_LEN - 1]);

        let mut port = MockPort::new();
        port.push_bytes(stream);
        port.push_bytes(&frame);

        let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
        assert!(sync.next_frame(&mut port).unwrap().is_none());
        assert_eq!(sync.next_frame(&mut port).unwrap().unwrap(), frame.as_slice());
    }

    #[test]
    fn test_base64_alphabet() {
        for b in b"AZaz09+/=" {
            assert!(is_base64_byte(*b));
        }
        for b in b"-_ \r\n\0!" {
            assert!(!is_base64_byte(*b));
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use raspyke_protocol::REPORT_ENCODED_LEN;
    use raspyke_serial::MockPort;

    proptest! {
        #[test]
        fn output_is_full_capacity_of_alphabet_bytes_or_nothing(
            stream in proptest::collection::vec(
                prop_oneof![
                    Just(b'f'),
                    Just(b'3'),
                    Just(b'\n'),
                    any::<u8>(),
                ],
                0..200,
            ),
        ) {
            let mut port = MockPort::new();
            port.push_bytes(&stream);

            let mut sync = FrameSynchronizer::new(REPORT_ENCODED_LEN);
            loop {
                match sync.next_frame(&mut port) {
                    Ok(Some(frame)) => {
                        prop_assert_eq!(frame.len(), REPORT_ENCODED_LEN);
                        prop_assert!(frame.iter().all(|&b| is_base64_byte(b)));
                        prop_assert_eq!(&frame[..2], &REPORT_MARKER[..]);
                    },
                    Ok(None) => {},
                    Err(e) => {
                        let is_timeout = matches!(e, SerialError::Timeout { .. });
                        prop_assert!(is_timeout, "unexpected error: {}", e);
                        break;
                    },
                }
            }
        }
    }
}
