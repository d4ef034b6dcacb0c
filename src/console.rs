//! Line-oriented numeric target input.
//!
//! Each line carries one decimal number, a motor shaft angle in radians. It is
//! stored straight into the setpoint cell, bypassing the link decoder and its
//! de-duplication.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use crate::setpoint::{SetpointCell, SetpointUnit};

/// Why a line was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// More than `N` bytes before the newline
    Overflow,
    /// Non-ASCII byte in the line
    Encoding,
    /// Not a finite decimal number
    Parse,
}

/// Collects bytes into lines
pub struct LineAssembler<const N: usize> {
    line: String<N>,
    /// Set once the current line is known to be unusable
    discard: Option<LineError>,
}

impl<const N: usize> LineAssembler<N> {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            discard: None,
        }
    }

    /// Feed one byte
    ///
    /// # Returns
    /// * `None` while the line is incomplete
    /// * `Some(Ok(value))` when a line parsed as a number
    /// * `Some(Err(e))` when a line was rejected
    pub fn push(&mut self, byte: u8) -> Option<Result<f32, LineError>> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let result = match self.discard.take() {
                    Some(e) => Err(e),
                    None => parse_target(&self.line),
                };
                self.line.clear();
                Some(result)
            }
            _ if self.discard.is_some() => None,
            _ if !byte.is_ascii() => {
                self.discard = Some(LineError::Encoding);
                None
            }
            _ => {
                if self.line.push(byte as char).is_err() {
                    self.discard = Some(LineError::Overflow);
                }
                None
            }
        }
    }
}

impl<const N: usize> Default for LineAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_target(line: &str) -> Result<f32, LineError> {
    match line.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LineError::Parse),
    }
}

/// Feeds console bytes into the setpoint cell
pub struct Console<const N: usize> {
    lines: LineAssembler<N>,
}

impl<const N: usize> Console<N> {
    pub const fn new() -> Self {
        Self {
            lines: LineAssembler::new(),
        }
    }

    /// Feed received bytes
    ///
    /// Every accepted value is stored as a native radian target and passed to
    /// `echo`. Rejected lines are logged and dropped.
    pub fn feed<M: RawMutex>(
        &mut self,
        bytes: &[u8],
        setpoint: &SetpointCell<M>,
        mut echo: impl FnMut(f32),
    ) {
        for &byte in bytes {
            match self.lines.push(byte) {
                None => {}
                Some(Ok(value)) => {
                    setpoint.store(value, SetpointUnit::NativeRadians);
                    info!("Console target: {} rad", value);
                    echo(value);
                }
                Some(Err(e)) => warn!("Console line dropped: {}", e),
            }
        }
    }
}

impl<const N: usize> Default for Console<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    fn feed_all<const N: usize>(asm: &mut LineAssembler<N>, bytes: &[u8]) -> Vec<Result<f32, LineError>> {
        bytes.iter().filter_map(|&b| asm.push(b)).collect()
    }

    #[test]
    fn test_parses_lines() {
        let mut asm = LineAssembler::<16>::new();
        assert_eq!(feed_all(&mut asm, b"1.5\n"), vec![Ok(1.5)]);
        assert_eq!(feed_all(&mut asm, b"  -2\r\n"), vec![Ok(-2.0)]);
    }

    #[test]
    fn test_split_across_feeds() {
        let mut asm = LineAssembler::<16>::new();
        assert!(feed_all(&mut asm, b"3.1").is_empty());
        assert_eq!(feed_all(&mut asm, b"4\n"), vec![Ok(3.14)]);
    }

    #[test]
    fn test_rejects_garbage() {
        let mut asm = LineAssembler::<16>::new();
        assert_eq!(feed_all(&mut asm, b"abc\n"), vec![Err(LineError::Parse)]);
        assert_eq!(feed_all(&mut asm, b"\n"), vec![Err(LineError::Parse)]);
        assert_eq!(feed_all(&mut asm, b"inf\n"), vec![Err(LineError::Parse)]);
    }

    #[test]
    fn test_overflow_drops_line_and_recovers() {
        let mut asm = LineAssembler::<4>::new();
        assert_eq!(feed_all(&mut asm, b"123456\n"), vec![Err(LineError::Overflow)]);
        assert_eq!(feed_all(&mut asm, b"12\n"), vec![Ok(12.0)]);
    }

    #[test]
    fn test_non_ascii_rejected() {
        let mut asm = LineAssembler::<8>::new();
        assert_eq!(
            feed_all(&mut asm, &[b'1', 0xC3, 0xA9, b'\n']),
            vec![Err(LineError::Encoding)]
        );
    }

    #[test]
    fn test_console_stores_without_dedup() {
        let cell = SetpointCell::<CriticalSectionRawMutex>::new();
        let mut console = Console::<32>::new();
        let mut echoed = Vec::new();

        console.feed(b"0.5\n", &cell, |v| echoed.push(v));
        assert_eq!(cell.take().map(|s| (s.value, s.unit)), Some((0.5, SetpointUnit::NativeRadians)));

        console.feed(b"0.5\nnope\n", &cell, |v| echoed.push(v));
        assert!(cell.is_dirty());
        assert_eq!(echoed, vec![0.5, 0.5]);
    }
}
