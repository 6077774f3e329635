//! Human-readable output helpers shared by [`UartChannel`](crate::UartChannel) and
//! [`Rs485`](crate::Rs485).

use crate::number::{NumberBuf, format_int, format_num, scale_float};

/// Appended by every `println*` method.
pub const LINE_ENDING: &[u8] = b"\r\n";

/// Text and number printing on top of a blocking byte sink.
///
/// Implementors provide [`write_bytes`](Print::write_bytes); everything else is derived from
/// it. Every call is handed to the sink as one transfer, so on an RS-485 line a `println`
/// keeps the driver enabled for the text and the line ending together.
pub trait Print {
    /// Transmits `bytes`, blocking until the hardware has accepted all of them.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Transmits several slices back to back as a single transfer.
    fn write_parts(&mut self, parts: &[&[u8]]) {
        for part in parts {
            self.write_bytes(part);
        }
    }

    /// Prints `text`.
    fn print(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Prints `text` followed by [`LINE_ENDING`].
    fn println(&mut self, text: &str) {
        self.write_parts(&[text.as_bytes(), LINE_ENDING]);
    }

    /// Writes raw bytes. Zero bytes are transmitted like any other value.
    fn print_array(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
    }

    /// Prints `n` in base 10.
    fn print_int(&mut self, n: i64) {
        self.print_int_base(n, 10);
    }

    /// Prints `n` in `base` (2 to 36, anything else is treated as 10).
    fn print_int_base(&mut self, n: i64, base: u8) {
        let mut buf = NumberBuf::new();
        let text = format_int(n, base, &mut buf);
        self.write_bytes(text.as_bytes());
    }

    /// Prints `n` in base 10 followed by [`LINE_ENDING`].
    fn println_int(&mut self, n: i64) {
        self.println_int_base(n, 10);
    }

    /// Prints `n` in `base` followed by [`LINE_ENDING`].
    fn println_int_base(&mut self, n: i64, base: u8) {
        let mut buf = NumberBuf::new();
        let text = format_int(n, base, &mut buf);
        self.write_parts(&[text.as_bytes(), LINE_ENDING]);
    }

    /// Prints `n` in base 10, or as a value scaled by 100 with two decimals when `is_float`
    /// is set (`12345` prints `123.45`).
    fn print_num(&mut self, n: i64, is_float: bool) {
        let mut buf = NumberBuf::new();
        let text = format_num(n, is_float, &mut buf);
        self.write_bytes(text.as_bytes());
    }

    /// [`print_num`](Print::print_num) followed by [`LINE_ENDING`].
    fn println_num(&mut self, n: i64, is_float: bool) {
        let mut buf = NumberBuf::new();
        let text = format_num(n, is_float, &mut buf);
        self.write_parts(&[text.as_bytes(), LINE_ENDING]);
    }

    /// Prints `value` with two decimals, truncated toward zero.
    ///
    /// Takes `f64` so values above 2^24 keep their hundredths; pass `f32` through
    /// `f64::from`.
    fn print_float(&mut self, value: f64) {
        self.print_num(scale_float(value), true);
    }

    /// [`print_float`](Print::print_float) followed by [`LINE_ENDING`].
    fn println_float(&mut self, value: f64) {
        self.println_num(scale_float(value), true);
    }
}
