/// Longest state line we accept before discarding the buffer as line noise.
const MAX_LINE_LEN: usize = 256;

/// Buffers serial input and emits a line whenever `\n` is seen.
///
/// The firmware terminates lines with `\r\n`; both terminators are stripped.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &b in bytes {
            if b == b'\n' {
                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }
                lines.push(String::from_utf8_lossy(&self.buffer).into_owned());
                self.buffer.clear();
                continue;
            }

            if self.buffer.len() >= MAX_LINE_LEN {
                tracing::warn!(
                    "Discarding {} bytes of serial input without line terminator",
                    self.buffer.len()
                );
                self.buffer.clear();
            }
            self.buffer.push(b);
        }

        lines
    }

    /// Drop any partial line, used after the device was re-opened.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
