//! Text accumulator for process output.
//!
//! Bytes are decoded as UTF-8 as they arrive. A multi-byte sequence split
//! across two reads is held back until it completes; invalid sequences
//! become U+FFFD. Match positions therefore index the decoded text
//! directly.

/// Default buffer capacity (1 MB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Decoded, bounded output buffer.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    text: String,
    pending: Vec<u8>,
    max_size: usize,
    bytes_discarded: usize,
}

impl OutputBuffer {
    /// Create a buffer holding at most `max_size` bytes of text.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            max_size: max_size.max(1),
            bytes_discarded: 0,
        }
    }

    /// Append raw output.
    ///
    /// When the buffer overflows the oldest text is dropped.
    pub fn append(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = consumed + e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending[consumed..valid_up_to]) {
                        self.text.push_str(valid);
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_up_to + len;
                        }
                        None => {
                            consumed = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);

        self.trim();
    }

    fn trim(&mut self) {
        if self.text.len() <= self.max_size {
            return;
        }

        let mut cut = self.text.len() - self.max_size;
        while !self.text.is_char_boundary(cut) {
            cut += 1;
        }
        self.text.drain(..cut);
        self.bytes_discarded += cut;
    }

    /// Current decoded contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes of the decoded contents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the buffer holds no decoded text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Get the maximum size of the buffer.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Bytes dropped because the buffer overflowed.
    #[must_use]
    pub const fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// Remove and return the first `end` bytes of text.
    ///
    /// `end` must lie on a character boundary.
    pub fn consume(&mut self, end: usize) -> String {
        let end = end.min(self.text.len());
        self.text.drain(..end).collect()
    }

    /// Remove and return everything, including an incomplete trailing
    /// sequence (decoded lossily).
    pub fn take_all(&mut self) -> String {
        let mut all = std::mem::take(&mut self.text);
        if !self.pending.is_empty() {
            all.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        all
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
