//! Text vs binary content sniffing.

/// The kind of content detected in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Mostly printable text; safe to run pattern extraction over.
    Text,
    /// Unprintable or control-heavy data; skipped entirely.
    Binary,
}

/// Heuristic thresholds for text vs binary classification.
#[derive(Debug, Clone)]
pub struct ContentInspector {
    max_null_bytes: usize,
    max_control_ratio: f64,
}

impl Default for ContentInspector {
    fn default() -> Self {
        Self {
            max_null_bytes: 4,
            max_control_ratio: 0.3,
        }
    }
}

impl ContentInspector {
    pub fn new() -> Self {
        Default::default()
    }

    /// Classify `bytes`:
    ///
    /// 1. More than `max_null_bytes` null bytes -> `Binary`.
    /// 2. Control characters (excluding `\n`, `\r`, `\t`) above
    ///    `max_control_ratio` of the total -> `Binary`.
    /// 3. Otherwise `Text`.
    #[must_use]
    pub fn inspect(&self, bytes: &[u8]) -> ContentKind {
        let nulls = bytes.iter().filter(|&&b| b == 0).count();
        if nulls > self.max_null_bytes {
            return ContentKind::Binary;
        }

        let controls = bytes
            .iter()
            .filter(|&&b| b < 32 && !matches!(b, b'\n' | b'\r' | b'\t'))
            .count();
        let ratio = if bytes.is_empty() {
            0.0
        } else {
            controls as f64 / bytes.len() as f64
        };

        if ratio > self.max_control_ratio {
            ContentKind::Binary
        } else {
            ContentKind::Text
        }
    }
}
