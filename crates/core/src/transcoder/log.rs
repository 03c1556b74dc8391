//! Per-attempt diagnostic log.

/// Append-only list of diagnostic lines, cleared at the start of every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    lines: Vec<String>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The most recent line, if any.
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut log = LogBuffer::new();
        assert!(log.is_empty());

        log.push("one");
        log.push(String::from("two"));
        assert_eq!(log.lines(), &["one".to_string(), "two".to_string()]);
        assert_eq!(log.last(), Some("two"));

        log.clear();
        assert_eq!(log.len(), 0);
        assert_eq!(log.last(), None);
    }
}
