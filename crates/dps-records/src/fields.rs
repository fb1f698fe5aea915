//! Whitespace-separated field parsing shared by the text codecs.

use core::str::FromStr;

use crate::error::RecordError;

/// Cursor over the fields of one record line.
pub(crate) struct Fields<'a> {
    line: usize,
    tokens: core::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    /// Split `text` (which starts on one-based line `line`).
    pub(crate) fn new(line: usize, text: &'a str) -> Self {
        Self {
            line,
            tokens: text.split_whitespace(),
        }
    }

    /// Next raw token.
    pub(crate) fn token(&mut self, what: &str) -> Result<&'a str, RecordError> {
        self.tokens
            .next()
            .ok_or_else(|| RecordError::malformed(self.line, format!("missing {what}")))
    }

    /// Next token parsed as `T`.
    pub(crate) fn parse<T: FromStr>(&mut self, what: &str) -> Result<T, RecordError> {
        let token = self.token(what)?;
        token
            .parse()
            .map_err(|_parse_error| RecordError::malformed(self.line, format!("bad {what}: {token:?}")))
    }

    /// Skip `count` tokens.
    pub(crate) fn skip(&mut self, count: usize, what: &str) -> Result<(), RecordError> {
        for _ in 0..count {
            self.token(what)?;
        }
        Ok(())
    }

    /// Read a count followed by that many `f64` values.
    pub(crate) fn counted_floats(&mut self, what: &str) -> Result<Vec<f64>, RecordError> {
        let count: usize = self.parse(what)?;
        (0..count).map(|_| self.parse(what)).collect()
    }

    /// Parse every remaining token as `T`.
    pub(crate) fn remaining<T: FromStr>(&mut self, what: &str) -> Result<Vec<T>, RecordError> {
        let line = self.line;
        self.tokens
            .by_ref()
            .map(|token| {
                token
                    .parse()
                    .map_err(|_parse_error| RecordError::malformed(line, format!("bad {what}: {token:?}")))
            })
            .collect()
    }

    /// Whatever remains of the line, rejoined with single spaces.
    pub(crate) fn rest(&mut self) -> String {
        self.tokens.by_ref().collect::<Vec<_>>().join(" ")
    }

    /// Line number of this record.
    pub(crate) const fn line(&self) -> usize {
        self.line
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_tokens() {
        let mut fields = Fields::new(3, "P 12 -1 2212 1.5e0");
        assert_eq!(fields.token("tag").unwrap(), "P");
        assert_eq!(fields.parse::<i64>("id").unwrap(), 12);
        assert_eq!(fields.parse::<i64>("parent").unwrap(), -1);
        assert_eq!(fields.parse::<i32>("pdg").unwrap(), 2212);
        assert!((fields.parse::<f64>("px").unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_and_bad_fields_are_malformed() {
        let mut fields = Fields::new(7, "E x");
        fields.skip(1, "tag").unwrap();
        let err = fields.parse::<u64>("number").unwrap_err();
        assert!(matches!(err, RecordError::Malformed { line: 7, .. }));
        let err = fields.token("more").unwrap_err();
        assert!(err.to_string().contains("missing more"));
    }

    #[test]
    fn counted_floats_reads_prefix_count() {
        let mut fields = Fields::new(1, "2 0.5 2.0 tail");
        assert_eq!(fields.counted_floats("weights").unwrap(), vec![0.5, 2.0]);
        assert_eq!(fields.rest(), "tail");
    }

    #[test]
    fn remaining_parses_to_end() {
        let mut fields = Fields::new(1, "W 1.0 0.25");
        fields.skip(1, "tag").unwrap();
        assert_eq!(fields.remaining::<f64>("weight").unwrap(), vec![1.0, 0.25]);
        let mut bad = Fields::new(2, "1.0 x");
        assert!(bad.remaining::<f64>("weight").is_err());
    }
}
