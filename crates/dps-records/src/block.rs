//! Event-block framing shared by the two ASCII record formats.
//!
//! Both formats are line oriented: a header, then one block per event that
//! starts with an `E` line, then an `END_EVENT_LISTING` footer. The framer
//! hands out whole blocks, so a block that fails to parse has already been
//! consumed and the next call starts at the following event. The same holds
//! for a block containing bytes that are not UTF-8: it is framed as usual and
//! then reported as malformed.

use std::io::BufRead;

use crate::error::RecordError;

/// One numbered line of input.
pub(crate) type Line = (usize, String);

/// A line as read, and whether its bytes were valid UTF-8.
pub(crate) type RawLine = (Line, bool);

/// Reads event blocks from a line-oriented stream.
pub(crate) struct BlockReader<R> {
    inner: R,
    line_no: usize,
    lookahead: Option<RawLine>,
    finished: bool,
}

impl<R: BufRead> BlockReader<R> {
    pub(crate) const fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            lookahead: None,
            finished: false,
        }
    }

    /// Next event block, starting with its `E` line. `None` at end of stream.
    pub(crate) fn next_block(&mut self) -> Result<Option<Vec<Line>>, RecordError> {
        if self.finished {
            return Ok(None);
        }
        let (first, valid) = match self.lookahead.take() {
            Some(raw) => raw,
            None => loop {
                match read_text_line(&mut self.inner, &mut self.line_no)? {
                    Some((line, valid)) if is_event_start(&line.1) => break (line, valid),
                    Some((line, _)) if is_footer(&line.1) => {
                        self.finished = true;
                        return Ok(None);
                    }
                    Some(_) => {}
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                }
            },
        };

        let mut undecodable = (!valid).then_some(first.0);
        let mut block = vec![first];
        loop {
            match read_text_line(&mut self.inner, &mut self.line_no)? {
                Some((line, valid)) if is_event_start(&line.1) => {
                    self.lookahead = Some((line, valid));
                    break;
                }
                Some((line, _)) if is_footer(&line.1) => {
                    self.finished = true;
                    break;
                }
                Some((line, valid)) => {
                    if !valid {
                        undecodable.get_or_insert(line.0);
                    }
                    if !line.1.is_empty() {
                        block.push(line);
                    }
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        match undecodable {
            Some(line) => Err(RecordError::malformed(line, "line is not valid UTF-8")),
            None => Ok(Some(block)),
        }
    }
}

/// Read one line, trimmed at the end. Bytes that are not UTF-8 are replaced
/// and the line is flagged invalid.
pub(crate) fn read_text_line<R: BufRead>(inner: &mut R, line_no: &mut usize) -> Result<Option<RawLine>, RecordError> {
    let mut buf = Vec::new();
    if inner.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    *line_no = line_no.saturating_add(1);
    let (text, valid) = match String::from_utf8(buf) {
        Ok(text) => (text, true),
        Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), false),
    };
    Ok(Some(((*line_no, text.trim_end().to_owned()), valid)))
}

fn is_event_start(text: &str) -> bool {
    text == "E" || text.starts_with("E ")
}

fn is_footer(text: &str) -> bool {
    text.starts_with("HepMC::") && text.ends_with("END_EVENT_LISTING")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_event_lines() {
        let text = "HepMC::Version 3\nHepMC::Asciiv3-START_EVENT_LISTING\nE 1 0 0\nU GEV MM\n\nE 2 0 0\nHepMC::Asciiv3-END_EVENT_LISTING\nE 3 0 0\n";
        let mut reader = BlockReader::new(text.as_bytes());
        let first = reader.next_block().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0], (3, "E 1 0 0".to_owned()));
        let second = reader.next_block().unwrap().unwrap();
        assert_eq!(second, vec![(6, "E 2 0 0".to_owned())]);
        // Nothing after the footer is read.
        assert!(reader.next_block().unwrap().is_none());
    }

    #[test]
    fn undecodable_block_is_malformed_and_skipped() {
        let mut text = b"E 1 0 0\nP 1 0 22 ".to_vec();
        text.extend_from_slice(&[0xff, 0xfe]);
        text.extend_from_slice(b"\nE 2 0 0\nP 1\n");
        let mut reader = BlockReader::new(text.as_slice());
        let err = reader.next_block().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("line 2"));
        let next = reader.next_block().unwrap().unwrap();
        assert_eq!(next[0], (3, "E 2 0 0".to_owned()));
        assert!(reader.next_block().unwrap().is_none());
    }

    #[test]
    fn undecodable_event_line_taints_only_its_own_block() {
        let mut text = b"E 1 0 0\nP 1\nE 2 ".to_vec();
        text.push(0xff);
        text.extend_from_slice(b"\nP 2\nE 3 0 0\n");
        let mut reader = BlockReader::new(text.as_slice());
        assert_eq!(reader.next_block().unwrap().unwrap().len(), 2);
        assert!(reader.next_block().unwrap_err().is_recoverable());
        assert_eq!(reader.next_block().unwrap().unwrap()[0].1, "E 3 0 0");
    }

    #[test]
    fn missing_footer_ends_at_eof() {
        let mut reader = BlockReader::new("E 1\nP 1\n".as_bytes());
        assert_eq!(reader.next_block().unwrap().unwrap().len(), 2);
        assert!(reader.next_block().unwrap().is_none());
    }
}
