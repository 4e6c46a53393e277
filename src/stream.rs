//! The document-stream splitter behind [`Parser::parse_many`].
//!
//! A buffer of concatenated top-level JSON values is consumed batch by
//! batch: one streaming stage-1 sweep indexes a batch, a boundary scan
//! over the structural indexes finds the last complete document, and
//! streaming stage-2 runs once per document inside that bound. A batch
//! that holds no complete document (for example because it ends inside a
//! string) grows and is indexed again.

use crate::error::{ErrorType, Result};
use crate::tape::Tape;
use crate::Parser;

/// Lazy sequence of documents parsed out of one input buffer.
///
/// Each call to [`next`](Self::next) yields a [`Tape`] view borrowing the
/// parser, so the previous document's view must be dropped first; this is
/// why `DocumentStream` is not a std `Iterator`.
pub struct DocumentStream<'p, 'b> {
    parser: &'p mut Parser,
    input: &'b [u8],
    batch_size: usize,
    /// Absolute byte offset of the current batch.
    pos: usize,
    /// Logical byte length of the current batch.
    batch_len: usize,
    /// Structural cursor bounding the complete documents of this batch.
    doc_limit: usize,
    /// Structural cursor of the next document within the batch.
    next_structural: usize,
    loaded: bool,
    finished: bool,
    yielded_any: bool,
}

/// Strip trailing non-ASCII bytes so a batch cannot split a multi-byte
/// sequence; stage 1 validates UTF-8 per batch.
fn trimmed_length_safe_utf8(bytes: &[u8]) -> usize {
    let mut len = bytes.len();
    while len > 0 && bytes[len - 1] >= 0x80 {
        len -= 1;
    }
    len
}

/// Find the structural cursor where the last complete document of the
/// batch ends, walking backwards for a value-end byte directly followed by
/// a value-start byte. Inside one well-formed document such a pair cannot
/// occur, so it marks the boundary of the trailing (possibly incomplete)
/// document. Returns 0 when the batch holds no complete document.
fn find_last_boundary(buf: &[u8], indexes: &[u32]) -> usize {
    // the final entry is the sentinel
    let n = indexes.len().saturating_sub(1);
    if n < 2 {
        return 0;
    }
    let mut i = n - 1;
    while i > 0 {
        let idxb = indexes[i] as usize;
        match buf[idxb] {
            b':' | b',' | b'}' | b']' => {}
            _ => {
                let idxa = indexes[i - 1] as usize;
                match buf[idxa] {
                    b'{' | b'[' | b':' | b',' => {}
                    _ => return i,
                }
            }
        }
        i -= 1;
    }
    0
}

impl<'p, 'b> DocumentStream<'p, 'b> {
    pub(crate) fn new(parser: &'p mut Parser, input: &'b [u8], batch_size: usize) -> Self {
        Self {
            parser,
            input,
            batch_size: batch_size.max(1),
            pos: 0,
            batch_len: 0,
            doc_limit: 0,
            next_structural: 0,
            loaded: false,
            finished: false,
            yielded_any: false,
        }
    }

    /// The next document, or `None` once the input is exhausted. An error
    /// ends the stream.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Result<Tape<'_>>> {
        if self.finished {
            return None;
        }
        if !self.loaded {
            match self.load_batch() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        let mut next_json = 0;
        match self
            .parser
            .run_stage2(self.next_structural, true, &mut next_json)
        {
            Ok(has_more) => {
                self.yielded_any = true;
                if !has_more {
                    // batch fully consumed
                    self.pos += self.batch_len;
                    self.loaded = false;
                } else if next_json >= self.doc_limit {
                    // the rest of the batch is an incomplete document;
                    // reload starting at its first byte
                    self.pos += self.parser.structural_indexes[next_json] as usize;
                    self.loaded = false;
                } else {
                    self.next_structural = next_json;
                }
                Some(Ok(self.parser.tape_view()))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Index the next batch. `Ok(false)` means the input is exhausted.
    fn load_batch(&mut self) -> Result<bool> {
        let remaining = self.input.len() - self.pos;
        if remaining == 0 {
            return Ok(false);
        }

        let mut batch = self.batch_size.min(remaining);
        loop {
            let mut at_end = self.pos + batch == self.input.len();
            let trimmed = if at_end {
                batch
            } else {
                trimmed_length_safe_utf8(&self.input[self.pos..self.pos + batch])
            };
            if trimmed == 0 {
                return Err(crate::Error::generic(ErrorType::Utf8Error));
            }
            at_end = self.pos + trimmed == self.input.len();

            match self
                .parser
                .stage1(&self.input[self.pos..self.pos + trimmed], true)
            {
                Ok(()) => {}
                Err(e) if e.error_type() == ErrorType::Empty => {
                    if at_end {
                        // nothing but whitespace left
                        return if self.yielded_any { Ok(false) } else { Err(e) };
                    }
                    batch = (batch * 2).min(remaining);
                    continue;
                }
                Err(e) => return Err(e),
            }

            // structural count without the sentinel
            let n = self.parser.structural_indexes.len() - 1;
            if at_end {
                self.doc_limit = n;
            } else {
                // bound this batch to its last complete document; a batch
                // that ended inside a string or mid-document has its
                // trailing piece re-indexed with the next batch
                let boundary = find_last_boundary(&self.input[self.pos..], &self.parser.structural_indexes);
                if boundary == 0 {
                    // no complete document fits, grow and re-index
                    batch = (batch * 2).min(remaining);
                    continue;
                }
                self.doc_limit = boundary;
            }
            self.batch_len = trimmed;
            self.next_structural = 0;
            return Ok(true);
        }
    }
}
