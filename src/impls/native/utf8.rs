use simdutf8::basic::imp::ChunkedUtf8Validator;
use simdutf8::basic::{from_utf8, Utf8Error};

#[cfg_attr(not(feature = "no-inline"), inline)]
fn utf8_sequence_len(lead: u8) -> usize {
    if lead < 0xE0 {
        2
    } else if lead < 0xF0 {
        3
    } else {
        4
    }
}

/// Incremental UTF-8 validation for the portable implementation.
///
/// Chunks are validated eagerly up to the last position that cannot be
/// extended by bytes from the next chunk; at most three trailing bytes of a
/// multi-byte sequence are carried over. The carry always starts at a lead
/// byte, because a trailing run of continuation bytes longer than three is
/// ill-formed and gets validated (and rejected) in place.
pub(crate) struct ChunkedUtf8ValidatorImp {
    carry: [u8; 4],
    carry_len: usize,
    err: Option<Utf8Error>,
}

impl ChunkedUtf8ValidatorImp {
    fn check(&mut self, bytes: &[u8]) {
        if self.err.is_none() {
            if let Err(e) = from_utf8(bytes) {
                self.err = Some(e);
            }
        }
    }

    fn feed(&mut self, input: &[u8]) {
        if self.err.is_some() {
            return;
        }

        let mut input = input;
        if self.carry_len > 0 {
            let need = utf8_sequence_len(self.carry[0]);
            let take = (need - self.carry_len).min(input.len());
            let mut seq = [0_u8; 4];
            seq[..self.carry_len].copy_from_slice(&self.carry[..self.carry_len]);
            seq[self.carry_len..self.carry_len + take].copy_from_slice(&input[..take]);
            if self.carry_len + take < need {
                // still incomplete, keep carrying
                self.carry = seq;
                self.carry_len += take;
                return;
            }
            self.check(&seq[..need]);
            self.carry_len = 0;
            input = &input[take..];
        }

        // trim an incomplete trailing sequence off the validated range
        let mut cut = input.len();
        let mut back = 0_usize;
        while back < 3 && back < input.len() {
            let b = input[input.len() - 1 - back];
            if b < 0x80 {
                break;
            }
            if b >= 0xC0 {
                if utf8_sequence_len(b) > back + 1 {
                    cut = input.len() - 1 - back;
                }
                break;
            }
            back += 1;
        }

        self.check(&input[..cut]);
        let rest = &input[cut..];
        self.carry[..rest.len()].copy_from_slice(rest);
        self.carry_len = rest.len();
    }
}

impl ChunkedUtf8Validator for ChunkedUtf8ValidatorImp {
    unsafe fn new() -> Self {
        Self {
            carry: [0_u8; 4],
            carry_len: 0,
            err: None,
        }
    }

    unsafe fn update_from_chunks(&mut self, input: &[u8]) {
        self.feed(input);
    }

    unsafe fn finalize(
        mut self,
        remaining_input: Option<&[u8]>,
    ) -> core::result::Result<(), Utf8Error> {
        if let Some(rest) = remaining_input {
            self.feed(rest);
        }
        if self.carry_len > 0 {
            // a truncated sequence at end of input is ill-formed
            let carry = self.carry;
            let carry_len = self.carry_len;
            self.check(&carry[..carry_len]);
        }
        match self.err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn validate(chunks: &[&[u8]]) -> bool {
        let mut v = unsafe { ChunkedUtf8ValidatorImp::new() };
        for chunk in chunks {
            unsafe { v.update_from_chunks(chunk) };
        }
        unsafe { v.finalize(None) }.is_ok()
    }

    #[test]
    fn ascii_chunks() {
        assert!(validate(&[b"hello ", b"world"]));
    }

    #[test]
    fn multibyte_across_boundary() {
        let euro = "\u{20AC}".as_bytes(); // 3 bytes
        assert!(validate(&[&euro[..1], &euro[1..]]));
        assert!(validate(&[&euro[..2], &euro[2..]]));
    }

    #[test]
    fn truncated_at_end() {
        let euro = "\u{20AC}".as_bytes();
        assert!(!validate(&[&euro[..2]]));
    }

    #[test]
    fn bad_continuation() {
        assert!(!validate(&[&[0xE2, 0x28, 0xA1]]));
        assert!(!validate(&[&[0xC0, 0xAF]]));
    }
}
