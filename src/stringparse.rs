//! Stage-2 string decoding into the arena.
//!
//! Each decoded string is stored as a little-endian `u32` length, the
//! unescaped bytes, and one NUL. Runs of plain characters are copied 64
//! bytes at a time with the same vector primitives stage 1 scans with; the
//! copy is unconditional and over-writes are reclaimed when an escape or
//! the closing quote is found.

use crate::charutils::{codepoint_to_utf8, hex_to_u32_nocheck};
use crate::error::{Error, ErrorType, Result};
use crate::safer_unchecked::GetSaferUnchecked;
use crate::stage1::Stage1Parse;

const fn build_escape_map() -> [u8; 256] {
    let mut map = [0u8; 256];
    map[b'"' as usize] = b'"';
    map[b'\\' as usize] = b'\\';
    map[b'/' as usize] = b'/';
    map[b'b' as usize] = 0x08;
    map[b'f' as usize] = 0x0C;
    map[b'n' as usize] = 0x0A;
    map[b'r' as usize] = 0x0D;
    map[b't' as usize] = 0x09;
    map
}

/// Maps the byte after a backslash to its unescaped value, zero for
/// escapes JSON does not define.
static ESCAPE_MAP: [u8; 256] = build_escape_map();

/// Decode the string whose opening quote sits at `idx`, appending one
/// arena record to `string_buf` and returning the record's byte offset.
///
/// `input` is the padded buffer, `len` the logical document length.
/// `string_buf` must have enough spare capacity for the whole remaining
/// input plus one chunk; the parser sizes it that way up front.
#[allow(clippy::cast_possible_truncation)]
pub(crate) unsafe fn parse_string<S: Stage1Parse>(
    input: &[u8],
    len: usize,
    idx: usize,
    string_buf: &mut Vec<u8>,
) -> Result<u64> {
    let record_offset = string_buf.len();
    let buf_ptr = string_buf.as_mut_ptr();

    // the length prefix is backfilled once the closing quote is found
    let mut dst = record_offset + 4;
    let mut src = idx + 1;

    loop {
        debug_assert!(src + 64 <= input.len());
        debug_assert!(dst + 64 <= string_buf.capacity());
        let v = unsafe { S::new(input.get_kinda_unchecked(src..src + 64)) };
        unsafe { v.copy_to(buf_ptr.add(dst)) };

        let bs_bits = unsafe { v.cmp_mask_against_input(b'\\') };
        let quote_bits = unsafe { v.cmp_mask_against_input(b'"') };

        if (bs_bits.wrapping_sub(1) & quote_bits) != 0 {
            // we encountered quotes first; add the string to the arena
            let quote_dist = quote_bits.trailing_zeros() as usize;
            if src + quote_dist >= len {
                return Err(Error::generic(ErrorType::UnclosedString));
            }
            let str_len = (dst + quote_dist - (record_offset + 4)) as u32;
            unsafe {
                core::ptr::copy_nonoverlapping(
                    str_len.to_le_bytes().as_ptr(),
                    buf_ptr.add(record_offset),
                    4,
                );
                *buf_ptr.add(dst + quote_dist) = 0;
                string_buf.set_len(dst + quote_dist + 1);
            }
            return Ok(record_offset as u64);
        }

        if (quote_bits.wrapping_sub(1) & bs_bits) != 0 {
            // find out where the backslash is
            let bs_dist = bs_bits.trailing_zeros() as usize;
            let escape_char = unsafe { *input.get_kinda_unchecked(src + bs_dist + 1) };
            if escape_char == b'u' {
                src += bs_dist;
                dst += bs_dist;
                unsafe {
                    handle_unicode_codepoint(input, &mut src, buf_ptr, &mut dst)?;
                }
            } else {
                // simple 1:1 transformation; the copy above already wrote
                // the bytes before the backslash
                let escape_result = ESCAPE_MAP[escape_char as usize];
                if escape_result == 0 {
                    return Err(Error::new_c(
                        src + bs_dist,
                        escape_char as char,
                        ErrorType::StringError,
                    ));
                }
                unsafe { *buf_ptr.add(dst + bs_dist) = escape_result };
                src += bs_dist + 2;
                dst += bs_dist + 1;
            }
        } else {
            // neither a quote nor a backslash in this chunk
            src += 64;
            dst += 64;
        }

        if src >= len {
            // ran past the document without a closing quote
            return Err(Error::generic(ErrorType::UnclosedString));
        }
    }
}

/// Decode a `\uXXXX` escape (optionally a surrogate pair) starting with
/// `src` on the backslash, writing the UTF-8 bytes at `dst`.
unsafe fn handle_unicode_codepoint(
    input: &[u8],
    src: &mut usize,
    buf_ptr: *mut u8,
    dst: &mut usize,
) -> Result<()> {
    let mut code_point = hex_to_u32_nocheck(unsafe { input.get_kinda_unchecked(*src + 2..*src + 6) });
    *src += 6;
    if code_point > 0xFFFF {
        // poisoned: one of the four bytes was not a hex digit
        return Err(Error::generic(ErrorType::StringError));
    }
    if (0xD800..0xDC00).contains(&code_point) {
        // high surrogate; a low surrogate escape must follow immediately
        if unsafe { *input.get_kinda_unchecked(*src) } != b'\\'
            || unsafe { *input.get_kinda_unchecked(*src + 1) } != b'u'
        {
            return Err(Error::generic(ErrorType::StringError));
        }
        let code_point_2 =
            hex_to_u32_nocheck(unsafe { input.get_kinda_unchecked(*src + 2..*src + 6) });
        if !(0xDC00..0xE000).contains(&code_point_2) {
            return Err(Error::generic(ErrorType::StringError));
        }
        code_point = (((code_point - 0xD800) << 10) | (code_point_2 - 0xDC00)) + 0x10000;
        *src += 6;
    } else if (0xDC00..0xE000).contains(&code_point) {
        // lone low surrogate
        return Err(Error::generic(ErrorType::StringError));
    }
    let mut utf8 = [0u8; 4];
    let written = codepoint_to_utf8(code_point, &mut utf8);
    if written == 0 {
        return Err(Error::generic(ErrorType::StringError));
    }
    unsafe {
        core::ptr::copy_nonoverlapping(utf8.as_ptr(), buf_ptr.add(*dst), written);
    }
    *dst += written;
    Ok(())
}
