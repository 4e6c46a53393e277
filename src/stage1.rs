//! Stage 1: structural indexing.
//!
//! One pass over the input in 64-byte chunks produces, per chunk, a 64-bit
//! bitmap of structural and pseudo-structural bytes, which is flattened into
//! `structural_indexes`. UTF-8 validation runs over the same chunks. All
//! cross-chunk state (escape parity, in-string bit, previous-byte predicate)
//! lives in an explicit [`Stage1State`] so the document-stream splitter can
//! observe where a batch ended.

use simdutf8::basic::imp::ChunkedUtf8Validator;

use crate::error::{Error, ErrorType, Result};
use crate::safer_unchecked::GetSaferUnchecked;

pub(crate) const SIMDINPUT_LENGTH: usize = 64;

pub(crate) const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
pub(crate) const ODD_BITS: u64 = !EVEN_BITS;

/// Cross-chunk carries of the structural scanner.
///
/// `prev_iter_inside_quote` is all-ones while the scan is inside a string,
/// `prev_iter_ends_odd_backslash` is the escape parity crossing the chunk
/// boundary, and `prev_iter_ends_pseudo_pred` holds the "previous byte was
/// whitespace or an operator" bit for the next chunk's shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage1State {
    pub(crate) prev_iter_ends_odd_backslash: u64,
    pub(crate) prev_iter_inside_quote: u64,
    pub(crate) prev_iter_ends_pseudo_pred: u64,
}

impl Stage1State {
    pub fn new() -> Self {
        Self {
            prev_iter_ends_odd_backslash: 0,
            prev_iter_inside_quote: 0,
            // the start of the input behaves as if preceded by whitespace,
            // so a scalar at offset 0 is pseudo-structural
            prev_iter_ends_pseudo_pred: 1,
        }
    }

    /// True when the scanned range ended inside an unterminated string.
    pub fn ends_inside_string(&self) -> bool {
        self.prev_iter_inside_quote != 0
    }

    /// True when the scanned range ended on an odd run of backslashes.
    pub fn ends_odd_backslash(&self) -> bool {
        self.prev_iter_ends_odd_backslash != 0
    }
}

impl Default for Stage1State {
    fn default() -> Self {
        Self::new()
    }
}

/// The byte-vector primitives stage 1 is generic over.
///
/// Implementations process 64 input bytes per step; on narrower hardware a
/// step is assembled from multiple registers, but every mask handed back is
/// 64 bits with bit `i` describing byte `i` of the chunk.
pub(crate) trait Stage1Parse {
    type Utf8Validator: ChunkedUtf8Validator;
    type SimdRepresentation;

    unsafe fn new(ptr: &[u8]) -> Self;

    /// Fill every bit position between (and including) the opening quote of
    /// a string and the position before its closing quote, given the mask of
    /// unescaped quotes. Prefix-XOR, via carry-less multiply where the CPU
    /// has it.
    unsafe fn compute_quote_mask(quote_bits: u64) -> u64;

    /// Bit `i` set iff byte `i` of the chunk equals `m`.
    unsafe fn cmp_mask_against_input(&self, m: u8) -> u64;

    /// Bit `i` set iff byte `i` is unsigned-less-or-equal to the
    /// corresponding lane of `maxval`.
    unsafe fn unsigned_lteq_against_input(&self, maxval: Self::SimdRepresentation) -> u64;

    /// Nibble-shuffle classification of the chunk into whitespace and
    /// operator masks.
    unsafe fn find_whitespace_and_structurals(&self, whitespace: &mut u64, structurals: &mut u64);

    /// Append the absolute offset of every set bit of `bits` to `base`,
    /// lowest bit first. `idx` is the offset of the chunk *after* the one
    /// `bits` describes; implementations subtract the chunk width.
    unsafe fn flatten_bits(base: &mut Vec<u32>, idx: u32, bits: u64);

    unsafe fn fill_s8(n: i8) -> Self::SimdRepresentation;

    /// Store the 64 loaded bytes to `dst`. The string decoder copies runs
    /// this way before it knows where they end.
    unsafe fn copy_to(&self, dst: *mut u8);

    /// Mask of backslashes that escape the byte after them, i.e. ends of
    /// odd-length backslash runs. Parity carries across chunks.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn find_odd_backslash_sequences(&self, prev_iter_ends_odd_backslash: &mut u64) -> u64 {
        let bs_bits = unsafe { self.cmp_mask_against_input(b'\\') };
        let start_edges = bs_bits & !(bs_bits << 1);
        // flip lowest if we have an odd-length run at the end of the prior
        // iteration
        let even_start_mask = EVEN_BITS ^ *prev_iter_ends_odd_backslash;
        let even_starts = start_edges & even_start_mask;
        let odd_starts = start_edges & !even_start_mask;
        let even_carries = bs_bits.wrapping_add(even_starts);
        // must record the carry-out of our odd-carries out of bit 63
        let (mut odd_carries, iter_ends_odd_backslash) = bs_bits.overflowing_add(odd_starts);
        // push in a bit zero as a potential carry-in for the aggregation
        odd_carries |= *prev_iter_ends_odd_backslash;
        *prev_iter_ends_odd_backslash = u64::from(iter_ends_odd_backslash);
        let even_carry_ends = even_carries & !bs_bits;
        let odd_carry_ends = odd_carries & !bs_bits;
        let even_start_odd_end = even_carry_ends & ODD_BITS;
        let odd_start_even_end = odd_carry_ends & EVEN_BITS;
        even_start_odd_end | odd_start_even_end
    }

    /// Compute the in-string mask for this chunk and collect unescaped
    /// control characters found inside strings into `error_mask`.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn find_quote_mask_and_bits(
        &self,
        odd_ends: u64,
        prev_iter_inside_quote: &mut u64,
        quote_bits: &mut u64,
        error_mask: &mut u64,
    ) -> u64 {
        unsafe {
            *quote_bits = self.cmp_mask_against_input(b'"') & !odd_ends;
            let mut quote_mask = Self::compute_quote_mask(*quote_bits);
            quote_mask ^= *prev_iter_inside_quote;
            // All bytes inside strings must be at least 0x20; anything below
            // is an unescaped control character.
            let unescaped = self.unsigned_lteq_against_input(Self::fill_s8(0x1F));
            *error_mask |= quote_mask & unescaped;
            // right shift of a signed value expected to be well-defined and
            // to copy the sign bit
            *prev_iter_inside_quote = static_cast_u64!(static_cast_i64!(quote_mask) >> 63);
            quote_mask
        }
    }

    /// Merge operator and scalar-start bits into the final structural mask
    /// for a chunk.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    fn finalize_structurals(
        mut structurals: u64,
        whitespace: u64,
        quote_mask: u64,
        quote_bits: u64,
        prev_iter_ends_pseudo_pred: &mut u64,
    ) -> u64 {
        // mask off anything inside quotes
        structurals &= !quote_mask;
        // add the real quote bits back into our bitmask as well, so we can
        // keep track of the location of the string boundaries
        structurals |= quote_bits;
        let pseudo_pred: u64 = structurals | whitespace;

        let shifted_pseudo_pred: u64 = (pseudo_pred << 1) | *prev_iter_ends_pseudo_pred;
        *prev_iter_ends_pseudo_pred = pseudo_pred >> 63;
        let pseudo_structurals: u64 = shifted_pseudo_pred & !whitespace & !quote_mask;
        structurals |= pseudo_structurals;

        // now, we've used our close quotes; purge them from the structurals
        structurals &= !(quote_bits & !quote_mask);
        structurals
    }
}

/// Walk `input` (a space-padded buffer whose logical document occupies the
/// first `len` bytes) and fill `structural_indexes`, terminated by one
/// sentinel offset equal to `len`.
///
/// In streaming mode an unterminated trailing string is not an error; the
/// splitter inspects `state` and grows its batch instead.
#[allow(clippy::cast_possible_truncation)]
pub(crate) unsafe fn find_structural_bits<S: Stage1Parse>(
    input: &[u8],
    len: usize,
    structural_indexes: &mut Vec<u32>,
    state: &mut Stage1State,
    streaming: bool,
) -> Result<()> {
    structural_indexes.clear();
    structural_indexes.reserve(len / 6 + 16);

    let mut utf8_validator = unsafe { S::Utf8Validator::new() };

    let mut prev_iter_ends_odd_backslash = state.prev_iter_ends_odd_backslash;
    let mut prev_iter_inside_quote = state.prev_iter_inside_quote;
    let mut prev_iter_ends_pseudo_pred = state.prev_iter_ends_pseudo_pred;

    let mut error_mask: u64 = 0;

    // Whole chunks including the space-padded tail; padding is whitespace,
    // so it can never contribute a structural bit.
    let padded_end = (len + SIMDINPUT_LENGTH - 1) / SIMDINPUT_LENGTH * SIMDINPUT_LENGTH;
    debug_assert!(padded_end <= input.len());

    // `structurals` is the *previous* chunk's result; flattening it one
    // iteration late keeps the loop body free of a long dependency chain.
    let mut structurals: u64 = 0;
    let mut idx: usize = 0;
    while idx < padded_end {
        let chunk = unsafe { input.get_kinda_unchecked(idx..idx + SIMDINPUT_LENGTH) };
        unsafe { utf8_validator.update_from_chunks(chunk) };

        let input_v = unsafe { S::new(chunk) };
        let odd_ends =
            unsafe { input_v.find_odd_backslash_sequences(&mut prev_iter_ends_odd_backslash) };

        let mut quote_bits: u64 = 0;
        let quote_mask = unsafe {
            input_v.find_quote_mask_and_bits(
                odd_ends,
                &mut prev_iter_inside_quote,
                &mut quote_bits,
                &mut error_mask,
            )
        };

        unsafe { S::flatten_bits(structural_indexes, idx as u32, structurals) };

        let mut whitespace: u64 = 0;
        let mut chunk_structurals: u64 = 0;
        unsafe {
            input_v.find_whitespace_and_structurals(&mut whitespace, &mut chunk_structurals);
        }
        structurals = S::finalize_structurals(
            chunk_structurals,
            whitespace,
            quote_mask,
            quote_bits,
            &mut prev_iter_ends_pseudo_pred,
        );

        idx += SIMDINPUT_LENGTH;
    }
    unsafe { S::flatten_bits(structural_indexes, idx as u32, structurals) };

    state.prev_iter_ends_odd_backslash = prev_iter_ends_odd_backslash;
    state.prev_iter_inside_quote = prev_iter_inside_quote;
    state.prev_iter_ends_pseudo_pred = prev_iter_ends_pseudo_pred;

    if unsafe { utf8_validator.finalize(None) }.is_err() {
        return Err(Error::generic(ErrorType::Utf8Error));
    }
    if error_mask != 0 {
        return Err(Error::generic(ErrorType::UnescapedChars));
    }
    if !streaming && prev_iter_inside_quote != 0 {
        return Err(Error::generic(ErrorType::UnclosedString));
    }
    if structural_indexes.is_empty() {
        return Err(Error::generic(ErrorType::Empty));
    }

    // terminating sentinel
    structural_indexes.push(len as u32);
    Ok(())
}
