/*!
# `simd-tape`

A vectorized JSON parser that decodes documents into a flat 64-bit tape in
two stages: a structural-indexing sweep over 64-byte chunks, and a
depth-tracked walk over the resulting index that decodes scalars and
verifies nesting.

## ⚠️ CAREFUL

This library contains a _lot_ of unsafe code and is very performance
sensitive. The hot paths avoid branching and bounds checks wherever the
document's own structure makes them redundant; unchecked accesses go
through helpers that stay checked in debug and test builds.

A [`Parser`] owns its whole workspace (structural indexes, tape, string
arena, scope stacks) and reuses it across parses. The input is copied into
an owned, 64-byte-aligned buffer whose tail is padded with spaces, so the
vector loops never read past an allocation and a document ending in a bare
number or atom needs no special tail handling.

```
use simd_tape::{Parser, TapeKind};

let mut parser = Parser::new();
let tape = parser.parse(br#"{"answer":42}"#).unwrap();
assert_eq!(tape.entry(2).0, TapeKind::String);
```
*/

#![allow(clippy::missing_safety_doc)]

#[macro_use]
mod macros;

mod charutils;
mod error;
mod impls;
mod numberparse;
mod safer_unchecked;
mod stage1;
mod stage2;
mod stream;
mod stringparse;
mod tape;

#[cfg(test)]
mod tests;

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

pub use crate::error::{Error, ErrorType, Result};
pub use crate::stage1::Stage1State;
pub use crate::stream::DocumentStream;
pub use crate::tape::{Tape, TapeKind, TAPE_VALUE_MASK};

use crate::stage1::find_structural_bits;
use crate::stage2::{build_tape, RetAddress};

/// Bytes of space padding kept past the logical input in the owned buffer.
/// One full chunk, so the tail chunk and every scalar decoder read stays
/// in-bounds.
pub(crate) const SIMDTAPE_PADDING: usize = 64;

/// Default nesting limit when the caller never calls [`Parser::allocate`].
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// The stage-1 implementation picked for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Implementation {
    #[cfg(target_arch = "x86_64")]
    Avx2,
    Native,
}

fn detect_implementation() -> Implementation {
    #[cfg(target_arch = "x86_64")]
    {
        if std::is_x86_feature_detected!("avx2") && std::is_x86_feature_detected!("pclmulqdq") {
            return Implementation::Avx2;
        }
    }
    Implementation::Native
}

fn active_implementation() -> Implementation {
    static ACTIVE: std::sync::OnceLock<Implementation> = std::sync::OnceLock::new();
    *ACTIVE.get_or_init(detect_implementation)
}

/// Name of the stage-1 implementation selected for this CPU.
pub fn implementation_name() -> &'static str {
    match active_implementation() {
        #[cfg(target_arch = "x86_64")]
        Implementation::Avx2 => "avx2",
        Implementation::Native => "native",
    }
}

/// A 64-byte-aligned, manually managed byte buffer for the padded input
/// copy.
pub struct AlignedBuf {
    layout: Layout,
    inner: NonNull<u8>,
}

// The buffer is plain bytes with exclusive ownership.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocate `capacity` bytes at 64-byte alignment, or `None` when the
    /// allocator refuses.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return Some(Self {
                layout: Layout::from_size_align(0, 64).ok()?,
                inner: NonNull::dangling(),
            });
        }
        let layout = Layout::from_size_align(capacity, 64).ok()?;
        let inner = NonNull::new(unsafe { alloc(layout) })?;
        Some(Self { layout, inner })
    }

    /// Panicking variant of [`try_with_capacity`](Self::try_with_capacity).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity(capacity).expect("allocation failed")
    }

    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.inner.as_ptr()
    }

    /// The first `len` bytes of the buffer. The caller guarantees they
    /// have been initialized.
    unsafe fn as_slice(&self, len: usize) -> &[u8] {
        debug_assert!(len <= self.capacity());
        unsafe { std::slice::from_raw_parts(self.inner.as_ptr(), len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            unsafe { dealloc(self.inner.as_ptr(), self.layout) }
        }
    }
}

/// A reusable JSON parser: one instance, one workspace.
pub struct Parser {
    imp: Implementation,
    input_buf: AlignedBuf,
    /// Initialized bytes in `input_buf` (logical length + padding).
    input_end: usize,
    /// Logical length of the last loaded document.
    input_len: usize,
    byte_capacity: usize,
    /// Whether the workspace size was pinned by an explicit
    /// [`allocate`](Self::allocate); automatic sizing may grow instead of
    /// failing with `capacity`.
    user_allocated: bool,
    pub(crate) structural_indexes: Vec<u32>,
    tape: Vec<u64>,
    string_buf: Vec<u8>,
    containing_scope_offset: Vec<u32>,
    ret_address: Vec<RetAddress>,
    stage1_state: Stage1State,
    stage1_valid: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser with an empty workspace; the first
    /// [`parse`](Self::parse) sizes it to its input unless
    /// [`allocate`](Self::allocate) ran first.
    pub fn new() -> Self {
        Self {
            imp: active_implementation(),
            input_buf: AlignedBuf::with_capacity(0),
            input_end: 0,
            input_len: 0,
            byte_capacity: 0,
            user_allocated: false,
            structural_indexes: Vec::new(),
            tape: Vec::new(),
            string_buf: Vec::new(),
            containing_scope_offset: Vec::new(),
            ret_address: Vec::new(),
            stage1_state: Stage1State::new(),
            stage1_valid: false,
        }
    }

    /// Reserve workspace for documents up to `max_bytes` long and
    /// `max_depth` nesting levels deep.
    pub fn allocate(&mut self, max_bytes: usize, max_depth: usize) -> Result<()> {
        if max_bytes == 0 || max_depth == 0 {
            return Err(Error::generic(ErrorType::MemAlloc));
        }
        let input_buf = AlignedBuf::try_with_capacity(max_bytes + SIMDTAPE_PADDING)
            .ok_or_else(|| Error::generic(ErrorType::MemAlloc))?;

        let memalloc = |_| Error::generic(ErrorType::MemAlloc);
        let mut structural_indexes = Vec::new();
        structural_indexes
            .try_reserve_exact(max_bytes + 2)
            .map_err(memalloc)?;
        let mut tape = Vec::new();
        tape.try_reserve_exact(max_bytes + 8).map_err(memalloc)?;
        let mut string_buf = Vec::new();
        string_buf
            // a two-byte empty string becomes a six-byte arena record, so
            // 5/3 of the input plus one chunk of copy slack bounds it
            .try_reserve_exact(5 * max_bytes / 3 + 2 * SIMDTAPE_PADDING)
            .map_err(memalloc)?;

        // one extra slot for the root scope and one for the push that
        // reports the overflow
        let stack_slots = max_depth + 2;
        self.containing_scope_offset = vec![0; stack_slots];
        self.ret_address = vec![RetAddress::Finish; stack_slots];

        self.input_buf = input_buf;
        self.input_end = 0;
        self.input_len = 0;
        self.structural_indexes = structural_indexes;
        self.tape = tape;
        self.string_buf = string_buf;
        self.byte_capacity = max_bytes;
        self.user_allocated = true;
        self.stage1_valid = false;
        Ok(())
    }

    /// Parse one document: stage 1 then stage 2. The returned [`Tape`]
    /// borrows this parser and is invalidated by the next call.
    pub fn parse(&mut self, input: &[u8]) -> Result<Tape<'_>> {
        self.stage1(input, false)?;
        self.stage2()
    }

    /// Run structural indexing over `input` without building the tape.
    ///
    /// In streaming mode a batch that ends inside a string is not an
    /// error; the final cross-chunk carries stay observable via
    /// [`stage1_state`](Self::stage1_state).
    pub fn stage1(&mut self, input: &[u8], streaming: bool) -> Result<()> {
        self.stage1_valid = false;
        self.ensure_capacity(input.len())?;
        self.load_input(input);
        self.stage1_state = Stage1State::new();

        let buf = unsafe { self.input_buf.as_slice(self.input_end) };
        let res = match self.imp {
            #[cfg(target_arch = "x86_64")]
            Implementation::Avx2 => unsafe {
                find_structural_bits::<impls::avx2::SimdInput>(
                    buf,
                    self.input_len,
                    &mut self.structural_indexes,
                    &mut self.stage1_state,
                    streaming,
                )
            },
            Implementation::Native => unsafe {
                find_structural_bits::<impls::native::SimdInput>(
                    buf,
                    self.input_len,
                    &mut self.structural_indexes,
                    &mut self.stage1_state,
                    streaming,
                )
            },
        };
        res?;
        self.stage1_valid = true;
        Ok(())
    }

    /// Build the tape from a prior successful [`stage1`](Self::stage1).
    pub fn stage2(&mut self) -> Result<Tape<'_>> {
        let mut next_json = 0;
        self.run_stage2(0, false, &mut next_json)?;
        Ok(self.tape_view())
    }

    /// Iterate the top-level documents of a concatenated buffer lazily.
    /// `batch_size` bounds how much input each stage-1 sweep covers; it
    /// grows automatically when a single document does not fit.
    pub fn parse_many<'p, 'b>(
        &'p mut self,
        input: &'b [u8],
        batch_size: usize,
    ) -> DocumentStream<'p, 'b> {
        DocumentStream::new(self, input, batch_size)
    }

    /// The stage-1 cross-chunk carries after the last
    /// [`stage1`](Self::stage1) call.
    pub fn stage1_state(&self) -> Stage1State {
        self.stage1_state
    }

    /// Name of the stage-1 implementation this parser was constructed
    /// with.
    pub fn implementation_name(&self) -> &'static str {
        implementation_name()
    }

    fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        if len > u32::MAX as usize - 2 {
            // the index and tape formats address the input with 32 bits
            return Err(Error::generic(ErrorType::Capacity));
        }
        if self.byte_capacity == 0 {
            self.allocate(len.max(SIMDTAPE_PADDING), DEFAULT_MAX_DEPTH)?;
            self.user_allocated = false;
            return Ok(());
        }
        if len <= self.byte_capacity {
            return Ok(());
        }
        if self.user_allocated {
            return Err(Error::generic(ErrorType::Capacity));
        }
        self.allocate(len, DEFAULT_MAX_DEPTH)?;
        self.user_allocated = false;
        Ok(())
    }

    /// Copy `input` into the owned buffer and pad the tail with spaces.
    fn load_input(&mut self, input: &[u8]) {
        let len = input.len();
        debug_assert!(len + SIMDTAPE_PADDING <= self.input_buf.capacity());
        let dst = self.input_buf.as_mut_ptr();
        unsafe {
            std::ptr::copy_nonoverlapping(input.as_ptr(), dst, len);
            std::ptr::write_bytes(dst.add(len), b' ', SIMDTAPE_PADDING);
        }
        self.input_len = len;
        self.input_end = len + SIMDTAPE_PADDING;
    }

    /// Run the tape builder over the current structural indexes, starting
    /// at structural cursor `start`.
    pub(crate) fn run_stage2(
        &mut self,
        start: usize,
        streaming: bool,
        next_json: &mut usize,
    ) -> Result<bool> {
        if !self.stage1_valid {
            return Err(Error::generic(ErrorType::Uninitialized));
        }
        self.tape.clear();
        self.string_buf.clear();

        let buf = unsafe { self.input_buf.as_slice(self.input_end) };
        match self.imp {
            #[cfg(target_arch = "x86_64")]
            Implementation::Avx2 => build_tape::<impls::avx2::SimdInput>(
                buf,
                self.input_len,
                &self.structural_indexes,
                &mut self.tape,
                &mut self.string_buf,
                &mut self.containing_scope_offset,
                &mut self.ret_address,
                start,
                streaming,
                next_json,
            ),
            Implementation::Native => build_tape::<impls::native::SimdInput>(
                buf,
                self.input_len,
                &self.structural_indexes,
                &mut self.tape,
                &mut self.string_buf,
                &mut self.containing_scope_offset,
                &mut self.ret_address,
                start,
                streaming,
                next_json,
            ),
        }
    }

    pub(crate) fn tape_view(&self) -> Tape<'_> {
        Tape {
            tape: &self.tape,
            string_buf: &self.string_buf,
        }
    }
}
