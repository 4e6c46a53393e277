//! Stage 2: the tape builder.
//!
//! A depth-tracked state machine walks the structural index sequence,
//! decodes scalars at the value-dispatch sites, and verifies that the
//! structural characters form a well-nested document. Scope bookkeeping
//! lives in the `containing_scope_offset`/`ret_address` stacks; container
//! start entries are backpatched with their end's tape index when the
//! scope closes.

use crate::charutils::is_structural_or_whitespace;
use crate::error::{Error, ErrorType, Result};
use crate::numberparse::{parse_number, Number};
use crate::safer_unchecked::GetSaferUnchecked;
use crate::stage1::Stage1Parse;
use crate::stringparse::parse_string;
use crate::tape::new_entry;

macro_rules! get {
    ($a:expr, $i:expr) => {{ unsafe { *$a.get_kinda_unchecked($i) } }};
}

/// Continuation recorded for each open scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetAddress {
    ObjectContinue,
    ArrayContinue,
    Finish,
}

#[derive(Debug)]
enum State {
    ObjectBegin,
    ObjectKey,
    ObjectContinue,
    ArrayBegin,
    MainArraySwitch,
    ArrayContinue,
    ScopeEnd,
    Finish,
}

#[cfg_attr(not(feature = "no-inline"), inline)]
fn is_valid_true_atom(loc: &[u8]) -> bool {
    loc[..4] == *b"true" && is_structural_or_whitespace(loc[4]) == 1
}

#[cfg_attr(not(feature = "no-inline"), inline)]
fn is_valid_false_atom(loc: &[u8]) -> bool {
    loc[..5] == *b"false" && is_structural_or_whitespace(loc[5]) == 1
}

#[cfg_attr(not(feature = "no-inline"), inline)]
fn is_valid_null_atom(loc: &[u8]) -> bool {
    loc[..4] == *b"null" && is_structural_or_whitespace(loc[4]) == 1
}

#[cold]
fn classify_error(idx: usize, c: u8) -> Error {
    let ty = match c {
        b'"' => ErrorType::StringError,
        b'0'..=b'9' | b'-' => ErrorType::NumberError,
        b't' => ErrorType::TAtomError,
        b'f' => ErrorType::FAtomError,
        b'n' => ErrorType::NAtomError,
        _ => ErrorType::TapeError,
    };
    Error::new_c(idx, c as char, ty)
}

/// Walk the structural indexes starting at cursor `start` and build one
/// document's tape. `input` is the padded buffer, `len` the logical
/// document length.
///
/// In streaming mode the document need not consume the whole index
/// sequence; `next_json` receives the cursor of the first unconsumed
/// structural and the return value says whether any are left before the
/// sentinel. Non-streaming parses must end exactly on the sentinel.
#[allow(
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::cast_possible_truncation
)]
pub(crate) fn build_tape<S: Stage1Parse>(
    input: &[u8],
    len: usize,
    structural_indexes: &[u32],
    tape: &mut Vec<u64>,
    string_buf: &mut Vec<u8>,
    containing_scope_offset: &mut [u32],
    ret_address: &mut [RetAddress],
    start: usize,
    streaming: bool,
    next_json: &mut usize,
) -> Result<bool> {
    let depth_capacity = containing_scope_offset.len();

    // Cursor into `structural_indexes`.
    let mut i: usize = start;
    // Byte offset of the structural currently being handled.
    let mut idx: usize;
    // The structural byte itself.
    let mut c: u8;
    // Current nesting level; the root scope occupies level 0, so this is 1
    // once the root scope below is pushed.
    let mut depth: usize = 1;

    let mut state;

    macro_rules! fail {
        () => {
            return Err(classify_error(idx, c))
        };
        ($t:expr) => {
            return Err(Error::new_c(idx, c as char, $t))
        };
    }

    macro_rules! update_char {
        () => {
            if likely!(i < structural_indexes.len()) {
                idx = get!(structural_indexes, i) as usize;
                i += 1;
                c = get!(input, idx);
            } else {
                return Err(Error::generic(ErrorType::TapeError));
            }
        };
    }

    macro_rules! goto {
        ($state:expr) => {{
            state = $state;
            continue;
        }};
    }

    macro_rules! write_tape {
        ($val:expr, $kind:expr) => {
            tape.push(new_entry($val, $kind))
        };
    }

    // Record the current tape offset and the continuation, write the
    // placeholder start entry, and descend.
    macro_rules! push_scope {
        ($ret:expr) => {{
            containing_scope_offset[depth] = tape.len() as u32;
            ret_address[depth] = $ret;
            write_tape!(0, c);
            depth += 1;
            if unlikely!(depth >= depth_capacity) {
                fail!(ErrorType::DepthError);
            }
        }};
    }

    macro_rules! emit_string {
        () => {{
            let offset = unsafe { parse_string::<S>(input, len, idx, string_buf)? };
            write_tape!(offset, b'"');
        }};
    }

    macro_rules! emit_number {
        () => {{
            match parse_number(input, idx, c == b'-')? {
                Number::I64(n) => {
                    write_tape!(0, b'l');
                    tape.push(n as u64);
                }
                Number::U64(n) => {
                    write_tape!(0, b'u');
                    tape.push(n);
                }
                Number::F64(n) => {
                    write_tape!(0, b'd');
                    tape.push(n.to_bits());
                }
            }
        }};
    }

    macro_rules! emit_atom {
        () => {{
            match c {
                b't' => {
                    if !is_valid_true_atom(unsafe { input.get_kinda_unchecked(idx..) }) {
                        fail!(ErrorType::TAtomError);
                    }
                }
                b'f' => {
                    if !is_valid_false_atom(unsafe { input.get_kinda_unchecked(idx..) }) {
                        fail!(ErrorType::FAtomError);
                    }
                }
                _ => {
                    if !is_valid_null_atom(unsafe { input.get_kinda_unchecked(idx..) }) {
                        fail!(ErrorType::NAtomError);
                    }
                }
            }
            write_tape!(0, c);
        }};
    }

    // The common value dispatcher: scalars emit and continue at the
    // caller's return state, containers open a new scope.
    macro_rules! parse_value {
        ($ret:expr, $cont:expr) => {{
            match c {
                b'"' => {
                    emit_string!();
                    goto!($cont);
                }
                b't' | b'f' | b'n' => {
                    emit_atom!();
                    goto!($cont);
                }
                b'0'..=b'9' | b'-' => {
                    emit_number!();
                    goto!($cont);
                }
                b'{' => {
                    push_scope!($ret);
                    goto!(State::ObjectBegin);
                }
                b'[' => {
                    push_scope!($ret);
                    goto!(State::ArrayBegin);
                }
                _ => fail!(),
            }
        }};
    }

    if unlikely!(structural_indexes.len() < 2) {
        return Err(Error::generic(ErrorType::Empty));
    }

    update_char!();

    // push the root scope; there is always at least one scope
    let root_offset = tape.len();
    containing_scope_offset[0] = root_offset as u32;
    ret_address[0] = RetAddress::Finish;
    write_tape!(0, b'r');

    // the first structural dispatches the root value
    match c {
        b'{' => {
            push_scope!(RetAddress::Finish);
            state = State::ObjectBegin;
        }
        b'[' => {
            push_scope!(RetAddress::Finish);
            state = State::ArrayBegin;
        }
        b'"' => {
            emit_string!();
            state = State::Finish;
        }
        b't' | b'f' | b'n' => {
            emit_atom!();
            state = State::Finish;
        }
        b'0'..=b'9' | b'-' => {
            emit_number!();
            state = State::Finish;
        }
        _ => fail!(),
    }

    loop {
        match state {
            State::ObjectBegin => {
                update_char!();
                match c {
                    b'"' => {
                        emit_string!();
                        goto!(State::ObjectKey);
                    }
                    b'}' => goto!(State::ScopeEnd),
                    _ => fail!(),
                }
            }

            State::ObjectKey => {
                update_char!();
                if unlikely!(c != b':') {
                    fail!();
                }
                update_char!();
                parse_value!(RetAddress::ObjectContinue, State::ObjectContinue);
            }

            State::ObjectContinue => {
                update_char!();
                match c {
                    b',' => {
                        update_char!();
                        if unlikely!(c != b'"') {
                            fail!();
                        }
                        emit_string!();
                        goto!(State::ObjectKey);
                    }
                    b'}' => goto!(State::ScopeEnd),
                    _ => fail!(),
                }
            }

            State::ArrayBegin => {
                update_char!();
                if c == b']' {
                    goto!(State::ScopeEnd);
                }
                goto!(State::MainArraySwitch);
            }

            State::MainArraySwitch => {
                // update_char ran on every path in, so c is the value start
                parse_value!(RetAddress::ArrayContinue, State::ArrayContinue);
            }

            State::ArrayContinue => {
                update_char!();
                match c {
                    b',' => {
                        update_char!();
                        goto!(State::MainArraySwitch);
                    }
                    b']' => goto!(State::ScopeEnd),
                    _ => fail!(),
                }
            }

            State::ScopeEnd => {
                // write the end entry and backpatch the start with it
                depth -= 1;
                let scope_start = containing_scope_offset[depth];
                let end_offset = tape.len() as u64;
                write_tape!(u64::from(scope_start), c);
                tape[scope_start as usize] |= end_offset;
                match ret_address[depth] {
                    RetAddress::ObjectContinue => goto!(State::ObjectContinue),
                    RetAddress::ArrayContinue => goto!(State::ArrayContinue),
                    RetAddress::Finish => goto!(State::Finish),
                }
            }

            State::Finish => {
                if !streaming && i + 1 != structural_indexes.len() {
                    // everything after the root value must be the sentinel
                    if i < structural_indexes.len() {
                        idx = get!(structural_indexes, i) as usize;
                        c = get!(input, idx);
                        fail!(ErrorType::TapeError);
                    }
                    return Err(Error::generic(ErrorType::TapeError));
                }
                depth -= 1;
                if unlikely!(depth != 0) {
                    return Err(Error::generic(ErrorType::TapeError));
                }
                // the root pair references itself across the whole tape
                let end_offset = tape.len() as u64;
                tape[root_offset] |= end_offset;
                write_tape!(root_offset as u64, b'r');

                *next_json = i;
                return Ok(i + 1 < structural_indexes.len());
            }
        }
    }
}
