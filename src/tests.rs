#![allow(clippy::unreadable_literal)]

use crate::tape::new_entry;
use crate::{ErrorType, Parser, TapeKind};

fn w(payload: u64, kind: u8) -> u64 {
    new_entry(payload, kind)
}

fn parse_words(input: &[u8]) -> Vec<u64> {
    let mut parser = Parser::new();
    let tape = parser.parse(input).expect("failed to parse");
    tape.words().to_vec()
}

fn parse_err(input: &[u8]) -> ErrorType {
    let mut parser = Parser::new();
    parser.parse(input).expect_err("expected failure").error_type()
}

#[test]
fn test_parser_moves_across_threads_between_parses() {
    // a parser owns its whole workspace, so it can migrate to another
    // thread between uses and keep producing identical tapes
    let mut parser = Parser::new();
    let before = parser.parse(br#"{"a":[1,2,3]}"#).unwrap().words().to_vec();
    let (words, parser) = std::thread::spawn(move || {
        let words = parser.parse(br#"{"a":[1,2,3]}"#).unwrap().words().to_vec();
        (words, parser)
    })
    .join()
    .unwrap();
    assert_eq!(before, words);
    // the workspace survives the round trip and stays reusable
    let mut parser = parser;
    assert!(parser.parse(b"[true]").is_ok());
}

#[test]
fn test_tape_object_simple() {
    assert_eq!(
        parse_words(br#"{"a":1,"b":2,"c":3}"#),
        [
            w(12, b'r'),
            w(11, b'{'),
            w(0, b'"'),
            w(0, b'l'),
            1,
            w(6, b'"'),
            w(0, b'l'),
            2,
            w(12, b'"'),
            w(0, b'l'),
            3,
            w(1, b'}'),
            w(0, b'r'),
        ]
    );
}

#[test]
fn test_tape_array_of_numbers() {
    assert_eq!(
        parse_words(b"[ 0, 1, -1, 1.1 ]"),
        [
            w(11, b'r'),
            w(10, b'['),
            w(0, b'l'),
            0,
            w(0, b'l'),
            1,
            w(0, b'l'),
            (-1_i64) as u64,
            w(0, b'd'),
            1.1_f64.to_bits(),
            w(1, b']'),
            w(0, b'r'),
        ]
    );
}

#[test]
fn test_tape_empty_containers() {
    assert_eq!(
        parse_words(b"[]"),
        [w(3, b'r'), w(2, b'['), w(1, b']'), w(0, b'r')]
    );
    assert_eq!(
        parse_words(b"{}"),
        [w(3, b'r'), w(2, b'{'), w(1, b'}'), w(0, b'r')]
    );
}

#[test]
fn test_tape_atoms() {
    assert_eq!(
        parse_words(b"[true,false,null]"),
        [
            w(6, b'r'),
            w(5, b'['),
            w(0, b't'),
            w(0, b'f'),
            w(0, b'n'),
            w(1, b']'),
            w(0, b'r'),
        ]
    );
}

#[test]
fn test_bare_scalar_documents() {
    assert_eq!(parse_words(b"42"), [w(3, b'r'), w(0, b'l'), 42, w(0, b'r')]);
    assert_eq!(parse_words(b"true"), [w(2, b'r'), w(0, b't'), w(0, b'r')]);
    let words = parse_words(br#""hi""#);
    assert_eq!(words, [w(2, b'r'), w(0, b'"'), w(0, b'r')]);
}

#[test]
fn test_string_arena_records() {
    let mut parser = Parser::new();
    let tape = parser.parse(br#"["ab","","c"]"#).unwrap();
    let (kind, payload) = tape.entry(2);
    assert_eq!(kind, TapeKind::String);
    assert_eq!(tape.get_string(payload), "ab");
    let (_, payload) = tape.entry(3);
    assert_eq!(tape.get_string(payload), "");
    let (_, payload) = tape.entry(4);
    assert_eq!(tape.get_string(payload), "c");
    // records are length-prefixed and NUL-terminated back to back
    assert_eq!(payload, (4 + 2 + 1) + (4 + 1) as u64);
}

#[test]
fn test_string_escapes() {
    let mut parser = Parser::new();
    let tape = parser
        .parse(r#"["a\nb","A","😀","\\\"/"]"#.as_bytes())
        .unwrap();
    let (_, p) = tape.entry(2);
    assert_eq!(tape.get_string(p), "a\nb");
    let (_, p) = tape.entry(3);
    assert_eq!(tape.get_string(p), "A");
    let (_, p) = tape.entry(4);
    assert_eq!(tape.get_string(p), "\u{1F600}");
    let (_, p) = tape.entry(5);
    assert_eq!(tape.get_string(p), "\\\"/");
}

#[test]
fn test_lone_surrogates_rejected() {
    assert_eq!(parse_err(br#"["\ud800"]"#), ErrorType::StringError);
    assert_eq!(parse_err(br#"["\udc00"]"#), ErrorType::StringError);
    assert_eq!(parse_err(br#"["\ud800A"]"#), ErrorType::StringError);
}

#[test]
fn test_integer_typing_boundaries() {
    assert_eq!(
        parse_words(b"9223372036854775807")[1..3],
        [w(0, b'l'), i64::MAX as u64]
    );
    assert_eq!(
        parse_words(b"9223372036854775808")[1..3],
        [w(0, b'u'), 1 << 63]
    );
    assert_eq!(
        parse_words(b"18446744073709551615")[1..3],
        [w(0, b'u'), u64::MAX]
    );
    assert_eq!(
        parse_words(b"-9223372036854775808")[1..3],
        [w(0, b'l'), i64::MIN as u64]
    );
    // one past either end of the 64-bit bands becomes a double
    assert_eq!(
        parse_words(b"18446744073709551616")[1..3],
        [w(0, b'd'), 18446744073709551616.0_f64.to_bits()]
    );
}

#[test]
fn test_float_range() {
    assert_eq!(
        parse_words(b"1e308")[1..3],
        [w(0, b'd'), 1e308_f64.to_bits()]
    );
    assert_eq!(parse_err(b"1e309"), ErrorType::NumberError);
    assert_eq!(parse_err(b"-1e309"), ErrorType::NumberError);
}

#[test]
fn test_deep_nesting_matched_pairs() {
    let mut input = Vec::new();
    input.extend(std::iter::repeat(b'[').take(1000));
    input.extend(std::iter::repeat(b']').take(1000));
    let mut parser = Parser::new();
    let tape = parser.parse(&input).unwrap();
    // every start references its end and vice-versa
    for i in 1..=1000 {
        let (kind, end) = tape.entry(i);
        assert_eq!(kind, TapeKind::StartArray);
        let (end_kind, back) = tape.entry(end as usize);
        assert_eq!(end_kind, TapeKind::EndArray);
        assert_eq!(back as usize, i);
    }
}

#[test]
fn test_depth_limit() {
    let nested = |depth: usize| {
        let mut input = Vec::new();
        input.extend(std::iter::repeat(b'[').take(depth));
        input.extend(std::iter::repeat(b']').take(depth));
        let mut parser = Parser::new();
        parser.allocate(input.len().max(64), 10).unwrap();
        parser.parse(&input).map(|t| t.len()).map_err(|e| e.error_type())
    };
    assert!(nested(10).is_ok());
    assert_eq!(nested(11), Err(ErrorType::DepthError));
}

#[test]
fn test_unclosed_containers() {
    assert_eq!(
        parse_err(b"[7,7,7,7,6,7,7,7,6,7,7,6,[7,7,7,7,6,7,7,7,6,7,7,6,7,7,7,7,7,7,6"),
        ErrorType::TapeError
    );
    assert_eq!(parse_err(b"["), ErrorType::TapeError);
    assert_eq!(parse_err(b"{"), ErrorType::TapeError);
    assert_eq!(parse_err(b"[1,2"), ErrorType::TapeError);
}

#[test]
fn test_error_classification() {
    assert_eq!(parse_err(b"[tru]"), ErrorType::TAtomError);
    assert_eq!(parse_err(b"[truex]"), ErrorType::TAtomError);
    assert_eq!(parse_err(b"[fals]"), ErrorType::FAtomError);
    assert_eq!(parse_err(b"[nul]"), ErrorType::NAtomError);
    assert_eq!(parse_err(b"[01]"), ErrorType::NumberError);
    assert_eq!(parse_err(b"[1.]"), ErrorType::NumberError);
    assert_eq!(parse_err(b"[1,]"), ErrorType::TapeError);
    assert_eq!(parse_err(b"{\"a\":1,}"), ErrorType::TapeError);
    assert_eq!(parse_err(b"{\"a\"}"), ErrorType::TapeError);
    // a stray scalar is classified by its first byte
    assert_eq!(parse_err(b"[1 2]"), ErrorType::NumberError);
}

#[test]
fn test_stage1_errors() {
    assert_eq!(parse_err(b"\"abc"), ErrorType::UnclosedString);
    assert_eq!(parse_err(b"[\"a\x01b\"]"), ErrorType::UnescapedChars);
    assert_eq!(parse_err(&[0xFF, 0xFE]), ErrorType::Utf8Error);
    assert_eq!(parse_err(b""), ErrorType::Empty);
    assert_eq!(parse_err(b"   "), ErrorType::Empty);
}

#[test]
fn test_utf8_content_passes() {
    let mut parser = Parser::new();
    let tape = parser.parse("[\"héllo\",\"\u{1F600}\"]".as_bytes()).unwrap();
    let (_, p) = tape.entry(2);
    assert_eq!(tape.get_string(p), "héllo");
}

#[test]
fn test_idempotent_reparse() {
    let mut parser = Parser::new();
    let first = parser.parse(br#"{"a":[1,2,3]}"#).unwrap().words().to_vec();
    let second = parser.parse(br#"{"a":[1,2,3]}"#).unwrap().words().to_vec();
    assert_eq!(first, second);
}

#[test]
fn test_parser_reusable_after_error() {
    let mut parser = Parser::new();
    assert!(parser.parse(b"[1,").is_err());
    assert!(parser.parse(b"[1,2]").is_ok());
}

#[test]
fn test_minify_round_trip() {
    let inputs: &[&[u8]] = &[
        br#"{"a":1,"b":[true,false,null],"c":"x\ny"}"#,
        br#"[ 0, 1, -1, 1.1 ]"#,
        br#"[1e308,2.2250738585072014e-308]"#,
        br#"{"nested":{"deep":[{"k":"v"}]}}"#,
    ];
    for input in inputs {
        let mut parser = Parser::new();
        let first = parser.parse(input).unwrap();
        let minified = first.minify();
        let first_words = first.words().to_vec();
        let mut reparser = Parser::new();
        let second = reparser.parse(minified.as_bytes()).unwrap();
        assert_eq!(first_words, second.words(), "diverged on {minified}");
    }
}

#[test]
fn test_structural_at_every_chunk_offset() {
    // slide a small document across two chunk boundaries; detection must
    // not depend on where a structural lands inside a chunk
    for lead in 0..130 {
        let mut input = vec![b' '; lead];
        input.extend_from_slice(br#"{"k":[1,"s"]}"#);
        let mut parser = Parser::new();
        let tape = parser.parse(&input).unwrap_or_else(|e| panic!("lead {lead}: {e}"));
        assert_eq!(tape.minify(), r#"{"k":[1,"s"]}"#, "lead {lead}");
    }
}

#[test]
fn test_padding_tolerance() {
    // bytes past the logical end must never leak into the parse
    let mut buf = Vec::new();
    buf.extend_from_slice(b"123");
    buf.extend_from_slice(b"456garbage\"[{");
    let mut parser = Parser::new();
    let tape = parser.parse(&buf[..3]).unwrap();
    assert_eq!(tape.words()[1..3], [w(0, b'l'), 123]);
}

#[test]
fn test_stage2_requires_stage1() {
    let mut parser = Parser::new();
    assert_eq!(
        parser.stage2().expect_err("no stage1 ran").error_type(),
        ErrorType::Uninitialized
    );
}

#[test]
fn test_capacity_limits() {
    let mut parser = Parser::new();
    parser.allocate(8, 4).unwrap();
    assert_eq!(
        parser.parse(b"[1,2,3,4,5]").expect_err("too big").error_type(),
        ErrorType::Capacity
    );
    assert_eq!(
        Parser::new().allocate(0, 0).expect_err("zero").error_type(),
        ErrorType::MemAlloc
    );
}

#[test]
fn test_error_code_names() {
    assert_eq!(ErrorType::TAtomError.to_string(), "t_atom_error");
    assert_eq!(ErrorType::UnescapedChars.to_string(), "unescaped_chars");
    assert_eq!(ErrorType::Capacity.to_string(), "capacity");
    assert_eq!(ErrorType::MemAlloc.to_string(), "memalloc");
    assert_eq!(ErrorType::NoSuchField.to_string(), "no_such_field");
    assert_eq!(
        ErrorType::UnsupportedArchitecture.to_string(),
        "unsupported_architecture"
    );
}

#[test]
fn test_implementation_name() {
    let name = crate::implementation_name();
    assert!(name == "avx2" || name == "native");
}

#[test]
fn test_parse_many_two_documents() {
    let input = br#"{"error":[],"result":{"token":"xxx"}}{"error":[],"result":{"token":"xxx"}}"#;
    let mut parser = Parser::new();
    let mut stream = parser.parse_many(input, 1_000_000);
    let mut docs = 0;
    while let Some(doc) = stream.next() {
        let tape = doc.expect("valid document");
        assert_eq!(tape.minify(), r#"{"error":[],"result":{"token":"xxx"}}"#);
        docs += 1;
    }
    assert_eq!(docs, 2);
}

#[test]
fn test_parse_many_small_batches() {
    // batch smaller than a document forces the growth path
    let input = br#"{"a":1} [2,3] "four" true 5 "#;
    let expected = [r#"{"a":1}"#, "[2,3]", r#""four""#, "true", "5"];
    let mut parser = Parser::new();
    let mut stream = parser.parse_many(input, 4);
    let mut seen = Vec::new();
    while let Some(doc) = stream.next() {
        seen.push(doc.expect("valid document").minify());
    }
    assert_eq!(seen, expected);
}

#[test]
fn test_parse_many_stops_on_error() {
    let input = br#"{"a":1}{"b":}"#;
    let mut parser = Parser::new();
    let mut stream = parser.parse_many(input, 1_000_000);
    assert!(stream.next().unwrap().is_ok());
    assert!(stream.next().unwrap().is_err());
    assert!(stream.next().is_none());
}
