//! RFC 8259 accept/reject conformance, in the style of the classic
//! `pass*.json` / `fail*.json` checker corpus. Fixtures are embedded so
//! the suite has no data-directory dependency.

use simd_tape::Parser;

fn accepts(input: &[u8]) -> bool {
    Parser::new().parse(input).is_ok()
}

#[test]
fn pass_corpus() {
    let cases: &[&[u8]] = &[
        br#"[1,2,3]"#,
        br#"{"a":1}"#,
        br#"[]"#,
        br#"{}"#,
        br#""lonely string""#,
        br#"42"#,
        br#"-0"#,
        br#"true"#,
        br#"false"#,
        br#"null"#,
        br#"[0e+1]"#,
        br#"[2e+00,2e-00]"#,
        br#"[1.234567890E+34,23456789012E66]"#,
        br#"[123.456e-789]"#,
        br#"[0.5,98.6,99.44,1066]"#,
        br#"{"integer":1234567890,"real":-9876.543210,"e":0.123456789e-12}"#,
        br#"["\u0041\u00e9\u20ac\ud83d\ude00"]"#,
        br#"["\"\\\/\b\f\n\r\t"]"#,
        br#"["\u0000"]"#,
        br#"{"":0}"#,
        br#"{"object with 1 member":["array with 1 element"]}"#,
        br#"[[[[[[[[[[[[[[[[[[["deep enough"]]]]]]]]]]]]]]]]]]]"#,
        br#" [ 1 , 2 , 3 ] "#,
        "[\"caf\u{e9}\"]".as_bytes(),
        b"\t[1]\n",
        br#"{"a":{"b":{"c":[null,true,false,"s",0.1]}}}"#,
    ];
    for (n, case) in cases.iter().enumerate() {
        assert!(
            accepts(case),
            "pass case {n} rejected: {}",
            String::from_utf8_lossy(case)
        );
    }
}

#[test]
fn fail_corpus() {
    let cases: &[&[u8]] = &[
        br#"["unclosed array""#,
        br#"{unquoted_key: 1}"#,
        br#"["extra comma",]"#,
        br#"["double extra comma",,]"#,
        br#"[   , "missing value"]"#,
        br#"["comma after close"],"#,
        br#"["extra close"]]"#,
        br#"{"extra comma": 1,}"#,
        br#"{"misplaced quoted value": "here" "and here"}"#,
        br#"{"illegal expression": 1 + 2}"#,
        br#"{"illegal invocation": alert()}"#,
        br#"{"numbers cannot have leading zeroes": 013}"#,
        br#"{"numbers cannot be hex": 0x14}"#,
        br#"["illegal backslash escape: \x15"]"#,
        br#"[\naked]"#,
        br#"[1 2]"#,
        br#"{"missing colon" null}"#,
        br#"{"double colon":: null}"#,
        br#"{"comma instead of colon", null}"#,
        br#"["colon instead of comma": false]"#,
        br#"["bad atom", truth]"#,
        br#"['single quotes']"#,
        br#"["line
break"]"#,
        br#"[0e]"#,
        br#"[0e+]"#,
        br#"[1e+-2]"#,
        br#"[.5]"#,
        br#"[-.5]"#,
        br#"[+1]"#,
        br#"[1.]"#,
        br#"{"a":1} trailing"#,
        br#"{"a""#,
        br#"["mismatch"}"#,
        br#"[{"no close"]"#,
        b"[\"raw\ttab\"]",
        b"",
        b"   ",
        b"[1e309]",
        b"[\"lone surrogate\",\"\\ud800\"]",
        &[0xC0, 0xAF],
        b"[\"bad utf8 \xed\xa0\x80\"]",
    ];
    for (n, case) in cases.iter().enumerate() {
        assert!(
            !accepts(case),
            "fail case {n} accepted: {}",
            String::from_utf8_lossy(case)
        );
    }
}

#[test]
fn pass_kitchen_sink() {
    let doc = br#"{
        "glossary": {
            "title": "example glossary",
            "GlossDiv": {
                "title": "S",
                "GlossList": {
                    "GlossEntry": {
                        "ID": "SGML",
                        "SortAs": "SGML",
                        "GlossTerm": "Standard Generalized Markup Language",
                        "Acronym": "SGML",
                        "Abbrev": "ISO 8879:1986",
                        "GlossDef": {
                            "para": "A meta-markup language.",
                            "GlossSeeAlso": ["GML", "XML"]
                        },
                        "GlossSee": "markup",
                        "ratio": 0.25,
                        "count": 79,
                        "negative": -17
                    }
                }
            }
        }
    }"#;
    let mut parser = Parser::new();
    let tape = parser.parse(doc).expect("kitchen sink parses");
    // round-trip: minified output reparses to the identical tape
    let minified = tape.minify();
    let words = tape.words().to_vec();
    let mut reparser = Parser::new();
    let tape2 = reparser.parse(minified.as_bytes()).expect("minified parses");
    assert_eq!(words, tape2.words());
}
