//! Table-driven parser vectors: each case is a source document plus either
//! the expected root shape or the expected diagnostic.

use confdata::{ConfigData, Settings, parse_with_settings};
use serde::Deserialize;

#[derive(Deserialize)]
struct Case {
    description: String,
    source: String,
    #[serde(default)]
    flags: Vec<String>,
    /// Expected `Kind::name()` of the root on success.
    #[serde(default)]
    root: Option<String>,
    /// Expected `array_size`/`object_size` of the root, when aggregate.
    #[serde(default)]
    size: Option<u32>,
    /// Expected diagnostic on failure.
    #[serde(default)]
    error: Option<String>,
}

fn settings_from(flags: &[String]) -> Settings {
    let mut s = Settings::default();
    for flag in flags {
        match flag.as_str() {
            "unquoted_keys" => s.unquoted_keys = true,
            "c_comments" => s.c_comments = true,
            "implicit_root_object" => s.implicit_root_object = true,
            "optional_commas" => s.optional_commas = true,
            "equals_for_colon" => s.equals_for_colon = true,
            "python_multiline_strings" => s.python_multiline_strings = true,
            "skip_escape_sequences" => s.skip_escape_sequences = true,
            "allow_control_characters" => s.allow_control_characters = true,
            other => panic!("unknown flag {other}"),
        }
    }
    s
}

const VECTORS: &str = r#"[
  {"description": "null root", "source": "null", "root": "null"},
  {"description": "true root", "source": "true", "root": "true"},
  {"description": "number root", "source": "-17.5", "root": "number"},
  {"description": "string root", "source": "\"s\"", "root": "string"},
  {"description": "empty array", "source": "[]", "root": "array", "size": 0},
  {"description": "mixed array", "source": "[null, true, 3, \"x\"]", "root": "array", "size": 4},
  {"description": "object", "source": "{\"a\": 1, \"b\": 2}", "root": "object", "size": 2},
  {"description": "duplicate keys collapse", "source": "{\"a\": 1, \"a\": 2}", "root": "object", "size": 1},
  {"description": "truncated array", "source": "[1, 2", "error": "1: Expected `,`, saw `\\x00`"},
  {"description": "truncated object", "source": "{\"a\": 1", "error": "1: Expected `}`, saw `\\x00`"},
  {"description": "unterminated string", "source": "\"abc", "error": "1: Expected `\"`, saw `\\x00`"},
  {"description": "bad escape", "source": "\"\\q\"", "error": "1: Unexpected character `q`"},
  {"description": "bad unicode escape", "source": "\"\\u12g4\"", "error": "1: Unexpected character `g`"},
  {"description": "bareword root value is rejected", "source": "[a]", "flags": ["unquoted_keys"], "error": "1: Unexpected character `a`"},
  {"description": "sjson", "source": "speed = 10 // fast\nname = \"bot\"", "flags": ["unquoted_keys", "c_comments", "implicit_root_object", "optional_commas", "equals_for_colon"], "root": "object", "size": 2},
  {"description": "multiline string root", "source": "\"\"\"a\nb\"\"\"", "flags": ["python_multiline_strings"], "root": "string"},
  {"description": "comma only input", "source": ",", "flags": ["implicit_root_object", "optional_commas"], "root": "object", "size": 0}
]"#;

#[test]
fn vectors() {
    let cases: Vec<Case> = serde_json::from_str(VECTORS).expect("vector table must parse");
    for case in &cases {
        let settings = settings_from(&case.flags);
        let mut cd = ConfigData::new();
        let result = parse_with_settings(&case.source, &mut cd, &settings);

        match (&case.error, result) {
            (Some(expected), Err(err)) => {
                assert_eq!(&err.to_string(), expected, "{}", case.description);
            }
            (Some(expected), Ok(())) => {
                panic!("{}: expected error `{expected}`, saw success", case.description)
            }
            (None, Err(err)) => panic!("{}: unexpected error `{err}`", case.description),
            (None, Ok(())) => {
                let root = cd.root();
                let kind = case.root.as_deref().expect("success case needs a root kind");
                assert_eq!(root.kind().name(), kind, "{}", case.description);
                if let Some(size) = case.size {
                    let actual = match kind {
                        "array" => cd.array_size(root),
                        "object" => cd.object_size(root),
                        other => panic!("size check on non-aggregate {other}"),
                    };
                    assert_eq!(actual, size, "{}", case.description);
                }
            }
        }
    }
}
