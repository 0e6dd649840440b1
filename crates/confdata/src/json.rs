//! JSON parsing into a [`ConfigData`].
//!
//! [`parse`] accepts strict JSON. [`parse_with_settings`] additionally
//! understands a family of relaxed dialects controlled by [`Settings`],
//! covering the usual human-friendly configuration forms:
//!
//! ```text
//! // Comment
//! name = "Amy"
//! age = 30
//! ```
//!
//! The parser is a plain recursive descent over bytes; structure lives in
//! the call stack and errors propagate as [`ParseError`] values from any
//! depth. Each diagnostic carries the 1-based line it was detected on.

use crate::config_data::ConfigData;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::loc::Loc;

/// Dialect switches for [`parse_with_settings`].
///
/// The default value (all flags off) is strict JSON. Each flag
/// independently relaxes one rule:
///
/// * `unquoted_keys` — object keys may be barewords made of `a-z`, `A-Z`,
///   `0-9`, `_` and `-`: `{a: 10, b: 20}`.
/// * `c_comments` — `// line` and `/* block */` comments are whitespace.
/// * `implicit_root_object` — input that does not start with `{` is parsed
///   as a member list and wrapped in an object: `a: 10, b: 20`. Empty
///   input yields an empty object.
/// * `optional_commas` — separators between members and elements may be
///   omitted; stray commas are treated as whitespace.
/// * `equals_for_colon` — `=` is accepted in place of `:`: `a = 10`.
/// * `python_multiline_strings` — `"""raw text"""` strings. The content is
///   taken verbatim (no escapes); the only thing that cannot appear inside
///   is the closing `"""`.
/// * `skip_escape_sequences` — `\` inside strings is a literal character.
/// * `allow_control_characters` — bytes below 0x20 are allowed verbatim
///   inside strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    pub unquoted_keys: bool,
    pub c_comments: bool,
    pub implicit_root_object: bool,
    pub optional_commas: bool,
    pub equals_for_colon: bool,
    pub python_multiline_strings: bool,
    pub skip_escape_sequences: bool,
    pub allow_control_characters: bool,
}

/// Parse strict JSON from `s` into `cd` and set the root to the result.
///
/// # Errors
///
/// Returns a [`ParseError`] on malformed input. On error the root is set
/// to an empty object so later reads never see a stale root.
pub fn parse(s: &str, cd: &mut ConfigData) -> ParseResult<()> {
    parse_with_settings(s, cd, &Settings::default())
}

/// As [`parse`], with dialect relaxations from `settings`.
///
/// # Errors
///
/// Returns a [`ParseError`] on malformed input. On error the root is set
/// to an empty object so later reads never see a stale root.
pub fn parse_with_settings(s: &str, cd: &mut ConfigData, settings: &Settings) -> ParseResult<()> {
    let mut p = Parser {
        src: s.as_bytes(),
        pos: 0,
        line: 1,
        cd,
        settings,
    };
    match p.run() {
        Ok(()) => Ok(()),
        Err(e) => {
            let empty = p.cd.add_object(0);
            p.cd.set_root(empty);
            Err(e)
        }
    }
}

struct Parser<'a, 'c> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    cd: &'c mut ConfigData,
    settings: &'a Settings,
}

impl Parser<'_, '_> {
    fn run(&mut self) -> ParseResult<()> {
        self.skip_whitespace()?;
        let root = if self.settings.implicit_root_object && self.peek(0) != b'{' {
            if self.peek(0) == 0 {
                self.cd.add_object(0)
            } else {
                self.parse_members()?
            }
        } else {
            self.parse_value()?
        };
        self.skip_whitespace()?;
        if self.peek(0) != 0 {
            return Err(self.unexpected(self.peek(0)));
        }
        self.cd.set_root(root);
        Ok(())
    }

    /// Byte at `pos + ahead`, or 0 past the end of input.
    #[inline]
    fn peek(&self, ahead: usize) -> u8 {
        self.src.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            kind,
        }
    }

    fn unexpected(&self, saw: u8) -> ParseError {
        self.err(ParseErrorKind::UnexpectedCharacter(saw as char))
    }

    /// Consume `expected` or fail with a positioned diagnostic.
    fn skip_char(&mut self, expected: char) -> ParseResult<()> {
        let saw = self.peek(0);
        if saw != expected as u8 {
            let kind = if saw >= 32 {
                ParseErrorKind::Expected {
                    expected,
                    saw: saw as char,
                }
            } else {
                ParseErrorKind::ExpectedControl { expected, saw }
            };
            return Err(self.err(kind));
        }
        self.pos += 1;
        Ok(())
    }

    /// Skip whitespace, plus comments under `c_comments` and stray commas
    /// under `optional_commas`. Counts lines.
    fn skip_whitespace(&mut self) -> ParseResult<()> {
        loop {
            let c = self.peek(0);
            if !(c.is_ascii_whitespace() || c == b'/' || c == b',') {
                return Ok(());
            }
            if c == b'\n' {
                self.line += 1;
                self.pos += 1;
            } else if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'/' && self.settings.c_comments {
                if self.peek(1) == b'/' {
                    while self.peek(0) != 0 && self.peek(0) != b'\n' {
                        self.pos += 1;
                    }
                    self.line += 1;
                    self.pos += 1;
                } else if self.peek(1) == b'*' {
                    self.pos += 2;
                    while self.peek(0) != 0 && !(self.peek(0) == b'*' && self.peek(1) == b'/') {
                        if self.peek(0) == b'\n' {
                            self.line += 1;
                        }
                        self.pos += 1;
                    }
                    self.skip_char('*')?;
                    self.skip_char('/')?;
                } else {
                    return Ok(());
                }
            } else if c == b',' && self.settings.optional_commas {
                self.pos += 1;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self) -> ParseResult<Loc> {
        match self.peek(0) {
            b'"' => self.parse_string(),
            b'0'..=b'9' | b'-' => self.parse_number(),
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            b't' => self.parse_true(),
            b'f' => self.parse_false(),
            b'n' => self.parse_null(),
            c => Err(self.unexpected(c)),
        }
    }

    fn parse_true(&mut self) -> ParseResult<Loc> {
        for c in ['t', 'r', 'u', 'e'] {
            self.skip_char(c)?;
        }
        Ok(Loc::TRUE)
    }

    fn parse_false(&mut self) -> ParseResult<Loc> {
        for c in ['f', 'a', 'l', 's', 'e'] {
            self.skip_char(c)?;
        }
        Ok(Loc::FALSE)
    }

    fn parse_null(&mut self) -> ParseResult<Loc> {
        for c in ['n', 'u', 'l', 'l'] {
            self.skip_char(c)?;
        }
        Ok(Loc::NULL)
    }

    fn parse_string(&mut self) -> ParseResult<Loc> {
        let mut buf: Vec<u8> = Vec::new();
        self.skip_char('"')?;

        if self.settings.python_multiline_strings && self.peek(0) == b'"' && self.peek(1) == b'"' {
            self.pos += 2;
            // The string runs to the first `"""` whose fourth character is
            // not another quote; surplus quotes belong to the content.
            while self.peek(0) != 0
                && self.peek(1) != 0
                && self.peek(2) != 0
                && !(self.peek(0) == b'"'
                    && self.peek(1) == b'"'
                    && self.peek(2) == b'"'
                    && self.peek(3) != b'"')
            {
                buf.push(self.peek(0));
                self.pos += 1;
            }
            self.skip_char('"')?;
            self.skip_char('"')?;
            self.skip_char('"')?;
            let s = String::from_utf8_lossy(&buf);
            return Ok(self.cd.add_string(&s));
        }

        loop {
            let c = self.peek(0);
            if c == 0 || c == b'"' {
                break;
            } else if !self.settings.allow_control_characters && c < 32 {
                return Err(self.err(ParseErrorKind::LiteralControlCharacter));
            } else if !self.settings.skip_escape_sequences && c == b'\\' {
                self.pos += 1;
                let esc = self.peek(0);
                self.pos += 1;
                match esc {
                    b'"' | b'\\' | b'/' => buf.push(esc),
                    b'b' => buf.push(0x08),
                    b'f' => buf.push(0x0c),
                    b'n' => buf.push(b'\n'),
                    b'r' => buf.push(b'\r'),
                    b't' => buf.push(b'\t'),
                    b'u' => self.push_unicode_escape(&mut buf)?,
                    _ => return Err(self.unexpected(esc)),
                }
            } else {
                buf.push(c);
                self.pos += 1;
            }
        }

        self.skip_char('"')?;
        let s = String::from_utf8_lossy(&buf);
        Ok(self.cd.add_string(&s))
    }

    /// Parse the `XXXX` of a `\uXXXX` escape.
    fn parse_codepoint(&mut self) -> ParseResult<u32> {
        let mut codepoint = 0u32;
        for _ in 0..4 {
            let c = self.peek(0);
            let digit = match c {
                b'0'..=b'9' => u32::from(c - b'0'),
                b'a'..=b'f' => u32::from(c - b'a') + 10,
                b'A'..=b'F' => u32::from(c - b'A') + 10,
                _ => return Err(self.unexpected(c)),
            };
            codepoint = (codepoint << 4) | digit;
            self.pos += 1;
        }
        Ok(codepoint)
    }

    /// Decode a `\u` escape (combining a surrogate pair when present) and
    /// append its UTF-8 bytes.
    fn push_unicode_escape(&mut self, buf: &mut Vec<u8>) -> ParseResult<()> {
        let mut codepoint = self.parse_codepoint()?;
        if (0xd800..=0xdbff).contains(&codepoint) {
            if self.peek(0) == b'\\' && self.peek(1) == b'u' {
                self.pos += 2;
                let low = self.parse_codepoint()?;
                if !(0xdc00..=0xdfff).contains(&low) {
                    return Err(self.err(ParseErrorKind::NotUtf8Codepoint(low)));
                }
                codepoint = 0x10000 + ((codepoint - 0xd800) << 10) + (low - 0xdc00);
            } else {
                return Err(self.err(ParseErrorKind::NotUtf8Codepoint(codepoint)));
            }
        }
        let Some(ch) = char::from_u32(codepoint) else {
            return Err(self.err(ParseErrorKind::NotUtf8Codepoint(codepoint)));
        };
        let mut utf8 = [0u8; 4];
        buf.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    /// Parse a number with the integer-scaling scheme: the integer, fraction
    /// and exponent parts are accumulated separately and combined at the
    /// end. Accurate to a few ULP for configuration-sized literals; not a
    /// shortest-roundtrip float parser.
    fn parse_number(&mut self) -> ParseResult<Loc> {
        let mut sign = 1.0f64;
        if self.peek(0) == b'-' {
            sign = -1.0;
            self.pos += 1;
        }

        let mut int_part = 0.0f64;
        match self.peek(0) {
            b'0' => self.pos += 1,
            b'1'..=b'9' => {
                while let d @ b'0'..=b'9' = self.peek(0) {
                    int_part = 10.0 * int_part + f64::from(d - b'0');
                    self.pos += 1;
                }
            }
            _ => return Err(self.err(ParseErrorKind::BadNumberFormat)),
        }

        let mut frac_part = 0.0f64;
        let mut frac_divisor = 1.0f64;
        if self.peek(0) == b'.' {
            self.pos += 1;
            if !self.peek(0).is_ascii_digit() {
                return Err(self.err(ParseErrorKind::BadNumberFormat));
            }
            while let d @ b'0'..=b'9' = self.peek(0) {
                frac_part = 10.0 * frac_part + f64::from(d - b'0');
                frac_divisor *= 10.0;
                self.pos += 1;
            }
        }

        let mut exp_sign = 1i32;
        let mut exp = 0i32;
        if self.peek(0) == b'e' || self.peek(0) == b'E' {
            self.pos += 1;
            if self.peek(0) == b'+' {
                self.pos += 1;
            } else if self.peek(0) == b'-' {
                exp_sign = -1;
                self.pos += 1;
            }
            if !self.peek(0).is_ascii_digit() {
                return Err(self.err(ParseErrorKind::BadNumberFormat));
            }
            while let d @ b'0'..=b'9' = self.peek(0) {
                exp = exp.saturating_mul(10).saturating_add(i32::from(d - b'0'));
                self.pos += 1;
            }
        }

        let value = sign * (int_part + frac_part / frac_divisor)
            * 10.0f64.powi(exp_sign.saturating_mul(exp));
        Ok(self.cd.add_number(value))
    }

    fn parse_object(&mut self) -> ParseResult<Loc> {
        self.skip_char('{')?;
        self.skip_whitespace()?;
        let object = if self.peek(0) == b'}' {
            self.cd.add_object(0)
        } else {
            self.parse_members()?
        };
        self.skip_char('}')?;
        Ok(object)
    }

    fn parse_members(&mut self) -> ParseResult<Loc> {
        let mut members: Vec<(Loc, Loc)> = Vec::new();

        loop {
            let key = self.parse_key()?;
            self.skip_whitespace()?;
            if self.settings.equals_for_colon && self.peek(0) == b'=' {
                self.skip_char('=')?;
            } else {
                self.skip_char(':')?;
            }
            self.skip_whitespace()?;
            let value = self.parse_value()?;
            members.push((key, value));
            self.skip_whitespace()?;
            if self.peek(0) == b'}' || self.peek(0) == 0 {
                break;
            }
            if !self.settings.optional_commas {
                self.skip_char(',')?;
            }
            self.skip_whitespace()?;
        }

        let object = self.cd.add_object(members.len() as u32);
        for (key, value) in members {
            self.cd.set_loc(object, key, value);
        }
        Ok(object)
    }

    fn parse_key(&mut self) -> ParseResult<Loc> {
        self.skip_whitespace()?;
        if self.settings.unquoted_keys && is_bareword(self.peek(0)) {
            let start = self.pos;
            while is_bareword(self.peek(0)) {
                self.pos += 1;
            }
            let word = String::from_utf8_lossy(&self.src[start..self.pos]);
            return Ok(self.cd.add_string(&word));
        }
        self.parse_string()
    }

    fn parse_array(&mut self) -> ParseResult<Loc> {
        self.skip_char('[')?;
        self.skip_whitespace()?;
        if self.peek(0) == b']' {
            self.skip_char(']')?;
            return Ok(self.cd.add_array(0));
        }
        self.parse_elements()
    }

    fn parse_elements(&mut self) -> ParseResult<Loc> {
        let mut elements: Vec<Loc> = Vec::new();

        loop {
            self.skip_whitespace()?;
            let element = self.parse_value()?;
            elements.push(element);
            self.skip_whitespace()?;
            if self.peek(0) == b']' {
                break;
            }
            if !self.settings.optional_commas {
                self.skip_char(',')?;
            }
        }
        self.skip_char(']')?;

        let array = self.cd.add_array(elements.len() as u32);
        for element in elements {
            self.cd.push(array, element);
        }
        Ok(array)
    }
}

/// Characters allowed in an unquoted key.
fn is_bareword(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::Kind;

    fn roundtrip(src: &str) -> ConfigData {
        let mut cd = ConfigData::new();
        parse(src, &mut cd).unwrap();
        cd
    }

    #[test]
    fn scalars() {
        assert!(roundtrip("null").root().is_null());
        assert_eq!(roundtrip("true").root(), Loc::TRUE);
        assert_eq!(roundtrip("false").root(), Loc::FALSE);

        let cd = roundtrip("  42 ");
        assert!((cd.to_number(cd.root()) - 42.0).abs() < 1e-12);

        let cd = roundtrip(r#""hello""#);
        assert_eq!(cd.to_string(cd.root()), "hello");
    }

    #[test]
    fn nested_structure() {
        let cd = roundtrip(r#"{"values": [1, {"deep": true}], "n": 2}"#);
        let root = cd.root();
        assert_eq!(root.kind(), Kind::Object);
        assert_eq!(cd.object_size(root), 2);

        let values = cd.object_lookup(root, "values");
        assert_eq!(cd.array_size(values), 2);
        let deep = cd.object_lookup(cd.array_item(values, 1), "deep");
        assert_eq!(deep, Loc::TRUE);
    }

    #[test]
    fn duplicate_keys_overwrite() {
        let cd = roundtrip(r#"{"k": 1, "k": 2}"#);
        let root = cd.root();
        assert_eq!(cd.object_size(root), 1);
        assert!((cd.to_number(cd.object_lookup(root, "k")) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn error_sets_empty_object_root() {
        let mut cd = ConfigData::new();
        let n = cd.add_number(9.0);
        cd.set_root(n);
        assert!(parse("{invalid", &mut cd).is_err());
        let root = cd.root();
        assert_eq!(root.kind(), Kind::Object);
        assert_eq!(cd.object_size(root), 0);
    }

    #[test]
    fn surrogate_pair_combines() {
        // U+1F600 escaped as a surrogate pair must produce one 4-byte scalar.
        let cd = roundtrip(r#""\ud83d\ude00""#);
        assert_eq!(cd.to_string(cd.root()), "\u{1f600}");
        assert_eq!(cd.to_string(cd.root()).len(), 4);
    }

    #[test]
    fn lone_surrogate_is_rejected() {
        let mut cd = ConfigData::new();
        let err = parse(r#""\ud83d oops""#, &mut cd).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NotUtf8Codepoint(0xd83d));
    }

    #[test]
    fn sjson_flavor() {
        let settings = Settings {
            unquoted_keys: true,
            c_comments: true,
            implicit_root_object: true,
            optional_commas: true,
            equals_for_colon: true,
            ..Settings::default()
        };
        let mut cd = ConfigData::new();
        parse_with_settings("// c\nname = \"Amy\" age = 30", &mut cd, &settings).unwrap();
        let root = cd.root();
        assert_eq!(cd.to_string(cd.object_lookup(root, "name")), "Amy");
        assert!((cd.to_number(cd.object_lookup(root, "age")) - 30.0).abs() < 1e-12);
    }
}
