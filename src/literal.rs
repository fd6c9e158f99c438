//! Strict codec for the record literal grammar.
//!
//! Stored records are small Python-style literals: one-level mappings of
//! string keys to string/integer/`None` values, bare integers, and quoted
//! strings. This module parses exactly that grammar and nothing more — it
//! is a replacement for the `eval`-based decoding the store originally
//! relied on, so a malformed record becomes a typed error instead of
//! arbitrary code execution.
//!
//! # Example
//!
//! ```
//! use wifi_station_esp32::literal::{parse, Literal};
//!
//! let value = parse("{'home': 'pw1'}").unwrap();
//! assert!(matches!(value, Literal::Map(_)));
//! ```

use std::fmt;

/// A value in the record literal grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Quoted string.
    Str(String),
    /// Decimal integer.
    Int(i64),
    /// The `None` keyword (absent value).
    None,
    /// One-level mapping. Entries keep their source order; keys are unique.
    Map(Vec<(String, Literal)>),
}

impl Literal {
    /// Encode in the single-quoted form records are stored in.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut String) {
        match self {
            Self::Str(s) => encode_str(s, out),
            Self::Int(n) => out.push_str(&n.to_string()),
            Self::None => out.push_str("None"),
            Self::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    encode_str(key, out);
                    out.push_str(": ");
                    value.encode_into(out);
                }
                out.push('}');
            }
        }
    }

    /// Look up a mapping entry by key. Returns `None` for non-mappings too.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn encode_str(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
}

/// Parse one complete literal. Trailing input (other than whitespace) is an
/// error: a record is exactly one literal.
pub fn parse(input: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_whitespace();
    let value = parser.parse_value(true)?;
    parser.skip_whitespace();
    if let Some((pos, _)) = parser.peek() {
        return Err(LiteralError::TrailingInput { pos });
    }
    Ok(value)
}

/// Errors produced while parsing a record literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    /// Input ended inside a literal.
    UnexpectedEnd,
    /// A character that does not start or continue the expected token.
    Unexpected { pos: usize, found: char },
    /// Unsupported escape sequence inside a quoted string.
    InvalidEscape { pos: usize, found: char },
    /// Integer out of range for `i64`.
    IntOutOfRange { pos: usize },
    /// Mapping contains the same key twice.
    DuplicateKey(String),
    /// Mappings cannot nest in this grammar.
    NestedMap { pos: usize },
    /// A complete literal was followed by more input.
    TrailingInput { pos: usize },
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::Unexpected { pos, found } => {
                write!(f, "unexpected character {:?} at byte {}", found, pos)
            }
            Self::InvalidEscape { pos, found } => {
                write!(f, "invalid escape sequence '\\{}' at byte {}", found, pos)
            }
            Self::IntOutOfRange { pos } => write!(f, "integer out of range at byte {}", pos),
            Self::DuplicateKey(key) => write!(f, "duplicate mapping key {:?}", key),
            Self::NestedMap { pos } => write!(f, "nested mapping at byte {}", pos),
            Self::TrailingInput { pos } => write!(f, "trailing input at byte {}", pos),
        }
    }
}

impl std::error::Error for LiteralError {}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some((_, c)) if c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn parse_value(&mut self, allow_map: bool) -> Result<Literal, LiteralError> {
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some((_, '\'')) | Some((_, '"')) => self.parse_string().map(Literal::Str),
            Some((pos, '{')) => {
                if allow_map {
                    self.parse_map()
                } else {
                    Err(LiteralError::NestedMap { pos })
                }
            }
            Some((_, 'N')) => self.parse_none(),
            Some((_, c)) if c == '-' || c.is_ascii_digit() => self.parse_int(),
            Some((pos, found)) => Err(LiteralError::Unexpected { pos, found }),
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let (_, quote) = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some((_, c)) if c == quote => return Ok(out),
                Some((_, '\\')) => match self.bump() {
                    None => return Err(LiteralError::UnexpectedEnd),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, '\'')) => out.push('\''),
                    Some((_, '"')) => out.push('"'),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((pos, found)) => return Err(LiteralError::InvalidEscape { pos, found }),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn parse_none(&mut self) -> Result<Literal, LiteralError> {
        for expected in ['N', 'o', 'n', 'e'] {
            match self.bump() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some((_, c)) if c == expected => {}
                Some((pos, found)) => return Err(LiteralError::Unexpected { pos, found }),
            }
        }
        Ok(Literal::None)
    }

    fn parse_int(&mut self) -> Result<Literal, LiteralError> {
        let (start, first) = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut digits = String::new();
        digits.push(first);
        if first == '-' {
            match self.peek() {
                Some((_, c)) if c.is_ascii_digit() => {}
                Some((pos, found)) => return Err(LiteralError::Unexpected { pos, found }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
        while matches!(self.peek(), Some((_, c)) if c.is_ascii_digit()) {
            let (_, c) = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
            digits.push(c);
        }
        let n = digits
            .parse::<i64>()
            .map_err(|_| LiteralError::IntOutOfRange { pos: start })?;
        Ok(Literal::Int(n))
    }

    fn parse_map(&mut self) -> Result<Literal, LiteralError> {
        self.bump(); // consume '{'
        let mut entries: Vec<(String, Literal)> = Vec::new();
        self.skip_whitespace();
        if matches!(self.peek(), Some((_, '}'))) {
            self.bump();
            return Ok(Literal::Map(entries));
        }
        loop {
            self.skip_whitespace();
            let key = match self.peek() {
                Some((_, '\'')) | Some((_, '"')) => self.parse_string()?,
                Some((pos, found)) => return Err(LiteralError::Unexpected { pos, found }),
                None => return Err(LiteralError::UnexpectedEnd),
            };
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(LiteralError::DuplicateKey(key));
            }
            self.skip_whitespace();
            match self.bump() {
                Some((_, ':')) => {}
                Some((pos, found)) => return Err(LiteralError::Unexpected { pos, found }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
            self.skip_whitespace();
            let value = self.parse_value(false)?;
            entries.push((key, value));
            self.skip_whitespace();
            match self.bump() {
                Some((_, ',')) => {}
                Some((_, '}')) => return Ok(Literal::Map(entries)),
                Some((pos, found)) => return Err(LiteralError::Unexpected { pos, found }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Accepted Grammar ====================

    #[test]
    fn test_empty_map() {
        assert_eq!(parse("{}").unwrap(), Literal::Map(vec![]));
    }

    #[test]
    fn test_string_map() {
        let value = parse("{'home': 'pw1', 'work': 'pw2'}").unwrap();
        assert_eq!(
            value,
            Literal::Map(vec![
                ("home".to_string(), Literal::Str("pw1".to_string())),
                ("work".to_string(), Literal::Str("pw2".to_string())),
            ])
        );
    }

    #[test]
    fn test_map_with_none_value() {
        let value = parse("{'MyAp': None}").unwrap();
        assert_eq!(value.get("MyAp"), Some(&Literal::None));
    }

    #[test]
    fn test_map_with_int_value() {
        let value = parse("{'max_client/s': 4}").unwrap();
        assert_eq!(value.get("max_client/s"), Some(&Literal::Int(4)));
    }

    #[test]
    fn test_bare_int() {
        assert_eq!(parse("42").unwrap(), Literal::Int(42));
        assert_eq!(parse("-7").unwrap(), Literal::Int(-7));
    }

    #[test]
    fn test_bare_string_double_quoted() {
        assert_eq!(parse("\"cafe\"").unwrap(), Literal::Str("cafe".to_string()));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse(r"'a\'b\\c'").unwrap(),
            Literal::Str("a'b\\c".to_string())
        );
        assert_eq!(parse(r"'a\nb'").unwrap(), Literal::Str("a\nb".to_string()));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let value = parse("  { 'a' : 1 , 'b' : None }  ").unwrap();
        assert_eq!(value.get("a"), Some(&Literal::Int(1)));
        assert_eq!(value.get("b"), Some(&Literal::None));
    }

    // ==================== Rejected Inputs ====================

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(""), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn test_trailing_input() {
        assert!(matches!(
            parse("{} junk"),
            Err(LiteralError::TrailingInput { .. })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(parse("'abc"), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn test_duplicate_key() {
        assert_eq!(
            parse("{'a': 1, 'a': 2}"),
            Err(LiteralError::DuplicateKey("a".to_string()))
        );
    }

    #[test]
    fn test_nested_map_rejected() {
        assert!(matches!(
            parse("{'a': {'b': 1}}"),
            Err(LiteralError::NestedMap { .. })
        ));
    }

    #[test]
    fn test_non_string_key_rejected() {
        assert!(matches!(
            parse("{1: 'a'}"),
            Err(LiteralError::Unexpected { .. })
        ));
    }

    #[test]
    fn test_function_call_rejected() {
        // The whole point of the strict grammar: nothing callable parses.
        assert!(parse("__import__('os')").is_err());
        assert!(parse("{'a': open('x')}").is_err());
    }

    #[test]
    fn test_invalid_escape() {
        assert!(matches!(
            parse(r"'a\qb'"),
            Err(LiteralError::InvalidEscape { .. })
        ));
    }

    #[test]
    fn test_bare_minus_rejected() {
        assert_eq!(parse("-"), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn test_int_out_of_range() {
        assert!(matches!(
            parse("99999999999999999999"),
            Err(LiteralError::IntOutOfRange { .. })
        ));
    }

    // ==================== Round-trips ====================

    #[test]
    fn test_encode_round_trip() {
        let cases = [
            "{}",
            "{'home': 'pw1', 'work': 'pw2'}",
            "{'MyAp': None}",
            "{'max_client/s': 10}",
            "7",
            "'plain'",
        ];
        for case in cases {
            let value = parse(case).unwrap();
            assert_eq!(parse(&value.encode()).unwrap(), value, "case {:?}", case);
        }
    }

    #[test]
    fn test_encode_escapes_quotes() {
        let value = Literal::Str("it's".to_string());
        assert_eq!(value.encode(), r"'it\'s'");
        assert_eq!(parse(&value.encode()).unwrap(), value);
    }

    #[test]
    fn test_map_preserves_order() {
        let value = parse("{'b': 1, 'a': 2}").unwrap();
        assert_eq!(value.encode(), "{'b': 1, 'a': 2}");
    }
}
