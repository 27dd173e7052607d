//! Permissive parsing of collection literals written in Python syntax.
//!
//! Exported spreadsheets often hold cells like `{'city': 'Berlin', 'open': True}`
//! or `['a.png', 'b.png']`. [`normalize_value`] turns such cells into canonical
//! JSON text and leaves every other cell exactly as it was.
//!
//! Accepted syntax: dicts, lists, tuples, single/double/triple-quoted strings
//! (with optional `u` prefix and implicit concatenation), integers (decimal,
//! hex, octal, binary, `_` separators), floats, `True`/`False`/`None` and their
//! JSON spellings. Sets, bytes, raw strings and complex numbers are rejected.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Outcome of normalizing one cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The cell held a literal and was re-serialized as JSON.
    Converted(String),
    /// The cell was not a literal, or could not be parsed; kept as given.
    Unchanged(String),
}

impl Normalized {
    pub fn into_string(self) -> String {
        match self {
            Normalized::Converted(s) | Normalized::Unchanged(s) => s,
        }
    }
}

/// True when the trimmed value is bracketed like a list or dict literal.
pub fn looks_like_collection(value: &str) -> bool {
    let v = value.trim();
    (v.starts_with('{') && v.ends_with('}')) || (v.starts_with('[') && v.ends_with(']'))
}

/// Re-serializes a list/dict literal as compact JSON. Anything that is not a
/// collection literal, or fails to parse, comes back unchanged.
pub fn normalize_value(value: &str) -> Normalized {
    if !looks_like_collection(value) {
        return Normalized::Unchanged(value.to_string());
    }
    match parse_literal(value.trim()) {
        Ok(parsed) => match serde_json::to_string(&parsed) {
            Ok(json) => Normalized::Converted(json),
            Err(_) => Normalized::Unchanged(value.to_string()),
        },
        Err(e) => {
            tracing::debug!("Keeping cell unchanged, not a literal: {}", e);
            Normalized::Unchanged(value.to_string())
        }
    }
}

/// Parses a complete literal expression into a JSON value.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser::new(text);
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

/// Deepest collection nesting accepted, the same limit serde_json applies.
const MAX_DEPTH: usize = 128;

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LiteralParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some('{') | Some('[') | Some('(') => self.parse_nested(),
            Some('\'') | Some('"') => self.parse_strings().map(Value::String),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_word(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_nested(&mut self) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let value = match self.peek() {
            Some('{') => self.parse_dict(),
            Some('[') => self.parse_sequence('[', ']').map(Value::Array),
            _ => self.parse_parenthesized(),
        };
        self.depth -= 1;
        value
    }

    fn parse_dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = self.parse_value()?;
            self.skip_ws();
            if self.peek() != Some(':') {
                return Err(self.error("set literals are not supported"));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(self.key_string(key)?, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}' in dict"));
                }
            }
        }
    }

    /// Dict keys become strings the way `json.dumps` renders them.
    fn key_string(&self, key: Value) -> Result<String, LiteralError> {
        match key {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Array(_) | Value::Object(_) => {
                Err(self.error("dict keys must be strings, numbers, booleans or None"))
            }
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Result<Vec<Value>, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error(format!("expected ',' or '{}'", close)));
                }
            }
        }
    }

    /// `(x)` is a grouped value, `(x,)` and `()` are tuples.
    fn parse_parenthesized(&mut self) -> Result<Value, LiteralError> {
        self.expect('(')?;
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(')') {
                self.pos += 1;
                break;
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(')') => {
                    trailing_comma = false;
                    break;
                }
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or ')'"));
                }
            }
        }
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    /// Parses one or more adjacent string literals and concatenates them.
    fn parse_strings(&mut self) -> Result<String, LiteralError> {
        let mut out = self.parse_string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => out.push_str(&self.parse_string()?),
                Some('u') | Some('U') if matches!(self.peek_at(1), Some('\'') | Some('"')) => {
                    self.pos += 1;
                    out.push_str(&self.parse_string()?);
                }
                _ => {
                    self.pos = save;
                    return Ok(out);
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            match c {
                '\\' => self.parse_escape(&mut out)?,
                c if c == quote && !triple => return Ok(out),
                c if c == quote && self.peek() == Some(quote) && self.peek_at(1) == Some(quote) => {
                    self.pos += 2;
                    return Ok(out);
                }
                '\n' if !triple => return Err(self.error("newline in single-quoted string")),
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            'a' => out.push('\u{7}'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(self.char_from(code)?);
            }
            'u' => {
                let code = self.hex_digits(4)?;
                if (0xD800..0xDC00).contains(&code)
                    && self.peek() == Some('\\')
                    && self.peek_at(1) == Some('u')
                {
                    self.pos += 2;
                    let low = self.hex_digits(4)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.error("invalid surrogate pair"));
                    }
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    out.push(self.char_from(combined)?);
                } else {
                    out.push(self.char_from(code)?);
                }
            }
            'U' => {
                let code = self.hex_digits(8)?;
                out.push(self.char_from(code)?);
            }
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(self.char_from(code)?);
            }
            'N' => return Err(self.error("named unicode escapes are not supported")),
            // Unknown escapes keep their backslash.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid hex escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn char_from(&self, code: u32) -> Result<char, LiteralError> {
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:#x}", code)))
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut negative = false;
        while let Some(sign) = self.peek().filter(|c| *c == '-' || *c == '+') {
            if sign == '-' {
                negative = !negative;
            }
            self.pos += 1;
            self.skip_ws();
        }

        let body_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.')
            || (matches!(self.peek(), Some('+') | Some('-'))
                && matches!(self.chars.get(self.pos.wrapping_sub(1)), Some('e') | Some('E'))
                && !self.is_radix_literal(body_start))
        {
            self.pos += 1;
        }
        let body: String = self.chars[body_start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        if body.is_empty() {
            self.pos = start;
            return Err(self.error("expected a number"));
        }

        let lower = body.to_ascii_lowercase();
        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            let magnitude = u64::from_str_radix(&lower[2..], radix)
                .map_err(|_| self.error(format!("invalid integer '{}'", body)))?;
            return self.integer(negative, magnitude);
        }

        if lower.ends_with('j') {
            return Err(self.error("complex numbers are not supported"));
        }

        if lower.contains(|c: char| c == '.' || c == 'e') {
            let float: f64 = lower
                .parse()
                .map_err(|_| self.error(format!("invalid float '{}'", body)))?;
            let float = if negative { -float } else { float };
            return Number::from_f64(float)
                .map(Value::Number)
                .ok_or_else(|| self.error("float is not finite"));
        }

        if lower.len() > 1 && lower.starts_with('0') && lower.chars().any(|c| c != '0') {
            return Err(self.error("leading zeros in decimal integer"));
        }
        let magnitude: u64 = lower
            .parse()
            .map_err(|_| self.error(format!("integer '{}' out of range", body)))?;
        self.integer(negative, magnitude)
    }

    fn is_radix_literal(&self, body_start: usize) -> bool {
        self.chars.get(body_start) == Some(&'0')
            && matches!(
                self.chars.get(body_start + 1),
                Some('x') | Some('X') | Some('o') | Some('O') | Some('b') | Some('B')
            )
    }

    fn integer(&self, negative: bool, magnitude: u64) -> Result<Value, LiteralError> {
        if !negative {
            return Ok(Value::Number(magnitude.into()));
        }
        if magnitude == 0 {
            return Ok(Value::Number(0.into()));
        }
        0i64.checked_sub_unsigned(magnitude)
            .map(|n| Value::Number(n.into()))
            .ok_or_else(|| self.error("integer out of range"))
    }

    fn parse_word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            "u" | "U" if matches!(self.peek(), Some('\'') | Some('"')) => {
                self.parse_strings().map(Value::String)
            }
            _ => {
                self.pos = start;
                Err(self.error(format!("unsupported name '{}'", word)))
            }
        }
    }
}
