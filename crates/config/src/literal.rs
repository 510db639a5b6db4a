//! Static JavaScript object-literal reader/writer.
//! 讀寫靜態 JavaScript 物件字面值（不執行任何程式碼）。

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors raised while reading a literal.
/// 解析字面值時的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected token '{found}' at byte {offset}")]
    UnexpectedToken { found: char, offset: usize },
    #[error("invalid number literal at byte {0}")]
    InvalidNumber(usize),
    #[error("invalid escape sequence at byte {0}")]
    InvalidEscape(usize),
    #[error("template interpolation at byte {0} cannot be evaluated")]
    Interpolation(usize),
    #[error("expression `{name}` at byte {offset} is not a static value")]
    NotStatic { name: String, offset: usize },
}

/// Parses `input` as a single literal, rejecting trailing content.
/// 將整段輸入解析為單一字面值。
pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let (value, end) = parse_at(input, 0)?;
    let mut parser = Parser::at(input, end);
    parser.skip_trivia();
    match parser.peek() {
        Some(found) => Err(LiteralError::UnexpectedToken {
            found,
            offset: parser.position,
        }),
        None => Ok(value),
    }
}

/// Parses the literal starting at byte `offset`, returning it with the byte offset just past it.
/// 從指定位元組位置解析字面值，並回傳結束位置。
pub fn parse_at(input: &str, offset: usize) -> Result<(Value, usize), LiteralError> {
    let mut parser = Parser::at(input, offset);
    let value = parser.parse_value()?;
    Ok((value, parser.position))
}

/// Writes `value` in JavaScript style: single-quoted strings, bare keys where legal.
/// `unit` is one indentation step, `base` the indentation of the line the literal starts on.
/// 以 JavaScript 風格輸出字面值。
pub fn render(value: &Value, unit: &str, base: &str) -> String {
    let mut buf = String::new();
    write_value(value, unit, base, &mut buf);
    buf
}

fn write_value(value: &Value, unit: &str, indent: &str, buf: &mut String) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => buf.push_str(&n.to_string()),
        Value::String(s) => write_string(s, buf),
        Value::Array(items) => {
            if items.is_empty() {
                buf.push_str("[]");
                return;
            }
            let inner = format!("{indent}{unit}");
            buf.push_str("[\n");
            for (index, item) in items.iter().enumerate() {
                buf.push_str(&inner);
                write_value(item, unit, &inner, buf);
                if index + 1 != items.len() {
                    buf.push(',');
                }
                buf.push('\n');
            }
            buf.push_str(indent);
            buf.push(']');
        }
        Value::Object(map) => {
            if map.is_empty() {
                buf.push_str("{}");
                return;
            }
            let inner = format!("{indent}{unit}");
            buf.push_str("{\n");
            let len = map.len();
            for (index, (key, value)) in map.iter().enumerate() {
                buf.push_str(&inner);
                if is_identifier(key) {
                    buf.push_str(key);
                } else {
                    write_string(key, buf);
                }
                buf.push_str(": ");
                write_value(value, unit, &inner, buf);
                if index + 1 != len {
                    buf.push(',');
                }
                buf.push('\n');
            }
            buf.push_str(indent);
            buf.push('}');
        }
    }
}

fn write_string(s: &str, buf: &mut String) {
    buf.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => buf.push_str("\\\\"),
            '\'' => buf.push_str("\\'"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            other if other.is_control() => buf.push_str(&format!("\\u{:04x}", other as u32)),
            other => buf.push(other),
        }
    }
    buf.push('\'');
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_continue),
        _ => false,
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

struct Parser<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    fn at(input: &'a str, position: usize) -> Self {
        Self { input, position }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(quote @ ('\'' | '"')) => self.parse_string(quote).map(Value::String),
            Some('`') => self.parse_template().map(Value::String),
            Some('-' | '+' | '.' | '0'..='9') => self.parse_number(),
            Some(ch) if is_ident_start(ch) => self.parse_keyword(),
            Some(found) => Err(LiteralError::UnexpectedToken {
                found,
                offset: self.position,
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let offset = self.position;
        let name = self.parse_identifier();
        match name.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" => Ok(Value::Null),
            _ => Err(LiteralError::NotStatic { name, offset }),
        }
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.position;
        while matches!(self.peek(), Some(ch) if is_ident_continue(ch)) {
            self.next_char();
        }
        self.input[start..self.position].to_string()
    }

    fn parse_string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.expect(quote)?;
        let mut result = String::new();
        while let Some(ch) = self.next_char() {
            match ch {
                '\\' => self.parse_escape(&mut result)?,
                '\n' => {
                    return Err(LiteralError::UnexpectedToken {
                        found: ch,
                        offset: self.position - 1,
                    })
                }
                ch if ch == quote => return Ok(result),
                other => result.push(other),
            }
        }
        Err(LiteralError::UnexpectedEnd)
    }

    fn parse_template(&mut self) -> Result<String, LiteralError> {
        self.expect('`')?;
        let mut result = String::new();
        while let Some(ch) = self.next_char() {
            match ch {
                '`' => return Ok(result),
                '\\' => self.parse_escape(&mut result)?,
                '$' if self.peek() == Some('{') => {
                    return Err(LiteralError::Interpolation(self.position - 1))
                }
                other => result.push(other),
            }
        }
        Err(LiteralError::UnexpectedEnd)
    }

    fn parse_escape(&mut self, result: &mut String) -> Result<(), LiteralError> {
        let offset = self.position - 1;
        let escaped = self.next_char().ok_or(LiteralError::UnexpectedEnd)?;
        let translated = match escaped {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            '0' => '\0',
            // Line continuation.
            '\n' => return Ok(()),
            '\r' => {
                if self.peek() == Some('\n') {
                    self.next_char();
                }
                return Ok(());
            }
            'x' => self.parse_hex_digits(2, offset)?,
            'u' => {
                if self.peek() == Some('{') {
                    self.next_char();
                    let start = self.position;
                    while matches!(self.peek(), Some(ch) if ch.is_ascii_hexdigit()) {
                        self.next_char();
                    }
                    let digits = &self.input[start..self.position];
                    self.expect('}')
                        .map_err(|_| LiteralError::InvalidEscape(offset))?;
                    u32::from_str_radix(digits, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or(LiteralError::InvalidEscape(offset))?
                } else {
                    self.parse_hex_digits(4, offset)?
                }
            }
            other => other,
        };
        result.push(translated);
        Ok(())
    }

    fn parse_hex_digits(&mut self, count: usize, offset: usize) -> Result<char, LiteralError> {
        let start = self.position;
        for _ in 0..count {
            match self.next_char() {
                Some(ch) if ch.is_ascii_hexdigit() => {}
                _ => return Err(LiteralError::InvalidEscape(offset)),
            }
        }
        u32::from_str_radix(&self.input[start..self.position], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LiteralError::InvalidEscape(offset))
    }

    fn parse_array(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(']') {
                self.next_char();
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_trivia();
            match self.next_char() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(found) => {
                    return Err(LiteralError::UnexpectedToken {
                        found,
                        offset: self.position - found.len_utf8(),
                    })
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.next_char();
                return Ok(Value::Object(map));
            }
            let key = self.parse_key()?;
            self.skip_trivia();
            let offset = self.position;
            match self.next_char() {
                Some(':') => {}
                // Shorthand properties and methods refer to runtime values.
                Some(',' | '}' | '(') => return Err(LiteralError::NotStatic { name: key, offset }),
                Some(found) => return Err(LiteralError::UnexpectedToken { found, offset }),
                None => return Err(LiteralError::UnexpectedEnd),
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_trivia();
            match self.next_char() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(found) => {
                    return Err(LiteralError::UnexpectedToken {
                        found,
                        offset: self.position - found.len_utf8(),
                    })
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, LiteralError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.parse_string(quote),
            Some('0'..='9') => {
                let offset = self.position;
                match self.parse_number()? {
                    Value::Number(number) => Ok(number.to_string()),
                    _ => Err(LiteralError::InvalidNumber(offset)),
                }
            }
            Some(ch) if is_ident_start(ch) => Ok(self.parse_identifier()),
            Some('.') => Err(LiteralError::NotStatic {
                name: "...".to_string(),
                offset: self.position,
            }),
            Some(found) => Err(LiteralError::UnexpectedToken {
                found,
                offset: self.position,
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.position;
        let negative = match self.peek() {
            Some('-') => {
                self.next_char();
                true
            }
            Some('+') => {
                self.next_char();
                false
            }
            _ => false,
        };

        let rest = &self.input[self.position..];
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.position += 2;
            let digits_start = self.position;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_hexdigit() || ch == '_') {
                self.next_char();
            }
            let digits = self.input[digits_start..self.position].replace('_', "");
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| LiteralError::InvalidNumber(start))?;
            return Ok(Value::Number(Number::from(if negative { -value } else { value })));
        }

        let digits_start = self.position;
        self.consume_digits();
        let mut integral = true;
        if self.peek() == Some('.') {
            integral = false;
            self.next_char();
            self.consume_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            integral = false;
            self.next_char();
            if matches!(self.peek(), Some('+' | '-')) {
                self.next_char();
            }
            self.consume_digits();
        }
        let text = self.input[digits_start..self.position].replace('_', "");
        if text.is_empty() || text == "." {
            return Err(LiteralError::InvalidNumber(start));
        }
        if integral {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Value::Number(Number::from(if negative { -value } else { value })));
            }
        }
        let value: f64 = text.parse().map_err(|_| LiteralError::InvalidNumber(start))?;
        Number::from_f64(if negative { -value } else { value })
            .map(Value::Number)
            .ok_or(LiteralError::InvalidNumber(start))
    }

    fn consume_digits(&mut self) {
        while matches!(self.peek(), Some('0'..='9' | '_')) {
            self.next_char();
        }
    }

    /// Skips whitespace plus line and block comments.
    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.input[self.position..];
            if rest.starts_with("//") {
                self.position += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                self.position += rest.find("*/").map(|idx| idx + 2).unwrap_or(rest.len());
            } else if matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), LiteralError> {
        let offset = self.position;
        match self.next_char() {
            Some(actual) if actual == ch => Ok(()),
            Some(found) => Err(LiteralError::UnexpectedToken { found, offset }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position..).and_then(|rest| rest.chars().next())
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_taro_style_config() {
        let source = r#"{
            // 主包
            pages: [
                'pages/index/index',
                "pages/mine/index", /* trailing */
            ],
            window: { navigationBarTitleText: 'Demo', 'background-color': `#fff` },
            debug: false,
            version: 2,
            ratio: 0.5,
            missing: undefined,
        }"#;

        let value = parse(source).unwrap();
        assert_eq!(
            value,
            json!({
                "pages": ["pages/index/index", "pages/mine/index"],
                "window": { "navigationBarTitleText": "Demo", "background-color": "#fff" },
                "debug": false,
                "version": 2,
                "ratio": 0.5,
                "missing": null
            })
        );
    }

    #[test]
    fn keeps_key_order_of_source() {
        let value = parse("{ zeta: 1, alpha: 2, mid: 3 }").unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn parse_at_reports_end_offset() {
        let source = "export default { pages: ['a'] }\n";
        let start = source.find('{').unwrap();
        let (value, end) = parse_at(source, start).unwrap();
        assert_eq!(value, json!({ "pages": ["a"] }));
        assert_eq!(&source[end..], "\n");
    }

    #[test]
    fn rejects_runtime_expressions() {
        assert!(matches!(
            parse("{ pages: PAGES }"),
            Err(LiteralError::NotStatic { ref name, .. }) if name == "PAGES"
        ));
        assert!(matches!(
            parse("{ pages }"),
            Err(LiteralError::NotStatic { .. })
        ));
        assert!(matches!(
            parse("{ ...base, pages: [] }"),
            Err(LiteralError::NotStatic { .. })
        ));
        assert!(matches!(
            parse("{ title: `v${version}` }"),
            Err(LiteralError::Interpolation(_))
        ));
    }

    #[test]
    fn decodes_escapes_and_non_ascii() {
        let value = parse(r"['頁面\n', 'A\x42', 'it\'s', '\u{1F600}']").unwrap();
        assert_eq!(value, json!(["頁面\n", "AB", "it's", "😀"]));
    }

    #[test]
    fn render_uses_bare_keys_and_single_quotes() {
        let value = json!({
            "pages": ["a", "it's"],
            "tab-bar": {},
            "list": [],
            "n": 1
        });
        let text = render(&value, "  ", "");
        assert_eq!(
            text,
            "{\n  pages: [\n    'a',\n    'it\\'s'\n  ],\n  'tab-bar': {},\n  list: [],\n  n: 1\n}"
        );
        assert_eq!(parse(&text).unwrap(), value);
    }

    #[test]
    fn render_respects_base_indent() {
        let text = render(&json!({ "pages": ["a"] }), "\t", "\t");
        assert_eq!(text, "{\n\t\tpages: [\n\t\t\t'a'\n\t\t]\n\t}");
    }
}
