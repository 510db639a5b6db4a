//! Locates the configuration declaration in entry-file text and splices a new one in.
//! 在入口檔原始碼中定位設定宣告，並以新的設定物件替換。

use once_cell::sync::Lazy;
use page_picker_settings::EntryLayout;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::literal;

static CLASS_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^.\w$])(config)\s*[?!]?\s*(?::[^=;{}()]*)?=\s*\{")
        .expect("class property pattern compiles")
});

/// Byte range of the configuration object literal inside the source text.
/// 設定物件字面值在原始碼中的位元組範圍。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("configuration declaration not found")]
    Missing,
    #[error("{0} configuration declarations found")]
    Ambiguous(usize),
    #[error("object literal starting at byte {0} is never closed")]
    Unterminated(usize),
}

/// Finds the declaration for `layout` inside `text`.
/// 依入口檔格式尋找設定宣告。
pub fn locate(text: &str, layout: &EntryLayout) -> Result<Span, LocateError> {
    let masked = mask_non_code(text);
    match layout {
        EntryLayout::ClassProperty { .. } => locate_class_property(&masked),
        EntryLayout::ObjectLiteral { .. } => locate_pages_object(text, &masked),
    }
}

fn locate_class_property(masked: &str) -> Result<Span, LocateError> {
    let mut starts = Vec::new();
    for captures in CLASS_PROPERTY.captures_iter(masked) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if is_variable_binding(&masked[..name.start()]) {
            continue;
        }
        starts.push(whole.end() - 1);
    }

    match starts.as_slice() {
        [] => Err(LocateError::Missing),
        [start] => {
            let end = matching_brace(masked, *start).ok_or(LocateError::Unterminated(*start))?;
            Ok(Span { start: *start, end })
        }
        many => Err(LocateError::Ambiguous(many.len())),
    }
}

fn is_variable_binding(before: &str) -> bool {
    let word: String = before
        .trim_end()
        .chars()
        .rev()
        .take_while(|ch| ch.is_alphanumeric() || *ch == '_' || *ch == '$')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    matches!(word.as_str(), "const" | "let" | "var")
}

/// The first object literal, in source order, whose own keys include `pages`.
fn locate_pages_object(text: &str, masked: &str) -> Result<Span, LocateError> {
    for (start, _) in masked.match_indices('{') {
        if let Ok((Value::Object(map), end)) = literal::parse_at(text, start) {
            if map.contains_key("pages") {
                return Ok(Span { start, end });
            }
        }
    }
    Err(LocateError::Missing)
}

fn matching_brace(masked: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in masked.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Replaces string, template and comment contents with spaces so that byte offsets stay valid.
/// Regular-expression literals are not recognised.
fn mask_non_code(text: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Quoted(char),
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();
    let blank = |out: &mut String, ch: char| {
        if ch == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
        }
    };

    while let Some(ch) = chars.next() {
        match state {
            State::Code => match ch {
                '/' if chars.peek() == Some(&'/') => {
                    state = State::LineComment;
                    blank(&mut out, ch);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                '\'' | '"' | '`' => {
                    state = State::Quoted(ch);
                    blank(&mut out, ch);
                }
                other => out.push(other),
            },
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                }
                blank(&mut out, ch);
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Quoted(quote) => {
                if ch == '\\' {
                    blank(&mut out, ch);
                    if let Some(escaped) = chars.next() {
                        blank(&mut out, escaped);
                    }
                    continue;
                }
                if ch == quote || (ch == '\n' && quote != '`') {
                    state = State::Code;
                }
                blank(&mut out, ch);
            }
        }
    }
    out
}

/// Substitutes `value` for the literal at `span`; every byte outside the span is kept.
/// 以新的設定物件取代指定範圍，範圍外的內容逐位元組保留。
pub fn embed(text: &str, span: Span, value: &Value) -> String {
    let line_start = text[..span.start].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let base: String = text[line_start..span.start]
        .chars()
        .take_while(|ch| *ch == ' ' || *ch == '\t')
        .collect();
    let unit = detect_indent_unit(&text[span.start..span.end], &base);
    let rendered = literal::render(value, &unit, &base);

    let mut out = String::with_capacity(text.len() + rendered.len());
    out.push_str(&text[..span.start]);
    out.push_str(&rendered);
    out.push_str(&text[span.end..]);
    out
}

fn detect_indent_unit(literal_text: &str, base: &str) -> String {
    literal_text
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .and_then(|line| {
            let leading: String = line
                .chars()
                .take_while(|ch| *ch == ' ' || *ch == '\t')
                .collect();
            leading
                .strip_prefix(base)
                .filter(|unit| !unit.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "  ".to_string())
}

/// Flag written around tool-generated entry files.
/// 標示檔案由本工具產生的旗標。
#[derive(Debug, Clone)]
pub struct GenerationMarker {
    flag: String,
    pattern: Regex,
}

impl GenerationMarker {
    pub fn new(flag: impl Into<String>) -> Self {
        let flag = flag.into();
        let pattern = Regex::new(&format!("(?i){}", regex::escape(&flag)))
            .expect("escaped flag is a valid pattern");
        Self { flag, pattern }
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn is_marked(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    pub fn banner(&self) -> String {
        format!(
            "/* {}: generated by page-picker, do not edit. Run `page-picker revert` to restore the original file. */\n",
            self.flag
        )
    }

    /// Wraps `body` with the banner at both ends.
    pub fn wrap(&self, body: &str) -> String {
        let banner = self.banner();
        let mut out = String::with_capacity(body.len() + banner.len() * 2 + 1);
        out.push_str(&banner);
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&banner);
        out
    }
}
