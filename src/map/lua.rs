//! Reader for the subset of Lua that Tiled writes when exporting a map:
//! an optional `return` followed by one table literal made of strings,
//! numbers, booleans, nil and nested tables.
//!
//! There is no evaluation. Anything that isn't a literal is an error.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum LuaValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Table(LuaTable),
}

impl LuaValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LuaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&LuaTable> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }
}

/// A Lua table split into its positional part and its named part.
/// `[n] = v` keys land in `fields` under their decimal spelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LuaTable {
    pub array: Vec<LuaValue>,
    pub fields: HashMap<String, LuaValue>,
}

impl LuaTable {
    pub fn get(&self, key: &str) -> Option<&LuaValue> {
        self.fields.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(LuaValue::as_number)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(LuaValue::as_str)
    }

    pub fn table(&self, key: &str) -> Option<&LuaTable> {
        self.get(key).and_then(LuaValue::as_table)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LuaParseError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected '{found}' on line {line}")]
    UnexpectedChar { found: char, line: usize },
    #[error("invalid number '{text}' on line {line}")]
    InvalidNumber { text: String, line: usize },
    #[error("unterminated string starting on line {line}")]
    UnterminatedString { line: usize },
    #[error("unknown identifier '{name}' on line {line}")]
    UnknownIdentifier { name: String, line: usize },
    #[error("trailing input after the table on line {line}")]
    TrailingInput { line: usize },
}

/// Parse a Tiled Lua export into its root value.
pub fn parse(source: &str) -> Result<LuaValue, LuaParseError> {
    let mut parser = Parser::new(source);
    parser.skip_trivia();
    if parser.peek_word() == Some("return") {
        parser.pos += "return".len();
    }
    let value = parser.value()?;
    parser.skip_trivia();
    if parser.peek().is_some() {
        return Err(LuaParseError::TrailingInput { line: parser.line() });
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn line(&self) -> usize {
        self.src[..self.pos].matches('\n').count() + 1
    }

    fn unexpected(&self) -> LuaParseError {
        match self.peek() {
            Some(found) => LuaParseError::UnexpectedChar { found, line: self.line() },
            None => LuaParseError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LuaParseError> {
        self.skip_trivia();
        if self.peek() == Some(wanted) {
            self.pos += wanted.len_utf8();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Whitespace plus `--` line comments and `--[[ ]]` block comments.
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if let Some(after) = trimmed.strip_prefix("--[[") {
                let end = after.find("]]").map_or(after.len(), |i| i + 2);
                self.pos += 4 + end;
            } else if trimmed.starts_with("--") {
                let end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += end;
            } else {
                return;
            }
        }
    }

    fn peek_word(&self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let first = rest.chars().next()?;
        if len == 0 || !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        Some(&rest[..len])
    }

    fn value(&mut self) -> Result<LuaValue, LuaParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(LuaParseError::UnexpectedEnd),
            Some('{') => self.table().map(LuaValue::Table),
            Some('"') | Some('\'') => self.string().map(LuaValue::Str),
            Some(c) if c == '-' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(_) => {
                let line = self.line();
                let Some(word) = self.peek_word() else {
                    return Err(self.unexpected());
                };
                self.pos += word.len();
                match word {
                    "true" => Ok(LuaValue::Bool(true)),
                    "false" => Ok(LuaValue::Bool(false)),
                    "nil" => Ok(LuaValue::Nil),
                    _ => Err(LuaParseError::UnknownIdentifier { name: word.to_string(), line }),
                }
            }
        }
    }

    fn number(&mut self) -> Result<LuaValue, LuaParseError> {
        let line = self.line();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(i, c)| {
                let sign_ok = (*c == '-' || *c == '+')
                    && (*i == 0 || matches!(rest[..*i].chars().last(), Some('e') | Some('E')));
                !(c.is_ascii_alphanumeric() || *c == '.' || sign_ok)
            })
            .map_or(rest.len(), |(i, _)| i);
        let text = &rest[..len];
        self.pos += len;

        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok().map(|n| n as f64),
            None => text.parse::<f64>().ok(),
        };
        parsed
            .map(LuaValue::Number)
            .ok_or_else(|| LuaParseError::InvalidNumber { text: text.to_string(), line })
    }

    fn string(&mut self) -> Result<String, LuaParseError> {
        let line = self.line();
        let quote = self.bump().ok_or(LuaParseError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(LuaParseError::UnterminatedString { line }),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                    None => return Err(LuaParseError::UnterminatedString { line }),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn table(&mut self) -> Result<LuaTable, LuaParseError> {
        self.expect('{')?;
        let mut table = LuaTable::default();

        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(table);
                }
                None => return Err(LuaParseError::UnexpectedEnd),
                _ => {}
            }

            match self.key()? {
                Some(key) => {
                    let value = self.value()?;
                    table.fields.insert(key, value);
                }
                None => {
                    let value = self.value()?;
                    table.array.push(value);
                }
            }

            self.skip_trivia();
            match self.peek() {
                Some(',') | Some(';') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    /// `name =` or `[expr] =`. Returns None (and consumes nothing) for a
    /// positional entry.
    fn key(&mut self) -> Result<Option<String>, LuaParseError> {
        let start = self.pos;

        if self.peek() == Some('[') {
            self.pos += 1;
            let key = match self.value()? {
                LuaValue::Str(s) => s,
                LuaValue::Number(n) => format_number_key(n),
                _ => return Err(self.unexpected()),
            };
            self.expect(']')?;
            self.expect('=')?;
            return Ok(Some(key));
        }

        if let Some(word) = self.peek_word() {
            if !matches!(word, "true" | "false" | "nil") {
                self.pos += word.len();
                self.skip_trivia();
                // `==` never shows up in an export, but don't mistake it for a key
                if self.peek() == Some('=') && !self.rest().starts_with("==") {
                    self.pos += 1;
                    return Ok(Some(word.to_string()));
                }
            }
        }

        self.pos = start;
        Ok(None)
    }
}

fn format_number_key(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_positional_entries() {
        let value = parse("return { width = 3, name = \"arena\", visible = true, data = { 1, 2, 3, } }")
            .unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table.number("width"), Some(3.0));
        assert_eq!(table.string("name"), Some("arena"));
        assert_eq!(table.get("visible").and_then(LuaValue::as_bool), Some(true));
        let data = table.table("data").unwrap();
        assert_eq!(data.array.len(), 3);
        assert_eq!(data.array[2], LuaValue::Number(3.0));
    }

    #[test]
    fn return_keyword_is_optional() {
        assert_eq!(parse("{}").unwrap(), LuaValue::Table(LuaTable::default()));
    }

    #[test]
    fn skips_comments() {
        let src = "-- exported map\nreturn { --[[ block\ncomment ]] a = 1; -- trailing\n b = -2.5e1 }";
        let table = parse(src).unwrap();
        let table = table.as_table().unwrap();
        assert_eq!(table.number("a"), Some(1.0));
        assert_eq!(table.number("b"), Some(-25.0));
    }

    #[test]
    fn bracketed_keys_and_escapes() {
        let table = parse(r#"{ ["my key"] = 'it\'s', [7] = 0x1F }"#).unwrap();
        let table = table.as_table().unwrap();
        assert_eq!(table.string("my key"), Some("it's"));
        assert_eq!(table.number("7"), Some(31.0));
    }

    #[test]
    fn large_gids_survive_as_exact_numbers() {
        // Flip flags set the top bits of a gid
        let table = parse("{ 2147483649 }").unwrap();
        assert_eq!(table.as_table().unwrap().array[0], LuaValue::Number(2147483649.0));
    }

    #[test]
    fn reports_unterminated_strings_with_line() {
        let err = parse("{\n name = \"oops\n}").unwrap_err();
        assert_eq!(err, LuaParseError::UnterminatedString { line: 2 });
    }

    #[test]
    fn rejects_code_that_is_not_a_literal() {
        assert!(matches!(
            parse("{ a = math }"),
            Err(LuaParseError::UnknownIdentifier { .. })
        ));
        assert_eq!(parse("{ a = 1"), Err(LuaParseError::UnexpectedEnd));
        assert!(matches!(parse("{} {}"), Err(LuaParseError::TrailingInput { .. })));
    }
}
