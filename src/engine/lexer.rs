//! Tokenizer for opening hours expressions.
//!
//! Eager and strict: the whole input is turned into tokens up front, and any
//! character or word that is not part of the language is an error at its byte
//! offset. Nothing is silently skipped.

use std::collections::HashMap;
use std::fmt;

use chrono::Weekday;
use once_cell::sync::Lazy;

use crate::error::{LexError, LexErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Off,
    Closed,
    Open,
    Unknown,
    PublicHoliday,
    SchoolHoliday,
    Sunrise,
    Sunset,
    Dawn,
    Dusk,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Dash,
    Comma,
    Semicolon,
    Colon,
    Slash,
    DoublePipe,
    Plus,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Weekday(Weekday),
    /// 1-based month.
    Month(u32),
    /// `digits` is the written width, so `2024` and `02024` can be told apart
    /// from day numbers.
    Number { value: u32, digits: usize },
    Time { hour: u32, minute: u32 },
    Keyword(Keyword),
    Symbol(Symbol),
    /// Text between double quotes, quotes stripped.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The raw slice of input this token was read from.
    pub text: String,
    /// Byte offset into the raw input.
    pub position: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.text)
    }
}

enum Word {
    Weekday(Weekday),
    Month(u32),
    Keyword(Keyword),
}

static WORDS: Lazy<HashMap<&'static str, Word>> = Lazy::new(|| {
    use Keyword::*;
    use Weekday::*;
    HashMap::from([
        ("mo", Word::Weekday(Mon)),
        ("mon", Word::Weekday(Mon)),
        ("monday", Word::Weekday(Mon)),
        ("tu", Word::Weekday(Tue)),
        ("tue", Word::Weekday(Tue)),
        ("tues", Word::Weekday(Tue)),
        ("tuesday", Word::Weekday(Tue)),
        ("we", Word::Weekday(Wed)),
        ("wed", Word::Weekday(Wed)),
        ("wednesday", Word::Weekday(Wed)),
        ("th", Word::Weekday(Thu)),
        ("thu", Word::Weekday(Thu)),
        ("thur", Word::Weekday(Thu)),
        ("thurs", Word::Weekday(Thu)),
        ("thursday", Word::Weekday(Thu)),
        ("fr", Word::Weekday(Fri)),
        ("fri", Word::Weekday(Fri)),
        ("friday", Word::Weekday(Fri)),
        ("sa", Word::Weekday(Sat)),
        ("sat", Word::Weekday(Sat)),
        ("saturday", Word::Weekday(Sat)),
        ("su", Word::Weekday(Sun)),
        ("sun", Word::Weekday(Sun)),
        ("sunday", Word::Weekday(Sun)),
        ("jan", Word::Month(1)),
        ("january", Word::Month(1)),
        ("feb", Word::Month(2)),
        ("february", Word::Month(2)),
        ("mar", Word::Month(3)),
        ("march", Word::Month(3)),
        ("apr", Word::Month(4)),
        ("april", Word::Month(4)),
        ("may", Word::Month(5)),
        ("jun", Word::Month(6)),
        ("june", Word::Month(6)),
        ("jul", Word::Month(7)),
        ("july", Word::Month(7)),
        ("aug", Word::Month(8)),
        ("august", Word::Month(8)),
        ("sep", Word::Month(9)),
        ("sept", Word::Month(9)),
        ("september", Word::Month(9)),
        ("oct", Word::Month(10)),
        ("october", Word::Month(10)),
        ("nov", Word::Month(11)),
        ("november", Word::Month(11)),
        ("dec", Word::Month(12)),
        ("december", Word::Month(12)),
        ("off", Word::Keyword(Off)),
        ("closed", Word::Keyword(Closed)),
        ("open", Word::Keyword(Open)),
        ("unknown", Word::Keyword(Unknown)),
        ("ph", Word::Keyword(PublicHoliday)),
        ("sh", Word::Keyword(SchoolHoliday)),
        ("sunrise", Word::Keyword(Sunrise)),
        ("sunset", Word::Keyword(Sunset)),
        ("dawn", Word::Keyword(Dawn)),
        ("dusk", Word::Keyword(Dusk)),
        ("week", Word::Keyword(Week)),
    ])
});

fn symbol(c: char) -> Option<Symbol> {
    Some(match c {
        '-' => Symbol::Dash,
        ',' => Symbol::Comma,
        ';' => Symbol::Semicolon,
        ':' => Symbol::Colon,
        '/' => Symbol::Slash,
        '+' => Symbol::Plus,
        '[' => Symbol::LBracket,
        ']' => Symbol::RBracket,
        '(' => Symbol::LParen,
        ')' => Symbol::RParen,
        _ => return None,
    })
}

/// Split `raw` into tokens.
pub fn tokenize(raw: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < raw.len() {
        let rest = &raw[pos..];
        let Some(c) = rest.chars().next() else { break };

        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let (kind, len) = if let Some(m) = regex!(r"^([0-9]{1,2}):([0-9]{2})").captures(rest) {
            let (Ok(hour), Ok(minute)) = (m[1].parse(), m[2].parse()) else {
                return Err(LexError { position: pos, kind: LexErrorKind::UnexpectedChar(c) });
            };
            (TokenKind::Time { hour, minute }, m[0].len())
        } else if let Some(m) = regex!(r"^[0-9]+").find(rest) {
            let value = m.as_str().parse().unwrap_or(u32::MAX);
            (TokenKind::Number { value, digits: m.len() }, m.len())
        } else if let Some(m) = regex!(r"^[A-Za-z]+").find(rest) {
            let kind = match WORDS.get(m.as_str().to_ascii_lowercase().as_str()) {
                Some(Word::Weekday(wd)) => TokenKind::Weekday(*wd),
                Some(Word::Month(month)) => TokenKind::Month(*month),
                Some(Word::Keyword(kw)) => TokenKind::Keyword(*kw),
                None => {
                    return Err(LexError { position: pos, kind: LexErrorKind::UnknownWord(m.as_str().to_string()) });
                }
            };
            (kind, m.len())
        } else if c == '"' {
            let Some(close) = rest[1..].find('"') else {
                return Err(LexError { position: pos, kind: LexErrorKind::UnterminatedComment });
            };
            (TokenKind::Comment(rest[1..close + 1].to_string()), close + 2)
        } else if rest.starts_with("||") {
            (TokenKind::Symbol(Symbol::DoublePipe), 2)
        } else if let Some(sym) = symbol(c) {
            (TokenKind::Symbol(sym), c.len_utf8())
        } else {
            return Err(LexError { position: pos, kind: LexErrorKind::UnexpectedChar(c) });
        };

        tokens.push(Token { kind, text: rest[..len].to_string(), position: pos });
        pos += len;
    }

    Ok(tokens)
}
