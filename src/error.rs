//! Error types for parsing and querying opening hours.

use chrono::NaiveDateTime;
use thiserror::Error;

/// What the lexer tripped on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unknown word '{0}'")]
    UnknownWord(String),

    #[error("unterminated comment")]
    UnterminatedComment,
}

/// The raw input contains something that is not part of the language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at position {position}")]
pub struct LexError {
    /// Byte offset into the raw input.
    pub position: usize,
    pub kind: LexErrorKind,
}

/// The token stream does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at position {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    /// Byte offset into the raw input of the offending token.
    pub position: usize,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The forward search for a state change hit its horizon. This is not the
    /// same as "never changes", which is reported as `Ok(None)`.
    #[error("no state change found within {years} years after {from}")]
    SearchExhausted { from: NaiveDateTime, years: u32 },

    #[error("invalid naive timestamp '{0}' (expected YYYY-MM-DDTHH:MM:SS)")]
    InvalidTimestamp(String),
}

impl Error {
    /// Byte offset of a parse failure, if this is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::Lex(err) => Some(err.position),
            Error::Syntax(err) => Some(err.position),
            Error::SearchExhausted { .. } | Error::InvalidTimestamp(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_message_carries_position() {
        let err = Error::from(SyntaxError {
            position: 6,
            expected: "a time between 00:00 and 24:00".to_string(),
            found: "'25:99'".to_string(),
        });
        assert_eq!(err.to_string(), "syntax error at position 6: expected a time between 00:00 and 24:00, found '25:99'");
        assert_eq!(err.position(), Some(6));
    }

    #[test]
    fn lex_error_names_the_character() {
        let err = LexError { position: 3, kind: LexErrorKind::UnexpectedChar('@') };
        assert_eq!(err.to_string(), "unexpected character '@' at position 3");
    }
}
