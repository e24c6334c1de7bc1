#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected character '{found}' at position {position}, expected {expected}")]
    Unexpected {
        found: char,
        position: usize,
        expected: &'static str,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;
