use std::fmt;

/// A 0-based position in the story data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// 0-based line number
    pub line: usize,
    /// 0-based column (byte offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

impl Position {
    /// Derive line and column for `offset` by scanning `input` up to it.
    pub fn locate(input: &[u8], offset: usize) -> Self {
        let consumed = &input[..offset.min(input.len())];
        let line = consumed.iter().filter(|&&b| b == b'\n').count();
        let last_newline = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        Position {
            line,
            column: consumed.len() - last_newline,
            offset: consumed.len(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Lexical error taxonomy. Produced by the tokenizer as values, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedComma,
    UnexpectedTrailingComma,
    InvalidByte,
    PrematureEndOfInput,
    /// Only raised when string contents are decoded, never while lexing.
    MalformedUnicodeEscapeSequence,
    MalformedNumberLiteral,
    UnterminatedString,
    SyntaxError,
    UnspecifiedError,
}

impl ErrorKind {
    /// Human-readable description of the error.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::UnexpectedComma => "Unexpected comma",
            ErrorKind::UnexpectedTrailingComma => "Unexpected trailing comma",
            ErrorKind::InvalidByte => "Invalid input byte",
            ErrorKind::PrematureEndOfInput => "Premature end of input",
            ErrorKind::MalformedUnicodeEscapeSequence => "Malformed Unicode escape sequence",
            ErrorKind::MalformedNumberLiteral => "Malformed number literal",
            ErrorKind::UnterminatedString => "Unterminated string",
            ErrorKind::SyntaxError => "Illegal JSON (syntax error)",
            ErrorKind::UnspecifiedError => "Unspecified error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ErrorKind {}

/// Failure while turning story data into a statement tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecompileError {
    #[error("{position}: {kind}")]
    Lex { kind: ErrorKind, position: Position },
    #[error("{position}: unexpected {found}")]
    UnexpectedToken { found: String, position: Position },
    #[error("{position}: nesting deeper than {limit} levels")]
    NestingTooDeep { limit: usize, position: Position },
    #[error("story has no root container")]
    MissingRoot,
    #[error("invalid story: {0}")]
    InvalidStory(String),
}

impl DecompileError {
    pub fn lex(kind: ErrorKind, input: &[u8], offset: usize) -> Self {
        DecompileError::Lex {
            kind,
            position: Position::locate(input, offset),
        }
    }

    pub fn unexpected(found: impl Into<String>, input: &[u8], offset: usize) -> Self {
        DecompileError::UnexpectedToken {
            found: found.into(),
            position: Position::locate(input, offset),
        }
    }

    /// Where in the input the error was found, for errors tied to a location.
    pub fn position(&self) -> Option<Position> {
        match self {
            DecompileError::Lex { position, .. }
            | DecompileError::UnexpectedToken { position, .. }
            | DecompileError::NestingTooDeep { position, .. } => Some(*position),
            DecompileError::MissingRoot | DecompileError::InvalidStory(_) => None,
        }
    }
}
