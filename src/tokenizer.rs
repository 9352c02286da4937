//! Streaming, zero-copy lexer for ink's JSON story format.
//!
//! The tokenizer borrows the caller's buffer for its whole lifetime and hands
//! out one [`Token`] per call to [`Tokenizer::next`]. Value-bearing tokens are
//! slices of that buffer: strings keep their surrounding quotes and escape
//! sequences are left undecoded for the consumer (see `from_json`).

use crate::error::ErrorKind;

/// Discriminant of a [`Token`], for callers that only care about the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    FieldName,
    String,
    Integer,
    Float,
    True,
    False,
    Null,
    End,
    Error,
}

/// One lexical unit. Raw lexemes borrow from the tokenizer's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    /// A string followed by `:`. The slice includes the quotes.
    FieldName(&'a [u8]),
    /// A string value. The slice includes the quotes.
    String(&'a [u8]),
    Integer(&'a [u8]),
    Float(&'a [u8]),
    True,
    False,
    Null,
    End,
    Error(ErrorKind),
}

impl<'a> Token<'a> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::ObjectStart => TokenKind::ObjectStart,
            Token::ObjectEnd => TokenKind::ObjectEnd,
            Token::ArrayStart => TokenKind::ArrayStart,
            Token::ArrayEnd => TokenKind::ArrayEnd,
            Token::FieldName(_) => TokenKind::FieldName,
            Token::String(_) => TokenKind::String,
            Token::Integer(_) => TokenKind::Integer,
            Token::Float(_) => TokenKind::Float,
            Token::True => TokenKind::True,
            Token::False => TokenKind::False,
            Token::Null => TokenKind::Null,
            Token::End => TokenKind::End,
            Token::Error(_) => TokenKind::Error,
        }
    }

    /// Whether the token carries a raw lexeme from the input.
    pub fn has_value(&self) -> bool {
        matches!(
            self,
            Token::FieldName(_) | Token::String(_) | Token::Integer(_) | Token::Float(_)
        )
    }

    /// Raw lexeme, or the canonical spelling for tokens without one.
    pub fn text(&self) -> &'a [u8] {
        match *self {
            Token::FieldName(raw) | Token::String(raw) | Token::Integer(raw) | Token::Float(raw) => {
                raw
            }
            Token::ObjectStart => b"{",
            Token::ObjectEnd => b"}",
            Token::ArrayStart => b"[",
            Token::ArrayEnd => b"]",
            Token::True => b"true",
            Token::False => b"false",
            Token::Null => b"null",
            Token::End | Token::Error(_) => b"",
        }
    }

    /// True for tokens that complete a value, i.e. may precede a comma.
    fn ends_value(&self) -> bool {
        matches!(
            self,
            Token::String(_)
                | Token::Integer(_)
                | Token::Float(_)
                | Token::True
                | Token::False
                | Token::Null
                | Token::ObjectEnd
                | Token::ArrayEnd
        )
    }
}

/// Lexer state: the borrowed input, a read offset and the last token.
pub struct Tokenizer<'a> {
    input: &'a [u8],
    offset: usize,
    token: Token<'a>,
    /// A comma was consumed and the next token must be a value.
    pending_comma: bool,
    /// The current token came right after a comma.
    after_comma: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            input,
            offset: 0,
            token: Token::End,
            pending_comma: false,
            after_comma: false,
        }
    }

    /// The token returned by the last call to [`next`](Self::next).
    pub fn current(&self) -> Token<'a> {
        self.token
    }

    /// Byte offset of the read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether a comma separated the current token from the previous one.
    pub fn follows_comma(&self) -> bool {
        self.after_comma
    }

    /// Read the next token.
    ///
    /// Errors are sticky: once an `Error` token has been produced every
    /// further call returns it again without advancing. `End` repeats too.
    pub fn next(&mut self) -> Token<'a> {
        if let Token::Error(_) = self.token {
            return self.token;
        }
        loop {
            self.skip_ws();
            let Some(&b) = self.input.get(self.offset) else {
                if self.pending_comma {
                    return self.set_error(ErrorKind::PrematureEndOfInput);
                }
                return self.set_token(Token::End);
            };
            let token_start = self.offset;
            self.offset += 1;
            return match b {
                b'{' => self.set_token(Token::ObjectStart),
                b'}' => self.read_end_bracket(Token::ObjectEnd),
                b'[' => self.set_token(Token::ArrayStart),
                b']' => self.read_end_bracket(Token::ArrayEnd),
                b'n' => self.read_atom(b"ull", Token::Null),
                b't' => self.read_atom(b"rue", Token::True),
                b'f' => self.read_atom(b"alse", Token::False),
                b'"' => self.read_string(token_start),
                b',' => match self.read_comma() {
                    Ok(()) => continue,
                    Err(kind) => self.set_error(kind),
                },
                b'-' | b'0'..=b'9' => self.read_number(b, token_start),
                _ => self.set_error(ErrorKind::InvalidByte),
            };
        }
    }

    /// Message for the current error, or an empty string when not errored.
    pub fn error_message(&self) -> &'static str {
        match self.token {
            Token::Error(kind) => kind.message(),
            _ => "",
        }
    }

    /// Raw lexeme of the current token (see [`Token::text`]).
    pub fn data_value(&self) -> &'a [u8] {
        self.token.text()
    }

    /// Current token as a float. `true` is 1, other value-less tokens are 0.
    pub fn float_value(&self) -> f64 {
        match self.token {
            Token::True => 1.0,
            Token::Integer(raw) | Token::Float(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Current token as an integer: the leading integer part of a number,
    /// saturating on overflow. `true` is 1, other value-less tokens are 0.
    pub fn int_value(&self) -> i64 {
        match self.token {
            Token::True => 1,
            Token::Integer(raw) | Token::Float(raw) => leading_integer(raw),
            _ => 0,
        }
    }

    fn set_token(&mut self, token: Token<'a>) -> Token<'a> {
        self.after_comma = self.pending_comma;
        self.pending_comma = false;
        self.token = token;
        token
    }

    fn set_error(&mut self, kind: ErrorKind) -> Token<'a> {
        self.set_token(Token::Error(kind))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.offset).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.offset += 1;
        }
    }

    /// Match the rest of `null`/`true`/`false`; the first byte is consumed.
    fn read_atom(&mut self, rest: &'static [u8], token: Token<'a>) -> Token<'a> {
        let end = self.offset + rest.len();
        if self.input.len() < end {
            return self.set_error(ErrorKind::PrematureEndOfInput);
        }
        if &self.input[self.offset..end] != rest {
            return self.set_error(ErrorKind::InvalidByte);
        }
        if self.input.get(end).is_some_and(u8::is_ascii_alphanumeric) {
            return self.set_error(ErrorKind::SyntaxError);
        }
        self.offset = end;
        self.set_token(token)
    }

    /// A comma must follow a completed value and be followed by another one.
    /// The trailing half of that rule is checked by the next token.
    fn read_comma(&mut self) -> Result<(), ErrorKind> {
        if self.pending_comma || !self.token.ends_value() {
            return Err(ErrorKind::UnexpectedComma);
        }
        self.pending_comma = true;
        Ok(())
    }

    fn read_end_bracket(&mut self, token: Token<'a>) -> Token<'a> {
        if self.pending_comma {
            return self.set_error(ErrorKind::UnexpectedTrailingComma);
        }
        self.set_token(token)
    }

    fn read_digits(&mut self, mut digits: usize) -> bool {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.offset += 1;
            digits += 1;
        }
        digits > 0
    }

    fn read_fraction(&mut self, is_float: &mut bool) -> bool {
        if self.peek() != Some(b'.') {
            return true;
        }
        *is_float = true;
        self.offset += 1;
        self.read_digits(0)
    }

    fn read_exponent(&mut self, is_float: &mut bool) -> bool {
        if !matches!(self.peek(), Some(b'e' | b'E')) {
            return true;
        }
        *is_float = true;
        self.offset += 1;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.offset += 1;
        }
        self.read_digits(0)
    }

    fn read_number(&mut self, first: u8, token_start: usize) -> Token<'a> {
        // A document may be a single bare number, so end of input right
        // after the digits still yields the number.
        let mut is_float = false;
        if !self.read_digits(usize::from(first.is_ascii_digit()))
            || !self.read_fraction(&mut is_float)
            || !self.read_exponent(&mut is_float)
        {
            return self.set_error(ErrorKind::MalformedNumberLiteral);
        }
        let value = &self.input[token_start..self.offset];
        if is_float {
            self.set_token(Token::Float(value))
        } else {
            self.set_token(Token::Integer(value))
        }
    }

    fn read_string(&mut self, token_start: usize) -> Token<'a> {
        loop {
            let Some(b) = self.peek() else {
                return self.set_error(ErrorKind::UnterminatedString);
            };
            self.offset += 1;
            match b {
                b'\\' => {
                    if self.peek().is_none() {
                        return self.set_error(ErrorKind::PrematureEndOfInput);
                    }
                    self.offset += 1;
                }
                b'"' => break,
                0 => return self.set_error(ErrorKind::InvalidByte),
                _ => {}
            }
        }
        let value = &self.input[token_start..self.offset];

        self.skip_ws();
        match self.peek() {
            None => self.set_token(Token::String(value)),
            Some(b':') => {
                self.offset += 1;
                self.set_token(Token::FieldName(value))
            }
            // Left in place for the next call.
            Some(b',' | b']' | b'}') => self.set_token(Token::String(value)),
            Some(0) => self.set_error(ErrorKind::InvalidByte),
            Some(_) => self.set_error(ErrorKind::SyntaxError),
        }
    }
}

fn leading_integer(raw: &[u8]) -> i64 {
    let (negative, digits) = match raw.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, raw),
    };
    let mut value: i64 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(b - b'0');
        let next = value.checked_mul(10).and_then(|v| {
            if negative {
                v.checked_sub(digit)
            } else {
                v.checked_add(digit)
            }
        });
        value = match next {
            Some(v) => v,
            None if negative => return i64::MIN,
            None => return i64::MAX,
        };
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut t = Tokenizer::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let token = t.next();
            out.push(token.kind());
            if matches!(token, Token::End | Token::Error(_)) {
                return out;
            }
        }
    }

    fn first_error(input: &str) -> Option<ErrorKind> {
        let mut t = Tokenizer::new(input.as_bytes());
        loop {
            match t.next() {
                Token::Error(kind) => return Some(kind),
                Token::End => return None,
                _ => {}
            }
        }
    }

    #[test]
    fn scalar_values_read_back() {
        let mut t = Tokenizer::new(b"-12.5e3");
        assert_eq!(t.next(), Token::Float(b"-12.5e3"));
        assert_eq!(t.float_value(), -12500.0);
        assert_eq!(t.int_value(), -12);

        let mut t = Tokenizer::new(b"0");
        assert_eq!(t.next(), Token::Integer(b"0"));
        assert_eq!(t.int_value(), 0);
        assert_eq!(t.float_value(), 0.0);

        let mut t = Tokenizer::new(b"true");
        assert_eq!(t.next(), Token::True);
        assert_eq!(t.int_value(), 1);
        assert_eq!(t.float_value(), 1.0);
        assert_eq!(t.data_value(), b"true");

        let mut t = Tokenizer::new(b"null");
        assert_eq!(t.next(), Token::Null);
        assert_eq!(t.int_value(), 0);
        assert_eq!(t.data_value(), b"null");

        let mut t = Tokenizer::new(br#""ab\"c""#);
        assert_eq!(t.next(), Token::String(br#""ab\"c""#));
        assert_eq!(t.data_value(), br#""ab\"c""#);
    }

    #[test]
    fn float_values_match_serde_json() {
        for input in ["3.25", "-0.5", "1e10", "6.02E+23", "-7e-3", "42"] {
            let mut t = Tokenizer::new(input.as_bytes());
            t.next();
            let expected: f64 = serde_json::from_str(input).unwrap();
            assert_eq!(t.float_value(), expected, "input {input}");
        }
    }

    #[test]
    fn int_value_saturates() {
        let mut t = Tokenizer::new(b"99999999999999999999");
        t.next();
        assert_eq!(t.int_value(), i64::MAX);
        let mut t = Tokenizer::new(b"-99999999999999999999");
        t.next();
        assert_eq!(t.int_value(), i64::MIN);
    }

    #[test]
    fn end_is_idempotent() {
        let mut t = Tokenizer::new(b"  \n\t ");
        assert_eq!(t.next(), Token::End);
        assert_eq!(t.next(), Token::End);
        assert_eq!(t.current(), Token::End);
        assert_eq!(t.data_value(), b"");
    }

    #[test]
    fn atom_errors() {
        assert_eq!(first_error("true1"), Some(ErrorKind::SyntaxError));
        assert_eq!(first_error("nullx"), Some(ErrorKind::SyntaxError));
        assert_eq!(first_error("tru"), Some(ErrorKind::PrematureEndOfInput));
        assert_eq!(first_error("txue"), Some(ErrorKind::InvalidByte));
        // The atom reader stops at the first byte that does not spell the
        // keyword, so a truncated keyword followed by a digit is an invalid
        // byte. Only a complete keyword runs the trailing delimiter check.
        assert_eq!(first_error("tru1"), Some(ErrorKind::InvalidByte));
        assert_eq!(first_error("[true]"), None);
    }

    #[test]
    fn field_name_or_string_by_following_byte() {
        let mut t = Tokenizer::new(br#""abc" : 1"#);
        assert_eq!(t.next(), Token::FieldName(br#""abc""#));
        assert_eq!(t.next(), Token::Integer(b"1"));

        let mut t = Tokenizer::new(br#"["abc", 2]"#);
        assert_eq!(t.next(), Token::ArrayStart);
        assert_eq!(t.next(), Token::String(br#""abc""#));
        assert_eq!(t.offset(), 6);
        assert_eq!(t.next(), Token::Integer(b"2"));
        assert_eq!(t.next(), Token::ArrayEnd);
        assert_eq!(t.next(), Token::End);
    }

    #[test]
    fn string_at_end_of_input_is_a_value() {
        let mut t = Tokenizer::new(br#""abc""#);
        assert_eq!(t.next(), Token::String(br#""abc""#));
        assert_eq!(t.next(), Token::End);
    }

    #[test]
    fn string_errors() {
        assert_eq!(first_error(r#""abc"#), Some(ErrorKind::UnterminatedString));
        assert_eq!(first_error("\"ab\\"), Some(ErrorKind::PrematureEndOfInput));
        assert_eq!(first_error("\"a\0b\""), Some(ErrorKind::InvalidByte));
        assert_eq!(first_error(r#"["a" "b"]"#), Some(ErrorKind::SyntaxError));
        assert_eq!(first_error("\"a\" \0"), Some(ErrorKind::InvalidByte));
    }

    #[test]
    fn escapes_are_skipped_not_decoded() {
        let mut t = Tokenizer::new(br#"["a\"]\\", 1]"#);
        t.next();
        assert_eq!(t.next(), Token::String(br#""a\"]\\""#));
        assert_eq!(t.next(), Token::Integer(b"1"));
    }

    #[test]
    fn number_errors() {
        assert_eq!(first_error("-"), Some(ErrorKind::MalformedNumberLiteral));
        assert_eq!(first_error("-x"), Some(ErrorKind::MalformedNumberLiteral));
        assert_eq!(first_error("1."), Some(ErrorKind::MalformedNumberLiteral));
        assert_eq!(first_error("1e"), Some(ErrorKind::MalformedNumberLiteral));
        assert_eq!(first_error("2E+"), Some(ErrorKind::MalformedNumberLiteral));
        assert_eq!(first_error("[1.5, -2, 3e2]"), None);
    }

    #[test]
    fn number_kinds() {
        assert_eq!(
            kinds("[1, 1.5, 2e3, -4]"),
            vec![
                TokenKind::ArrayStart,
                TokenKind::Integer,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Integer,
                TokenKind::ArrayEnd,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn invalid_bytes() {
        assert_eq!(first_error("\0"), Some(ErrorKind::InvalidByte));
        assert_eq!(first_error("@"), Some(ErrorKind::InvalidByte));
        assert_eq!(first_error("[1, x]"), Some(ErrorKind::InvalidByte));
    }

    #[test]
    fn comma_rules() {
        assert_eq!(first_error(",1"), Some(ErrorKind::UnexpectedComma));
        assert_eq!(first_error("[,1]"), Some(ErrorKind::UnexpectedComma));
        assert_eq!(first_error("[1,,2]"), Some(ErrorKind::UnexpectedComma));
        assert_eq!(first_error(r#"{"a":,1}"#), Some(ErrorKind::UnexpectedComma));
        assert_eq!(first_error("[1,]"), Some(ErrorKind::UnexpectedTrailingComma));
        assert_eq!(first_error(r#"{"a":1 , }"#), Some(ErrorKind::UnexpectedTrailingComma));
        assert_eq!(first_error("[1,"), Some(ErrorKind::PrematureEndOfInput));
        assert_eq!(first_error(r#"[{"a":[]},{"b":null}]"#), None);
    }

    #[test]
    fn follows_comma_marks_separated_tokens() {
        let mut t = Tokenizer::new(b"[1, 2 3]");
        let mut separated = Vec::new();
        loop {
            let token = t.next();
            if token == Token::End {
                break;
            }
            separated.push(t.follows_comma());
        }
        assert_eq!(separated, [false, false, true, false, false]);
    }

    #[test]
    fn object_tokens() {
        assert_eq!(
            kinds(r#"{"a": [true, false, null], "b": {}}"#),
            vec![
                TokenKind::ObjectStart,
                TokenKind::FieldName,
                TokenKind::ArrayStart,
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::ArrayEnd,
                TokenKind::FieldName,
                TokenKind::ObjectStart,
                TokenKind::ObjectEnd,
                TokenKind::ObjectEnd,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn errors_are_sticky() {
        let mut t = Tokenizer::new(b"[1,,2] 3");
        t.next();
        t.next();
        let err = t.next();
        assert_eq!(err, Token::Error(ErrorKind::UnexpectedComma));
        let offset = t.offset();
        assert_eq!(t.next(), err);
        assert_eq!(t.next(), err);
        assert_eq!(t.offset(), offset);
        assert_eq!(t.error_message(), "Unexpected comma");
        assert_eq!(t.int_value(), 0);
    }

    #[test]
    fn value_bearing_tokens() {
        assert!(Token::FieldName(b"\"a\"").has_value());
        assert!(Token::Integer(b"1").has_value());
        assert!(!Token::Null.has_value());
        assert!(!Token::ArrayEnd.has_value());
        assert_eq!(Token::ArrayEnd.text(), b"]");
        assert_eq!(Token::Error(ErrorKind::InvalidByte).text(), b"");
    }

    #[test]
    fn error_message_empty_without_error() {
        let mut t = Tokenizer::new(b"1");
        t.next();
        assert_eq!(t.error_message(), "");
    }
}
