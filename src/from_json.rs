use crate::error::{DecompileError, ErrorKind, Position};
use crate::tokenizer::{Token, Tokenizer};
use crate::value::JsonValue;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Deepest array/object nesting a story may use.
pub const MAX_DEPTH: usize = 256;

/// Drop a leading UTF-8 byte order mark; inklecate writes one.
pub fn strip_bom(input: &[u8]) -> &[u8] {
    input.strip_prefix(UTF8_BOM).unwrap_or(input)
}

/// Read a whole story file into a [`JsonValue`].
///
/// Elements must be separated by commas and nesting may not exceed
/// [`MAX_DEPTH`].
pub fn parse_document(input: &[u8]) -> Result<JsonValue, DecompileError> {
    let input = strip_bom(input);
    let mut reader = DocumentReader {
        input,
        tokens: Tokenizer::new(input),
        depth: 0,
    };
    let first = reader.tokens.next();
    let value = reader.parse_value(first)?;
    match reader.tokens.next() {
        Token::End => Ok(value),
        other => Err(reader.unexpected(other)),
    }
}

struct DocumentReader<'a> {
    input: &'a [u8],
    tokens: Tokenizer<'a>,
    /// Open arrays and objects.
    depth: usize,
}

fn describe(token: Token<'_>) -> String {
    format!(
        "{:?} '{}'",
        token.kind(),
        String::from_utf8_lossy(token.text())
    )
}

impl<'a> DocumentReader<'a> {
    fn unexpected(&self, token: Token<'a>) -> DecompileError {
        match token {
            Token::Error(kind) => DecompileError::lex(kind, self.input, self.tokens.offset()),
            Token::End => DecompileError::lex(
                ErrorKind::PrematureEndOfInput,
                self.input,
                self.tokens.offset(),
            ),
            other => DecompileError::unexpected(describe(other), self.input, self.tokens.offset()),
        }
    }

    fn missing_comma(&self, token: Token<'a>) -> DecompileError {
        DecompileError::unexpected(
            format!("{} where ',' was expected", describe(token)),
            self.input,
            self.tokens.offset(),
        )
    }

    /// Check `token` can start the next element; `first` elements need no comma.
    fn element(&self, token: Token<'a>, first: bool) -> Result<Token<'a>, DecompileError> {
        match token {
            Token::Error(_) | Token::End => Err(self.unexpected(token)),
            _ if !first && !self.tokens.follows_comma() => Err(self.missing_comma(token)),
            _ => Ok(token),
        }
    }

    fn enter(&mut self) -> Result<(), DecompileError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DecompileError::NestingTooDeep {
                limit: MAX_DEPTH,
                position: Position::locate(self.input, self.tokens.offset()),
            });
        }
        Ok(())
    }

    fn decode(&self, raw: &[u8]) -> Result<String, DecompileError> {
        decode_string(raw)
            .map_err(|kind| DecompileError::lex(kind, self.input, self.tokens.offset()))
    }

    /// Build the value that starts with `token` (already read).
    fn parse_value(&mut self, token: Token<'a>) -> Result<JsonValue, DecompileError> {
        match token {
            Token::ObjectStart => self.parse_object(),
            Token::ArrayStart => self.parse_array(),
            Token::String(raw) => Ok(JsonValue::String(self.decode(raw)?)),
            Token::Integer(_) => Ok(JsonValue::Integer(self.tokens.int_value())),
            Token::Float(_) => Ok(JsonValue::Float(self.tokens.float_value())),
            Token::True => Ok(JsonValue::Bool(true)),
            Token::False => Ok(JsonValue::Bool(false)),
            Token::Null => Ok(JsonValue::Null),
            other => Err(self.unexpected(other)),
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue, DecompileError> {
        self.enter()?;
        let mut entries = Vec::new();
        loop {
            let token = self.tokens.next();
            if token == Token::ObjectEnd {
                self.depth -= 1;
                return Ok(JsonValue::Object(entries));
            }
            match self.element(token, entries.is_empty())? {
                Token::FieldName(raw) => {
                    let key = self.decode(raw)?;
                    let token = self.tokens.next();
                    let value = self.parse_value(token)?;
                    entries.push((key, value));
                }
                other => return Err(self.unexpected(other)),
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsonValue, DecompileError> {
        self.enter()?;
        let mut items = Vec::new();
        loop {
            let token = self.tokens.next();
            if token == Token::ArrayEnd {
                self.depth -= 1;
                return Ok(JsonValue::Array(items));
            }
            let token = self.element(token, items.is_empty())?;
            items.push(self.parse_value(token)?);
        }
    }
}

/// Decode a raw string lexeme (quotes included) into its text.
pub fn decode_string(raw: &[u8]) -> Result<String, ErrorKind> {
    let inner = match raw {
        [b'"', inner @ .., b'"'] => inner,
        _ => return Err(ErrorKind::SyntaxError),
    };
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut pos = 0;
    while pos < inner.len() {
        let b = inner[pos];
        pos += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&escape) = inner.get(pos) else {
            return Err(ErrorKind::PrematureEndOfInput);
        };
        pos += 1;
        let ch = match escape {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'b' => '\u{0008}',
            b'f' => '\u{000C}',
            b'u' => {
                let cp = parse_hex4(inner, &mut pos)?;
                if (0xD800..=0xDBFF).contains(&cp) {
                    // High surrogate: a low surrogate must follow.
                    if inner.get(pos..pos + 2) == Some(&b"\\u"[..]) {
                        pos += 2;
                        let low = parse_hex4(inner, &mut pos)?;
                        if (0xDC00..=0xDFFF).contains(&low) {
                            let cp = 0x10000 + ((cp - 0xD800) << 10) + (low - 0xDC00);
                            char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER)
                        } else {
                            char::REPLACEMENT_CHARACTER
                        }
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                } else {
                    char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER)
                }
            }
            _ => return Err(ErrorKind::SyntaxError),
        };
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    String::from_utf8(out).map_err(|_| ErrorKind::InvalidByte)
}

fn parse_hex4(input: &[u8], pos: &mut usize) -> Result<u32, ErrorKind> {
    let hex = input
        .get(*pos..*pos + 4)
        .ok_or(ErrorKind::MalformedUnicodeEscapeSequence)?;
    let hex = std::str::from_utf8(hex).map_err(|_| ErrorKind::MalformedUnicodeEscapeSequence)?;
    let value =
        u32::from_str_radix(hex, 16).map_err(|_| ErrorKind::MalformedUnicodeEscapeSequence)?;
    *pos += 4;
    Ok(value)
}
