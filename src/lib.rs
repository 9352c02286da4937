pub mod driver;
pub mod error;
pub mod expression;
pub mod from_json;
pub mod registry;
pub mod statement;
pub mod tokenizer;
pub mod value;

pub use driver::{Driver, Story};
pub use error::{DecompileError, ErrorKind, Position};
pub use tokenizer::{Token, TokenKind, Tokenizer};

// ── Core API ───────────────────────────────────────────────────────

/// Decompile compiled ink story JSON back into ink script.
///
/// Each call uses a fresh [`Driver`], so global names never leak between
/// stories.
pub fn decompile_story(input: &[u8]) -> Result<String, DecompileError> {
    Driver::new().decompile(input)
}

/// List the tokens of `input`, one per line: kind and raw text, plus the
/// integer and float readings for numbers. A leading byte order mark is
/// skipped. Returns `false` if lexing stopped on an error, whose message is
/// the last line.
pub fn dump_tokens(input: &[u8], out: &mut String) -> bool {
    let mut tokens = Tokenizer::new(from_json::strip_bom(input));
    loop {
        let token = tokens.next();
        match token {
            Token::End => return true,
            Token::Error(_) => {
                out.push_str(&format!("Error\t{}\n", tokens.error_message()));
                return false;
            }
            Token::Integer(_) | Token::Float(_) => out.push_str(&format!(
                "{:?}\t{}\t{}\t{}\n",
                token.kind(),
                String::from_utf8_lossy(tokens.data_value()),
                tokens.int_value(),
                tokens.float_value()
            )),
            _ => out.push_str(&format!(
                "{:?}\t{}\n",
                token.kind(),
                String::from_utf8_lossy(tokens.data_value())
            )),
        }
    }
}

#[cfg(test)]
mod tests;
