//! PAF tokenizer
//!
//! Comments run from `#` to end of line and are dropped. Newlines are kept
//! as tokens because a value list ends at the end of its line.

use crate::error::{ParseError, ParseResult};

/// Token kinds produced by [`tokenize`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Unquoted run of non-delimiter characters
    Word(String),
    /// Quoted string with escapes already processed
    Quoted(String),
    /// `@path` or `@"path"`
    FileRef(String),
    Equals,
    Colon,
    LBrace,
    RBrace,
    Newline,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Word(w) => format!("'{w}'"),
            Self::Quoted(s) => format!("string \"{s}\""),
            Self::FileRef(p) => format!("file reference @{p}"),
            Self::Equals => "'='".to_string(),
            Self::Colon => "':'".to_string(),
            Self::LBrace => "'{'".to_string(),
            Self::RBrace => "'}'".to_string(),
            Self::Newline => "end of line".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its 1-based source position
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '=' | ':' | '#' | '"' | '\'')
}

struct Lexer<'s> {
    chars: std::iter::Peekable<std::str::Chars<'s>>,
    line: usize,
    column: usize,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_delimiter(c) {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }

    fn quoted(&mut self, line: usize, column: usize) -> ParseResult<String> {
        let Some(quote) = self.bump() else {
            return Err(ParseError::syntax(line, column, "expected string"));
        };
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(ParseError::syntax(line, column, "unterminated string"));
                }
                Some(c) if c == quote => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(c @ ('\\' | '"' | '\'')) => text.push(c),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => {
                        return Err(ParseError::syntax(line, column, "unterminated string"));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        loop {
            match self.chars.peek() {
                Some('#') => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(&c) if c.is_whitespace() && c != '\n' => {
                    self.bump();
                }
                _ => break,
            }
        }

        let (line, column) = (self.line, self.column);
        let token = |kind| Token { kind, line, column };

        let Some(&c) = self.chars.peek() else {
            return Ok(token(TokenKind::Eof));
        };

        let kind = match c {
            '\n' => {
                self.bump();
                TokenKind::Newline
            }
            '=' => {
                self.bump();
                TokenKind::Equals
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '{' => {
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bump();
                TokenKind::RBrace
            }
            '"' | '\'' => TokenKind::Quoted(self.quoted(line, column)?),
            '@' => {
                self.bump();
                let path = match self.chars.peek() {
                    Some('"' | '\'') => self.quoted(line, column)?,
                    _ => self.word(),
                };
                if path.is_empty() {
                    return Err(ParseError::syntax(line, column, "file reference without a path"));
                }
                TokenKind::FileRef(path)
            }
            _ => TokenKind::Word(self.word()),
        };
        Ok(token(kind))
    }
}

/// Split PAF source text into tokens, ending with [`TokenKind::Eof`]
///
/// # Errors
/// Unterminated strings and empty file references are syntax errors
pub(crate) fn tokenize(source: &str) -> ParseResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn word(w: &str) -> TokenKind {
        TokenKind::Word(w.to_string())
    }

    #[test]
    fn simple_assignment() {
        assert_eq!(
            kinds("a.b = 12\n"),
            vec![word("a.b"), TokenKind::Equals, word("12"), TokenKind::Newline, TokenKind::Eof]
        );
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(
            kinds("# <?cfg PAF policy ?>\nx: 1 # trailing\n"),
            vec![
                TokenKind::Newline,
                word("x"),
                TokenKind::Colon,
                word("1"),
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn quoted_strings_and_escapes() {
        assert_eq!(
            kinds(r#"s = "a # not a comment" 'it\'s' "tab\there""#),
            vec![
                word("s"),
                TokenKind::Equals,
                TokenKind::Quoted("a # not a comment".into()),
                TokenKind::Quoted("it's".into()),
                TokenKind::Quoted("tab\there".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn file_references() {
        assert_eq!(
            kinds(r#"inc: @sub/dir.paf @"with space.paf""#),
            vec![
                word("inc"),
                TokenKind::Colon,
                TokenKind::FileRef("sub/dir.paf".into()),
                TokenKind::FileRef("with space.paf".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn braces_split_words() {
        assert_eq!(
            kinds("a:{b=1}"),
            vec![
                word("a"),
                TokenKind::Colon,
                TokenKind::LBrace,
                word("b"),
                TokenKind::Equals,
                word("1"),
                TokenKind::RBrace,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = tokenize("\n  key = v").unwrap();
        let key = &tokens[1];
        assert_eq!((key.line, key.column), (2, 3));
        let value = &tokens[3];
        assert_eq!((value.line, value.column), (2, 9));
    }

    #[test]
    fn unterminated_string_fails() {
        let err = tokenize("a = \"open\nb = 1").unwrap_err();
        assert_eq!(err.position(), Some((1, 5)));
    }

    #[test]
    fn bare_at_fails() {
        assert!(tokenize("a = @ \n").is_err());
    }
}
