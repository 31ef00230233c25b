use super::token::{Token, TokenKind};
use crate::diagnostic::{Code, DiagnosticSink};

/// Scans the whole source into a token vector ending with `Eof`.
///
/// A lone `&` or `|` reports code `a` and recovers as `&&`/`||`; any other
/// unrecognized character reports `a` and is skipped.
pub fn lex(source: &str, sink: &mut DiagnosticSink) -> Vec<Token> {
    Lexer::new(source, sink).run()
}

struct Lexer<'s, 'd> {
    source: &'s [u8],
    pos: usize,
    line: u32,
    sink: &'d mut DiagnosticSink,
}

impl<'s, 'd> Lexer<'s, 'd> {
    fn new(source: &'s str, sink: &'d mut DiagnosticSink) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            sink,
        }
    }

    fn run(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(ch), _) if ch.is_ascii_whitespace() => {
                    self.bump();
                }
                (Some(b'/'), Some(b'/')) => {
                    while self.peek().is_some_and(|ch| ch != b'\n') {
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek2()) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => break,
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize, line: u32) -> Token {
        Token {
            kind,
            line,
            span: (start..self.pos).into(),
        }
    }

    fn next_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let start = self.pos;
            let line = self.line;
            let Some(ch) = self.bump() else {
                return self.token(TokenKind::Eof, start, line);
            };

            let kind = match ch {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    while self
                        .peek()
                        .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
                    {
                        self.bump();
                    }
                    let ident = std::str::from_utf8(&self.source[start..self.pos])
                        .expect("source is ascii here")
                        .to_owned();
                    TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident))
                }
                b'0'..=b'9' => {
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    let digits = std::str::from_utf8(&self.source[start..self.pos])
                        .expect("source is ascii here");
                    TokenKind::IntConst(digits.parse().unwrap_or_default())
                }
                b'"' => {
                    let content_start = self.pos;
                    while self.peek().is_some_and(|c| c != b'"' && c != b'\n') {
                        self.bump();
                    }
                    let content = String::from_utf8_lossy(&self.source[content_start..self.pos])
                        .into_owned();
                    // Eat the closing quote; an unterminated string just ends
                    // at the line break.
                    if self.peek() == Some(b'"') {
                        self.bump();
                    }
                    TokenKind::StrConst(content)
                }
                b'&' => {
                    if self.peek() == Some(b'&') {
                        self.bump();
                    } else {
                        self.sink.report(line, Code::IllegalSymbol, (start..self.pos).into());
                    }
                    TokenKind::AndAnd
                }
                b'|' => {
                    if self.peek() == Some(b'|') {
                        self.bump();
                    } else {
                        self.sink.report(line, Code::IllegalSymbol, (start..self.pos).into());
                    }
                    TokenKind::OrOr
                }
                b'<' => self.with_eq(TokenKind::Le, TokenKind::Lt),
                b'>' => self.with_eq(TokenKind::Ge, TokenKind::Gt),
                b'=' => self.with_eq(TokenKind::Eq, TokenKind::Assign),
                b'!' => self.with_eq(TokenKind::Ne, TokenKind::Not),
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'%' => TokenKind::Percent,
                b',' => TokenKind::Comma,
                b';' => TokenKind::Semicolon,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                _ => {
                    self.sink.report(line, Code::IllegalSymbol, (start..self.pos).into());
                    continue;
                }
            };
            return self.token(kind, start, line);
        }
    }

    fn with_eq(&mut self, with: TokenKind, without: TokenKind) -> TokenKind {
        if self.peek() == Some(b'=') {
            self.bump();
            with
        } else {
            without
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut sink = DiagnosticSink::new();
        lex(source, &mut sink)
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("const int static foo"),
            vec![
                TokenKind::Const,
                TokenKind::Int,
                TokenKind::Static,
                TokenKind::Ident("foo".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("<= >= == != < > = ! && ||"),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
                TokenKind::Not,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_and_lines() {
        let mut sink = DiagnosticSink::new();
        let tokens = lex("a // one\n/* two\nthree */ b", &mut sink);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
        assert!(sink.is_empty());
    }

    #[test]
    fn lone_ampersand_reports_a_and_recovers() {
        let mut sink = DiagnosticSink::new();
        let tokens = lex("a & b\nc | d", &mut sink);
        assert_eq!(tokens[1].kind, TokenKind::AndAnd);
        assert_eq!(tokens[4].kind, TokenKind::OrOr);
        assert_eq!(sink.dump(), "1 a\n2 a\n");
    }

    #[test]
    fn string_constant_keeps_raw_content() {
        let mut sink = DiagnosticSink::new();
        let tokens = lex(r#"printf("x=%d\n", x)"#, &mut sink);
        assert_eq!(tokens[2].kind, TokenKind::StrConst("x=%d\\n".into()));
    }

    #[test]
    fn illegal_character() {
        let mut sink = DiagnosticSink::new();
        let tokens = lex("int $x;", &mut sink);
        assert_eq!(tokens[1].kind, TokenKind::Ident("x".into()));
        assert_eq!(sink.dump(), "1 a\n");
    }
}
