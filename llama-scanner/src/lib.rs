//! Character stream -> token stream, plus the refactor pass that disambiguates
//! unary operators and inserts synthetic call-boundary tokens.
//!
//! Grounded directly on `original_source/src/lexer.cpp`: the keyword table, the
//! operator/number/string/label scanning, and the refactor pass's bracket-stack
//! algorithm are all ports of that file's logic into idiomatic Rust.

use llama_core::diagnostics::{LogLevel, Status};
use llama_core::position::Position;
use llama_core::token::{Token, TokenKind};
use llama_core::Logger;

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_hexdigit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

fn is_octal(c: u8) -> bool {
    (b'0'..=b'7').contains(&c)
}

fn is_binary(c: u8) -> bool {
    c == b'0' || c == b'1'
}

fn is_op_char(c: u8) -> bool {
    matches!(
        c,
        b'+' | b'-' | b'/' | b'%' | b',' | b':' | b'.' | b'(' | b')' | b'{' | b'}' | b'[' | b']' | b';' | b'*' | b'!' | b'>' | b'<' | b'='
    )
}

fn is_str_quote(c: u8) -> bool {
    matches!(c, b'\'' | b'"' | b'`')
}

fn is_literal_marker(c: u8) -> bool {
    matches!(c.to_ascii_lowercase(), b'x' | b'o' | b'b')
}

fn is_label_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ascii(c: u8) -> bool {
    c < 0x7f
}

fn is_unary_sign(c: u8) -> bool {
    c == b'+' || c == b'-'
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    tokens: Vec<Token>,
}

const ERROR: usize = usize::MAX;

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source, bytes: source.as_bytes(), tokens: Vec::new() }
    }

    pub fn scan(mut self, log: &mut Logger) -> Result<Vec<Token>, Status> {
        if self.read_str(log) == Status::Failure {
            return Err(Status::Failure);
        }
        if self.refactor(log) == Status::Failure {
            return Err(Status::Failure);
        }
        Ok(self.tokens)
    }

    fn seek(&self, pos: usize) -> u8 {
        self.bytes.get(pos).copied().unwrap_or(0)
    }

    fn pos_at(&self, byte: usize) -> Position {
        Position::from_offsets(self.source, byte, byte + 1)
    }

    fn push(&mut self, start: usize, end: usize, kind: TokenKind, lexeme: String) {
        if kind == TokenKind::Eof && lexeme.is_empty() {
            return;
        }
        let position = Position::from_offsets(self.source, start, end);
        self.tokens.push(Token::new(kind, lexeme, position));
    }

    fn read_str(&mut self, log: &mut Logger) -> Status {
        let len = self.bytes.len();
        let mut i = 0usize;
        while i < len {
            let old_i = i;
            let c = self.bytes[i];

            if is_space(c) {
                i += 1;
                continue;
            } else if c == b'/' && matches!(self.seek(i + 1), b'*' | b'/') {
                i = self.read_comment(i, log);
            } else if is_digit(c) || (c == b'.' && is_digit(self.seek(i + 1))) {
                i = self.read_number(i, log);
            } else if is_str_quote(c) {
                i = self.read_string(i, log);
            } else if is_op_char(c) {
                i = self.read_op(i, log);
            } else if is_label_start(c) || !is_ascii(c) {
                i = self.read_label(i, log);
            } else {
                log.log(LogLevel::SyntaxError, self.pos_at(i), format!("unexpected character {}", c as char));
                return Status::Failure;
            }

            if i == old_i {
                log.log(LogLevel::SyntaxError, self.pos_at(i), "infinite loop, aborting");
                return Status::Failure;
            } else if i == ERROR {
                return Status::Failure;
            }
        }
        Status::Ok
    }

    fn read_comment(&mut self, start: usize, log: &mut Logger) -> usize {
        let len = self.bytes.len();
        let mut i = start + 2;
        let lined = self.bytes[start] == b'/' && self.seek(start + 1) == b'/';
        let mlined = self.bytes[start] == b'/' && self.seek(start + 1) == b'*';
        let mut has_end = false;

        while i < len {
            let single_end = lined && self.bytes[i] == b'\n';
            let multi_end = mlined && self.bytes[i] == b'*' && self.seek(i + 1) == b'/';
            if single_end || multi_end {
                has_end = true;
                break;
            }
            i += 1;
        }
        if lined {
            has_end = true;
        }
        if !has_end {
            log.log(LogLevel::SyntaxError, self.pos_at(start), "unterminated comment");
            return ERROR;
        }
        i + 1 + (mlined as usize)
    }

    fn read_string(&mut self, start: usize, log: &mut Logger) -> usize {
        let len = self.bytes.len();
        let first = self.bytes[start];
        let mut i = start + 1;
        let mut raw = Vec::new();
        let mut has_end = false;

        while i < len {
            if self.bytes[i] == first {
                has_end = true;
                break;
            }
            raw.push(self.bytes[i]);
            i += 1;
        }
        if !has_end {
            log.log(LogLevel::SyntaxError, self.pos_at(start), "unterminated string");
            return ERROR;
        }

        match decode_escapes(&raw) {
            Ok(text) => self.push(start, i + 1, TokenKind::String, text),
            Err(offset) => {
                log.log(LogLevel::SyntaxError, self.pos_at(start + 1 + offset), "unrecognised escape sequence");
                return ERROR;
            }
        }
        i + 1
    }

    fn read_number(&mut self, start: usize, log: &mut Logger) -> usize {
        let mut kind = TokenKind::Integer;
        let lit = self.seek(start + 1);
        let end;

        if self.bytes[start] == b'0' && is_literal_marker(lit) {
            end = match lit.to_ascii_lowercase() {
                b'x' => self.search_radix(start + 2, is_hexdigit, "hexadecimal", log),
                b'o' => self.search_radix(start + 2, is_octal, "octal", log),
                b'b' => self.search_radix(start + 2, is_binary, "binary", log),
                _ => {
                    log.log(LogLevel::SyntaxError, self.pos_at(start + 1), format!("invalid literal {}", lit as char));
                    ERROR
                }
            };
        } else {
            let mut has_dot = false;
            end = self.search_decimal(start, &mut has_dot, log);
            if has_dot {
                kind = TokenKind::Decimal;
            }
        }

        if end != ERROR && end > start {
            let lexeme = self.source[start..end].to_string();
            self.push(start, end, kind, lexeme);
        }
        end
    }

    fn search_radix(&self, start: usize, accept: impl Fn(u8) -> bool, name: &str, log: &mut Logger) -> usize {
        let len = self.bytes.len();
        let mut i = start;
        while i < len {
            let c = self.bytes[i];
            if accept(c) || c == b'_' {
                i += 1;
                continue;
            } else if is_space(c) || is_op_char(c) {
                break;
            } else {
                log.log(LogLevel::SyntaxError, self.pos_at(i), format!("{name} number containing non-{name} character {}", c as char));
                return ERROR;
            }
        }
        i
    }

    fn search_decimal(&self, start: usize, has_dot: &mut bool, log: &mut Logger) -> usize {
        let len = self.bytes.len();
        let mut i = start;
        let mut has_e = false;
        let mut has_end = false;
        let mut has_sig = false;

        while i < len {
            let c = self.bytes[i];

            if is_unary_sign(c) && has_e {
                if has_sig {
                    log.log(LogLevel::SyntaxError, self.pos_at(i), "duplicated signal on e-notation exponent");
                    return ERROR;
                }
                has_sig = true;
                i += 1;
                continue;
            }

            if is_digit(c) || c == b'_' {
                i += 1;
                if has_e {
                    has_end = true;
                }
                continue;
            } else if c.to_ascii_lowercase() == b'e' {
                if has_e {
                    log.log(LogLevel::SyntaxError, self.pos_at(i), "duplicated e-notation marker in number");
                    return ERROR;
                }
                has_e = true;
                i += 1;
                continue;
            } else if c == b'.' {
                if has_e {
                    log.log(LogLevel::SyntaxError, self.pos_at(i), "decimal number on e-notation exponent");
                    return ERROR;
                }
                if *has_dot {
                    log.log(LogLevel::SyntaxError, self.pos_at(i), "duplicated dot in number");
                    return ERROR;
                }
                *has_dot = true;
                i += 1;
                continue;
            } else if is_space(c) || is_op_char(c) {
                if has_e && !has_end {
                    log.log(LogLevel::SyntaxError, self.pos_at(i), "invalid e-notation exponent");
                    return ERROR;
                }
                break;
            } else {
                log.log(LogLevel::SyntaxError, self.pos_at(i), "malformed number");
                return ERROR;
            }
        }
        i
    }

    fn read_op(&mut self, start: usize, log: &mut Logger) -> usize {
        let c = self.bytes[start];
        let mut kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Multiply,
            b'/' => TokenKind::Divide,
            b'%' => TokenKind::Modulo,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'.' => TokenKind::Dot,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b'!' => TokenKind::Not,
            b'>' => TokenKind::Greater,
            b'<' => TokenKind::Less,
            b'=' => TokenKind::Equal,
            _ => TokenKind::Eof,
        };

        let mut i = start;
        let mut len = 1;
        let lc = self.seek(i + 1);
        if is_op_char(lc) {
            match lc {
                b'*' if c == b'*' => {
                    kind = TokenKind::Power;
                    i += 1;
                    len = 2;
                }
                b'=' => {
                    let two = match c {
                        b'>' => Some(TokenKind::GreaterEqual),
                        b'<' => Some(TokenKind::LessEqual),
                        b'=' => Some(TokenKind::EqualEqual),
                        b'!' => Some(TokenKind::NotEqual),
                        _ => None,
                    };
                    if let Some(k) = two {
                        kind = k;
                        i += 1;
                        len = 2;
                    }
                }
                _ => {}
            }
        }

        if kind == TokenKind::Eof {
            log.log(LogLevel::SyntaxError, self.pos_at(start), format!("unknown operator {}", c as char));
            return ERROR;
        }

        let lexeme = self.source[start..start + len].to_string();
        self.push(start, start + len, kind, lexeme);
        i + 1
    }

    fn read_label(&mut self, start: usize, log: &mut Logger) -> usize {
        let len = self.bytes.len();
        let mut i = start;
        while i < len {
            let c = self.bytes[i];
            if is_label_start(c) || is_digit(c) {
                i += 1;
                continue;
            } else if is_space(c) || is_op_char(c) {
                break;
            } else if !is_ascii(c) {
                log.log(LogLevel::SyntaxError, self.pos_at(start), "special UTF-8 characters are not allowed for labels");
                return ERROR;
            } else {
                log.log(LogLevel::SyntaxError, self.pos_at(i), format!("unexpected character '{}' in label", c as char));
                return ERROR;
            }
        }
        let lexeme = self.source[start..i].to_string();
        self.push(start, i, TokenKind::Label, lexeme);
        i
    }

    /// The refactor pass: keyword retyping, call-boundary insertion, unary
    /// disambiguation, driven by a single bracket-expectation stack.
    fn refactor(&mut self, log: &mut Logger) -> Status {
        #[derive(Clone, Copy, PartialEq)]
        enum Expect {
            Bracket(TokenKind),
            CallEnd,
        }

        let mut expects: Vec<Expect> = Vec::new();
        let mut last_kind: Option<TokenKind> = None;
        let mut is_fn = false;
        let mut i = 0usize;

        while i < self.tokens.len() {
            let mut kind = self.tokens[i].kind;
            let position = self.tokens[i].position;
            let lexeme = self.tokens[i].lexeme.clone();

            if kind.is_internal() {
                i += 1;
                continue;
            }

            if kind == TokenKind::Label {
                if let Some(k) = TokenKind::keyword(&lexeme) {
                    kind = k;
                    if kind == TokenKind::Fn {
                        is_fn = true;
                    }
                }
            }

            let next_kind = self.tokens.get(i + 1).map(|t| t.kind);
            if !is_fn && kind.is_callable() && next_kind == Some(TokenKind::LParen) {
                // Insert CallStart right after the opening paren.
                self.tokens.insert(i + 2, Token::new(TokenKind::CallStart, "", position));
                expects.push(Expect::CallEnd);
            }

            let prev_is_operand = i > 0 && self.tokens.get(i - 1).map(|t| t.kind.is_operand()).unwrap_or(false);
            let next_is_operand = self.tokens.get(i + 1).map(|t| t.kind.is_operand()).unwrap_or(false);
            if kind.is_operator() && next_is_operand && !prev_is_operand {
                if kind == TokenKind::Plus {
                    kind = TokenKind::UnaryPlus;
                } else if kind == TokenKind::Minus {
                    kind = TokenKind::UnaryMinus;
                }
            }

            let is_expr_like = kind.is_arithmetic() || kind.is_logical() || matches!(kind, TokenKind::As | TokenKind::Ref | TokenKind::Comma | TokenKind::Colon | TokenKind::Dot);
            let last_is_binary_boundary = last_kind
                .map(|k| k.is_arithmetic() || matches!(k, TokenKind::As | TokenKind::Ref | TokenKind::Comma | TokenKind::Colon | TokenKind::Dot))
                .unwrap_or(false);
            // Legitimate unary-prefixed operands following a binary operator (e.g. `1 + -2`)
            // are exempted: only a genuinely doubled binary/special operator is an error.
            if is_expr_like && !matches!(kind, TokenKind::UnaryPlus | TokenKind::UnaryMinus | TokenKind::Not) && last_is_binary_boundary {
                log.log(LogLevel::SyntaxError, position, format!("unexpected operator '{lexeme}'"));
                return Status::Failure;
            } else if kind.is_lscope() {
                expects.push(Expect::Bracket(reverse_bracket(kind)));
                is_fn = false;
            } else if kind.is_rscope() {
                match expects.pop() {
                    Some(Expect::Bracket(expected)) if expected == kind => {}
                    Some(_) => {
                        log.log(LogLevel::SyntaxError, position, format!("unexpected token '{lexeme}'"));
                        return Status::Failure;
                    }
                    None => {
                        log.log(LogLevel::SyntaxError, position, format!("unmatched token '{lexeme}'"));
                        return Status::Failure;
                    }
                }
                if expects.last() == Some(&Expect::CallEnd) {
                    self.tokens.insert(i + 1, Token::new(TokenKind::CallEnd, "", position));
                    expects.pop();
                }
            }

            if !kind.is_internal() {
                last_kind = Some(kind);
            }
            self.tokens[i].kind = kind;

            i += 1;
        }

        if !expects.is_empty() {
            log.log(LogLevel::SyntaxError, Position::unknown(), "unmatched bracket at end of input");
            return Status::Failure;
        }

        Status::Ok
    }
}

fn reverse_bracket(kind: TokenKind) -> TokenKind {
    match kind {
        TokenKind::LParen => TokenKind::RParen,
        TokenKind::LBrace => TokenKind::RBrace,
        TokenKind::LBracket => TokenKind::RBracket,
        other => other,
    }
}

/// Interprets `\n \t \r \\ \0 \' \" \`` escapes inside a string literal's raw bytes.
/// Returns the byte offset of the first unrecognised escape on failure.
fn decode_escapes(raw: &[u8]) -> Result<String, usize> {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            let decoded = match raw[i + 1] {
                b'n' => '\n',
                b't' => '\t',
                b'r' => '\r',
                b'\\' => '\\',
                b'0' => '\0',
                b'\'' => '\'',
                b'"' => '"',
                b'`' => '`',
                _ => return Err(i),
            };
            out.push(decoded);
            i += 2;
        } else {
            let ch_len = utf8_len(raw[i]);
            let end = (i + ch_len).min(raw.len());
            out.push_str(&String::from_utf8_lossy(&raw[i..end]));
            i = end;
        }
    }
    Ok(out)
}

fn utf8_len(byte: u8) -> usize {
    if byte & 0x80 == 0 {
        1
    } else if byte & 0xe0 == 0xc0 {
        2
    } else if byte & 0xf0 == 0xe0 {
        3
    } else if byte & 0xf8 == 0xf0 {
        4
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_ok(src: &str) -> Vec<Token> {
        let mut log = Logger::new();
        log.set_recoverable(true);
        Lexer::new(src).scan(&mut log).expect("scan should succeed")
    }

    #[test]
    fn token_lexemes_round_trip_into_source() {
        let src = "var x = 1 + 2;";
        let tokens = scan_ok(src);
        for t in &tokens {
            if t.kind.is_internal() {
                continue;
            }
            assert_eq!(&src[t.position.start..t.position.end], t.lexeme);
        }
    }

    #[test]
    fn keywords_are_retyped_from_labels() {
        let tokens = scan_ok("while true {}");
        assert_eq!(tokens[0].kind, TokenKind::While);
        assert_eq!(tokens[1].kind, TokenKind::True);
    }

    #[test]
    fn call_boundaries_are_synthesised_around_arguments() {
        let tokens = scan_ok("sq(5);");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Label, TokenKind::LParen, TokenKind::CallStart, TokenKind::Integer, TokenKind::RParen, TokenKind::CallEnd, TokenKind::Semicolon]
        );
    }

    #[test]
    fn unary_minus_is_distinguished_from_binary_minus() {
        let tokens = scan_ok("var r = 1 + -2;");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::UnaryMinus));
        assert!(kinds.contains(&TokenKind::Plus));
    }

    #[test]
    fn duplicated_dot_in_number_is_a_syntax_error() {
        let mut log = Logger::new();
        log.set_recoverable(true);
        let result = Lexer::new("var x = 1.2.3;").scan(&mut log);
        assert!(result.is_err());
    }

    #[test]
    fn fn_declaration_does_not_get_call_boundaries() {
        let tokens = scan_ok("fn sq(x) { return x; }");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert!(!kinds.contains(&TokenKind::CallStart));
    }
}
