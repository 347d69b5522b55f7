// crates/qalam-engine/src/expr/scanner.rs

use super::ExprError;

/// A lexical token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    /// `||`
    Or,
    /// `&&`
    And,
    /// single `|`, the filter operator
    Pipe,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}

/// Human-readable token text for error messages.
pub fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Number(n) => format!("\"{}\"", crate::value::format_number(*n)),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Ident(name) => format!("\"{name}\""),
        Tok::LParen => "\"(\"".to_string(),
        Tok::RParen => "\")\"".to_string(),
        Tok::LBracket => "\"[\"".to_string(),
        Tok::RBracket => "\"]\"".to_string(),
        Tok::Comma => "\",\"".to_string(),
        Tok::Dot => "\".\"".to_string(),
        Tok::Question => "\"?\"".to_string(),
        Tok::Colon => "\":\"".to_string(),
        Tok::Or => "\"||\"".to_string(),
        Tok::And => "\"&&\"".to_string(),
        Tok::Pipe => "\"|\"".to_string(),
        Tok::Eq => "\"==\"".to_string(),
        Tok::Ne => "\"!=\"".to_string(),
        Tok::Le => "\"<=\"".to_string(),
        Tok::Ge => "\">=\"".to_string(),
        Tok::Lt => "\"<\"".to_string(),
        Tok::Gt => "\">\"".to_string(),
        Tok::Plus => "\"+\"".to_string(),
        Tok::Minus => "\"-\"".to_string(),
        Tok::Star => "\"*\"".to_string(),
        Tok::Slash => "\"/\"".to_string(),
        Tok::Percent => "\"%\"".to_string(),
        Tok::Bang => "\"!\"".to_string(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Result<Tok, ExprError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                // not an exponent after all
                self.pos = mark;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Tok::Number)
            .map_err(|_| ExprError::Syntax(format!("Invalid number \"{text}\"")))
    }

    fn string(&mut self, quote: char) -> Result<Tok, ExprError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ExprError::Syntax("Unterminated string literal".to_string())),
                Some(c) if c == quote => return Ok(Tok::Str(text)),
                Some('\\') => match self.bump() {
                    None => {
                        return Err(ExprError::Syntax("Unterminated string literal".to_string()))
                    }
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some(other) => text.push(other),
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn ident(&mut self) -> Tok {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        Tok::Ident(self.chars[start..self.pos].iter().collect())
    }
}

/// Tokenize expression text. Single `=`, single `&` and backticks are not
/// part of the language and fail here.
pub fn scan(input: &str) -> Result<Vec<Tok>, ExprError> {
    let mut scanner = Scanner {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut toks = Vec::new();
    while let Some(c) = scanner.peek() {
        if c.is_whitespace() {
            scanner.pos += 1;
            continue;
        }
        if c.is_ascii_digit()
            || (c == '.' && scanner.peek_next().is_some_and(|n| n.is_ascii_digit()))
        {
            toks.push(scanner.number()?);
            continue;
        }
        if is_ident_start(c) {
            toks.push(scanner.ident());
            continue;
        }
        if c == '\'' || c == '"' {
            scanner.pos += 1;
            toks.push(scanner.string(c)?);
            continue;
        }
        scanner.pos += 1;
        let tok = match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            ',' => Tok::Comma,
            '.' => Tok::Dot,
            '?' => Tok::Question,
            ':' => Tok::Colon,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '%' => Tok::Percent,
            '|' => {
                if scanner.eat('|') {
                    Tok::Or
                } else {
                    Tok::Pipe
                }
            }
            '&' => {
                if scanner.eat('&') {
                    Tok::And
                } else {
                    return Err(ExprError::Syntax("Unexpected character \"&\"".to_string()));
                }
            }
            '=' => {
                if scanner.eat('=') {
                    Tok::Eq
                } else {
                    return Err(ExprError::Syntax("Unexpected character \"=\"".to_string()));
                }
            }
            '!' => {
                if scanner.eat('=') {
                    Tok::Ne
                } else {
                    Tok::Bang
                }
            }
            '<' => {
                if scanner.eat('=') {
                    Tok::Le
                } else {
                    Tok::Lt
                }
            }
            '>' => {
                if scanner.eat('=') {
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            '`' => {
                return Err(ExprError::Syntax(
                    "Backtick template strings are not supported".to_string(),
                ))
            }
            other => {
                return Err(ExprError::Syntax(format!(
                    "Unexpected character \"{other}\""
                )))
            }
        };
        toks.push(tok);
    }
    Ok(toks)
}
