// crates/qalam-engine/src/lexer/mod.rs

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[cfg(test)]
mod tests;

lazy_static! {
    static ref DIRECTIVE_RE: Regex = Regex::new(
        r"^\s*@(include|elseif|else|endif|endmacro|endwhile|endrepeat|end|error|warning|macro|while|repeat|if|set)\b(.*?)\s*$"
    )
    .unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"^\s*@(?:\s.*)?$").unwrap();
}

/// A tokenization or structural error, located in the source document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({file}:{line})")]
pub struct SyntaxError {
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, file: &str, line: u32) -> Self {
        SyntaxError {
            message: message.into(),
            file: file.to_string(),
            line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Include,
    Set,
    If,
    Elseif,
    Else,
    Endif,
    Macro,
    Endmacro,
    While,
    Endwhile,
    Repeat,
    Endrepeat,
    Error,
    Warning,
    End,
}

impl Keyword {
    fn parse(text: &str) -> Option<Keyword> {
        Some(match text {
            "include" => Keyword::Include,
            "set" => Keyword::Set,
            "if" => Keyword::If,
            "elseif" => Keyword::Elseif,
            "else" => Keyword::Else,
            "endif" => Keyword::Endif,
            "macro" => Keyword::Macro,
            "endmacro" => Keyword::Endmacro,
            "while" => Keyword::While,
            "endwhile" => Keyword::Endwhile,
            "repeat" => Keyword::Repeat,
            "endrepeat" => Keyword::Endrepeat,
            "error" => Keyword::Error,
            "warning" => Keyword::Warning,
            "end" => Keyword::End,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Include => "include",
            Keyword::Set => "set",
            Keyword::If => "if",
            Keyword::Elseif => "elseif",
            Keyword::Else => "else",
            Keyword::Endif => "endif",
            Keyword::Macro => "macro",
            Keyword::Endmacro => "endmacro",
            Keyword::While => "while",
            Keyword::Endwhile => "endwhile",
            Keyword::Repeat => "repeat",
            Keyword::Endrepeat => "endrepeat",
            Keyword::Error => "error",
            Keyword::Warning => "warning",
            Keyword::End => "end",
        }
    }
}

/// A line-level token. Fragments carry their line terminator, so a document
/// with no directives round-trips byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal output text.
    Fragment { line: u32, text: String },
    /// An inline `@{...}` expression site.
    Inline { line: u32, expr: String },
    /// A directive line with its raw argument text, comments stripped.
    Directive {
        line: u32,
        keyword: Keyword,
        arg: String,
    },
}

impl Token {
    pub fn line(&self) -> u32 {
        match self {
            Token::Fragment { line, .. } => *line,
            Token::Inline { line, .. } => *line,
            Token::Directive { line, .. } => *line,
        }
    }
}

/// Tokenize a document into fragments, inline expression sites and
/// directives. Lines whose first non-blank character is `@` followed by
/// whitespace (or nothing) are comments and produce no token; an `@` not
/// followed by a known keyword is ordinary text.
pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line: u32 = 0;
    while !rest.is_empty() {
        line += 1;
        let (content, terminator, remainder) = next_line(rest);
        rest = remainder;

        let directive = DIRECTIVE_RE.captures(content).and_then(|caps| {
            let keyword = Keyword::parse(caps.get(1)?.as_str())?;
            let raw = caps.get(2).map_or("", |m| m.as_str()).trim();
            Some((keyword, strip_line_comment(raw).to_string()))
        });
        if let Some((keyword, arg)) = directive {
            tokens.push(Token::Directive { line, keyword, arg });
            continue;
        }
        if COMMENT_RE.is_match(content) {
            continue;
        }
        scan_text_line(content, terminator, line, file, &mut tokens)?;
    }
    Ok(tokens)
}

/// Split off one line, returning (content, terminator, rest). The terminator
/// is `"\n"`, `"\r\n"`, or empty for a final unterminated line.
fn next_line(text: &str) -> (&str, &str, &str) {
    match text.find('\n') {
        Some(i) => {
            if i > 0 && text.as_bytes()[i - 1] == b'\r' {
                (&text[..i - 1], &text[i - 1..=i], &text[i + 1..])
            } else {
                (&text[..i], &text[i..=i], &text[i + 1..])
            }
        }
        None => (text, "", ""),
    }
}

/// Strip a trailing `// comment` from directive argument text. Slashes
/// inside quoted strings do not count, so URL locators survive.
fn strip_line_comment(arg: &str) -> &str {
    let bytes = arg.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    return arg[..i].trim_end();
                }
            }
        }
        i += 1;
    }
    arg
}

fn scan_text_line(
    content: &str,
    terminator: &str,
    line: u32,
    file: &str,
    tokens: &mut Vec<Token>,
) -> Result<(), SyntaxError> {
    let mut rest = content;
    while let Some(at) = rest.find("@{") {
        let before = &rest[..at];
        let after = &rest[at + 2..];
        let Some((expr, consumed)) = longest_parseable(after) else {
            return Err(SyntaxError::new("Syntax error in @{...}", file, line));
        };
        if !before.is_empty() {
            tokens.push(Token::Fragment {
                line,
                text: before.to_string(),
            });
        }
        tokens.push(Token::Inline {
            line,
            expr: expr.to_string(),
        });
        rest = &after[consumed..];
    }
    let tail = format!("{rest}{terminator}");
    if !tail.is_empty() {
        tokens.push(Token::Fragment { line, text: tail });
    }
    Ok(())
}

/// Find the longest `}`-terminated prefix that parses as an expression.
/// Expressions may contain `}` inside string literals, so every closing
/// brace is a candidate, tried longest-first.
fn longest_parseable(after: &str) -> Option<(&str, usize)> {
    let closers: Vec<usize> = after.match_indices('}').map(|(i, _)| i).collect();
    for &i in closers.iter().rev() {
        let cand = &after[..i];
        if crate::expr::parse_expression(cand).is_ok() {
            return Some((cand, i + 1));
        }
    }
    None
}
