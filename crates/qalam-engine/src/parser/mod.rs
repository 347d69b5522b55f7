// crates/qalam-engine/src/parser/mod.rs

use lazy_static::lazy_static;
use regex::Regex;

use crate::lexer::{tokenize, Keyword, SyntaxError, Token};


lazy_static! {
    static ref ONCE_RE: Regex = Regex::new(r"^once\s+(\S.*)$").unwrap();
    static ref SET_RE: Regex =
        Regex::new(r"^([A-Za-z_$][A-Za-z0-9_$]*)(?:\s*=\s*|\s+)(\S.*)$").unwrap();
}

/// Executable statements. Expression text stays raw here and is parsed again
/// at execution time, where the current context decides what it means.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A line fragment: literal text, or an inline expression to evaluate.
    Output {
        line: u32,
        value: String,
        literal: bool,
    },
    Include {
        line: u32,
        value: String,
        once: bool,
    },
    Set {
        line: u32,
        variable: String,
        value: String,
    },
    Error {
        line: u32,
        value: String,
    },
    Warning {
        line: u32,
        value: String,
    },
    Conditional(Conditional),
    MacroDecl {
        line: u32,
        declaration: String,
        body: Vec<Statement>,
    },
    Loop(Loop),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub line: u32,
    pub test: String,
    pub consequent: Vec<Statement>,
    pub elseifs: Vec<Conditional>,
    pub alternate: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub line: u32,
    pub kind: LoopKind,
    pub condition: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    Repeat,
}

/// Tokenize and build the statement tree for one document.
pub fn parse(source: &str, file: &str) -> Result<Vec<Statement>, SyntaxError> {
    let tokens = tokenize(source, file)?;
    TreeParser::new(&tokens, file).parse_document()
}

/// What ended a block: a branch keyword, a closing keyword, or the end of
/// the token stream. Validity depends on the block being closed and is
/// checked by the caller.
enum Closer {
    Elseif { line: u32, test: String },
    Else { line: u32 },
    End { line: u32, keyword: Keyword },
    Eof,
}

struct TreeParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    file: &'t str,
    last_line: u32,
}

impl<'t> TreeParser<'t> {
    fn new(tokens: &'t [Token], file: &'t str) -> Self {
        TreeParser {
            tokens,
            pos: 0,
            file,
            last_line: 1,
        }
    }

    fn parse_document(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let (statements, closer) = self.parse_block()?;
        match closer {
            Closer::Eof => Ok(statements),
            Closer::Elseif { line, .. } => Err(self.unexpected(Keyword::Elseif, line)),
            Closer::Else { line } => Err(self.unexpected(Keyword::Else, line)),
            Closer::End { line, keyword } => Err(self.unexpected(keyword, line)),
        }
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        self.last_line = token.line();
        Some(token)
    }

    fn error(&self, message: impl Into<String>, line: u32) -> SyntaxError {
        SyntaxError::new(message, self.file, line)
    }

    fn unexpected(&self, keyword: Keyword, line: u32) -> SyntaxError {
        self.error(format!("Unexpected @{}", keyword.as_str()), line)
    }

    fn bad_directive(&self, keyword: Keyword, line: u32) -> SyntaxError {
        self.error(format!("Syntax error in @{}", keyword.as_str()), line)
    }

    /// Collect statements until a closer token or end of stream.
    fn parse_block(&mut self) -> Result<(Vec<Statement>, Closer), SyntaxError> {
        let mut statements = Vec::new();
        while let Some(token) = self.next() {
            match token {
                Token::Fragment { line, text } => statements.push(Statement::Output {
                    line: *line,
                    value: text.clone(),
                    literal: true,
                }),
                Token::Inline { line, expr } => statements.push(Statement::Output {
                    line: *line,
                    value: expr.clone(),
                    literal: false,
                }),
                Token::Directive { line, keyword, arg } => {
                    let line = *line;
                    let arg = arg.as_str();
                    match keyword {
                        Keyword::Include => {
                            let (once, value) = match ONCE_RE.captures(arg) {
                                Some(caps) => (true, caps[1].to_string()),
                                None => (false, arg.to_string()),
                            };
                            if value.is_empty() {
                                return Err(self.bad_directive(Keyword::Include, line));
                            }
                            statements.push(Statement::Include { line, value, once });
                        }
                        Keyword::Set => {
                            let Some(caps) = SET_RE.captures(arg) else {
                                return Err(self.bad_directive(Keyword::Set, line));
                            };
                            statements.push(Statement::Set {
                                line,
                                variable: caps[1].to_string(),
                                value: caps[2].to_string(),
                            });
                        }
                        Keyword::Error => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(Keyword::Error, line));
                            }
                            statements.push(Statement::Error {
                                line,
                                value: arg.to_string(),
                            });
                        }
                        Keyword::Warning => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(Keyword::Warning, line));
                            }
                            statements.push(Statement::Warning {
                                line,
                                value: arg.to_string(),
                            });
                        }
                        Keyword::If => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(Keyword::If, line));
                            }
                            let cond = self.parse_conditional(line, arg.to_string())?;
                            statements.push(Statement::Conditional(cond));
                        }
                        Keyword::Macro => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(Keyword::Macro, line));
                            }
                            let body =
                                self.parse_closed(Keyword::Macro, Keyword::Endmacro)?;
                            statements.push(Statement::MacroDecl {
                                line,
                                declaration: arg.to_string(),
                                body,
                            });
                        }
                        Keyword::While | Keyword::Repeat => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(*keyword, line));
                            }
                            let (kind, closing) = if *keyword == Keyword::While {
                                (LoopKind::While, Keyword::Endwhile)
                            } else {
                                (LoopKind::Repeat, Keyword::Endrepeat)
                            };
                            let body = self.parse_closed(*keyword, closing)?;
                            statements.push(Statement::Loop(Loop {
                                line,
                                kind,
                                condition: arg.to_string(),
                                body,
                            }));
                        }
                        Keyword::Elseif => {
                            if arg.is_empty() {
                                return Err(self.bad_directive(Keyword::Elseif, line));
                            }
                            return Ok((
                                statements,
                                Closer::Elseif {
                                    line,
                                    test: arg.to_string(),
                                },
                            ));
                        }
                        Keyword::Else
                        | Keyword::Endif
                        | Keyword::Endmacro
                        | Keyword::Endwhile
                        | Keyword::Endrepeat
                        | Keyword::End => {
                            if !arg.is_empty() {
                                return Err(self.bad_directive(*keyword, line));
                            }
                            let closer = if *keyword == Keyword::Else {
                                Closer::Else { line }
                            } else {
                                Closer::End {
                                    line,
                                    keyword: *keyword,
                                }
                            };
                            return Ok((statements, closer));
                        }
                    }
                }
            }
        }
        Ok((statements, Closer::Eof))
    }

    /// Parse a `@macro`/`@while`/`@repeat` body up to its closing directive.
    /// The bare `@end` closes any block.
    fn parse_closed(
        &mut self,
        opener: Keyword,
        closing: Keyword,
    ) -> Result<Vec<Statement>, SyntaxError> {
        let (statements, closer) = self.parse_block()?;
        match closer {
            Closer::End { keyword, .. } if keyword == closing || keyword == Keyword::End => {
                Ok(statements)
            }
            Closer::End { line, keyword } => Err(self.unexpected(keyword, line)),
            Closer::Elseif { line, .. } => Err(self.unexpected(Keyword::Elseif, line)),
            Closer::Else { line } => Err(self.unexpected(Keyword::Else, line)),
            Closer::Eof => Err(self.error(
                format!("Unclosed @{} statement", opener.as_str()),
                self.last_line,
            )),
        }
    }

    fn parse_conditional(&mut self, line: u32, test: String) -> Result<Conditional, SyntaxError> {
        let (consequent, mut closer) = self.parse_block()?;
        let mut cond = Conditional {
            line,
            test,
            consequent,
            elseifs: Vec::new(),
            alternate: None,
        };
        loop {
            match closer {
                Closer::Elseif { line, test } => {
                    if cond.alternate.is_some() {
                        return Err(self.error("@elseif after @else is not allowed", line));
                    }
                    let (body, next) = self.parse_block()?;
                    cond.elseifs.push(Conditional {
                        line,
                        test,
                        consequent: body,
                        elseifs: Vec::new(),
                        alternate: None,
                    });
                    closer = next;
                }
                Closer::Else { line } => {
                    if cond.alternate.is_some() {
                        return Err(
                            self.error("Multiple @else statements are not allowed", line)
                        );
                    }
                    let (body, next) = self.parse_block()?;
                    cond.alternate = Some(body);
                    closer = next;
                }
                Closer::End {
                    keyword: Keyword::Endif | Keyword::End,
                    ..
                } => return Ok(cond),
                Closer::End { line, keyword } => return Err(self.unexpected(keyword, line)),
                Closer::Eof => {
                    return Err(self.error("Unclosed @if statement", self.last_line))
                }
            }
        }
    }
}
