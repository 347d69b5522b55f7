// crates/qalam-engine/src/expr/parser.rs

use super::scanner::{describe, scan, Tok};
use super::ExprError;

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Member {
        owner: Box<Expr>,
        prop: Prop,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Name(String),
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

/// Parse a complete expression; trailing tokens are an error, so this also
/// serves as the "does this text parse" probe for inline-site scanning.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    let toks = scan(input)?;
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_ternary()?;
    if let Some(tok) = parser.peek() {
        return Err(ExprError::Syntax(format!(
            "Unexpected token {}",
            describe(tok)
        )));
    }
    Ok(expr)
}

/// Parse `name(param, ...)` where every argument is a plain identifier.
pub fn parse_macro_declaration(input: &str) -> Result<(String, Vec<String>), ExprError> {
    let bad = || ExprError::Syntax("Syntax error in macro declaration".to_string());
    let Ok(Expr::Call { callee, args }) = parse_expression(input) else {
        return Err(bad());
    };
    let Expr::Ident(name) = *callee else {
        return Err(bad());
    };
    let mut params = Vec::with_capacity(args.len());
    for arg in args {
        let Expr::Ident(param) = arg else {
            return Err(bad());
        };
        params.push(param);
    }
    Ok((name, params))
}

/// Recognize `name(arg, ...)` calling a known macro. Anything that does not
/// parse, is not a call, or names something else yields `None` so the caller
/// can fall back to treating the text as a locator expression.
pub fn parse_macro_call<F>(input: &str, is_macro: F) -> Option<(String, Vec<Expr>)>
where
    F: Fn(&str) -> bool,
{
    let Ok(Expr::Call { callee, args }) = parse_expression(input) else {
        return None;
    };
    let Expr::Ident(name) = *callee else {
        return None;
    };
    if !is_macro(&name) {
        return None;
    }
    Some((name, args))
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, context: &str) -> Result<(), ExprError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ExprError::Syntax(format!(
                "Expected {} {}",
                describe(tok),
                context
            )))
        }
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if !self.eat(&Tok::Question) {
            return Ok(cond);
        }
        let then = self.parse_ternary()?;
        self.expect(&Tok::Colon, "in conditional expression")?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Tok::And) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinOp::Eq,
                Some(Tok::Ne) => BinOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_filter()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Ge) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_filter()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// `value | name` and `value | name(extra, ...)` desugar to calls with
    /// the piped value as the first argument; chains stay left-associative.
    fn parse_filter(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_additive()?;
        while self.eat(&Tok::Pipe) {
            let target = self.parse_additive()?;
            lhs = match target {
                Expr::Ident(name) => Expr::Call {
                    callee: Box::new(Expr::Ident(name)),
                    args: vec![lhs],
                },
                Expr::Call { callee, mut args } if matches!(*callee, Expr::Ident(_)) => {
                    args.insert(0, lhs);
                    Expr::Call { callee, args }
                }
                _ => {
                    return Err(ExprError::Syntax(
                        "Expected a function name after \"|\"".to_string(),
                    ))
                }
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Tok::Minus) => UnaryOp::Neg,
            Some(Tok::Plus) => UnaryOp::Pos,
            Some(Tok::Bang) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                match self.bump() {
                    Some(Tok::Ident(name)) => {
                        expr = Expr::Member {
                            owner: Box::new(expr),
                            prop: Prop::Name(name),
                        };
                    }
                    _ => {
                        return Err(ExprError::Syntax(
                            "Expected a property name after \".\"".to_string(),
                        ))
                    }
                }
            } else if self.eat(&Tok::LBracket) {
                let index = self.parse_ternary()?;
                self.expect(&Tok::RBracket, "after index expression")?;
                expr = Expr::Member {
                    owner: Box::new(expr),
                    prop: Prop::Index(Box::new(index)),
                };
            } else if self.eat(&Tok::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Tok::RParen) {
                    loop {
                        args.push(self.parse_ternary()?);
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        self.expect(&Tok::RParen, "after call arguments")?;
                        break;
                    }
                }
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            None => Err(ExprError::Syntax("Unexpected end of expression".to_string())),
            Some(Tok::Number(n)) => Ok(Expr::Number(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" | "undefined" => Ok(Expr::Null),
                "this" => Err(ExprError::Syntax("\"this\" is not supported".to_string())),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Tok::LParen) => {
                let expr = self.parse_ternary()?;
                self.expect(&Tok::RParen, "after expression")?;
                Ok(expr)
            }
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.parse_ternary()?);
                        if self.eat(&Tok::Comma) {
                            continue;
                        }
                        self.expect(&Tok::RBracket, "after array elements")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Some(tok) => Err(ExprError::Syntax(format!(
                "Unexpected token {}",
                describe(&tok)
            ))),
        }
    }
}
