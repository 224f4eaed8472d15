//! Expression parsing: precedence climbing over a fixed operator table.
//!
//! An expression ends at the first token that cannot continue it — a
//! reserved clause keyword, a comma at argument depth zero, a closing
//! paren — and that token is pushed back for the query parser to consume.
//! This is what lets `select a x, b from ...` treat `x` as an alias: the
//! expression parser stops after `a` and leaves `x` alone.

use crate::error::{JournalError, Result};
use crate::parser::lexer::{is_symbol, strip_quotes, Lexer};
use crate::parser::model::{ExprId, ExprNode, ExprNodeType};
use crate::parser::pool::Pool;

/// Binding power of binary operators; higher binds tighter.
fn binary_precedence(token: &str) -> Option<u8> {
    match token {
        "*" | "/" | "%" => Some(6),
        "+" | "-" => Some(5),
        "<" | ">" | "<=" | ">=" => Some(4),
        "=" | "!=" | "<>" | "~" | "in" => Some(3),
        "and" => Some(2),
        "or" => Some(1),
        _ => None,
    }
}

/// `not` takes everything up to (and excluding) `and`/`or`.
const NOT_OPERAND_PRECEDENCE: u8 = 3;

/// Parse an optional expression. `Ok(None)` when the next token cannot
/// start one; the token is pushed back either way.
pub(crate) fn parse_expr(lexer: &mut Lexer, pool: &mut Pool<ExprNode>) -> Result<Option<ExprId>> {
    parse_binary(lexer, pool, 1)
}

/// Parse a required expression.
pub(crate) fn expect_expr(lexer: &mut Lexer, pool: &mut Pool<ExprNode>) -> Result<ExprId> {
    parse_expr(lexer, pool)?
        .ok_or_else(|| JournalError::parse(lexer.position(), "Expression expected"))
}

fn parse_binary(lexer: &mut Lexer, pool: &mut Pool<ExprNode>, min_prec: u8) -> Result<Option<ExprId>> {
    let Some(mut lhs) = parse_unary(lexer, pool)? else {
        return Ok(None);
    };

    loop {
        let Some(token) = lexer.next_token() else {
            break;
        };
        match binary_precedence(token.text) {
            Some(prec) if prec >= min_prec => {
                let (text, pos) = (token.text.to_string(), token.pos);
                // left-associative: right operand binds one level tighter
                let rhs = parse_binary(lexer, pool, prec + 1)?.ok_or_else(|| {
                    JournalError::parse(lexer.position(), "Expression expected")
                })?;
                let id = alloc(pool, ExprNodeType::Operation, &text, pos);
                let node = pool.get_mut(id.0 as usize);
                node.lhs = Some(lhs);
                node.rhs = Some(rhs);
                lhs = id;
            }
            _ => {
                lexer.unparse();
                break;
            }
        }
    }

    Ok(Some(lhs))
}

fn parse_unary(lexer: &mut Lexer, pool: &mut Pool<ExprNode>) -> Result<Option<ExprId>> {
    let Some(token) = lexer.next_token() else {
        return Ok(None);
    };

    if token.text == "-" {
        let (pos, text) = (token.pos, token.text.to_string());
        let operand = parse_unary(lexer, pool)?.ok_or_else(|| {
            JournalError::parse(lexer.position(), "Expression expected")
        })?;
        let id = alloc(pool, ExprNodeType::Operation, &text, pos);
        pool.get_mut(id.0 as usize).lhs = Some(operand);
        return Ok(Some(id));
    }

    if token.text == "not" {
        let (pos, text) = (token.pos, token.text.to_string());
        let operand = parse_binary(lexer, pool, NOT_OPERAND_PRECEDENCE)?.ok_or_else(|| {
            JournalError::parse(lexer.position(), "Expression expected")
        })?;
        let id = alloc(pool, ExprNodeType::Operation, &text, pos);
        pool.get_mut(id.0 as usize).lhs = Some(operand);
        return Ok(Some(id));
    }

    lexer.unparse();
    parse_primary(lexer, pool)
}

fn parse_primary(lexer: &mut Lexer, pool: &mut Pool<ExprNode>) -> Result<Option<ExprId>> {
    let Some(token) = lexer.next_token() else {
        return Ok(None);
    };

    if token.text == "(" {
        let inner = parse_binary(lexer, pool, 1)?.ok_or_else(|| {
            JournalError::parse(lexer.position(), "Expression expected")
        })?;
        let close = lexer.next_token();
        if !matches!(close, Some(t) if t.text == ")") {
            return Err(JournalError::parse(lexer.position(), "\")\" expected"));
        }
        return Ok(Some(inner));
    }

    // any other symbol token terminates the operand position
    if is_symbol(token.text) {
        lexer.unparse();
        return Ok(None);
    }

    let first = token.text.as_bytes()[0];

    if matches!(first, b'\'' | b'"' | b'`') {
        return Ok(Some(alloc(
            pool,
            ExprNodeType::Constant,
            strip_quotes(token.text),
            token.pos,
        )));
    }

    if first.is_ascii_digit() || matches!(token.text, "true" | "false" | "null" | "NaN") {
        return Ok(Some(alloc(
            pool,
            ExprNodeType::Constant,
            token.text,
            token.pos,
        )));
    }

    // literal, or function call when "(" follows directly
    let (text, pos) = (token.text.to_string(), token.pos);
    let paren = lexer.next_token();
    if matches!(paren, Some(t) if t.text == "(") {
        let id = alloc(pool, ExprNodeType::Function, &text, pos);
        let args = parse_call_args(lexer, pool)?;
        pool.get_mut(id.0 as usize).args = args;
        return Ok(Some(id));
    }
    lexer.unparse();

    Ok(Some(alloc(pool, ExprNodeType::Literal, &text, pos)))
}

fn parse_call_args(lexer: &mut Lexer, pool: &mut Pool<ExprNode>) -> Result<Vec<ExprId>> {
    let mut args = Vec::new();

    let first = lexer
        .next_token()
        .ok_or_else(|| JournalError::parse(lexer.position(), "\")\" expected"))?;
    if first.text == ")" {
        return Ok(args);
    }
    lexer.unparse();

    loop {
        let arg = parse_binary(lexer, pool, 1)?.ok_or_else(|| {
            JournalError::parse(lexer.position(), "Expression expected")
        })?;
        args.push(arg);

        let sep = lexer
            .next_token()
            .ok_or_else(|| JournalError::parse(lexer.position(), "\")\" expected"))?;
        if sep.text == ")" {
            break;
        }
        if sep.text != "," {
            return Err(JournalError::parse(sep.pos, "\",\" or \")\" expected"));
        }
    }

    Ok(args)
}

pub(crate) fn alloc(
    pool: &mut Pool<ExprNode>,
    node_type: ExprNodeType,
    token: &str,
    position: usize,
) -> ExprId {
    let index = pool.next();
    let node = pool.get_mut(index);
    node.node_type = node_type;
    node.token.push_str(token);
    node.position = position;
    ExprId(index as u32)
}
