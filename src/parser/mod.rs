//! SQL-like query compiler front end.
//!
//! `QueryParser::parse` turns query text into a [`Statement`]: either a
//! `create journal` DDL (yielding an unbuilt [`JournalStructure`]) or a
//! query (yielding a [`QueryModel`] id). AST nodes live in parser-owned
//! arenas that are bulk-reset on every `parse` call, so a failed parse
//! never leaves a partial AST visible; resolve ids through
//! [`QueryParser::node`] / [`QueryParser::model`] while the statement is
//! in use.

pub mod model;

mod expr;
mod lexer;
mod pool;

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{JournalError, Result};
use crate::schema::structure::IntColumn;
use crate::schema::{ColumnType, JournalStructure, PartitionBy};

use lexer::{strip_quotes, Lexer, Token};
use pool::Pool;

pub use model::{
    ExprId, ExprNode, ExprNodeType, JoinType, ModelId, QueryColumn, QueryModel, Statement,
};

/// Tokens that may directly follow a source reference and therefore can
/// never be an alias.
static ALIAS_STOP_SET: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "where", "latest", "join", "inner", "outer", "cross", "asof", "sample", "order", "on",
        "timestamp", "limit", ")",
    ]
    .into_iter()
    .collect()
});

fn join_start(token: &str) -> Option<JoinType> {
    match token {
        "join" | "inner" => Some(JoinType::Inner),
        "outer" => Some(JoinType::Outer),
        "cross" => Some(JoinType::Cross),
        "asof" => Some(JoinType::AsOf),
        _ => None,
    }
}

fn is_field_term(token: &str) -> bool {
    token == ")" || token == ","
}

fn require<'s>(lexer: &mut Lexer<'s>) -> Result<Token<'s>> {
    lexer
        .next_token()
        .ok_or_else(|| JournalError::parse(lexer.position(), "Unexpected end of input"))
}

fn expect_text(lexer: &Lexer, token: Option<Token>, expected: &str) -> Result<()> {
    match token {
        Some(t) if t.text == expected => Ok(()),
        Some(t) => Err(JournalError::parse(
            t.pos,
            format!("\"{}\" expected", expected),
        )),
        None => Err(JournalError::parse(
            lexer.position(),
            format!("\"{}\" expected", expected),
        )),
    }
}

fn expect_next(lexer: &mut Lexer, expected: &str) -> Result<()> {
    let token = lexer.next_token();
    expect_text(lexer, token, expected)
}

/// Recursive-descent parser with arena-pooled AST nodes.
pub struct QueryParser {
    expr_pool: Pool<ExprNode>,
    model_pool: Pool<QueryModel>,
}

impl Default for QueryParser {
    fn default() -> Self {
        QueryParser::new()
    }
}

impl QueryParser {
    pub fn new() -> Self {
        QueryParser {
            expr_pool: Pool::with_capacity(128),
            model_pool: Pool::with_capacity(8),
        }
    }

    /// Parse one statement. Arenas are reset on entry; ids inside the
    /// returned statement are valid until the next call.
    pub fn parse(&mut self, text: &str) -> Result<Statement> {
        self.expr_pool.clear();
        self.model_pool.clear();
        let mut lexer = Lexer::new(text);
        self.parse_internal(&mut lexer)
    }

    pub fn node(&self, id: ExprId) -> &ExprNode {
        self.expr_pool.get(id.0 as usize)
    }

    pub fn model(&self, id: ModelId) -> &QueryModel {
        self.model_pool.get(id.0 as usize)
    }

    fn parse_internal(&mut self, lexer: &mut Lexer) -> Result<Statement> {
        let tok = require(lexer)?;
        if tok.text == "create" {
            return self.parse_create_statement(lexer);
        }
        lexer.unparse();
        Ok(Statement::Query(self.parse_query(lexer, false)?))
    }

    fn parse_create_statement(&mut self, lexer: &mut Lexer) -> Result<Statement> {
        let tok = require(lexer)?;
        if tok.text != "journal" {
            return Err(JournalError::parse(tok.pos, "\"journal\" expected"));
        }
        self.parse_create_journal(lexer)
    }

    fn parse_create_journal(&mut self, lexer: &mut Lexer) -> Result<Statement> {
        let name = require(lexer)?;
        let mut structure = JournalStructure::new(strip_quotes(name.text));
        structure = parse_journal_fields(lexer, structure)?;

        if let Some(tok) = lexer.next_token() {
            if tok.text != "partition" {
                return Err(JournalError::parse(tok.pos, "\"partition\" expected"));
            }
            expect_next(lexer, "by")?;
            let ptype = require(lexer)?;
            let partition = PartitionBy::parse(ptype.text)
                .ok_or_else(|| JournalError::parse(ptype.pos, "Invalid partition type"))?;
            structure = structure.partition_by(partition);
        }

        Ok(Statement::CreateJournal(structure))
    }

    fn parse_query(&mut self, lexer: &mut Lexer, sub_query: bool) -> Result<ModelId> {
        let model = self.model_pool.next();

        let mut tok = require(lexer)?;

        // [select]
        if tok.text == "select" {
            self.parse_select_columns(lexer, model)?;
            tok = require(lexer)?;
        }

        let mut t: Option<Token>;
        if tok.text == "(" {
            // sub-query source
            let nested = self.parse_query(lexer, true)?;
            self.model_pool.get_mut(model).nested_model = Some(nested);
            expect_next(lexer, ")")?;

            t = lexer.next_token();
            if matches!(t, Some(tt) if !ALIAS_STOP_SET.contains(tt.text)) {
                lexer.unparse();
                let alias = self.literal(lexer)?;
                self.model_pool.get_mut(model).alias = alias;
                t = lexer.next_token();
            }
            t = self.parse_timestamp(lexer, t, model)?;
        } else {
            // journal source
            lexer.unparse();
            let name = self.literal(lexer)?;
            self.model_pool.get_mut(model).journal_name = name;

            t = lexer.next_token();
            if matches!(t, Some(tt) if !ALIAS_STOP_SET.contains(tt.text)) {
                lexer.unparse();
                let alias = self.literal(lexer)?;
                self.model_pool.get_mut(model).alias = alias;
                t = lexer.next_token();
            }
            t = self.parse_timestamp(lexer, t, model)?;

            if matches!(t, Some(tt) if tt.text == "latest") {
                expect_next(lexer, "by")?;
                let e = self.expr_opt(lexer)?;
                self.model_pool.get_mut(model).latest_by = e;
                t = lexer.next_token();
            }
        }

        // [[inner | outer | cross | asof] join]*
        while let Some(tt) = t {
            let Some(join_type) = join_start(tt.text) else {
                break;
            };
            let join_model = self.parse_join(lexer, tt, join_type)?;
            self.model_pool.get_mut(model).join_models.push(join_model);
            t = lexer.next_token();
        }

        if matches!(t, Some(tt) if tt.text == "where") {
            let e = self.expr_opt(lexer)?;
            self.model_pool.get_mut(model).where_clause = e;
            t = lexer.next_token();
        }

        if matches!(t, Some(tt) if tt.text == "sample") {
            expect_next(lexer, "by")?;
            let e = self.expect_expr(lexer)?;
            self.model_pool.get_mut(model).sample_by = Some(e);
            t = lexer.next_token();
        }

        if matches!(t, Some(tt) if tt.text == "order") {
            expect_next(lexer, "by")?;
            loop {
                let next = require(lexer)?;
                if next.text == ")" {
                    return Err(JournalError::parse(next.pos, "Expression expected"));
                }
                lexer.unparse();
                let e = self.expect_expr(lexer)?;
                self.model_pool.get_mut(model).order_by.push(e);
                t = lexer.next_token();
                if !matches!(t, Some(tt) if tt.text == ",") {
                    break;
                }
            }
        }

        if matches!(t, Some(tt) if tt.text == "limit") {
            let lo = self.expect_expr(lexer)?;
            let mut hi = None;
            t = lexer.next_token();
            if matches!(t, Some(tt) if tt.text == ",") {
                hi = Some(self.expect_expr(lexer)?);
                t = lexer.next_token();
            }
            let m = self.model_pool.get_mut(model);
            m.limit_lo = Some(lo);
            m.limit_hi = hi;
        }

        if sub_query {
            // the enclosing query re-validates the trailing token
            lexer.unparse();
        } else if let Some(tt) = t {
            return Err(JournalError::parse(
                tt.pos,
                format!("Unexpected token: {}", tt.text),
            ));
        }

        Ok(ModelId(model as u32))
    }

    fn parse_select_columns(&mut self, lexer: &mut Lexer, model: usize) -> Result<()> {
        loop {
            let expr = self.expect_expr(lexer)?;
            let tok = require(lexer)?;

            // expect (from | , | [column alias])
            if tok.text == "from" {
                self.push_column(model, None, expr);
                break;
            }
            if tok.text == "," {
                self.push_column(model, None, expr);
                continue;
            }

            let alias = strip_quotes(tok.text).to_string();
            self.push_column(model, Some(alias), expr);

            let tok = require(lexer)?;
            if tok.text == "from" {
                break;
            }
            if tok.text != "," {
                return Err(JournalError::parse(tok.pos, "\",\" or \"from\" expected"));
            }
        }
        Ok(())
    }

    fn push_column(&mut self, model: usize, alias: Option<String>, expr: ExprId) {
        self.model_pool
            .get_mut(model)
            .select_columns
            .push(QueryColumn { alias, expr });
    }

    fn parse_join(&mut self, lexer: &mut Lexer, tok: Token, join_type: JoinType) -> Result<ModelId> {
        let join_model = self.model_pool.next();
        self.model_pool.get_mut(join_model).join_type = Some(join_type);

        if tok.text != "join" {
            expect_next(lexer, "join")?;
        }

        let t = require(lexer)?;
        if t.text == "(" {
            let nested = self.parse_query(lexer, true)?;
            self.model_pool.get_mut(join_model).nested_model = Some(nested);
            expect_next(lexer, ")")?;
        } else {
            lexer.unparse();
            let name = self.expect_expr(lexer)?;
            self.model_pool.get_mut(join_model).journal_name = Some(name);
        }

        let t = lexer.next_token();
        if matches!(t, Some(tt) if !ALIAS_STOP_SET.contains(tt.text)) {
            lexer.unparse();
            let alias = self.expr_opt(lexer)?;
            self.model_pool.get_mut(join_model).alias = alias;
        } else {
            lexer.unparse();
        }

        let t = lexer.next_token();

        if join_type == JoinType::Cross {
            if let Some(tt) = t {
                if tt.text == "on" {
                    return Err(JournalError::parse(
                        tt.pos,
                        "Cross joins cannot have join clauses",
                    ));
                }
            }
        }

        match join_type {
            JoinType::AsOf if !matches!(t, Some(tt) if tt.text == "on") => {
                // asof key is implicit unless "on" is given
                lexer.unparse();
            }
            JoinType::AsOf | JoinType::Inner | JoinType::Outer => {
                expect_text(lexer, t, "on")?;
                let criteria = self.expect_expr(lexer)?;
                self.model_pool.get_mut(join_model).join_criteria = Some(criteria);
            }
            JoinType::Cross => {
                lexer.unparse();
            }
        }

        Ok(ModelId(join_model as u32))
    }

    fn parse_timestamp<'s>(
        &mut self,
        lexer: &mut Lexer<'s>,
        t: Option<Token<'s>>,
        model: usize,
    ) -> Result<Option<Token<'s>>> {
        if matches!(t, Some(tt) if tt.text == "timestamp") {
            expect_next(lexer, "(")?;
            let e = self.expect_expr(lexer)?;
            self.model_pool.get_mut(model).timestamp = Some(e);
            expect_next(lexer, ")")?;
            return Ok(lexer.next_token());
        }
        Ok(t)
    }

    /// Single-token literal node (journal name, alias), unquoted.
    fn literal(&mut self, lexer: &mut Lexer) -> Result<Option<ExprId>> {
        let Some(tok) = lexer.next_token() else {
            return Ok(None);
        };
        Ok(Some(expr::alloc(
            &mut self.expr_pool,
            ExprNodeType::Literal,
            strip_quotes(tok.text),
            tok.pos,
        )))
    }

    fn expr_opt(&mut self, lexer: &mut Lexer) -> Result<Option<ExprId>> {
        expr::parse_expr(lexer, &mut self.expr_pool)
    }

    fn expect_expr(&mut self, lexer: &mut Lexer) -> Result<ExprId> {
        expr::expect_expr(lexer, &mut self.expr_pool)
    }
}

fn parse_journal_fields(
    lexer: &mut Lexer,
    mut structure: JournalStructure,
) -> Result<JournalStructure> {
    let open = require(lexer)?;
    if open.text != "(" {
        return Err(JournalError::parse(open.pos, "\"(\" expected"));
    }

    loop {
        let name_tok = not_term(lexer)?;
        let name = strip_quotes(name_tok.text).to_string();
        let type_tok = not_term(lexer)?;
        let column_type = ColumnType::parse(type_tok.text)
            .ok_or_else(|| JournalError::parse(type_tok.pos, "Unsupported type"))?;

        let mut term = None;
        structure = match column_type {
            ColumnType::Int => {
                let builder = structure.int_col(&name)?;
                let (builder, t) = parse_int_definition(lexer, builder)?;
                term = t;
                builder.done()
            }
            ColumnType::Bool => structure.bool_col(&name)?,
            ColumnType::Byte => structure.byte_col(&name)?,
            ColumnType::Short => structure.short_col(&name)?,
            ColumnType::Long => structure.long_col(&name)?,
            ColumnType::Float => structure.float_col(&name)?,
            ColumnType::Double => structure.double_col(&name)?,
            ColumnType::Date => structure.date_col(&name)?,
            ColumnType::String => structure.str_col(&name)?.done(),
            ColumnType::Symbol => structure.sym(&name)?.done(),
            ColumnType::Binary => structure.bin(&name)?.done(),
        };

        let t = match term {
            Some(t) => t,
            None => require(lexer)?,
        };
        if t.text == ")" {
            break;
        }
        if t.text != "," {
            return Err(JournalError::parse(t.pos, "\",\" or \")\" expected"));
        }
    }

    Ok(structure)
}

/// `index ["buckets" N]` modifiers on an int column. Returns the column
/// terminator when it was consumed while probing.
fn parse_int_definition<'s>(
    lexer: &mut Lexer<'s>,
    builder: IntColumn,
) -> Result<(IntColumn, Option<Token<'s>>)> {
    let tok = require(lexer)?;
    if is_field_term(tok.text) {
        return Ok((builder, Some(tok)));
    }
    if tok.text != "index" {
        return Err(JournalError::parse(tok.pos, "\"index\" expected"));
    }
    let builder = builder.index();

    let tok = require(lexer)?;
    if is_field_term(tok.text) {
        return Ok((builder, Some(tok)));
    }
    if tok.text != "buckets" {
        return Err(JournalError::parse(tok.pos, "\"buckets\" expected"));
    }

    let count_tok = require(lexer)?;
    let count: usize = count_tok
        .text
        .parse()
        .map_err(|_| JournalError::parse(count_tok.pos, "expected number of buckets (int)"))?;

    Ok((builder.buckets(count), None))
}

fn not_term<'s>(lexer: &mut Lexer<'s>) -> Result<Token<'s>> {
    let tok = require(lexer)?;
    if is_field_term(tok.text) {
        return Err(JournalError::parse(tok.pos, "Invalid column definition"));
    }
    Ok(tok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn query_model(parser: &mut QueryParser, text: &str) -> ModelId {
        match parser.parse(text).unwrap() {
            Statement::Query(m) => m,
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn test_select_where_order_limit() {
        let mut parser = QueryParser::new();
        let m = query_model(
            &mut parser,
            "select a, b from t where a > 1 order by b limit 10",
        );
        let model = parser.model(m);

        assert_eq!(model.select_columns.len(), 2);
        assert_eq!(parser.node(model.select_columns[0].expr).token, "a");
        assert_eq!(parser.node(model.select_columns[1].expr).token, "b");
        assert_eq!(parser.node(model.journal_name.unwrap()).token, "t");

        let w = parser.node(model.where_clause.unwrap());
        assert_eq!(w.token, ">");
        assert_eq!(w.node_type, ExprNodeType::Operation);

        assert_eq!(model.order_by.len(), 1);
        assert_eq!(parser.node(model.order_by[0]).token, "b");

        assert_eq!(parser.node(model.limit_lo.unwrap()).token, "10");
        assert!(model.limit_hi.is_none());
    }

    #[test]
    fn test_select_column_aliases() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "select a x, b + 1 y from t");
        let model = parser.model(m);
        assert_eq!(model.select_columns[0].alias.as_deref(), Some("x"));
        assert_eq!(model.select_columns[1].alias.as_deref(), Some("y"));
        assert_eq!(parser.node(model.select_columns[1].expr).token, "+");
    }

    #[test]
    fn test_journal_alias_respects_stop_set() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "trades tr where price > 0");
        let model = parser.model(m);
        assert_eq!(parser.node(model.alias.unwrap()).token, "tr");

        let m = query_model(&mut parser, "trades where price > 0");
        let model = parser.model(m);
        assert!(model.alias.is_none());
    }

    #[test]
    fn test_timestamp_and_latest_by() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "quotes timestamp (ts) latest by sym");
        let model = parser.model(m);
        assert_eq!(parser.node(model.timestamp.unwrap()).token, "ts");
        assert_eq!(parser.node(model.latest_by.unwrap()).token, "sym");
    }

    #[test]
    fn test_subquery_with_alias_and_trailing_validation() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "select x from (select a x from t) q limit 5");
        let model = parser.model(m);
        let nested = parser.model(model.nested_model.unwrap());
        assert_eq!(parser.node(nested.journal_name.unwrap()).token, "t");
        assert_eq!(parser.node(model.alias.unwrap()).token, "q");
        assert_eq!(parser.node(model.limit_lo.unwrap()).token, "5");
    }

    #[test]
    fn test_unclosed_subquery() {
        let mut parser = QueryParser::new();
        let err = parser.parse("select x from (select a from t").unwrap_err();
        assert!(err.to_string().contains("\")\" expected"), "{}", err);
    }

    #[test]
    fn test_joins_collected_in_order() {
        let mut parser = QueryParser::new();
        let m = query_model(
            &mut parser,
            "a join b on a.id = b.id outer join c on a.id = c.id cross join d",
        );
        let model = parser.model(m);
        assert_eq!(model.join_models.len(), 3);

        let j0 = parser.model(model.join_models[0]);
        assert_eq!(j0.join_type, Some(JoinType::Inner));
        assert_eq!(parser.node(j0.journal_name.unwrap()).token, "b");
        assert_eq!(parser.node(j0.join_criteria.unwrap()).token, "=");

        let j1 = parser.model(model.join_models[1]);
        assert_eq!(j1.join_type, Some(JoinType::Outer));

        let j2 = parser.model(model.join_models[2]);
        assert_eq!(j2.join_type, Some(JoinType::Cross));
        assert!(j2.join_criteria.is_none());
    }

    #[test]
    fn test_cross_join_rejects_on() {
        let mut parser = QueryParser::new();
        let err = parser.parse("a cross join b on a.id = b.id").unwrap_err();
        assert!(
            err.to_string().contains("Cross joins cannot have join clauses"),
            "{}",
            err
        );
    }

    #[test]
    fn test_asof_join_on_is_optional() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "trades asof join quotes");
        let model = parser.model(m);
        let j = parser.model(model.join_models[0]);
        assert_eq!(j.join_type, Some(JoinType::AsOf));
        assert!(j.join_criteria.is_none());

        let m = query_model(&mut parser, "trades asof join quotes on trades.sym = quotes.sym");
        let j = parser.model(parser.model(m).join_models[0]);
        assert_eq!(j.join_type, Some(JoinType::AsOf));
        assert!(j.join_criteria.is_some());
    }

    #[test]
    fn test_sample_by() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "select last(price) from trades sample by 1m");
        let model = parser.model(m);
        assert_eq!(parser.node(model.sample_by.unwrap()).token, "1m");
    }

    #[test]
    fn test_limit_lo_hi() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "t limit 10, 20");
        let model = parser.model(m);
        assert_eq!(parser.node(model.limit_lo.unwrap()).token, "10");
        assert_eq!(parser.node(model.limit_hi.unwrap()).token, "20");
    }

    #[test]
    fn test_trailing_token_is_hard_error() {
        let mut parser = QueryParser::new();
        let err = parser.parse("t limit 10 garbage").unwrap_err();
        match err {
            JournalError::Parse { position, message } => {
                assert_eq!(position, 11);
                assert!(message.contains("Unexpected token: garbage"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        let mut parser = QueryParser::new();
        let err = parser.parse("").unwrap_err();
        assert!(err.to_string().contains("Unexpected end of input"), "{}", err);
    }

    #[test]
    fn test_create_journal() {
        let mut parser = QueryParser::new();
        let stmt = parser
            .parse(
                "create journal quotes (sym symbol, bid double, ask double, \
                 book int index buckets 150, ts date) partition by month",
            )
            .unwrap();

        let Statement::CreateJournal(structure) = stmt else {
            panic!("expected create journal");
        };
        assert_eq!(structure.name(), "quotes");
        assert_eq!(structure.column_count(), 5);

        let meta = structure.build().unwrap();
        assert_eq!(meta.partition_by(), PartitionBy::Month);
        assert_eq!(meta.column(0).column_type, ColumnType::Symbol);
        let book = meta.column(meta.column_index("book").unwrap());
        assert!(book.indexed);
        assert_eq!(book.distinct_count_hint, 256);
    }

    #[test]
    fn test_create_journal_duplicate_column() {
        let mut parser = QueryParser::new();
        let err = parser.parse("create journal x (a int, a double)").unwrap_err();
        assert!(err.to_string().contains("Duplicate column: a"), "{}", err);
    }

    #[test]
    fn test_create_journal_unsupported_type() {
        let mut parser = QueryParser::new();
        let err = parser.parse("create journal x (a varchar)").unwrap_err();
        match err {
            JournalError::Parse { position, message } => {
                assert_eq!(position, 20);
                assert!(message.contains("Unsupported type"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_create_journal_bad_buckets() {
        let mut parser = QueryParser::new();
        let err = parser
            .parse("create journal x (a int index buckets many)")
            .unwrap_err();
        assert!(
            err.to_string().contains("expected number of buckets (int)"),
            "{}",
            err
        );
    }

    #[test]
    fn test_create_expects_journal() {
        let mut parser = QueryParser::new();
        let err = parser.parse("create table x (a int)").unwrap_err();
        assert!(err.to_string().contains("\"journal\" expected"), "{}", err);
    }

    #[test]
    fn test_failed_parse_resets_cleanly() {
        let mut parser = QueryParser::new();
        assert!(parser.parse("select a, b from t where (a > 1").is_err());

        // arena state from the failed attempt must not leak into the next
        let m = query_model(&mut parser, "select a from t");
        let model = parser.model(m);
        assert_eq!(model.select_columns.len(), 1);
        assert_eq!(parser.node(model.select_columns[0].expr).token, "a");
    }

    #[test]
    fn test_quoted_journal_name_stripped() {
        let mut parser = QueryParser::new();
        let m = query_model(&mut parser, "'my journal' where a > 0");
        let model = parser.model(m);
        assert_eq!(parser.node(model.journal_name.unwrap()).token, "my journal");
    }
}
