//! Logical AST: statements, query models and expression nodes.
//!
//! Nodes live in parser-owned arenas and are addressed by id; resolve
//! them through [`QueryParser::node`](crate::parser::QueryParser::node)
//! and [`QueryParser::model`](crate::parser::QueryParser::model). Ids are
//! valid until the next `parse` call resets the arenas.

use crate::parser::pool::Poolable;
use crate::schema::JournalStructure;

/// Handle to an [`ExprNode`] in the parser's expression arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(pub(crate) u32);

/// Handle to a [`QueryModel`] in the parser's model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelId(pub(crate) u32);

/// Parsed top-level statement.
#[derive(Debug)]
pub enum Statement {
    /// `create journal ...` DDL; the structure is unbuilt so the caller
    /// decides hints before freezing it into metadata.
    CreateJournal(JournalStructure),
    Query(ModelId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExprNodeType {
    /// Unquoted name: column, journal or alias reference.
    #[default]
    Literal,
    /// Number, quoted string, `true`/`false`/`null`.
    Constant,
    /// Unary or binary operator application.
    Operation,
    /// Call with parenthesised argument list.
    Function,
}

/// Typed expression node with its 0-based source offset.
#[derive(Debug, Default)]
pub struct ExprNode {
    pub node_type: ExprNodeType,
    pub token: String,
    pub position: usize,
    pub lhs: Option<ExprId>,
    pub rhs: Option<ExprId>,
    /// Function call arguments, in source order.
    pub args: Vec<ExprId>,
}

impl Poolable for ExprNode {
    fn reset(&mut self) {
        self.node_type = ExprNodeType::Literal;
        self.token.clear();
        self.position = 0;
        self.lhs = None;
        self.rhs = None;
        self.args.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Outer,
    Cross,
    AsOf,
}

/// One selected column, optionally aliased.
#[derive(Debug)]
pub struct QueryColumn {
    pub alias: Option<String>,
    pub expr: ExprId,
}

/// Query model: one level of a (possibly nested, possibly joined) query.
#[derive(Debug, Default)]
pub struct QueryModel {
    pub select_columns: Vec<QueryColumn>,
    /// Base journal reference; `None` when `nested_model` is set.
    pub journal_name: Option<ExprId>,
    pub nested_model: Option<ModelId>,
    pub alias: Option<ExprId>,
    /// Explicit `timestamp(column)` designation.
    pub timestamp: Option<ExprId>,
    pub latest_by: Option<ExprId>,
    /// Set on join models only.
    pub join_type: Option<JoinType>,
    pub join_criteria: Option<ExprId>,
    /// Join models in declaration order.
    pub join_models: Vec<ModelId>,
    pub where_clause: Option<ExprId>,
    pub sample_by: Option<ExprId>,
    pub order_by: Vec<ExprId>,
    pub limit_lo: Option<ExprId>,
    pub limit_hi: Option<ExprId>,
}

impl Poolable for QueryModel {
    fn reset(&mut self) {
        self.select_columns.clear();
        self.journal_name = None;
        self.nested_model = None;
        self.alias = None;
        self.timestamp = None;
        self.latest_by = None;
        self.join_type = None;
        self.join_criteria = None;
        self.join_models.clear();
        self.where_clause = None;
        self.sample_by = None;
        self.order_by.clear();
        self.limit_lo = None;
        self.limit_hi = None;
    }
}
