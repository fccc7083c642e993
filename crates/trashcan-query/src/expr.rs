//! WHERE-tree expressions: construction, SQL rendering and in-memory evaluation.
//!
//! This module provides the predicate tree used in WHERE clauses. Besides
//! rendering to SQL, an [`Expr`] can be traversed with [`Expr::walk`] (used to
//! inspect conditions before a query runs) and evaluated against a record with
//! SQL three-valued logic (used by in-process stores).

use trashcan_core::{Error, QueryErrorKind, Record, Result, Value};

/// Placeholder and quoting style of the rendered SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// `$1`, `$2`, ...
    #[default]
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
    /// bare `?`
    Mysql,
}

impl Dialect {
    /// Placeholder of parameter `index` (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote `name`, doubling embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }
}

/// A SQL expression that can be used in WHERE clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column, optionally qualified by a table name or alias
    Column {
        /// Qualifier
        table: Option<String>,
        /// Column name
        name: String,
    },

    /// Literal value
    Literal(Value),

    /// Binary operation (e.g., a = b, a AND b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN expression
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Verbatim SQL. Rendered as is, never evaluated in memory.
    Raw(String),

    /// Explicit grouping
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// `<=`
    Le,
    /// Greater than (>)
    Gt,
    /// `>=`
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    /// SQL spelling of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Binding strength; larger binds tighter.
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

impl Expr {
    // ---- construction ----

    /// Unqualified column.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// `table.column`.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Column reference from a dotted path: `"Articles.trashed"` is qualified,
    /// `"trashed"` is not.
    pub fn field(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((table, name)) => Expr::qualified(table, name),
            None => Expr::col(path),
        }
    }

    /// Bound parameter.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Verbatim SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// AND together every expression; `None` when there are none.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Match `fields` (qualified with `table` when given) against `values`.
    ///
    /// NULL values match with IS NULL so composite keys with optional parts
    /// still select the intended row.
    pub fn key_match<S: AsRef<str>>(table: Option<&str>, fields: &[S], values: &[Value]) -> Option<Self> {
        Expr::and_all(fields.iter().zip(values).map(|(field, value)| {
            let column = match table {
                Some(t) => Expr::qualified(t, field.as_ref()),
                None => Expr::col(field.as_ref()),
            };
            if value.is_null() {
                column.is_null()
            } else {
                column.eq(value.clone())
            }
        }))
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    // ---- comparison ----

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ---- logic ----

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    // ---- NULL tests, lists, ranges ----

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    // ==================== IN / BETWEEN ====================

    /// IN list of values
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN list of values
    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// BETWEEN low AND high
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    pub fn not_between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: true,
        }
    }

    /// Wrap in parentheses
    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    // ==================== Traversal ====================

    /// Visit this node and its descendants in pre-order.
    ///
    /// The visitor returns `false` to stop the walk; `walk` then returns
    /// `false` as well.
    pub fn walk<F>(&self, visitor: &mut F) -> bool
    where
        F: FnMut(&Expr) -> bool,
    {
        if !visitor(self) {
            return false;
        }
        match self {
            Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) => true,
            Expr::Binary { left, right, .. } => left.walk(visitor) && right.walk(visitor),
            Expr::Not(expr) | Expr::Paren(expr) | Expr::IsNull { expr, .. } => expr.walk(visitor),
            Expr::In { expr, values, .. } => {
                expr.walk(visitor) && values.iter().all(|v| v.walk(visitor))
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.walk(visitor) && low.walk(visitor) && high.walk(visitor),
        }
    }

    /// Whether any column node names `name`, either unqualified or qualified
    /// with `table`.
    pub fn references_column(&self, table: &str, name: &str) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if let Expr::Column {
                table: qualifier,
                name: column,
            } = node
            {
                if column == name && qualifier.as_deref().is_none_or(|q| q == table) {
                    found = true;
                    return false;
                }
            }
            true
        });
        found
    }

    // ---- rendering ----

    /// Render to SQL with the default (PostgreSQL) dialect, discarding params.
    pub fn to_sql(&self) -> String {
        let mut params = Vec::new();
        self.build(&mut params, 0)
    }

    /// Render in the Postgres dialect, appending bound values to `params`.
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::Postgres, params, offset)
    }

    /// Render in `dialect`. Placeholders are numbered from `offset + 1`.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    format!(
                        "{}.{}",
                        dialect.quote_identifier(t),
                        dialect.quote_identifier(name)
                    )
                } else {
                    dialect.quote_identifier(name)
                }
            }

            Expr::Literal(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(*op, dialect, params, offset);
                let right_sql = right.build_operand(*op, dialect, params, offset);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::Not(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                match expr.as_ref() {
                    Expr::Binary { .. } => format!("NOT ({expr_sql})"),
                    _ => format!("NOT {expr_sql}"),
                }
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| v.build_with_dialect(dialect, params, offset))
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let low_sql = low.build_with_dialect(dialect, params, offset);
                let high_sql = high.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}BETWEEN {low_sql} AND {high_sql}")
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Raw(sql) => sql.clone(),

            Expr::Paren(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                format!("({expr_sql})")
            }
        }
    }

    /// Render an operand, parenthesizing looser-binding binary operands.
    fn build_operand(
        &self,
        parent: BinaryOp,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let sql = self.build_with_dialect(dialect, params, offset);
        match self {
            Expr::Binary { op, .. } if op.precedence() < parent.precedence() => format!("({sql})"),
            _ => sql,
        }
    }

    // ==================== Evaluation ====================

    /// Evaluate against a row.
    ///
    /// `qualifiers` are the names a qualified column may use to refer to the
    /// row (table name and alias). Predicates yield `Value::Bool` or
    /// `Value::Null` (unknown).
    pub fn evaluate(&self, row: &Record, qualifiers: &[&str]) -> Result<Value> {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    if !qualifiers.contains(&t.as_str()) {
                        return Err(Error::query(
                            QueryErrorKind::NotFound,
                            format!("missing FROM-clause entry for table \"{t}\""),
                            None,
                        ));
                    }
                }
                row.get(name).cloned().ok_or_else(|| {
                    Error::query(
                        QueryErrorKind::NotFound,
                        format!("no such column: {name}"),
                        None,
                    )
                })
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Binary { left, op, right } => match op {
                BinaryOp::And => {
                    let l = truth(&left.evaluate(row, qualifiers)?);
                    if l == Some(false) {
                        return Ok(Value::Bool(false));
                    }
                    let r = truth(&right.evaluate(row, qualifiers)?);
                    Ok(from_truth(match (l, r) {
                        (_, Some(false)) => Some(false),
                        (Some(true), Some(true)) => Some(true),
                        _ => None,
                    }))
                }
                BinaryOp::Or => {
                    let l = truth(&left.evaluate(row, qualifiers)?);
                    if l == Some(true) {
                        return Ok(Value::Bool(true));
                    }
                    let r = truth(&right.evaluate(row, qualifiers)?);
                    Ok(from_truth(match (l, r) {
                        (_, Some(true)) => Some(true),
                        (Some(false), Some(false)) => Some(false),
                        _ => None,
                    }))
                }
                cmp => {
                    let l = left.evaluate(row, qualifiers)?;
                    let r = right.evaluate(row, qualifiers)?;
                    Ok(from_truth(compare(*cmp, &l, &r)))
                }
            },
            Expr::Not(expr) => Ok(from_truth(
                truth(&expr.evaluate(row, qualifiers)?).map(|b| !b),
            )),
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let needle = expr.evaluate(row, qualifiers)?;
                let mut result = Some(false);
                for candidate in values {
                    match needle.sql_eq(&candidate.evaluate(row, qualifiers)?) {
                        Some(true) => {
                            result = Some(true);
                            break;
                        }
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(from_truth(negate(result, *negated)))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let v = expr.evaluate(row, qualifiers)?;
                let lo = compare(BinaryOp::Ge, &v, &low.evaluate(row, qualifiers)?);
                let hi = compare(BinaryOp::Le, &v, &high.evaluate(row, qualifiers)?);
                let within = match (lo, hi) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                };
                Ok(from_truth(negate(within, *negated)))
            }
            Expr::IsNull { expr, negated } => {
                let is_null = expr.evaluate(row, qualifiers)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::Raw(sql) => Err(Error::query(
                QueryErrorKind::Unsupported,
                "raw SQL fragments cannot be evaluated in memory",
                Some(sql.clone()),
            )),
            Expr::Paren(expr) => expr.evaluate(row, qualifiers),
        }
    }

    /// True only when the predicate evaluates to TRUE (not FALSE or unknown).
    pub fn matches(&self, row: &Record, qualifiers: &[&str]) -> Result<bool> {
        Ok(truth(&self.evaluate(row, qualifiers)?) == Some(true))
    }
}

fn truth(value: &Value) -> Option<bool> {
    if value.is_null() {
        None
    } else {
        value.as_bool()
    }
}

fn from_truth(t: Option<bool>) -> Value {
    t.map_or(Value::Null, Value::Bool)
}

fn negate(t: Option<bool>, negated: bool) -> Option<bool> {
    if negated { t.map(|b| !b) } else { t }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Option<bool> {
    use std::cmp::Ordering;

    if left.is_null() || right.is_null() {
        return None;
    }
    match op {
        BinaryOp::Eq => left.sql_eq(right),
        BinaryOp::Ne => left.sql_eq(right).map(|b| !b),
        _ => {
            let ord = left.sql_cmp(right)?;
            Some(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
    }
}

// ==================== Conversions ====================

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}
