//! Structural SQL checks.
//!
//! Statements are parsed with `sqlparser` and WHERE clauses are lowered into
//! a small [`Predicate`] tree. Rules match on that tree, never on raw text,
//! so spacing, casing, parentheses and operand order do not matter.
//!
//! Checks (each independent, all BLOCKER):
//!
//!   - DELETE / UPDATE without WHERE
//!   - DELETE / UPDATE whose WHERE is always true
//!   - TRUNCATE, except tables prefixed `tmp_`, `scratch_`, `temp_`
//!   - DROP TABLE, DROP DATABASE

use std::collections::BTreeMap;

use sqlparser::ast::{
    BinaryOperator, Delete, Expr, ObjectName, ObjectType, Statement, UnaryOperator, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::analyzers::{Detection, GapKind, Outcome};
use crate::rules::catalog::{self, Rule};

const EXEMPT_TRUNCATE_PREFIXES: &[&str] = &["tmp_", "scratch_", "temp_"];

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    Text(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    /// Ordering, pattern and arithmetic operators. Never decided statically.
    Other,
}

/// Lowered WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Literal(Literal),
    Column(String),
    Compare {
        op: CompareOp,
        left: Box<Predicate>,
        right: Box<Predicate>,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Anything else (functions, subqueries, IN lists, ...).
    Opaque,
}

impl Predicate {
    pub fn lower(expr: &Expr) -> Self {
        match expr {
            Expr::Nested(inner) => Self::lower(inner),
            Expr::Value(value) => lower_value(value)
                .map(Predicate::Literal)
                .unwrap_or(Predicate::Opaque),
            Expr::Identifier(ident) => Predicate::Column(ident.value.to_ascii_lowercase()),
            Expr::CompoundIdentifier(parts) => Predicate::Column(
                parts
                    .iter()
                    .map(|p| p.value.to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            Expr::BinaryOp { left, op, right } => {
                let l = Box::new(Self::lower(left));
                let r = Box::new(Self::lower(right));
                match op {
                    BinaryOperator::And => Predicate::And(l, r),
                    BinaryOperator::Or => Predicate::Or(l, r),
                    BinaryOperator::Eq => Predicate::Compare {
                        op: CompareOp::Eq,
                        left: l,
                        right: r,
                    },
                    BinaryOperator::NotEq => Predicate::Compare {
                        op: CompareOp::NotEq,
                        left: l,
                        right: r,
                    },
                    _ => Predicate::Compare {
                        op: CompareOp::Other,
                        left: l,
                        right: r,
                    },
                }
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Predicate::Not(Box::new(Self::lower(expr))),
            _ => Predicate::Opaque,
        }
    }

    /// True for every row regardless of data.
    pub fn is_tautology(&self) -> bool {
        match self {
            Predicate::Literal(lit) => literal_truth(lit) == Some(true),
            Predicate::Compare { op, left, right } => {
                compare_literals(*op, left, right) == Some(true)
            }
            Predicate::Or(a, b) => a.is_tautology() || b.is_tautology(),
            Predicate::And(a, b) => a.is_tautology() && b.is_tautology(),
            Predicate::Not(inner) => inner.is_contradiction(),
            Predicate::Column(_) | Predicate::Opaque => false,
        }
    }

    /// False for every row regardless of data.
    pub fn is_contradiction(&self) -> bool {
        match self {
            Predicate::Literal(lit) => literal_truth(lit) == Some(false),
            Predicate::Compare { op, left, right } => {
                compare_literals(*op, left, right) == Some(false)
            }
            Predicate::Or(a, b) => a.is_contradiction() && b.is_contradiction(),
            Predicate::And(a, b) => a.is_contradiction() || b.is_contradiction(),
            Predicate::Not(inner) => inner.is_tautology(),
            Predicate::Column(_) | Predicate::Opaque => false,
        }
    }
}

fn lower_value(value: &Value) -> Option<Literal> {
    match value {
        Value::Number(n, _) => Some(Literal::Number(n.to_string())),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
            Some(Literal::Text(s.clone()))
        }
        Value::Boolean(b) => Some(Literal::Bool(*b)),
        Value::Null => Some(Literal::Null),
        _ => None,
    }
}

/// Exact value of a numeric literal as (negative, significant digits,
/// power of ten), so `1`, `1.0` and `10e-1` share one key and no precision
/// is lost on large or long literals. Zero is always `(false, "0", 0)`.
fn decimal_key(text: &str) -> Option<(bool, String, i64)> {
    let text = text.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(i) => (&rest[..i], rest[i + 1..].parse::<i64>().ok()?),
        None => (rest, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{int}{frac}");
    let leading = digits.trim_start_matches('0');
    if leading.is_empty() {
        return Some((false, "0".to_string(), 0));
    }
    let significant = leading.trim_end_matches('0');
    let exponent = i64::try_from(frac.len())
        .ok()
        .and_then(|f| exponent.checked_sub(f))?
        .checked_add(i64::try_from(leading.len() - significant.len()).ok()?)?;
    Some((negative, significant.to_string(), exponent))
}

/// Truth value of a bare literal used as a condition (`WHERE TRUE`, `WHERE 1`).
fn literal_truth(lit: &Literal) -> Option<bool> {
    match lit {
        Literal::Bool(b) => Some(*b),
        Literal::Number(n) => decimal_key(n).map(|(_, digits, _)| digits != "0"),
        Literal::Text(_) | Literal::Null => None,
    }
}

fn same_literal(a: &Literal, b: &Literal) -> Option<bool> {
    match (a, b) {
        (Literal::Number(x), Literal::Number(y)) => Some(decimal_key(x)? == decimal_key(y)?),
        // Identical text is equal under every collation; differing text may
        // still compare equal under a case- or pad-insensitive one.
        (Literal::Text(x), Literal::Text(y)) if x == y => Some(true),
        (Literal::Bool(x), Literal::Bool(y)) => Some(x == y),
        // NULL never compares equal, and mixed kinds depend on dialect coercion.
        _ => None,
    }
}

/// Statically decided result of `left op right`, when both sides are literals.
fn compare_literals(op: CompareOp, left: &Predicate, right: &Predicate) -> Option<bool> {
    let (Predicate::Literal(l), Predicate::Literal(r)) = (left, right) else {
        return None;
    };
    let equal = same_literal(l, r)?;
    match op {
        CompareOp::Eq => Some(equal),
        CompareOp::NotEq => Some(!equal),
        CompareOp::Other => None,
    }
}

/// Unqualified, unquoted, lowercased table name.
fn bare_table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_exempt_truncate(name: &ObjectName) -> bool {
    let table = bare_table_name(name);
    EXEMPT_TRUNCATE_PREFIXES
        .iter()
        .any(|prefix| table.starts_with(prefix))
}

fn mutation_rules(
    selection: Option<&Expr>,
    missing: &'static str,
    tautology: &'static str,
) -> Option<&'static str> {
    match selection {
        None => Some(missing),
        Some(expr) if Predicate::lower(expr).is_tautology() => Some(tautology),
        Some(_) => None,
    }
}

/// Rule ids raised by one parsed statement.
fn statement_rules(stmt: &Statement) -> Vec<&'static str> {
    match stmt {
        Statement::Delete(Delete { selection, .. }) => mutation_rules(
            selection.as_ref(),
            catalog::SQL_DELETE_NO_WHERE,
            catalog::SQL_DELETE_TAUTOLOGY,
        )
        .into_iter()
        .collect(),
        Statement::Update { selection, .. } => mutation_rules(
            selection.as_ref(),
            catalog::SQL_UPDATE_NO_WHERE,
            catalog::SQL_UPDATE_TAUTOLOGY,
        )
        .into_iter()
        .collect(),
        Statement::Truncate { table_names, .. } => {
            if table_names.iter().any(|t| !is_exempt_truncate(&t.name)) {
                vec![catalog::SQL_TRUNCATE]
            } else {
                vec![]
            }
        }
        Statement::Drop { object_type, .. } => match object_type {
            ObjectType::Table => vec![catalog::SQL_DROP_TABLE],
            ObjectType::Database => vec![catalog::SQL_DROP_DATABASE],
            _ => vec![],
        },
        _ => vec![],
    }
}

/// Analyze one `sql` record's query text.
///
/// Text that does not parse, or parses to no statement, is a coverage gap
/// rather than a pass.
pub fn check(query: &str) -> Outcome {
    let statements = match Parser::parse_sql(&GenericDialect {}, query) {
        Ok(statements) if !statements.is_empty() => statements,
        Ok(_) => return Outcome::Gap(GapKind::UnanalyzableSql),
        Err(e) => {
            tracing::debug!(error = %e, "sql did not parse");
            return Outcome::Gap(GapKind::UnanalyzableSql);
        }
    };

    // A category counts once per record even if several statements raise it.
    let mut hits: BTreeMap<&'static str, Rule> = BTreeMap::new();
    for stmt in &statements {
        for id in statement_rules(stmt) {
            if let Some(rule) = catalog::sql_rule(id) {
                hits.entry(id).or_insert(rule);
            }
        }
    }

    let example = query.trim().to_string();
    Outcome::Analyzed(
        hits.into_values()
            .map(|rule| Detection {
                rule,
                example: example.clone(),
                subject: None,
            })
            .collect(),
    )
}
