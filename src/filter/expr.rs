//! The boolean conjunct tree a scan hands to [`crate::filter::normalize`],
//! and the literal/leaf shapes it's built from. Grounded on
//! `categories/execution/filter.rs`'s `FilterOp` comparison vocabulary,
//! generalized from a single flat filter to a recursive predicate tree.

use serde::{Deserialize, Serialize};

use crate::filter::types::{ColumnType, ColumnValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NullSafeEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A fully-typed literal, as produced by [`crate::filter::literal::LiteralBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: ColumnValue,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub column_id: u32,
    pub column_type: ColumnType,
}

/// A function-predicate leaf the planner has already approved for
/// push-down (e.g. `date_trunc(col, 'day') = lit`). The normalizer never
/// invents these; it only recognizes ones already tagged as pushable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushableFunctionCall {
    pub name: String,
    pub column: ColumnRef,
    pub args: Vec<Literal>,
}

/// Leaf predicate shapes the normalizer recognizes. Anything else passed
/// in a conjunct tree is treated as opaque and left untouched in the
/// residual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Leaf {
    In { column: ColumnRef, values: Vec<Literal> },
    NotIn { column: ColumnRef, values: Vec<Literal> },
    Compare { column: ColumnRef, op: CompareOp, literal: Literal },
    IsNull { column: ColumnRef },
    IsNotNull { column: ColumnRef },
    BloomProbe { column: ColumnRef, filter_id: u32 },
    BitmapProbe { column: ColumnRef, filter_id: u32 },
    FunctionPushdown(PushableFunctionCall),
    /// Anything the normalizer doesn't recognize, preserved verbatim.
    Opaque(String),
}

/// The conjunct tree. `And`/`Or`/`Not` compose `Leaf`s; `True`/`False`
/// are the constant-folding terminals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateExpr {
    Leaf(Leaf),
    And(Vec<PredicateExpr>),
    Or(Vec<PredicateExpr>),
    Not(Box<PredicateExpr>),
    True,
    False,
}

impl PredicateExpr {
    pub fn and(mut parts: Vec<PredicateExpr>) -> PredicateExpr {
        parts.retain(|p| *p != PredicateExpr::True);
        if parts.iter().any(|p| *p == PredicateExpr::False) {
            return PredicateExpr::False;
        }
        match parts.len() {
            0 => PredicateExpr::True,
            1 => parts.into_iter().next().unwrap(),
            _ => PredicateExpr::And(parts),
        }
    }
}
