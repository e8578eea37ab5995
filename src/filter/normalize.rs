//! [`PredicateNormalizer`]: folds a scan's boolean conjunct tree (plus
//! its subscribed runtime filters) into per-column sinks and a residual
//! tree, via a single post-order walk. Grounded on
//! `categories/execution/filter.rs`'s `FilterOp` evaluation and
//! `categories/optimization/statistics_collector.rs`'s per-column
//! summarization, generalized from one flat comparison to a recursive
//! conjunct tree with set/range/bloom/bitmap/function-pushdown sinks.

use std::collections::HashMap;

use crate::filter::expr::{CompareOp, ColumnRef, Leaf, Literal, PredicateExpr, PushableFunctionCall};

/// Per-column accumulation of everything a conjunct tree walk pushed
/// down for that column. `range` absorbs `=`/`<`/`<=`/`>`/`>=`/`IS [NOT]
/// NULL`; `ne_values` absorbs `!=` (which never narrows the range);
/// `in_set`/`not_in_set` each absorb a *fixed*, in-capacity `IN (...)`
/// / `NOT IN (...)`; everything past capacity stays in the residual by
/// construction (we never invent a sink we can't bound).
#[derive(Debug, Clone, Default)]
pub struct RangeSink {
    pub low: Option<Literal>,
    pub low_inclusive: bool,
    pub high: Option<Literal>,
    pub high_inclusive: bool,
    pub null_bit: Option<bool>,
}

impl RangeSink {
    fn tighten_low(&mut self, literal: Literal, inclusive: bool) {
        let replace = match &self.low {
            None => true,
            Some(cur) => {
                matches!(literal.value.partial_cmp(&cur.value), Some(std::cmp::Ordering::Greater))
                    || (literal.value == cur.value && !inclusive && self.low_inclusive)
            }
        };
        if replace {
            self.low = Some(literal);
            self.low_inclusive = inclusive;
        }
    }

    fn tighten_high(&mut self, literal: Literal, inclusive: bool) {
        let replace = match &self.high {
            None => true,
            Some(cur) => {
                matches!(literal.value.partial_cmp(&cur.value), Some(std::cmp::Ordering::Less))
                    || (literal.value == cur.value && !inclusive && self.high_inclusive)
            }
        };
        if replace {
            self.high = Some(literal);
            self.high_inclusive = inclusive;
        }
    }

    /// Intersection of two range sinks, used when AND-ing sibling
    /// conjuncts on the same column.
    fn intersect(&mut self, other: &RangeSink) {
        if let Some(low) = other.low.clone() {
            self.tighten_low(low, other.low_inclusive);
        }
        if let Some(high) = other.high.clone() {
            self.tighten_high(high, other.high_inclusive);
        }
        if let Some(null_bit) = other.null_bit {
            self.null_bit = Some(self.null_bit.unwrap_or(true) && null_bit);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InSetSink {
    pub values: Vec<Literal>,
    pub capacity: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnSinks {
    pub range: RangeSink,
    pub ne_values: Vec<Literal>,
    pub in_set: Option<InSetSink>,
    /// Mirror of `in_set` for `NOT IN (...)`: a fixed, in-capacity
    /// exclusion set. Values here are definite row rejections rather
    /// than the definite-maybe membership `in_set` grants.
    pub not_in_set: Option<InSetSink>,
    pub bloom_filter_ids: Vec<u32>,
    pub bitmap_filter_ids: Vec<u32>,
    pub function_pushdowns: Vec<PushableFunctionCall>,
    /// Stats-only compound ranges contributed by an `OR` of same-column
    /// comparisons; never used to hard-filter rows.
    pub compound_ranges: Vec<RangeSink>,
}

#[derive(Debug, Default)]
pub struct NormalizedPredicate {
    pub sinks: HashMap<u32, ColumnSinks>,
    pub residual: PredicateExpr,
}

pub struct PredicateNormalizer {
    in_set_capacity: usize,
}

impl PredicateNormalizer {
    pub fn new(in_set_capacity: usize) -> Self {
        Self { in_set_capacity }
    }

    /// Normalize one conjunct tree in a single post-order walk.
    pub fn normalize(&self, expr: &PredicateExpr) -> NormalizedPredicate {
        let mut sinks: HashMap<u32, ColumnSinks> = HashMap::new();
        let residual = self.walk(expr, &mut sinks);
        NormalizedPredicate { sinks, residual }
    }

    /// Re-normalize after a late-arriving filter subscribes mid-scan: AND
    /// the new leaf onto the previous residual, producing a fresh
    /// conjunct context. The prior context (and any sinks already
    /// derived from it) remains valid until the in-flight batch drains;
    /// callers keep using the old `NormalizedPredicate` for rows already
    /// in flight and switch to the new one for the next batch.
    pub fn append_late_arrival(
        &self,
        previous_residual: &PredicateExpr,
        new_leaf: Leaf,
    ) -> NormalizedPredicate {
        let combined = PredicateExpr::and(vec![
            previous_residual.clone(),
            PredicateExpr::Leaf(new_leaf),
        ]);
        self.normalize(&combined)
    }

    fn walk(&self, expr: &PredicateExpr, sinks: &mut HashMap<u32, ColumnSinks>) -> PredicateExpr {
        match expr {
            PredicateExpr::True | PredicateExpr::False => expr.clone(),
            PredicateExpr::Leaf(leaf) => self.fold_leaf(leaf, sinks),
            PredicateExpr::And(children) => {
                let mut residual_children = Vec::new();
                for child in children {
                    let r = self.walk(child, sinks);
                    if r != PredicateExpr::True {
                        residual_children.push(r);
                    }
                    if r == PredicateExpr::False {
                        return PredicateExpr::False;
                    }
                }
                PredicateExpr::and(residual_children)
            }
            PredicateExpr::Or(children) => {
                // OR never hard-filters per column; record same-column
                // comparison ranges as compound (stats-only) and leave
                // the whole subtree in the residual.
                self.record_compound_or(children, sinks);
                let mut child_residuals = Vec::new();
                for child in children {
                    let mut scratch = HashMap::new();
                    child_residuals.push(self.walk(child, &mut scratch));
                }
                if child_residuals.iter().any(|c| *c == PredicateExpr::True) {
                    PredicateExpr::True
                } else {
                    PredicateExpr::Or(child_residuals)
                }
            }
            PredicateExpr::Not(inner) => self.fold_not(inner, sinks),
        }
    }

    fn record_compound_or(&self, children: &[PredicateExpr], sinks: &mut HashMap<u32, ColumnSinks>) {
        // Only worth recording when every branch is a Compare leaf on the
        // same column; anything else contributes nothing stats-wise.
        let columns: Vec<ColumnRef> = children
            .iter()
            .filter_map(|c| match c {
                PredicateExpr::Leaf(Leaf::Compare { column, .. }) => Some(*column),
                _ => None,
            })
            .collect();
        if columns.len() != children.len() || columns.is_empty() {
            return;
        }
        let first = columns[0];
        if !columns.iter().all(|c| c.column_id == first.column_id) {
            return;
        }
        let mut compound = RangeSink::default();
        for child in children {
            if let PredicateExpr::Leaf(Leaf::Compare { op, literal, .. }) = child {
                apply_compare(&mut compound, *op, literal.clone());
            }
        }
        sinks
            .entry(first.column_id)
            .or_default()
            .compound_ranges
            .push(compound);
    }

    fn fold_not(&self, inner: &PredicateExpr, sinks: &mut HashMap<u32, ColumnSinks>) -> PredicateExpr {
        match inner {
            PredicateExpr::Leaf(leaf) => self.fold_leaf(&invert_leaf(leaf), sinks),
            PredicateExpr::Not(double) => self.walk(double, sinks),
            PredicateExpr::And(children) if all_same_column_leaves(children) => {
                let inverted: Vec<PredicateExpr> = children
                    .iter()
                    .map(|c| PredicateExpr::Not(Box::new(c.clone())))
                    .collect();
                self.walk(&PredicateExpr::Or(inverted), sinks)
            }
            PredicateExpr::Or(children) if all_same_column_leaves(children) => {
                let inverted: Vec<PredicateExpr> = children
                    .iter()
                    .map(|c| PredicateExpr::Not(Box::new(c.clone())))
                    .collect();
                self.walk(&PredicateExpr::And(inverted), sinks)
            }
            // NOT never pushes over a mixed-column AND/OR.
            other => PredicateExpr::Not(Box::new(self.walk(other, &mut HashMap::new()))),
        }
    }

    fn fold_leaf(&self, leaf: &Leaf, sinks: &mut HashMap<u32, ColumnSinks>) -> PredicateExpr {
        match leaf {
            Leaf::In { column, values } => {
                if values.len() <= self.in_set_capacity {
                    let entry = sinks.entry(column.column_id).or_default();
                    let in_set = entry.in_set.get_or_insert_with(|| InSetSink {
                        values: Vec::new(),
                        capacity: self.in_set_capacity,
                    });
                    in_set.values.extend(values.iter().cloned());
                    PredicateExpr::True
                } else {
                    PredicateExpr::Leaf(leaf.clone())
                }
            }
            Leaf::NotIn { column, values } => {
                if values.len() <= self.in_set_capacity {
                    let entry = sinks.entry(column.column_id).or_default();
                    let not_in_set = entry.not_in_set.get_or_insert_with(|| InSetSink {
                        values: Vec::new(),
                        capacity: self.in_set_capacity,
                    });
                    not_in_set.values.extend(values.iter().cloned());
                    PredicateExpr::True
                } else {
                    PredicateExpr::Leaf(leaf.clone())
                }
            }
            Leaf::Compare { column, op, literal } => {
                let entry = sinks.entry(column.column_id).or_default();
                match op {
                    CompareOp::Eq | CompareOp::NullSafeEq => {
                        entry.range.tighten_low(literal.clone(), true);
                        entry.range.tighten_high(literal.clone(), true);
                    }
                    CompareOp::Ne => {
                        entry.ne_values.push(literal.clone());
                        // `!=` never narrows the range.
                        return PredicateExpr::Leaf(leaf.clone());
                    }
                    CompareOp::Lt => entry.range.tighten_high(literal.clone(), false),
                    CompareOp::Le => entry.range.tighten_high(literal.clone(), true),
                    CompareOp::Gt => entry.range.tighten_low(literal.clone(), false),
                    CompareOp::Ge => entry.range.tighten_low(literal.clone(), true),
                }
                PredicateExpr::True
            }
            Leaf::IsNull { column } => {
                sinks.entry(column.column_id).or_default().range.null_bit = Some(true);
                PredicateExpr::True
            }
            Leaf::IsNotNull { column } => {
                sinks.entry(column.column_id).or_default().range.null_bit = Some(false);
                PredicateExpr::True
            }
            Leaf::BloomProbe { column, filter_id } => {
                sinks
                    .entry(column.column_id)
                    .or_default()
                    .bloom_filter_ids
                    .push(*filter_id);
                // storage layer push-down is a property of the scan, not
                // this walk; keep the probe in the residual too so
                // correctness holds even if storage can't apply it.
                PredicateExpr::Leaf(leaf.clone())
            }
            Leaf::BitmapProbe { column, filter_id } => {
                sinks
                    .entry(column.column_id)
                    .or_default()
                    .bitmap_filter_ids
                    .push(*filter_id);
                PredicateExpr::Leaf(leaf.clone())
            }
            Leaf::FunctionPushdown(call) => {
                sinks
                    .entry(call.column.column_id)
                    .or_default()
                    .function_pushdowns
                    .push(call.clone());
                PredicateExpr::True
            }
            Leaf::Opaque(_) => PredicateExpr::Leaf(leaf.clone()),
        }
    }
}

fn apply_compare(sink: &mut RangeSink, op: CompareOp, literal: Literal) {
    match op {
        CompareOp::Eq | CompareOp::NullSafeEq => {
            sink.tighten_low(literal.clone(), true);
            sink.tighten_high(literal, true);
        }
        CompareOp::Ne => {}
        CompareOp::Lt => sink.tighten_high(literal, false),
        CompareOp::Le => sink.tighten_high(literal, true),
        CompareOp::Gt => sink.tighten_low(literal, false),
        CompareOp::Ge => sink.tighten_low(literal, true),
    }
}

fn invert_op(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Eq => CompareOp::Ne,
        CompareOp::Ne => CompareOp::Eq,
        CompareOp::NullSafeEq => CompareOp::Ne,
        CompareOp::Lt => CompareOp::Ge,
        CompareOp::Le => CompareOp::Gt,
        CompareOp::Gt => CompareOp::Le,
        CompareOp::Ge => CompareOp::Lt,
    }
}

fn invert_leaf(leaf: &Leaf) -> Leaf {
    match leaf {
        Leaf::Compare { column, op, literal } => Leaf::Compare {
            column: *column,
            op: invert_op(*op),
            literal: literal.clone(),
        },
        Leaf::In { column, values } => Leaf::NotIn {
            column: *column,
            values: values.clone(),
        },
        Leaf::NotIn { column, values } => Leaf::In {
            column: *column,
            values: values.clone(),
        },
        Leaf::IsNull { column } => Leaf::IsNotNull { column: *column },
        Leaf::IsNotNull { column } => Leaf::IsNull { column: *column },
        other => other.clone(),
    }
}

fn all_same_column_leaves(children: &[PredicateExpr]) -> bool {
    let mut column_id = None;
    for child in children {
        let id = match child {
            PredicateExpr::Leaf(Leaf::Compare { column, .. }) => column.column_id,
            PredicateExpr::Leaf(Leaf::In { column, .. }) => column.column_id,
            PredicateExpr::Leaf(Leaf::NotIn { column, .. }) => column.column_id,
            PredicateExpr::Leaf(Leaf::IsNull { column }) => column.column_id,
            PredicateExpr::Leaf(Leaf::IsNotNull { column }) => column.column_id,
            _ => return false,
        };
        match column_id {
            None => column_id = Some(id),
            Some(existing) if existing != id => return false,
            _ => {}
        }
    }
    true
}

impl Default for PredicateExpr {
    fn default() -> Self {
        PredicateExpr::True
    }
}
