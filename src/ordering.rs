//! Fractional order indexes.
//!
//! A new or moved task gets an index strictly between its neighbours, so the
//! rest of the collection is never renumbered. Repeated insertion at the same
//! boundary halves the gap each time; after roughly fifty halvings two
//! neighbouring `f64` values can no longer be split. Nothing rebalances
//! automatically. Callers that detect exhaustion with [`needs_rebalance`] can
//! renumber a view with [`rebalance`].

/// Index for a task placed between `before` and `after` (either may be absent)
pub fn between(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (None, None) => 1.0,
        (None, Some(after)) => after / 2.0,
        (Some(before), None) => before + 1.0,
        (Some(before), Some(after)) => (before + after) / 2.0,
    }
}

/// Index that appends after every existing index
pub fn next_order_index<I>(indices: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    indices
        .into_iter()
        .fold(None, |max: Option<f64>, i| Some(max.map_or(i, |m| m.max(i))))
        .map_or(1.0, |max| max + 1.0)
}

/// True when no representable value lies strictly between `before` and `after`
pub fn needs_rebalance(before: f64, after: f64) -> bool {
    let mid = between(Some(before), Some(after));
    !(before < mid && mid < after)
}

/// Evenly spaced indexes `1.0..=n`
pub fn rebalance(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}
