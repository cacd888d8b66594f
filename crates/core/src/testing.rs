//! Deterministic test doubles for driving the pipeline without a real
//! trace engine.
//!
//! The scripted engine records every submitted query and completes
//! nothing until the test resolves it, so interleavings — including the
//! stale-response orderings the controllers must survive — are fully
//! under test control.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{Engine, QueryCompletion, QueryError, QueryId, QueryResult, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Pending,
    Done,
}

#[derive(Default)]
struct Inner {
    submissions: Vec<(QueryId, String)>,
    states: HashMap<QueryId, QueryState>,
    mailbox: Vec<QueryCompletion>,
    next_id: QueryId,
    auto_result: Option<fn(&str) -> Result<QueryResult, QueryError>>,
}

impl Inner {
    fn complete(&mut self, id: QueryId, result: Result<QueryResult, QueryError>) {
        debug_assert_eq!(self.states.get(&id), Some(&QueryState::Pending));
        self.states.insert(id, QueryState::Done);
        self.mailbox.push(QueryCompletion { id, result });
    }
}

/// An [`Engine`] whose completions are produced by the test, in any
/// order the test chooses.
///
/// The handle is cheaply cloneable (shared interior, single-threaded):
/// one clone moves into the `AppContext` under test while the test keeps
/// another to resolve queries and inspect submissions.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    inner: Rc<RefCell<Inner>>,
}

impl ScriptedEngine {
    pub fn new() -> ScriptedEngine {
        ScriptedEngine::default()
    }

    /// An engine that auto-resolves every query through `f`, visible at
    /// the next drain.
    pub fn auto(f: fn(&str) -> Result<QueryResult, QueryError>) -> ScriptedEngine {
        let engine = ScriptedEngine::new();
        engine.inner.borrow_mut().auto_result = Some(f);
        engine
    }

    /// All submissions so far, in order.
    pub fn submissions(&self) -> Vec<(QueryId, String)> {
        self.inner.borrow().submissions.clone()
    }

    /// The SQL text of one submitted query.
    pub fn sql(&self, id: QueryId) -> Option<String> {
        self.inner
            .borrow()
            .submissions
            .iter()
            .find(|(qid, _)| *qid == id)
            .map(|(_, sql)| sql.clone())
    }

    /// Complete a query successfully. The completion becomes visible at
    /// the next `drain`.
    pub fn resolve(&self, id: QueryId, result: QueryResult) {
        self.inner.borrow_mut().complete(id, Ok(result));
    }

    /// Complete a query with an error.
    pub fn fail(&self, id: QueryId, error: QueryError) {
        self.inner.borrow_mut().complete(id, Err(error));
    }
}

impl Engine for ScriptedEngine {
    fn submit(&mut self, sql: String) -> QueryId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.submissions.push((id, sql.clone()));
        inner.states.insert(id, QueryState::Pending);
        if let Some(f) = inner.auto_result {
            inner.complete(id, f(&sql));
        }
        id
    }

    fn drain(&mut self) -> Vec<QueryCompletion> {
        std::mem::take(&mut self.inner.borrow_mut().mailbox)
    }

    fn pending(&self) -> usize {
        self.inner
            .borrow()
            .states
            .values()
            .filter(|s| **s == QueryState::Pending)
            .count()
    }
}

/// Result of the slice controller's duration probe.
pub fn max_dur_result(max_dur: i64) -> QueryResult {
    let mut r = QueryResult::new(&["maxDur"]);
    r.push_row(vec![SqlValue::Long(max_dur)]);
    r
}

/// Result rows for the bucketed slice window query.
///
/// Input tuples are `(ts, dur, depth, name, id)`; the bucket column is
/// derived with the same floor the emitted SQL uses, and grouping by
/// `(bucket, depth)` keeps the longest slice per group, mirroring the
/// engine-side `group by tsq, depth` + `max(dur)`.
pub fn slice_window_result(resolution: i64, rows: &[(i64, i64, i64, &str, i64)]) -> QueryResult {
    let mut grouped: Vec<(i64, i64, i64, i64, String, i64)> = Vec::new();
    for &(ts, dur, depth, name, id) in rows {
        let tsq = ts.div_euclid(resolution) * resolution;
        match grouped
            .iter_mut()
            .find(|(gtsq, _, _, gdepth, _, _)| *gtsq == tsq && *gdepth == depth)
        {
            Some(slot) if dur > slot.2 => *slot = (tsq, ts, dur, depth, name.to_string(), id),
            Some(_) => {}
            None => grouped.push((tsq, ts, dur, depth, name.to_string(), id)),
        }
    }
    grouped.sort_by_key(|(tsq, _, _, depth, _, _)| (*tsq, *depth));

    let mut r = QueryResult::new(&["tsq", "ts", "dur", "depth", "name", "id"]);
    for (tsq, ts, dur, depth, name, id) in grouped {
        r.push_row(vec![
            SqlValue::Long(tsq),
            SqlValue::Long(ts),
            SqlValue::Long(dur),
            SqlValue::Long(depth),
            SqlValue::Str(name),
            SqlValue::Long(id),
        ]);
    }
    r
}

/// Result rows for the bucketed counter window query:
/// `(tsq, min, max, last, id)` per bucket.
pub fn counter_window_result(rows: &[(i64, f64, f64, f64, i64)]) -> QueryResult {
    let mut r = QueryResult::new(&["tsq", "minValue", "maxValue", "lastValue", "id"]);
    for &(tsq, min, max, last, id) in rows {
        r.push_row(vec![
            SqlValue::Long(tsq),
            SqlValue::Double(min),
            SqlValue::Double(max),
            SqlValue::Double(last),
            SqlValue::Long(id),
        ]);
    }
    r
}
