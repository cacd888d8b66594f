use std::collections::HashMap;

use tracedeck_core::engine::{Engine, QueryCompletion, QueryError, QueryId, QueryResult, SqlValue};

use crate::trace::{CounterSample, SliceRow, TraceFile, TraceTrack};

/// In-memory demo engine.
///
/// Executes the query shapes the core's controllers emit (duration
/// probe, bucketed slice window, bucketed counter window) against
/// tables loaded from a trace file. Completions sit in a mailbox until
/// the next drain, so from the core's perspective this engine behaves
/// like any other asynchronous backend.
pub struct MemoryEngine {
    slice_tables: HashMap<i64, Vec<(SliceRow, i64)>>,
    counter_tables: HashMap<i64, Vec<(CounterSample, i64)>>,
    mailbox: Vec<QueryCompletion>,
    pending: usize,
    next_query: QueryId,
}

impl MemoryEngine {
    /// Load every lane of a trace file, assigning table ids in file
    /// order (slice and counter lanes count separately) and globally
    /// unique row ids.
    pub fn from_trace(trace: &TraceFile) -> MemoryEngine {
        let mut engine = MemoryEngine {
            slice_tables: HashMap::new(),
            counter_tables: HashMap::new(),
            mailbox: Vec::new(),
            pending: 0,
            next_query: 0,
        };
        let mut next_row_id: i64 = 1;
        let mut next_slice_table: i64 = 0;
        let mut next_counter_table: i64 = 0;
        for track in &trace.tracks {
            match track {
                TraceTrack::Slice { slices, .. } => {
                    let rows = slices
                        .iter()
                        .map(|s| {
                            let row = (s.clone(), next_row_id);
                            next_row_id += 1;
                            row
                        })
                        .collect();
                    engine.slice_tables.insert(next_slice_table, rows);
                    next_slice_table += 1;
                }
                TraceTrack::Counter { samples, .. } => {
                    let rows = samples
                        .iter()
                        .map(|s| {
                            let row = (*s, next_row_id);
                            next_row_id += 1;
                            row
                        })
                        .collect();
                    engine.counter_tables.insert(next_counter_table, rows);
                    next_counter_table += 1;
                }
            }
        }
        engine
    }

    fn execute(&self, sql: &str) -> Result<QueryResult, QueryError> {
        if sql.contains("max(dur) as maxDur") {
            self.probe(sql)
        } else if sql.contains("from slice") {
            self.slice_window(sql)
        } else if sql.contains("from counter") {
            self.counter_window(sql)
        } else if sql.starts_with("drop table") {
            Ok(QueryResult::default())
        } else {
            Err(QueryError::Execution(format!("unsupported query: {sql}")))
        }
    }

    fn probe(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let table = extract_i64(sql, "track_id = ")?;
        let max = self
            .slice_tables
            .get(&table)
            .and_then(|rows| rows.iter().map(|(s, _)| s.dur).max());
        let mut result = QueryResult::new(&["maxDur"]);
        result.push_row(vec![max.map_or(SqlValue::Null, SqlValue::Long)]);
        Ok(result)
    }

    fn slice_window(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let table = extract_i64(sql, "track_id = ")?;
        let resolution = extract_i64(sql, "(ts/")?.max(1);
        let lo = extract_i64(sql, "ts >= ")?;
        let hi = extract_i64(sql, "ts <= ")?;

        // group by (bucket, depth), keeping the longest slice per group.
        let mut groups: Vec<(i64, i64, &SliceRow, i64)> = Vec::new();
        if let Some(rows) = self.slice_tables.get(&table) {
            for (slice, id) in rows {
                if slice.ts < lo || slice.ts > hi {
                    continue;
                }
                let tsq = slice.ts.div_euclid(resolution) * resolution;
                match groups
                    .iter_mut()
                    .find(|(gtsq, gdepth, _, _)| *gtsq == tsq && *gdepth == slice.depth)
                {
                    Some(slot) if slice.dur > slot.2.dur => *slot = (tsq, slice.depth, slice, *id),
                    Some(_) => {}
                    None => groups.push((tsq, slice.depth, slice, *id)),
                }
            }
        }
        groups.sort_by_key(|(tsq, depth, _, _)| (*tsq, *depth));

        let mut result = QueryResult::new(&["tsq", "ts", "dur", "depth", "name", "id"]);
        for (tsq, depth, slice, id) in groups {
            result.push_row(vec![
                SqlValue::Long(tsq),
                SqlValue::Long(slice.ts),
                SqlValue::Long(slice.dur),
                SqlValue::Long(depth),
                SqlValue::Str(slice.name.clone()),
                SqlValue::Long(id),
            ]);
        }
        Ok(result)
    }

    fn counter_window(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let table = extract_i64(sql, "track_id = ")?;
        let resolution = extract_i64(sql, "(ts/")?.max(1);
        let lo = extract_i64(sql, "ts >= ")?;
        let hi = extract_i64(sql, "ts <= ")?;

        // group by bucket: min/max over the bucket, last = latest sample.
        let mut groups: Vec<(i64, f64, f64, i64, f64, i64)> = Vec::new();
        if let Some(rows) = self.counter_tables.get(&table) {
            for (sample, id) in rows {
                if sample.ts < lo || sample.ts > hi {
                    continue;
                }
                let tsq = sample.ts.div_euclid(resolution) * resolution;
                match groups.iter_mut().find(|(gtsq, ..)| *gtsq == tsq) {
                    Some(slot) => {
                        slot.1 = slot.1.min(sample.value);
                        slot.2 = slot.2.max(sample.value);
                        if sample.ts >= slot.3 {
                            slot.3 = sample.ts;
                            slot.4 = sample.value;
                            slot.5 = *id;
                        }
                    }
                    None => groups.push((tsq, sample.value, sample.value, sample.ts, sample.value, *id)),
                }
            }
        }
        groups.sort_by_key(|(tsq, ..)| *tsq);

        let mut result = QueryResult::new(&["tsq", "minValue", "maxValue", "lastValue", "id"]);
        for (tsq, min, max, _, last, id) in groups {
            result.push_row(vec![
                SqlValue::Long(tsq),
                SqlValue::Double(min),
                SqlValue::Double(max),
                SqlValue::Double(last),
                SqlValue::Long(id),
            ]);
        }
        Ok(result)
    }
}

impl Engine for MemoryEngine {
    fn submit(&mut self, sql: String) -> QueryId {
        let id = self.next_query;
        self.next_query += 1;
        let result = self.execute(&sql);
        self.mailbox.push(QueryCompletion { id, result });
        self.pending += 1;
        id
    }

    fn drain(&mut self) -> Vec<QueryCompletion> {
        let completions = std::mem::take(&mut self.mailbox);
        self.pending -= completions.len();
        completions
    }

    fn pending(&self) -> usize {
        self.pending
    }
}

/// Parse the first integer literal following `key` in `sql`.
fn extract_i64(sql: &str, key: &str) -> Result<i64, QueryError> {
    let start = sql
        .find(key)
        .ok_or_else(|| QueryError::Execution(format!("missing `{key}` in: {sql}")))?
        + key.len();
    let rest = &sql[start..];
    let end = rest
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map_or(rest.len(), |(i, _)| i);
    rest[..end]
        .parse()
        .map_err(|_| QueryError::Execution(format!("bad literal after `{key}` in: {sql}")))
}
