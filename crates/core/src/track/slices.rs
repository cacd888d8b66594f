use serde::Deserialize;

use crate::engine::{Engine, QueryCompletion, QueryError, QueryId, QueryResult};
use crate::time::{TimeNs, TimeSpan};
use crate::track::data::SliceDataBuilder;
use crate::track::{CompletionOutcome, DataRequest, TrackController, TrackData};

/// Duration value the engine reports for slices still open at trace end.
pub const INCOMPLETE_DUR: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceConfig {
    /// Engine-side slice table track id.
    pub source_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MaxDur {
    /// Probe not issued yet.
    Unknown,
    /// Probe in flight under this query id.
    Probing(QueryId),
    /// Probe answered; safe to issue window queries.
    Known(TimeNs),
}

/// Controller for `"slice"` tracks.
///
/// For each requested window it runs one bucketed query against the
/// slice table, after a one-time probe for the track's maximum slice
/// duration. The probe bounds the lookback needed to catch slices that
/// start before the window but extend into it; it is cached per
/// controller (schema- and track-dependent, so never shared globally).
pub struct SliceTrackController {
    source_id: i64,
    max_dur: MaxDur,
    /// Most recent request — the only one whose completion is accepted.
    latest: Option<DataRequest>,
    generation: u64,
    /// In-flight window query: (query id, generation it was issued for).
    in_flight: Option<(QueryId, u64)>,
}

impl SliceTrackController {
    pub fn new(config: SliceConfig) -> SliceTrackController {
        SliceTrackController {
            source_id: config.source_id,
            max_dur: MaxDur::Unknown,
            latest: None,
            generation: 0,
            in_flight: None,
        }
    }

    fn probe_sql(&self) -> String {
        format!(
            "select max(dur) as maxDur from slice where track_id = {}",
            self.source_id
        )
    }

    /// The bucketed window query. Buckets are `floor(ts / resolution) *
    /// resolution`; grouping by `(bucket, depth)` keeps the row with the
    /// maximal duration per bucket, so overlapping sub-pixel slices
    /// collapse into one visible representative.
    fn window_sql(&self, req: &DataRequest, max_dur: TimeNs) -> String {
        let res = req.resolution.nanos();
        let lookback = req.span.start().saturating_sub(max_dur).nanos();
        format!(
            "select (ts/{res})*{res} as tsq, ts, max(dur) as dur, depth, name, id \
             from slice \
             where track_id = {} and ts >= {lookback} and ts <= {} \
             group by tsq, depth \
             order by tsq, depth",
            self.source_id,
            req.span.end().nanos(),
        )
    }

    fn submit_window(&mut self, engine: &mut dyn Engine, max_dur: TimeNs) -> Vec<QueryId> {
        let Some(req) = self.latest else {
            return Vec::new();
        };
        let id = engine.submit(self.window_sql(&req, max_dur));
        self.in_flight = Some((id, self.generation));
        vec![id]
    }

    fn build(&self, req: &DataRequest, result: &QueryResult) -> Result<TrackData, QueryError> {
        let res = req.resolution;
        let mut builder = SliceDataBuilder::new(req.span, res);
        for row in 0..result.len() {
            let tsq = TimeNs(result.long(row, "tsq")?).quantize(res);
            let ts = TimeNs(result.long(row, "ts")?);
            let dur = result.opt_long(row, "dur")?.unwrap_or(INCOMPLETE_DUR);
            let depth = result.long(row, "depth")?.max(0) as u32;
            let title = result.str(row, "name")?;
            let slice_id = result.long(row, "id")?;

            let incomplete = dur == INCOMPLETE_DUR;
            let instant = dur == 0;
            let end = if incomplete {
                // True end unknown; clamp to the visible window so the
                // rendered rectangle reaches the right edge.
                req.span.end().max(tsq + res)
            } else {
                // Quantized actual end, but never narrower than one
                // bucket — a slice must not vanish at low zoom.
                (ts + TimeNs(dur)).quantize(res).max(tsq + res)
            };
            builder.push(tsq, end, depth, title, instant, incomplete, slice_id);
        }
        Ok(TrackData::Slices(builder.finish()))
    }
}

impl TrackController for SliceTrackController {
    fn request_data(&mut self, engine: &mut dyn Engine, req: DataRequest) -> Vec<QueryId> {
        self.generation += 1;
        self.latest = Some(req);
        match self.max_dur {
            MaxDur::Unknown => {
                let id = engine.submit(self.probe_sql());
                self.max_dur = MaxDur::Probing(id);
                vec![id]
            }
            // Window query follows when the probe lands.
            MaxDur::Probing(_) => Vec::new(),
            MaxDur::Known(max_dur) => self.submit_window(engine, max_dur),
        }
    }

    fn handle_completion(
        &mut self,
        completion: &QueryCompletion,
        engine: &mut dyn Engine,
    ) -> CompletionOutcome {
        let mut outcome = CompletionOutcome::default();

        if let MaxDur::Probing(probe_id) = self.max_dur
            && completion.id == probe_id
        {
            match &completion.result {
                Ok(result) => {
                    let max_dur = result.opt_long(0, "maxDur").ok().flatten().unwrap_or(0);
                    let max_dur = TimeNs(max_dur.max(0));
                    self.max_dur = MaxDur::Known(max_dur);
                    outcome.issued = self.submit_window(engine, max_dur);
                }
                Err(err) => {
                    // Next window change re-probes.
                    self.max_dur = MaxDur::Unknown;
                    outcome.failed = Some(err.to_string());
                }
            }
            return outcome;
        }

        let Some((query_id, generation)) = self.in_flight else {
            return outcome;
        };
        if completion.id != query_id {
            // A completion for a query we no longer track: superseded.
            return outcome;
        }
        self.in_flight = None;
        if generation != self.generation {
            // Issued for an older window; a newer request owns the track.
            return outcome;
        }
        match (&completion.result, self.latest) {
            (Ok(result), Some(req)) => match self.build(&req, result) {
                Ok(data) => outcome.published = Some(data),
                Err(err) => outcome.failed = Some(err.to_string()),
            },
            (Err(err), _) => outcome.failed = Some(err.to_string()),
            (Ok(_), None) => {}
        }
        outcome
    }
}
