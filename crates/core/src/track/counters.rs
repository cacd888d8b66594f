use serde::Deserialize;

use crate::engine::{Engine, QueryCompletion, QueryError, QueryId, QueryResult};
use crate::time::{TimeNs, TimeSpan};
use crate::track::data::CounterData;
use crate::track::{CompletionOutcome, DataRequest, TrackController, TrackData};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterConfig {
    /// Engine-side counter table track id.
    pub source_id: i64,
}

/// Controller for `"counter"` tracks.
///
/// Counters have no duration, so there is no probe step: each window
/// request is a single bucketed query keeping min/max/last value per
/// bucket. Supersession follows the same last-request-wins discipline
/// as slice tracks.
pub struct CounterTrackController {
    source_id: i64,
    latest: Option<DataRequest>,
    generation: u64,
    in_flight: Option<(QueryId, u64)>,
}

impl CounterTrackController {
    pub fn new(config: CounterConfig) -> CounterTrackController {
        CounterTrackController {
            source_id: config.source_id,
            latest: None,
            generation: 0,
            in_flight: None,
        }
    }

    fn window_sql(&self, req: &DataRequest) -> String {
        let res = req.resolution.nanos();
        format!(
            "select (ts/{res})*{res} as tsq, min(value) as minValue, \
             max(value) as maxValue, value as lastValue, id \
             from counter \
             where track_id = {} and ts >= {} and ts <= {} \
             group by tsq \
             order by tsq",
            self.source_id,
            req.span.start().nanos(),
            req.span.end().nanos(),
        )
    }

    fn build(&self, req: &DataRequest, result: &QueryResult) -> Result<TrackData, QueryError> {
        let res = req.resolution;
        let mut data = CounterData {
            span: req.span,
            resolution: res,
            timestamps: Vec::with_capacity(result.len()),
            min_values: Vec::with_capacity(result.len()),
            max_values: Vec::with_capacity(result.len()),
            last_values: Vec::with_capacity(result.len()),
            sample_ids: Vec::with_capacity(result.len()),
        };
        for row in 0..result.len() {
            data.timestamps
                .push(TimeNs(result.long(row, "tsq")?).quantize(res));
            data.min_values.push(result.double(row, "minValue")?);
            data.max_values.push(result.double(row, "maxValue")?);
            data.last_values.push(result.double(row, "lastValue")?);
            data.sample_ids.push(result.long(row, "id")?);
        }
        Ok(TrackData::Counter(data))
    }
}

impl TrackController for CounterTrackController {
    fn request_data(&mut self, engine: &mut dyn Engine, req: DataRequest) -> Vec<QueryId> {
        self.generation += 1;
        self.latest = Some(req);
        let id = engine.submit(self.window_sql(&req));
        self.in_flight = Some((id, self.generation));
        vec![id]
    }

    fn handle_completion(
        &mut self,
        completion: &QueryCompletion,
        _engine: &mut dyn Engine,
    ) -> CompletionOutcome {
        let mut outcome = CompletionOutcome::default();
        let Some((query_id, generation)) = self.in_flight else {
            return outcome;
        };
        if completion.id != query_id {
            return outcome;
        }
        self.in_flight = None;
        if generation != self.generation {
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
