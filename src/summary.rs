//! Summary features: selected feature values of a document as JSON.

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::errors::Result;
use crate::match_data::MatchData;
use crate::pipeline::Pipeline;
use crate::types::{FeatureValue, Handle};

/// Writes a fixed set of features of the current document as a JSON object.
///
/// Names are resolved against the pipeline once, at construction. Names the
/// pipeline does not know are left out of every summary.
#[derive(Debug, Clone, Default)]
pub struct SummaryFeaturesWriter {
    entries: Vec<(String, Handle)>,
}

impl SummaryFeaturesWriter {
    pub fn new<S: AsRef<str>>(pipeline: &Pipeline, names: &[S]) -> Self {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            match pipeline.handle_of(name) {
                Some(handle) => entries.push((name.to_string(), handle)),
                None => debug!(feature = name, "summary feature not in pipeline, omitted"),
            }
        }
        Self { entries }
    }

    /// Names that will be written, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The already computed features of the current document.
    ///
    /// Never runs an executor: features not yet computed for this document
    /// are left out.
    pub fn write(&self, match_data: &MatchData) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, handle) in &self.entries {
            if let Some(value) = match_data.peek(*handle) {
                out.insert(name.clone(), to_json(value));
            }
        }
        out
    }

    /// Compute any missing feature, then write all of them.
    pub fn write_computing(
        &self,
        pipeline: &Pipeline,
        match_data: &mut MatchData,
    ) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (name, handle) in &self.entries {
            let value = pipeline.get_value(match_data, *handle)?;
            out.insert(name.clone(), to_json(&value));
        }
        Ok(out)
    }

    /// [`write`](Self::write) as compact JSON text.
    pub fn write_string(&self, match_data: &MatchData) -> Result<String> {
        Ok(serde_json::to_string(&Value::Object(self.write(match_data)))?)
    }

    /// Compute every feature and render them as pretty JSON, for feature dumps.
    pub fn write_dump(&self, pipeline: &Pipeline, match_data: &mut MatchData) -> Result<String> {
        let values = self.write_computing(pipeline, match_data)?;
        Ok(serde_json::to_string_pretty(&Value::Object(values))?)
    }
}

fn number(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

fn to_json(value: &FeatureValue) -> Value {
    match value {
        FeatureValue::Number(v) => number(*v),
        FeatureValue::Object(values) => Value::Array(values.iter().copied().map(number).collect()),
    }
}
