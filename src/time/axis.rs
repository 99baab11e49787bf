use super::format::parse_timestamp;
use crate::core::constants::COMPONENT_SEPARATOR;
use crate::prelude::HashMap;
use crate::tiles::source::LayerSpec;
use crate::{LoopError, Result};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// One animation frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Per-component timestamps joined with `,` in component order. This is
    /// the `TIMES` value of composite tile URLs and the key of the frame's
    /// composite.
    pub key: String,
    /// Time of the base layer this frame was built around
    pub base_time: NaiveDateTime,
}

/// Frames ordered oldest to newest
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeAxis {
    frames: Vec<Frame>,
}

impl TimeAxis {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.get(index).map(|f| f.key.as_str())
    }

    pub fn keys(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.key.clone()).collect()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.frames.len().checked_sub(1)
    }

    /// Base time of the newest frame
    pub fn latest_date(&self) -> Option<NaiveDateTime> {
        self.frames.last().map(|f| f.base_time)
    }

    pub fn frame_date(&self, index: usize) -> Option<NaiveDateTime> {
        self.get(index).map(|f| f.base_time)
    }
}

/// Merges a valid-times document into a time axis.
///
/// The newest `frame_count` times of the base layer form the reference axis.
/// Every other component contributes, per reference time, its newest time
/// not after it, or its oldest time when all of them are later.
pub fn resolve_valid_times(layer: &LayerSpec, document: &Value, frame_count: usize) -> Result<TimeAxis> {
    let layers = document
        .as_object()
        .ok_or_else(|| LoopError::invalid_response("valid times document is not an object"))?;

    let base_times = layer_times(layers, &layer.base_layer_name)?;
    let reference: &[ServerTime] = &base_times[base_times.len().saturating_sub(frame_count)..];
    if reference.is_empty() {
        return Ok(TimeAxis::empty());
    }

    let mut matched: HashMap<&str, Vec<String>> = HashMap::default();
    for component in layer.components() {
        if matched.contains_key(component) {
            continue;
        }
        let times = if component == layer.base_layer_name {
            reference.iter().map(|time| time.raw.clone()).collect()
        } else {
            let available = layer_times(layers, component)?;
            if available.is_empty() {
                return Err(LoopError::invalid_response(format!(
                    "layer {} has no valid times",
                    component
                )));
            }
            reference
                .iter()
                .map(|time| latest_not_after(&available, &time.parsed).raw.clone())
                .collect()
        };
        matched.insert(component, times);
    }

    let separator = COMPONENT_SEPARATOR.to_string();
    let frames = reference
        .iter()
        .enumerate()
        .map(|(i, base_time)| {
            let key = layer
                .components()
                .iter()
                .map(|c| matched[c][i].as_str())
                .collect::<Vec<_>>()
                .join(&separator);
            Frame {
                key,
                base_time: base_time.parsed,
            }
        })
        .collect();

    Ok(TimeAxis::new(frames))
}

/// Parses a raw valid-times response body
pub fn parse_valid_times(layer: &LayerSpec, body: &[u8], frame_count: usize) -> Result<TimeAxis> {
    let document: Value = serde_json::from_slice(body)?;
    resolve_valid_times(layer, &document, frame_count)
}

/// A valid time as the server spelled it, with its parsed value
struct ServerTime {
    parsed: NaiveDateTime,
    raw: String,
}

/// Sorted times of one layer
fn layer_times(layers: &serde_json::Map<String, Value>, name: &str) -> Result<Vec<ServerTime>> {
    let values = layers
        .get(name)
        .ok_or_else(|| LoopError::invalid_response(format!("missing layer {}", name)))?
        .as_array()
        .ok_or_else(|| LoopError::invalid_response(format!("layer {} is not an array", name)))?;

    let mut times = values
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| LoopError::invalid_response(format!("layer {} has a non-string time", name)))
                .and_then(|raw| {
                    Ok(ServerTime {
                        parsed: parse_timestamp(raw)?,
                        raw: raw.trim().to_string(),
                    })
                })
        })
        .collect::<Result<Vec<_>>>()?;
    times.sort_by_key(|time| time.parsed);
    Ok(times)
}

fn latest_not_after<'a>(sorted: &'a [ServerTime], reference: &NaiveDateTime) -> &'a ServerTime {
    let count = sorted.partition_point(|t| t.parsed <= *reference);
    &sorted[count.saturating_sub(1)]
}

/// Axis shared between the poller that replaces it and the readers that
/// snapshot it. Replacement swaps the whole axis at once.
#[derive(Debug, Default)]
pub struct SharedAxis {
    inner: RwLock<Arc<TimeAxis>>,
}

impl SharedAxis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<TimeAxis> {
        self.inner
            .read()
            .map(|axis| axis.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Stores a new axis and reports whether it differs from the old one
    pub fn replace(&self, axis: TimeAxis) -> bool {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = **guard != axis;
        *guard = Arc::new(axis);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(hour: u32) -> String {
        format!("2024-05-01T{:02}:00:00", hour)
    }

    #[test]
    fn test_base_layer_last_frames() {
        let layer = LayerSpec::single("radar");
        let doc = json!({ "radar": (1..=8).map(ts).collect::<Vec<_>>() });
        let axis = resolve_valid_times(&layer, &doc, 6).unwrap();

        assert_eq!(axis.len(), 6);
        assert_eq!(axis.key(0), Some(ts(3).as_str()));
        assert_eq!(axis.key(5), Some(ts(8).as_str()));
        assert_eq!(axis.latest_date(), Some(parse_timestamp(&ts(8)).unwrap()));
    }

    #[test]
    fn test_short_and_unsorted_base_layer() {
        let layer = LayerSpec::single("radar");
        let doc = json!({ "radar": [ts(3), ts(1), ts(2)] });
        let axis = resolve_valid_times(&layer, &doc, 6).unwrap();

        assert_eq!(axis.keys(), vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn test_keys_keep_server_spelling() {
        let layer = LayerSpec::new("radar,satellite", "radar");
        let doc = json!({
            "radar": ["2024-05-01T01:00:00Z", "2024-05-01T00:00:00Z"],
            "satellite": ["2024-05-01T00:30:00Z"],
        });
        let axis = resolve_valid_times(&layer, &doc, 6).unwrap();

        assert_eq!(
            axis.keys(),
            vec![
                "2024-05-01T00:00:00Z,2024-05-01T00:30:00Z",
                "2024-05-01T01:00:00Z,2024-05-01T00:30:00Z",
            ]
        );
        assert_eq!(axis.latest_date(), Some(parse_timestamp("2024-05-01T01:00:00").unwrap()));
    }

    #[test]
    fn test_composite_matches_latest_not_after() {
        let layer = LayerSpec::new("radar,satellite", "radar");
        let doc = json!({
            "radar": [ts(1), ts(2), ts(3)],
            "satellite": [ts(0), ts(2), ts(4)],
        });
        let axis = resolve_valid_times(&layer, &doc, 6).unwrap();

        assert_eq!(
            axis.keys(),
            vec![
                format!("{},{}", ts(1), ts(0)),
                format!("{},{}", ts(2), ts(2)),
                format!("{},{}", ts(3), ts(2)),
            ]
        );
        assert_eq!(axis.frame_date(2), Some(parse_timestamp(&ts(3)).unwrap()));
    }

    #[test]
    fn test_component_falls_back_to_earliest() {
        let layer = LayerSpec::new("alert,radar,alert", "radar");
        let doc = json!({
            "radar": [ts(1), ts(2)],
            "alert": [ts(5), ts(6)],
        });
        let axis = resolve_valid_times(&layer, &doc, 6).unwrap();

        assert_eq!(axis.key(0), Some(format!("{},{},{}", ts(5), ts(1), ts(5)).as_str()));
        assert_eq!(axis.key(1), Some(format!("{},{},{}", ts(5), ts(2), ts(5)).as_str()));
    }

    #[test]
    fn test_invalid_documents() {
        let layer = LayerSpec::new("radar,satellite", "radar");
        let invalid = [
            json!([1, 2]),
            json!({ "satellite": [ts(1)] }),
            json!({ "radar": "nope", "satellite": [ts(1)] }),
            json!({ "radar": [ts(1)] }),
            json!({ "radar": [ts(1)], "satellite": [] }),
            json!({ "radar": ["later"], "satellite": [ts(1)] }),
            json!({ "radar": [42], "satellite": [ts(1)] }),
        ];
        for doc in invalid {
            assert!(
                matches!(resolve_valid_times(&layer, &doc, 6), Err(LoopError::InvalidServerResponse { .. })),
                "{}",
                doc
            );
        }
    }

    #[test]
    fn test_empty_base_layer_gives_empty_axis() {
        let layer = LayerSpec::new("radar,satellite", "radar");
        let axis = resolve_valid_times(&layer, &json!({ "radar": [], "satellite": [ts(1)] }), 6).unwrap();
        assert!(axis.is_empty());
        assert_eq!(axis.latest_date(), None);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let layer = LayerSpec::new("radar,satellite", "radar");
        let body = br#"{"radar":["2024-05-01T01:00:00","2024-05-01T02:00:00"],"satellite":["2024-05-01T00:30:00"]}"#;

        let a = parse_valid_times(&layer, body, 6).unwrap();
        let b = parse_valid_times(&layer, body, 6).unwrap();
        assert_eq!(a, b);

        assert!(matches!(
            parse_valid_times(&layer, b"{not json", 6),
            Err(LoopError::InvalidServerResponse { .. })
        ));
    }

    #[test]
    fn test_shared_axis_reports_changes() {
        let shared = SharedAxis::new();
        let layer = LayerSpec::single("radar");
        let axis = resolve_valid_times(&layer, &json!({ "radar": [ts(1)] }), 6).unwrap();

        assert!(shared.load().is_empty());
        assert!(shared.replace(axis.clone()));
        assert!(!shared.replace(axis));
        assert_eq!(shared.load().len(), 1);
    }
}
