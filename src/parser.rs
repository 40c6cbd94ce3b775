//! JSON parser and normalizer for departure monitor responses.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::delay::parse_timestamp;
use crate::departure::NormalizedDeparture;
use crate::error::{EventNormalizationError, UpstreamError};

/// Top level of a `rapidJSON` departure monitor reply.
///
/// Events are kept untyped so that one malformed event cannot fail the whole
/// response; each one is decoded on its own by [`decode_event`].
#[derive(Debug, Default, Deserialize)]
pub struct DepartureMonitorResponse {
    #[serde(rename = "stopEvents")]
    stop_events: Option<Vec<Value>>,
}

impl DepartureMonitorResponse {
    pub fn new(stop_events: Vec<Value>) -> Self {
        Self {
            stop_events: Some(stop_events),
        }
    }

    pub fn into_events(self) -> Vec<Value> {
        self.stop_events.unwrap_or_default()
    }
}

/// Decodes an optional field, treating a value of the wrong JSON type as
/// absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// One stop event. Every field is lenient, so only a non-object event fails
/// to decode.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDepartureEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub transportation: Option<RawTransportation>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<RawLocation>,
    #[serde(default, deserialize_with = "lenient")]
    pub departure_time_planned: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub departure_time_estimated: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_realtime_controlled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransportation {
    /// Short code, e.g. `L2`.
    #[serde(default, deserialize_with = "lenient")]
    pub disassembled_name: Option<String>,
    /// Full line name, e.g. `L2 Randwick Line`.
    #[serde(default, deserialize_with = "lenient")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub operator: Option<Named>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination: Option<Named>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Named {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default, deserialize_with = "lenient")]
    pub properties: Option<RawLocationProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocationProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub platform_name: Option<String>,
}

/// Decodes a departure monitor response body.
///
/// # Errors
///
/// Returns [`UpstreamError::Decode`] if the body is not a JSON object.
pub fn parse_response(bytes: &[u8]) -> Result<DepartureMonitorResponse, UpstreamError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes the stop event at `index` into its typed form.
///
/// # Errors
///
/// Fails only when the event is not a JSON object.
pub fn decode_event(index: usize, event: Value) -> Result<RawDepartureEvent, EventNormalizationError> {
    if !event.is_object() {
        return Err(EventNormalizationError {
            index,
            source: de::Error::custom(format!("expected an object, found {event}")),
        });
    }
    serde_json::from_value(event).map_err(|source| EventNormalizationError { index, source })
}

/// Flattens a raw event into a [`NormalizedDeparture`]. Missing pieces become
/// `None`; an unparsable timestamp is treated as missing.
pub fn normalize(raw: RawDepartureEvent) -> NormalizedDeparture {
    let transportation = raw.transportation.unwrap_or_default();
    let platform = raw
        .location
        .and_then(|l| l.properties)
        .and_then(|p| p.platform_name);

    NormalizedDeparture {
        line: transportation.disassembled_name,
        line_name: transportation.number,
        destination: transportation.destination.and_then(|d| d.name),
        operator: transportation.operator.and_then(|o| o.name),
        platform,
        scheduled: raw.departure_time_planned.as_deref().and_then(parse_timestamp),
        estimated: raw.departure_time_estimated.as_deref().and_then(parse_timestamp),
        delay_min: None,
        realtime: raw.is_realtime_controlled.unwrap_or(false),
    }
}

/// Normalizes every event of a response, collecting per-event failures
/// instead of stopping at the first one.
pub fn normalize_events(
    events: Vec<Value>,
) -> (Vec<NormalizedDeparture>, Vec<EventNormalizationError>) {
    let mut departures = Vec::with_capacity(events.len());
    let mut failures = Vec::new();

    for (index, event) in events.into_iter().enumerate() {
        match decode_event(index, event) {
            Ok(raw) => departures.push(normalize(raw)),
            Err(e) => failures.push(e),
        }
    }

    (departures, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light_rail_event() -> Value {
        json!({
            "transportation": {
                "disassembledName": "L2",
                "number": "L2 Randwick Line",
                "operator": { "name": "Sydney Light Rail" },
                "destination": { "name": "Randwick Light Rail, Randwick" }
            },
            "location": {
                "properties": { "platformName": "Central Chalmers Street Light Rail" }
            },
            "departureTimePlanned": "2024-01-01T10:00:00Z",
            "departureTimeEstimated": "2024-01-01T10:02:00Z",
            "isRealtimeControlled": true
        })
    }

    #[test]
    fn test_parse_response_without_events() {
        let response = parse_response(br#"{"version":"10.2.1.42"}"#).unwrap();
        assert!(response.into_events().is_empty());

        let response = parse_response(br#"{"stopEvents":null}"#).unwrap();
        assert!(response.into_events().is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let result = parse_response(b"<html>Service Unavailable</html>");
        assert!(matches!(result, Err(UpstreamError::Decode(_))));
    }

    #[test]
    fn test_normalize_full_event() {
        let raw = decode_event(0, light_rail_event()).unwrap();
        let dep = normalize(raw);

        assert_eq!(dep.line.as_deref(), Some("L2"));
        assert_eq!(dep.line_name.as_deref(), Some("L2 Randwick Line"));
        assert_eq!(dep.operator.as_deref(), Some("Sydney Light Rail"));
        assert_eq!(dep.destination.as_deref(), Some("Randwick Light Rail, Randwick"));
        assert_eq!(dep.platform.as_deref(), Some("Central Chalmers Street Light Rail"));
        assert!(dep.scheduled.is_some());
        assert!(dep.estimated.is_some());
        assert!(dep.realtime);
        // delay is the pipeline's job
        assert_eq!(dep.delay_min, None);
    }

    #[test]
    fn test_normalize_defaults() {
        let raw = decode_event(0, json!({ "departureTimePlanned": "not a time" })).unwrap();
        let dep = normalize(raw);

        assert_eq!(dep.line, None);
        assert_eq!(dep.platform, None);
        assert_eq!(dep.scheduled, None);
        assert!(!dep.realtime);
    }

    #[test]
    fn test_malformed_event_does_not_abort_batch() {
        let events = vec![
            json!({ "location": {}, "departureTimePlanned": "2024-01-01T09:00:00Z" }),
            json!("not an event"),
            json!({ "transportation": "T1" }),
            json!([1, 2]),
            light_rail_event(),
        ];

        let (departures, failures) = normalize_events(events);

        assert_eq!(departures.len(), 3);
        assert_eq!(departures[0].line, None);
        assert_eq!(departures[1].line, None);
        assert_eq!(departures[2].line.as_deref(), Some("L2"));
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[1].index, 3);
    }

    #[test]
    fn test_wrong_typed_fields_keep_departure() {
        let event = |patch: Value| {
            let mut e = json!({
                "transportation": {
                    "disassembledName": "T1",
                    "number": "T1 North Shore & Western Line",
                    "operator": { "name": "Sydney Trains" }
                },
                "location": { "properties": { "platformName": "Platform 16" } },
                "departureTimePlanned": "2024-01-01T10:00:00Z",
                "departureTimeEstimated": "2024-01-01T10:02:00Z",
                "isRealtimeControlled": true
            });
            json_patch(&mut e, patch);
            e
        };
        let events = vec![
            event(json!({ "isRealtimeControlled": "true" })),
            event(json!({ "transportation": { "operator": "Sydney Trains" } })),
            event(json!({ "location": { "properties": { "platformName": 4 } } })),
        ];

        let (mut departures, failures) = normalize_events(events);

        assert!(failures.is_empty());
        assert_eq!(departures.len(), 3);
        for dep in &mut departures {
            dep.compute_delay();
            assert_eq!(dep.line.as_deref(), Some("T1"));
            assert_eq!(dep.delay_min, Some(2.0));
        }
        assert!(!departures[0].realtime);
        assert_eq!(departures[0].operator.as_deref(), Some("Sydney Trains"));
        assert_eq!(departures[1].operator, None);
        assert_eq!(departures[1].line_name.as_deref(), Some("T1 North Shore & Western Line"));
        assert_eq!(departures[2].platform, None);
        assert!(departures[2].realtime);
    }

    /// Merges `patch` into `target`, recursing into objects.
    fn json_patch(target: &mut Value, patch: Value) {
        match (target, patch) {
            (Value::Object(t), Value::Object(p)) => {
                for (k, v) in p {
                    json_patch(t.entry(k).or_insert(Value::Null), v);
                }
            }
            (t, p) => *t = p,
        }
    }
}
