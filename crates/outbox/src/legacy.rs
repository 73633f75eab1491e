//! Legacy event normalisation (§4.7 "Legacy event migration").
//!
//! The monolith emitted events in at least four shapes before CloudEvents
//! was adopted; the router accepts all of them at its boundary and
//! normalises each to a [`CloudEvent`] so routing/encoding downstream never
//! has to know which shape produced it.

use serde_json::Value as Json;

use crate::types::CloudEvent;

/// Event type used when a legacy payload's shape can't be recognised
/// (§4.7: "unknown types fall back to a catch-all type").
pub const CATCH_ALL_TYPE: &str = "com.foundry.oms.legacy.unrecognised";

/// Normalise one legacy payload into a [`CloudEvent`].
///
/// Recognises, in order:
/// 1. an already-CloudEvents-shaped envelope (`specversion` present) — passed through;
/// 2. an outbox-row shape (`event_type` + `payload` + `branch`);
/// 3. a custom `event_type` + `data` shape;
/// 4. a bus-subject form (`subject` + `data`, type recovered from the subject's
///    first three dot segments);
/// 5. anything else, tagged [`CATCH_ALL_TYPE`] with the raw value preserved as `data`.
pub fn normalize_legacy_event(raw: &Json, source: &str, id: &str, time: &str) -> CloudEvent {
    if raw.get("specversion").is_some() {
        if let Ok(event) = serde_json::from_value::<CloudEvent>(raw.clone()) {
            return event;
        }
    }

    if let (Some(event_type), Some(payload)) = (
        raw.get("event_type").and_then(Json::as_str),
        raw.get("payload"),
    ) {
        let branch = payload
            .get("branch")
            .and_then(Json::as_str)
            .map(String::from);
        return base_event(event_type, payload.clone(), source, id, time, branch);
    }

    if let (Some(event_type), Some(data)) = (
        raw.get("event_type").and_then(Json::as_str),
        raw.get("data"),
    ) {
        return base_event(event_type, data.clone(), source, id, time, None);
    }

    if let (Some(subject), Some(data)) = (raw.get("subject").and_then(Json::as_str), raw.get("data")) {
        let event_type = subject_to_type(subject);
        return base_event(&event_type, data.clone(), source, id, time, None);
    }

    base_event(CATCH_ALL_TYPE, raw.clone(), source, id, time, None)
}

fn base_event(
    event_type: &str,
    data: Json,
    source: &str,
    id: &str,
    time: &str,
    branch: Option<String>,
) -> CloudEvent {
    CloudEvent {
        specversion: "1.0",
        event_type: event_type.to_string(),
        source: source.to_string(),
        id: id.to_string(),
        time: time.to_string(),
        datacontenttype: "application/json",
        subject: None,
        data,
        correlation_id: None,
        causation_id: None,
        branch,
        commit: None,
        author: None,
        tenant: None,
        traceparent: None,
        spanid: None,
        sequencenumber: None,
    }
}

/// Best-effort reconstruction of a reverse-DNS type from a bus subject
/// (`oms.objecttype.created.main.Asset` → `com.foundry.oms.objecttype.created`).
fn subject_to_type(subject: &str) -> String {
    let segments: Vec<&str> = subject.split('.').collect();
    if segments.len() < 3 {
        return CATCH_ALL_TYPE.to_string();
    }
    format!("com.foundry.{}.{}.{}", segments[0], segments[1], segments[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbox_row_shape_normalises() {
        let raw = json!({
            "event_type": "com.foundry.oms.objecttype.created",
            "payload": {"branch": "main", "resource_id": "Asset"},
        });
        let event = normalize_legacy_event(&raw, "urn:oms:legacy", "id-1", "t0");
        assert_eq!(event.event_type, "com.foundry.oms.objecttype.created");
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.data["resource_id"], "Asset");
    }

    #[test]
    fn custom_event_type_data_shape_normalises() {
        let raw = json!({"event_type": "com.foundry.oms.property.added", "data": {"x": 1}});
        let event = normalize_legacy_event(&raw, "urn:oms:legacy", "id-2", "t0");
        assert_eq!(event.event_type, "com.foundry.oms.property.added");
        assert_eq!(event.data["x"], 1);
    }

    #[test]
    fn bus_subject_shape_reconstructs_type() {
        let raw = json!({"subject": "oms.objecttype.created.main.Asset", "data": {}});
        let event = normalize_legacy_event(&raw, "urn:oms:legacy", "id-3", "t0");
        assert_eq!(event.event_type, "com.foundry.oms.objecttype.created");
    }

    #[test]
    fn unrecognised_shape_falls_back_to_catch_all() {
        let raw = json!({"weird": true});
        let event = normalize_legacy_event(&raw, "urn:oms:legacy", "id-4", "t0");
        assert_eq!(event.event_type, CATCH_ALL_TYPE);
    }
}
