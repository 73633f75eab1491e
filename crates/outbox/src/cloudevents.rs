//! CloudEvents 1.0 encoding (§4.7 "CloudEvents encoding").

use std::collections::BTreeMap;

use crate::types::CloudEvent;

/// Serialize a [`CloudEvent`] as a single JSON body, for HTTP targets
/// (§4.7: "Structured (JSON body)").
pub fn to_structured_json(event: &CloudEvent) -> serde_json::Value {
    serde_json::to_value(event).expect("CloudEvent serializes")
}

/// Split a [`CloudEvent`] into `ce-*` headers plus a bare JSON body, for
/// message-bus targets (§4.7: "Binary headers").
///
/// `Nats-Msg-Id` is set to the event id so publishers can dedupe retried
/// sends (§4.7).
pub fn to_binary_headers(event: &CloudEvent) -> (BTreeMap<String, String>, serde_json::Value) {
    let mut headers = BTreeMap::new();
    headers.insert("ce-specversion".into(), event.specversion.to_string());
    headers.insert("ce-type".into(), event.event_type.clone());
    headers.insert("ce-source".into(), event.source.clone());
    headers.insert("ce-id".into(), event.id.clone());
    headers.insert("ce-time".into(), event.time.clone());
    headers.insert("ce-datacontenttype".into(), event.datacontenttype.to_string());
    headers.insert("Nats-Msg-Id".into(), event.id.clone());
    if let Some(subject) = &event.subject {
        headers.insert("ce-subject".into(), subject.clone());
    }
    if let Some(v) = &event.branch {
        headers.insert("ce-branch".into(), v.clone());
    }
    if let Some(v) = &event.commit {
        headers.insert("ce-commit".into(), v.clone());
    }
    if let Some(v) = &event.author {
        headers.insert("ce-author".into(), v.clone());
    }
    if let Some(v) = &event.correlation_id {
        headers.insert("ce-correlationid".into(), v.clone());
    }
    if let Some(v) = &event.causation_id {
        headers.insert("ce-causationid".into(), v.clone());
    }
    if let Some(v) = &event.traceparent {
        headers.insert("ce-traceparent".into(), v.clone());
    }
    if let Some(v) = &event.spanid {
        headers.insert("ce-spanid".into(), v.clone());
    }
    if let Some(v) = &event.sequencenumber {
        headers.insert("ce-sequencenumber".into(), v.clone());
    }
    (headers, event.data.clone())
}

/// Error decoding a [`CloudEvent`] out of `ce-*` headers.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A header required by every CloudEvent was missing.
    #[error("missing required header {0}")]
    MissingHeader(&'static str),
    /// `ce-specversion` held something other than `"1.0"`.
    #[error("unsupported specversion {0:?}")]
    UnsupportedSpecVersion(String),
}

fn required<'a>(headers: &'a BTreeMap<String, String>, key: &'static str) -> Result<&'a str, DecodeError> {
    headers.get(key).map(String::as_str).ok_or(DecodeError::MissingHeader(key))
}

/// Reassemble a [`CloudEvent`] from the `(headers, body)` pair produced by
/// [`to_binary_headers`] (§8 "`encode_binary(event) → decode_binary(…) ==
/// event` for all fields").
///
/// `datacontenttype` is always reconstructed as `application/json`, the only
/// value [`to_binary_headers`] ever emits.
pub fn from_binary_headers(
    headers: &BTreeMap<String, String>,
    data: serde_json::Value,
) -> Result<CloudEvent, DecodeError> {
    let specversion = required(headers, "ce-specversion")?;
    if specversion != "1.0" {
        return Err(DecodeError::UnsupportedSpecVersion(specversion.to_string()));
    }
    Ok(CloudEvent {
        specversion: "1.0",
        event_type: required(headers, "ce-type")?.to_string(),
        source: required(headers, "ce-source")?.to_string(),
        id: required(headers, "ce-id")?.to_string(),
        time: required(headers, "ce-time")?.to_string(),
        datacontenttype: "application/json",
        subject: headers.get("ce-subject").cloned(),
        data,
        correlation_id: headers.get("ce-correlationid").cloned(),
        causation_id: headers.get("ce-causationid").cloned(),
        branch: headers.get("ce-branch").cloned(),
        commit: headers.get("ce-commit").cloned(),
        author: headers.get("ce-author").cloned(),
        tenant: None,
        traceparent: headers.get("ce-traceparent").cloned(),
        spanid: headers.get("ce-spanid").cloned(),
        sequencenumber: headers.get("ce-sequencenumber").cloned(),
    })
}

/// Derive the bus subject for a type (§4.7: `com.foundry.oms.objecttype.created`
/// → `oms.objecttype.created.{branch}.{resourceId}`).
///
/// `event_type` must have at least 4 reverse-DNS segments (`com.foundry.oms.<rest>`);
/// anything shorter is passed through unchanged as a fallback.
pub fn derive_subject(event_type: &str, branch: &str, resource_id: &str) -> String {
    let segments: Vec<&str> = event_type.split('.').collect();
    if segments.len() < 4 {
        return event_type.to_string();
    }
    let rest = segments[2..].join(".");
    format!("{rest}.{branch}.{resource_id}")
}
