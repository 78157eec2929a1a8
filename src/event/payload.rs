//! Trigger payload decoding
//!
//! Storage notifications reach the service in one of several envelopes:
//!
//! - background function JSON: `{"context": {...}, "data": {bucket, name}}`
//! - CloudEvents binary mode: `ce-*` headers plus the object as body
//! - CloudEvents structured mode: `{"specversion", "id", "source", ..., "data"}`
//! - Pub/Sub push of a bucket notification: `{"message": {"attributes", "data"}}`
//!
//! All of them collapse into an [`IngestionEvent`].

use super::types::{CloudEventAttributes, IngestionEvent};
use crate::error::{Error, Result};
use crate::types::{JsonValue, OptionStringExt};
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Prefix of storage resource names in CloudEvents `source`
const STORAGE_SOURCE_PREFIX: &str = "//storage.googleapis.com/";

/// Envelope shapes, tried in order by [`decode_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// CloudEvents binary mode (attributes in headers)
    CloudEventBinary,
    /// CloudEvents structured mode
    CloudEventStructured,
    /// Pub/Sub push subscription
    PubSubPush,
    /// Background function `{context, data}`
    Background,
    /// Already-decoded [`IngestionEvent`] JSON
    Canonical,
}

/// Work out which envelope a body uses
pub fn detect_kind(body: &JsonValue, attrs: Option<&CloudEventAttributes>) -> Option<PayloadKind> {
    let is_push = body.get("message").is_some_and(JsonValue::is_object);

    // Eventarc delivers Pub/Sub notifications as binary CloudEvents wrapping the push envelope
    if attrs.is_some_and(|a| !a.is_empty()) {
        return Some(if is_push {
            PayloadKind::PubSubPush
        } else {
            PayloadKind::CloudEventBinary
        });
    }

    let obj = body.as_object()?;
    if obj.contains_key("specversion") {
        Some(PayloadKind::CloudEventStructured)
    } else if is_push {
        Some(PayloadKind::PubSubPush)
    } else if obj.contains_key("data")
        && (obj.contains_key("context") || obj.contains_key("eventId"))
    {
        Some(PayloadKind::Background)
    } else if obj.contains_key("bucket") && obj.contains_key("file_name") {
        Some(PayloadKind::Canonical)
    } else {
        None
    }
}

/// Decode any supported trigger payload
pub fn decode_event(
    body: &JsonValue,
    attrs: Option<&CloudEventAttributes>,
) -> Result<IngestionEvent> {
    match detect_kind(body, attrs) {
        Some(PayloadKind::CloudEventBinary) => {
            let attrs = attrs.cloned().unwrap_or_default();
            from_cloud_event(&attrs, body)
        }
        Some(PayloadKind::CloudEventStructured) => from_structured_cloud_event(body),
        Some(PayloadKind::PubSubPush) => from_pubsub_push(body),
        Some(PayloadKind::Background) => from_background(body),
        Some(PayloadKind::Canonical) => {
            let event: IngestionEvent = serde_json::from_value(body.clone())?;
            validate(event)
        }
        None => Err(Error::invalid_event(
            "unrecognised payload: expected a CloudEvent, Pub/Sub push or background event",
        )),
    }
}

// ============================================================================
// Storage object body
// ============================================================================

/// The subset of a storage object resource we need
#[derive(Debug, Default, Deserialize)]
struct StorageObject {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn parse_object(data: &JsonValue) -> Result<StorageObject> {
    if data.is_null() {
        return Ok(StorageObject::default());
    }
    serde_json::from_value(data.clone())
        .map_err(|e| Error::invalid_event(format!("malformed storage object: {e}")))
}

// ============================================================================
// CloudEvents
// ============================================================================

/// Binary-mode CloudEvent: attributes from headers, object as body
pub fn from_cloud_event(
    attrs: &CloudEventAttributes,
    data: &JsonValue,
) -> Result<IngestionEvent> {
    let object = parse_object(data)?;

    let bucket = object
        .bucket
        .none_if_empty()
        .or_else(|| attrs.source.as_deref().and_then(bucket_from_source));
    let file_name = object.name.none_if_empty().or_else(|| {
        attrs
            .subject
            .as_deref()
            .and_then(|s| s.strip_prefix("objects/"))
            .map(String::from)
    });

    let resource_name = match (&attrs.source, &attrs.subject) {
        (Some(source), Some(subject)) => {
            let source = source.strip_prefix(STORAGE_SOURCE_PREFIX).unwrap_or(source);
            format!("{}/{}", source.trim_end_matches('/'), subject)
        }
        (Some(source), None) => source
            .strip_prefix(STORAGE_SOURCE_PREFIX)
            .unwrap_or(source)
            .to_string(),
        _ => String::new(),
    };

    validate(IngestionEvent {
        bucket: bucket.unwrap_or_default(),
        file_name: file_name.unwrap_or_default(),
        event_id: attrs.id.clone().unwrap_or_default(),
        timestamp: attrs.time.clone().none_if_empty().unwrap_or_else(now),
        event_type: attrs.event_type.clone().unwrap_or_default(),
        resource_name,
    })
}

/// Structured-mode CloudEvent body
fn from_structured_cloud_event(body: &JsonValue) -> Result<IngestionEvent> {
    let field = |name: &str| body.get(name).and_then(JsonValue::as_str).map(String::from);

    let attrs = CloudEventAttributes {
        id: field("id"),
        time: field("time"),
        event_type: field("type"),
        source: field("source"),
        subject: field("subject"),
    };

    let data = body.get("data").cloned().unwrap_or(JsonValue::Null);
    from_cloud_event(&attrs, &data)
}

/// `//storage.googleapis.com/projects/_/buckets/{bucket}` → `{bucket}`
fn bucket_from_source(source: &str) -> Option<String> {
    source
        .split_once("/buckets/")
        .map(|(_, rest)| rest.trim_end_matches('/').to_string())
        .none_if_empty()
}

// ============================================================================
// Pub/Sub push
// ============================================================================

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Debug, Deserialize)]
struct PushMessage {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default, rename = "messageId", alias = "message_id")]
    message_id: Option<String>,
    #[serde(default, rename = "publishTime", alias = "publish_time")]
    publish_time: Option<String>,
}

/// Pub/Sub push of a bucket notification
fn from_pubsub_push(body: &JsonValue) -> Result<IngestionEvent> {
    let envelope: PushEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| Error::invalid_event(format!("malformed Pub/Sub push envelope: {e}")))?;
    let message = envelope.message;

    let object = match message.data.as_deref().filter(|d| !d.is_empty()) {
        Some(encoded) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::invalid_event(format!("message data is not base64: {e}")))?;
            let data: JsonValue = serde_json::from_slice(&bytes)
                .map_err(|e| Error::invalid_event(format!("message data is not JSON: {e}")))?;
            parse_object(&data)?
        }
        None => StorageObject::default(),
    };

    let attr = |name: &str| message.attributes.get(name).cloned().none_if_empty();

    let bucket = attr("bucketId").or(object.bucket).unwrap_or_default();
    let file_name = attr("objectId").or(object.name).unwrap_or_default();
    let resource_name = if bucket.is_empty() || file_name.is_empty() {
        String::new()
    } else {
        format!("projects/_/buckets/{bucket}/objects/{file_name}")
    };

    validate(IngestionEvent {
        bucket,
        file_name,
        event_id: message.message_id.unwrap_or_default(),
        timestamp: attr("eventTime")
            .or(message.publish_time)
            .none_if_empty()
            .unwrap_or_else(now),
        event_type: attr("eventType").unwrap_or_default(),
        resource_name,
    })
}

// ============================================================================
// Background function
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct BackgroundContext {
    #[serde(default, rename = "eventId", alias = "event_id")]
    event_id: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, rename = "eventType", alias = "event_type")]
    event_type: Option<String>,
    #[serde(default)]
    resource: Option<JsonValue>,
}

/// Background function event, with the context either nested or inlined
fn from_background(body: &JsonValue) -> Result<IngestionEvent> {
    let context_value = body.get("context").unwrap_or(body);
    let context: BackgroundContext = serde_json::from_value(context_value.clone())
        .map_err(|e| Error::invalid_event(format!("malformed event context: {e}")))?;

    let object = parse_object(body.get("data").unwrap_or(&JsonValue::Null))?;

    // `resource` is an object with a `name` in newer payloads, a bare string in older ones
    let resource_name = match &context.resource {
        Some(JsonValue::Object(map)) => map
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        _ => String::new(),
    };

    validate(IngestionEvent {
        bucket: object.bucket.unwrap_or_default(),
        file_name: object.name.unwrap_or_default(),
        event_id: context.event_id.unwrap_or_default(),
        timestamp: context.timestamp.none_if_empty().unwrap_or_else(now),
        event_type: context.event_type.unwrap_or_default(),
        resource_name,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn validate(event: IngestionEvent) -> Result<IngestionEvent> {
    if event.bucket.trim().is_empty() {
        return Err(Error::invalid_event("missing bucket name"));
    }
    if event.file_name.trim().is_empty() {
        return Err(Error::invalid_event("missing object name"));
    }
    Ok(event)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
