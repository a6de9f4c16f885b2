use serde_json::Value;

/// Decoded record payload.
///
/// Change feed records are stored as JSON objects; the format does not
/// interpret them beyond checking that each payload is valid JSON.
pub type EventJson = Value;

/// Returns true if the value looks like a change event record.
///
/// Only checks that the value is an object carrying the conventional `id`
/// and `eventType` fields. Readers accept any JSON value regardless.
pub fn is_change_event(value: &EventJson) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    obj.contains_key("id") && obj.contains_key("eventType")
}
