//! Control-plane wire types.
//!
//! Every push-channel frame is an envelope `{ "type": ..., "payload": ... }`.
//! Clients send one of the six mutation commands; the server answers the
//! requester with `ack` or `error` and pushes `units_snapshot` plus
//! `unit_changed` to every subscriber after each state change.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use variants_sync::{ErrorKind, UnitSummary};

use crate::error::DaemonError;

/// Mutation command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    NewVersion {
        unit: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DuplicateVersion {
        unit: String,
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_version: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteVersion { unit: String, version: String },
    #[serde(rename_all = "camelCase")]
    RenameVersion {
        unit: String,
        version: String,
        new_version: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameLabel {
        unit: String,
        version: String,
        new_label: String,
    },
    #[serde(rename_all = "camelCase")]
    PromoteVersion { unit: String, version: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::NewVersion { .. } => "new_version",
            Command::DuplicateVersion { .. } => "duplicate_version",
            Command::DeleteVersion { .. } => "delete_version",
            Command::RenameVersion { .. } => "rename_version",
            Command::RenameLabel { .. } => "rename_label",
            Command::PromoteVersion { .. } => "promote_version",
        }
    }

    pub fn unit(&self) -> &str {
        match self {
            Command::NewVersion { unit, .. }
            | Command::DuplicateVersion { unit, .. }
            | Command::DeleteVersion { unit, .. }
            | Command::RenameVersion { unit, .. }
            | Command::RenameLabel { unit, .. }
            | Command::PromoteVersion { unit, .. } => unit,
        }
    }
}

/// A decoded client frame: the command plus the optional `payload.requestId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub command: Command,
    pub request_id: Option<String>,
}

/// Decode a client frame.
///
/// The request id is read separately so malformed commands can still be
/// answered with the id the client sent.
pub fn decode_request(value: Value) -> Result<ClientRequest, (DaemonError, Option<String>)> {
    let request_id = request_id_of(&value);
    match serde_json::from_value::<Command>(value) {
        Ok(command) => Ok(ClientRequest {
            command,
            request_id,
        }),
        Err(err) => Err((DaemonError::InvalidRequest(err.to_string()), request_id)),
    }
}

fn request_id_of(value: &Value) -> Option<String> {
    match value.get("payload")?.get("requestId")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Why a unit appears in a `unit_changed` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Created,
    Updated,
    Removed,
    Promoted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorPayload {
    pub fn from_error(err: &DaemonError, command: Option<&str>, request_id: Option<String>) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            command: command.map(str::to_string),
            request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub name: String,
    pub path: PathBuf,
    pub versions: Vec<String>,
}

impl From<UnitSummary> for UnitEntry {
    fn from(summary: UnitSummary) -> Self {
        Self {
            name: summary.name.to_string(),
            path: summary.path,
            versions: summary.versions.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Body of `GET /api/units` and of the `units_snapshot` push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitsSnapshot {
    pub units: Vec<UnitEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitChanged {
    pub unit: String,
    pub reason: ChangeReason,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack(AckPayload),
    Error(ErrorPayload),
    UnitsSnapshot(UnitsSnapshot),
    UnitChanged(UnitChanged),
}

/// `POST /api/open` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub unit: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResponse {
    pub success: bool,
    pub file_path: PathBuf,
    pub tool: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_use_type_payload_envelope() {
        let value = json!({
            "type": "rename_label",
            "payload": { "unit": "Widget", "version": "v1", "newLabel": "Primary", "requestId": "r1" }
        });
        let request = decode_request(value).unwrap();
        assert_eq!(
            request.command,
            Command::RenameLabel {
                unit: "Widget".into(),
                version: "v1".into(),
                new_label: "Primary".into(),
            }
        );
        assert_eq!(request.request_id.as_deref(), Some("r1"));
    }

    #[test]
    fn optional_fields_may_be_omitted() {
        let request = decode_request(json!({ "type": "new_version", "payload": { "unit": "Widget" } })).unwrap();
        assert_eq!(
            request.command,
            Command::NewVersion { unit: "Widget".into(), version: None }
        );
        assert_eq!(request.request_id, None);
    }

    #[test]
    fn unknown_type_keeps_request_id() {
        let (err, id) = decode_request(json!({ "type": "explode", "payload": { "requestId": 7 } })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(id.as_deref(), Some("7"));
    }

    #[test]
    fn server_messages_serialize_snake_case() {
        let msg = ServerMessage::UnitChanged(UnitChanged {
            unit: "Widget".into(),
            reason: ChangeReason::Promoted,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "unit_changed", "payload": { "unit": "Widget", "reason": "promoted" } })
        );
    }
}
