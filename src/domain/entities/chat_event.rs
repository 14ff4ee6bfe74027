//! Real-time chat event published to a user's channel.
//!
//! Events are transient: they are built at send time, published once and
//! never stored by the relay. Durable rows live in `chat_messages`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a chat message.
///
/// Stored as text in `chat_messages.message_type` and serialized with the
/// same spelling on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageKind {
    /// Plain text message
    #[default]
    #[serde(rename = "text")]
    Text,
    /// Client asking an admin to rent a specific equipment item
    #[serde(rename = "equipment-request")]
    EquipmentRequest,
}

impl MessageKind {
    /// Convert from database string representation. Unknown values fall back to text.
    pub fn from_db(s: &str) -> Self {
        match s {
            "equipment-request" => Self::EquipmentRequest,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::EquipmentRequest => "equipment-request",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equipment detail block attached to equipment-request events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentDetails {
    pub equipment_id: i64,
    pub equipment_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_price: Option<f64>,
}

/// Caller-supplied part of a message event.
#[derive(Debug, Clone, Default)]
pub struct MessagePayload {
    /// Id of the already persisted message row
    pub id: i64,
    pub message: String,
    /// Defaults to [`MessageKind::Text`]
    pub message_type: Option<MessageKind>,
    pub equipment_id: Option<i64>,
    pub equipment_name: Option<String>,
}

/// Equipment being requested by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRequestData {
    pub equipment_id: i64,
    pub equipment_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub base_price: Option<f64>,
}

impl From<&EquipmentRequestData> for EquipmentDetails {
    fn from(data: &EquipmentRequestData) -> Self {
        Self {
            equipment_id: data.equipment_id,
            equipment_name: data.equipment_name.clone(),
            category: data.category.clone(),
            base_price: data.base_price,
        }
    }
}

/// Event delivered on `chat:user:{to_user_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub message: String,
    pub message_type: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_details: Option<EquipmentDetails>,
    /// ISO-8601 creation time
    pub created_at: DateTime<Utc>,
    /// Dispatch time in epoch milliseconds
    pub timestamp: i64,
}

impl ChatEvent {
    /// Build a message event stamped with `now`.
    pub fn message(from_user_id: i64, to_user_id: i64, payload: MessagePayload, now: DateTime<Utc>) -> Self {
        Self {
            id: payload.id,
            from_user_id,
            to_user_id,
            message: payload.message,
            message_type: payload.message_type.unwrap_or_default(),
            equipment_id: payload.equipment_id,
            equipment_name: payload.equipment_name,
            equipment_details: None,
            created_at: now,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Build an equipment-request event from a client to an admin.
    pub fn equipment_request(
        client_id: i64,
        admin_id: i64,
        data: &EquipmentRequestData,
        message_id: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: message_id,
            from_user_id: client_id,
            to_user_id: admin_id,
            message: equipment_request_text(&data.equipment_name),
            message_type: MessageKind::EquipmentRequest,
            equipment_id: Some(data.equipment_id),
            equipment_name: Some(data.equipment_name.clone()),
            equipment_details: Some(EquipmentDetails::from(data)),
            created_at: now,
            timestamp: now.timestamp_millis(),
        }
    }
}

/// Default body of an equipment-request message.
pub fn equipment_request_text(equipment_name: &str) -> String {
    format!("Equipment request: {}", equipment_name)
}
