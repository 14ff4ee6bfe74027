//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::application::services::{EquipmentRequestCommand, HistoryQuery, SendMessageCommand};
use crate::domain::{EquipmentRequestData, MessageKind};

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(range(min = 1, message = "Recipient id must be positive"))]
    pub to_user_id: i64,

    /// Upper bound is `chat.max_message_length`, checked by the service
    #[validate(length(min = 1, message = "Message cannot be empty"))]
    pub message: String,

    #[serde(default)]
    pub message_type: Option<MessageKind>,

    #[serde(default)]
    pub equipment_id: Option<i64>,

    #[validate(length(max = 255, message = "Equipment name must be at most 255 characters"))]
    #[serde(default)]
    pub equipment_name: Option<String>,
}

impl From<SendMessageRequest> for SendMessageCommand {
    fn from(request: SendMessageRequest) -> Self {
        Self {
            to_user_id: request.to_user_id,
            message: request.message,
            message_type: request.message_type,
            equipment_id: request.equipment_id,
            equipment_name: request.equipment_name,
        }
    }
}

/// Equipment request
#[derive(Debug, Deserialize, Validate)]
pub struct EquipmentRequestRequest {
    #[validate(range(min = 1, message = "Admin id must be positive"))]
    pub admin_id: i64,

    pub equipment_id: i64,

    #[validate(length(min = 1, max = 255, message = "Equipment name must be 1-255 characters"))]
    pub equipment_name: String,

    #[serde(default)]
    pub category: Option<String>,

    #[validate(range(min = 0.0, message = "Base price cannot be negative"))]
    #[serde(default)]
    pub base_price: Option<f64>,
}

impl From<EquipmentRequestRequest> for EquipmentRequestCommand {
    fn from(request: EquipmentRequestRequest) -> Self {
        Self {
            admin_id: request.admin_id,
            equipment: EquipmentRequestData {
                equipment_id: request.equipment_id,
                equipment_name: request.equipment_name,
                category: request.category,
                base_price: request.base_price,
            },
        }
    }
}

/// History query parameters
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

impl From<HistoryParams> for HistoryQuery {
    fn from(params: HistoryParams) -> Self {
        Self {
            before: params.before,
            limit: params.limit,
        }
    }
}
