use serde::{Deserialize, Serialize};

/// Error code reported for tokens whose device uninstalled the app or
/// revoked permission
pub const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

/// Push message addressed to a single device token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl PushMessage {
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            title: title.into(),
            body: body.into(),
            sound: Some("default".to_string()),
            data: None,
        }
    }
}

/// Error details attached to a failed ticket or receipt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushErrorDetails {
    pub error: Option<String>,
}

/// Per-message result of a batch send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushTicket {
    Ok {
        id: String,
    },
    Error {
        message: String,
        #[serde(default)]
        details: Option<PushErrorDetails>,
    },
}

impl PushTicket {
    /// Receipt id, present only for accepted messages
    pub fn id(&self) -> Option<&str> {
        match self {
            PushTicket::Ok { id } => Some(id),
            PushTicket::Error { .. } => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            PushTicket::Ok { .. } => None,
            PushTicket::Error { details, .. } => details.as_ref()?.error.as_deref(),
        }
    }

    pub fn is_device_not_registered(&self) -> bool {
        self.error_code() == Some(DEVICE_NOT_REGISTERED)
    }
}

/// Final delivery status of a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushReceipt {
    Ok,
    Error {
        message: String,
        #[serde(default)]
        details: Option<PushErrorDetails>,
    },
}

impl PushReceipt {
    pub fn error_code(&self) -> Option<&str> {
        match self {
            PushReceipt::Ok => None,
            PushReceipt::Error { details, .. } => details.as_ref()?.error.as_deref(),
        }
    }

    pub fn is_device_not_registered(&self) -> bool {
        self.error_code() == Some(DEVICE_NOT_REGISTERED)
    }
}

/// Envelope of every Expo push API response
#[derive(Debug, Deserialize)]
pub(crate) struct ExpoResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ExpoApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpoApiError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReceiptRequest<'a> {
    pub ids: &'a [String],
}

/// Check the `ExponentPushToken[...]` / `ExpoPushToken[...]` token shape
pub fn is_expo_push_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .filter_map(|prefix| token.strip_prefix(prefix))
        .any(|rest| rest.len() > 1 && rest.ends_with(']'))
}
