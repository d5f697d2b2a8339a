use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::STATUS_OK_MESSAGE;

/// Outcome code of a terminal status. Wire values: `OK = 0`, `FAILED = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    Ok,
    Failed,
}

impl StatusCode {
    pub const fn as_u8(self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Failed => 1,
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Ok),
            1 => Ok(StatusCode::Failed),
            other => Err(ProtocolError::UnknownStatusCode(other)),
        }
    }
}

/// The single terminal answer of a session.
///
/// Fields are private: once built, neither the code nor the message can be
/// changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusFields")]
pub struct Status {
    code: StatusCode,
    message: String,
}

/// Decoded form of a [`Status`], rebuilt through [`Status::from_parts`].
#[derive(Deserialize)]
struct StatusFields {
    code: StatusCode,
    message: String,
}

impl From<StatusFields> for Status {
    fn from(fields: StatusFields) -> Self {
        Status::from_parts(fields.code, fields.message)
    }
}

impl Status {
    /// A successful upload.
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: STATUS_OK_MESSAGE.into(),
        }
    }

    /// A business-level failure. An empty message is replaced with a
    /// generic one so a FAILED status always explains itself.
    pub fn failed(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = "upload failed".into();
        }
        Self {
            code: StatusCode::Failed,
            message,
        }
    }

    /// Rebuilds a status decoded from the wire.
    pub fn from_parts(code: StatusCode, message: String) -> Self {
        match code {
            StatusCode::Ok => Self { code, message },
            StatusCode::Failed => Self::failed(message),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            StatusCode::Ok => write!(f, "OK: {}", self.message),
            StatusCode::Failed => write!(f, "FAILED: {}", self.message),
        }
    }
}
