use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RcaError};

pub const PROTOCOL: &str = "rca/1";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RcaRequest {
    Health,
    Analyze {
        log: String,
    },
    History {
        limit: Option<u32>,
        #[serde(default)]
        offset: u32,
        #[serde(default)]
        newest_first: bool,
    },
    Get {
        id: i64,
    },
    Feedback {
        id: i64,
        helpful: bool,
        comment: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RcaResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub version: String,
}

impl RcaResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl From<RcaError> for RcaResponse {
    fn from(e: RcaError) -> Self {
        RcaResponse::err(e.kind(), e.to_string())
    }
}
