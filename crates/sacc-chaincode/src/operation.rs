use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChaincodeError, ChaincodeResult};

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// Every operation the chaincode exposes.
///
/// Function names are resolved into this enum once, at the dispatch
/// boundary; nothing past that point matches on strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Init,
    Update,
    Delete,
    Read,
    RangeQuery,
    RichQuery,
    RangeQueryPaginated,
    RichQueryPaginated,
    History,
    BatchRecord,
    BatchFlush,
    Batch,
    BatchStatus,
}

impl OperationKind {
    pub const ALL: [OperationKind; 13] = [
        Self::Init,
        Self::Update,
        Self::Delete,
        Self::Read,
        Self::RangeQuery,
        Self::RichQuery,
        Self::RangeQueryPaginated,
        Self::RichQueryPaginated,
        Self::History,
        Self::BatchRecord,
        Self::BatchFlush,
        Self::Batch,
        Self::BatchStatus,
    ];

    /// The function name clients invoke.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::RangeQuery => "rangeQuery",
            Self::RichQuery => "richQuery",
            Self::RangeQueryPaginated => "rangeQueryPaginated",
            Self::RichQueryPaginated => "richQueryPaginated",
            Self::History => "history",
            Self::BatchRecord => "batchRecord",
            Self::BatchFlush => "batchFlush",
            Self::Batch => "batch",
            Self::BatchStatus => "batchStatus",
        }
    }
}

impl FromStr for OperationKind {
    type Err = ChaincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ChaincodeError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A function name and its string arguments, as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> ChaincodeResult<OperationKind> {
        self.function.parse()
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Outcome of one invocation.
///
/// `status` follows HTTP conventions: 200 on success with a JSON `payload`,
/// otherwise an error status with a `message`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub const OK: u16 = 200;

    pub fn success(payload: Value) -> Self {
        Self {
            status: Self::OK,
            payload: Some(payload),
            message: None,
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

impl From<ChaincodeResult<Value>> for Response {
    fn from(result: ChaincodeResult<Value>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::error(e.status(), e.to_string()),
        }
    }
}
