use serde::{Deserialize, Serialize};

use sacc_batch::BatchConfig;
use sacc_types::DEFAULT_DOC_TYPE;

/// Chaincode settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaincodeConfig {
    /// `docType` written on records this chaincode creates.
    pub doc_type: String,
    /// Flush triggers for `batchRecord`.
    pub batch: BatchConfig,
}

impl Default for ChaincodeConfig {
    fn default() -> Self {
        Self {
            doc_type: DEFAULT_DOC_TYPE.to_string(),
            batch: BatchConfig::default(),
        }
    }
}
