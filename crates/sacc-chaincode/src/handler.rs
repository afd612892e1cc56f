use serde_json::Value;

use sacc_batch::UpdateBuffer;
use sacc_store::WorldState;

use crate::error::{ChaincodeError, ChaincodeResult};
use crate::operation::OperationKind;

// ---------------------------------------------------------------------------
// HandlerContext
// ---------------------------------------------------------------------------

/// What every handler can reach while it runs.
pub struct HandlerContext<'a> {
    /// The world state, for operations that bypass the buffer.
    pub store: &'a dyn WorldState,
    /// The shared update buffer.
    pub buffer: &'a UpdateBuffer,
    /// `docType` for records created by this invocation.
    pub doc_type: &'a str,
}

// ---------------------------------------------------------------------------
// OperationHandler trait
// ---------------------------------------------------------------------------

/// One registered chaincode operation.
///
/// The chaincode checks the argument count against [`arity`](Self::arity)
/// before calling [`execute`](Self::execute), so handlers may index `args`
/// directly. Object-safe and `Send + Sync` so handlers can live in the
/// registration table as `Box<dyn OperationHandler>`.
pub trait OperationHandler: Send + Sync {
    fn kind(&self) -> OperationKind;

    /// Exact number of string arguments the operation takes.
    fn arity(&self) -> usize;

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value>;
}

/// Parse a positive page size argument.
pub(crate) fn parse_page_size(raw: &str) -> ChaincodeResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ChaincodeError::Validation(format!(
            "page size must be a positive integer, got {raw:?}"
        ))),
    }
}

/// Parse a signed delta argument.
pub(crate) fn parse_delta(raw: &str) -> ChaincodeResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ChaincodeError::Validation(format!("delta must be an integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn page_size_must_be_positive() {
        assert_eq!(parse_page_size("2").unwrap(), 2);
        assert!(parse_page_size("0").is_err());
        assert!(parse_page_size("-1").is_err());
        assert!(parse_page_size("ten").is_err());
    }

    #[test]
    fn delta_parses_signed() {
        assert_eq!(parse_delta("-3").unwrap(), -3);
        assert_eq!(parse_delta(" 7 ").unwrap(), 7);
        assert!(matches!(parse_delta("1.5"), Err(ChaincodeError::Validation(_))));
    }

    proptest! {
        #[test]
        fn any_i64_is_a_valid_delta(n in any::<i64>()) {
            prop_assert_eq!(parse_delta(&n.to_string()).unwrap(), n);
        }
    }
}
