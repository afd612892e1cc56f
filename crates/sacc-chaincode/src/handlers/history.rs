use serde_json::Value;

use sacc_store::IterGuard;
use sacc_types::validate_key;

use crate::error::ChaincodeResult;
use crate::handler::{HandlerContext, OperationHandler};
use crate::operation::OperationKind;
use crate::render;

/// `history(key)`: every committed write and delete of a key, oldest first.
///
/// Buffered deltas are not history until they are flushed.
pub struct HistoryHandler;

impl OperationHandler for HistoryHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::History
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let key = &args[0];
        validate_key(key)?;
        let entries = IterGuard::new(ctx.store.get_history_for_key(key)?);
        render::history(key, entries)
    }
}
