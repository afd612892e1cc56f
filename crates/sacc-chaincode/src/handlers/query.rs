//! Range and rich queries, plain and paginated.

use serde_json::Value;
use tracing::debug;

use sacc_store::IterGuard;

use crate::error::ChaincodeResult;
use crate::handler::{parse_page_size, HandlerContext, OperationHandler};
use crate::operation::OperationKind;
use crate::render;

/// `rangeQuery(startKey, endKey)`: every record in `[start, end)`.
pub struct RangeQueryHandler;

impl OperationHandler for RangeQueryHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::RangeQuery
    }

    fn arity(&self) -> usize {
        2
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let rows = IterGuard::new(ctx.store.get_state_by_range(&args[0], &args[1])?);
        debug!(start = %args[0], end = %args[1], "range query");
        render::listing(rows)
    }
}

/// `richQuery(queryString)`: every record matching a selector query.
pub struct RichQueryHandler;

impl OperationHandler for RichQueryHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::RichQuery
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let rows = IterGuard::new(ctx.store.get_query_result(&args[0])?);
        render::listing(rows)
    }
}

/// `rangeQueryPaginated(startKey, endKey, pageSize, bookmark)`
pub struct RangeQueryPaginatedHandler;

impl OperationHandler for RangeQueryPaginatedHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::RangeQueryPaginated
    }

    fn arity(&self) -> usize {
        4
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let page_size = parse_page_size(&args[2])?;
        let (rows, metadata) = ctx.store.get_state_by_range_with_pagination(
            &args[0], &args[1], page_size, &args[3],
        )?;
        render::page(IterGuard::new(rows), metadata)
    }
}

/// `richQueryPaginated(queryString, pageSize, bookmark)`
pub struct RichQueryPaginatedHandler;

impl OperationHandler for RichQueryPaginatedHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::RichQueryPaginated
    }

    fn arity(&self) -> usize {
        3
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let page_size = parse_page_size(&args[1])?;
        let (rows, metadata) =
            ctx.store
                .get_query_result_with_pagination(&args[0], page_size, &args[2])?;
        render::page(IterGuard::new(rows), metadata)
    }
}
