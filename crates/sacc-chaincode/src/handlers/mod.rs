//! Built-in operation handlers.

pub mod batch;
pub mod crud;
pub mod history;
pub mod query;

pub use batch::{BatchFlushHandler, BatchHandler, BatchRecordHandler, BatchStatusHandler};
pub use crud::{DeleteHandler, InitHandler, ReadHandler, UpdateHandler};
pub use history::HistoryHandler;
pub use query::{
    RangeQueryHandler, RangeQueryPaginatedHandler, RichQueryHandler, RichQueryPaginatedHandler,
};
