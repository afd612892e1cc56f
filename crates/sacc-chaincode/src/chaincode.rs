use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use sacc_batch::{FlushReport, UpdateBuffer};
use sacc_store::WorldState;

use crate::config::ChaincodeConfig;
use crate::error::{ChaincodeError, ChaincodeResult};
use crate::handler::{HandlerContext, OperationHandler};
use crate::handlers::{
    BatchFlushHandler, BatchHandler, BatchRecordHandler, BatchStatusHandler, DeleteHandler,
    HistoryHandler, InitHandler, RangeQueryHandler, RangeQueryPaginatedHandler, ReadHandler,
    RichQueryHandler, RichQueryPaginatedHandler, UpdateHandler,
};
use crate::operation::{Invocation, OperationKind, Response};

/// The simple asset chaincode.
///
/// Owns the registration table mapping each [`OperationKind`] to its
/// handler, plus the process-wide [`UpdateBuffer`]. Construct once and
/// share (usually through an `Arc`); every method takes `&self`.
pub struct Chaincode {
    store: Arc<dyn WorldState>,
    buffer: Arc<UpdateBuffer>,
    config: ChaincodeConfig,
    handlers: BTreeMap<OperationKind, Box<dyn OperationHandler>>,
}

impl Chaincode {
    /// An empty registration table. Use [`Self::register`] to add
    /// handlers, or [`Self::with_default_handlers`] for every operation.
    pub fn new(store: Arc<dyn WorldState>, config: ChaincodeConfig) -> Self {
        let buffer = Arc::new(UpdateBuffer::new(
            Arc::clone(&store),
            config.doc_type.clone(),
            &config.batch,
        ));
        Self {
            store,
            buffer,
            config,
            handlers: BTreeMap::new(),
        }
    }

    pub fn with_default_handlers(store: Arc<dyn WorldState>, config: ChaincodeConfig) -> Self {
        let mut cc = Self::new(store, config);
        cc.register(Box::new(InitHandler));
        cc.register(Box::new(UpdateHandler));
        cc.register(Box::new(DeleteHandler));
        cc.register(Box::new(ReadHandler));
        cc.register(Box::new(RangeQueryHandler));
        cc.register(Box::new(RichQueryHandler));
        cc.register(Box::new(RangeQueryPaginatedHandler));
        cc.register(Box::new(RichQueryPaginatedHandler));
        cc.register(Box::new(HistoryHandler));
        cc.register(Box::new(BatchRecordHandler));
        cc.register(Box::new(BatchFlushHandler));
        cc.register(Box::new(BatchHandler));
        cc.register(Box::new(BatchStatusHandler));
        cc
    }

    /// Add or replace the handler for its kind.
    pub fn register(&mut self, handler: Box<dyn OperationHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Registered operations, in declaration order.
    pub fn operations(&self) -> Vec<OperationKind> {
        self.handlers.keys().copied().collect()
    }

    pub fn config(&self) -> &ChaincodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WorldState> {
        &self.store
    }

    pub fn buffer(&self) -> &Arc<UpdateBuffer> {
        &self.buffer
    }

    /// Resolve and run one invocation.
    pub fn execute(&self, invocation: &Invocation) -> ChaincodeResult<Value> {
        let kind = invocation.kind()?;
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| ChaincodeError::UnknownOperation(invocation.function.clone()))?;

        let got = invocation.args.len();
        if got != handler.arity() {
            return Err(ChaincodeError::ArgumentCount {
                operation: kind.name(),
                expected: handler.arity(),
                got,
            });
        }

        let ctx = HandlerContext {
            store: self.store.as_ref(),
            buffer: self.buffer.as_ref(),
            doc_type: &self.config.doc_type,
        };
        handler.execute(&ctx, &invocation.args)
    }

    /// [`execute`](Self::execute), with the result mapped to a [`Response`].
    pub fn invoke(&self, invocation: &Invocation) -> Response {
        let start = Instant::now();
        let result = self.execute(invocation);
        match &result {
            Ok(_) => debug!(
                function = %invocation.function,
                elapsed_us = start.elapsed().as_micros() as u64,
                "invocation succeeded"
            ),
            Err(e) => warn!(
                function = %invocation.function,
                status = e.status(),
                error = %e,
                "invocation failed"
            ),
        }
        Response::from(result)
    }

    /// Shorthand for `invoke(&Invocation::new(function, args))`.
    pub fn call<I, S>(&self, function: &str, args: I) -> Response
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoke(&Invocation::new(function, args))
    }

    /// Flush the buffer regardless of policy, e.g. on shutdown.
    pub fn flush(&self) -> ChaincodeResult<FlushReport> {
        Ok(self.buffer.flush()?)
    }

    /// Flush if a time-based trigger is due.
    pub fn flush_if_due(&self) -> ChaincodeResult<Option<FlushReport>> {
        Ok(self.buffer.flush_if_due()?)
    }
}

impl std::fmt::Debug for Chaincode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chaincode")
            .field("config", &self.config)
            .field("operations", &self.operations())
            .field("buffer", &self.buffer)
            .finish()
    }
}
