//! Point operations. These go straight to the world state; only `read`
//! consults the update buffer.

use serde_json::Value;
use tracing::info;

use sacc_types::{validate_key, Record, RecordValue};

use crate::error::{ChaincodeError, ChaincodeResult};
use crate::handler::{HandlerContext, OperationHandler};
use crate::operation::OperationKind;
use crate::render;

/// Integers are stored as numbers; anything else as lowercased text.
fn parse_value(raw: &str) -> ChaincodeResult<RecordValue> {
    if raw.trim().is_empty() {
        return Err(ChaincodeError::Validation("value must be a non-empty string".into()));
    }
    Ok(match RecordValue::parse(raw) {
        RecordValue::Text(text) => RecordValue::Text(text.to_lowercase()),
        number => number,
    })
}

/// Load and decode `key`, failing with `NotFound` if it is absent.
fn load_existing(ctx: &HandlerContext<'_>, key: &str) -> ChaincodeResult<Record> {
    let bytes = ctx
        .store
        .get_state(key)?
        .ok_or_else(|| ChaincodeError::NotFound { key: key.into() })?;
    Record::from_bytes(&bytes).map_err(|e| ChaincodeError::decode(key, e))
}

fn write(ctx: &HandlerContext<'_>, record: &Record) -> ChaincodeResult<Value> {
    let bytes = record
        .to_bytes()
        .map_err(|e| ChaincodeError::Encode(e.to_string()))?;
    ctx.store.put_state(&record.key, &bytes)?;
    render::json(record)
}

// ---------------------------------------------------------------------------
// init(key, value)
// ---------------------------------------------------------------------------

/// Create a record; fails if the key already exists.
pub struct InitHandler;

impl OperationHandler for InitHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Init
    }

    fn arity(&self) -> usize {
        2
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let key = &args[0];
        validate_key(key)?;
        let value = parse_value(&args[1])?;

        if ctx.store.get_state(key)?.is_some() {
            return Err(ChaincodeError::AlreadyExists { key: key.clone() });
        }
        let record = Record::new(ctx.doc_type, key.as_str(), value);
        let payload = write(ctx, &record)?;
        info!(key = %key, "record created");
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// update(key, newValue)
// ---------------------------------------------------------------------------

/// Replace the value of an existing record, keeping its `docType`.
pub struct UpdateHandler;

impl OperationHandler for UpdateHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Update
    }

    fn arity(&self) -> usize {
        2
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let key = &args[0];
        validate_key(key)?;
        let value = parse_value(&args[1])?;

        let current = load_existing(ctx, key)?;
        let record = Record { value, ..current };
        let payload = write(ctx, &record)?;
        info!(key = %key, "record updated");
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// delete(key)
// ---------------------------------------------------------------------------

/// Remove a record. Returns the record as it was before deletion.
///
/// Any buffered delta for the key is discarded with it, so a deleted key
/// reads as absent and is not recreated by the next flush.
pub struct DeleteHandler;

impl OperationHandler for DeleteHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let key = &args[0];
        validate_key(key)?;
        let (current, discarded) = ctx.buffer.discard_with(key, || -> ChaincodeResult<Record> {
            let current = load_existing(ctx, key)?;
            ctx.store.del_state(key)?;
            Ok(current)
        })?;
        info!(key = %key, discarded, "record deleted");
        render::json(&current)
    }
}

// ---------------------------------------------------------------------------
// read(key)
// ---------------------------------------------------------------------------

/// Read a record including any buffered delta.
pub struct ReadHandler;

impl OperationHandler for ReadHandler {
    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn arity(&self) -> usize {
        1
    }

    fn execute(&self, ctx: &HandlerContext<'_>, args: &[String]) -> ChaincodeResult<Value> {
        let key = &args[0];
        validate_key(key)?;
        let record = ctx
            .buffer
            .read_record(key)?
            .ok_or_else(|| ChaincodeError::NotFound { key: key.clone() })?;
        render::json(&record)
    }
}
