//! The simple asset chaincode.
//!
//! Clients invoke string-named operations with string arguments. Names are
//! resolved into an [`OperationKind`] and dispatched through a registration
//! table of [`OperationHandler`]s, each declaring its argument count.
//!
//! CRUD operations read and write the world state directly. `batchRecord`
//! goes through the shared [`UpdateBuffer`](sacc_batch::UpdateBuffer), and
//! `read` merges the stored value with any buffered delta.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sacc_chaincode::{Chaincode, ChaincodeConfig};
//! use sacc_store::InMemoryWorldState;
//!
//! let store = Arc::new(InMemoryWorldState::new());
//! let cc = Chaincode::with_default_handlers(store, ChaincodeConfig::default());
//! assert!(cc.call("init", ["a", "10"]).is_ok());
//! assert!(cc.call("batchRecord", ["a", "5"]).is_ok());
//! let read = cc.call("read", ["a"]);
//! assert_eq!(read.payload.unwrap()["value"], 15);
//! ```

pub mod chaincode;
pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod operation;
pub mod render;

pub use chaincode::Chaincode;
pub use config::ChaincodeConfig;
pub use error::{ChaincodeError, ChaincodeResult};
pub use handler::{HandlerContext, OperationHandler};
pub use handlers::batch::BatchEntry;
pub use operation::{Invocation, OperationKind, Response};
