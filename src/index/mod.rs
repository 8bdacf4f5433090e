pub mod document;
pub mod maintenance;
pub mod manager;
pub mod repository;
pub mod schema;
pub mod write_queue;

pub use maintenance::ReconciliationEngine;
pub use manager::{Connection, ConnectionManager, ContextId, ContextScope};
pub use repository::{Indexable, Repository};
pub use schema::{Schema, SchemaField};
pub use write_queue::{FlushOutcome, IndexQueueProcessor, PendingOperation};
