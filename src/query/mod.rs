pub mod builder;
pub mod dispatcher;
pub mod facets;

pub use builder::{QueryBuilder, SearchRequest};
pub use dispatcher::{FallBackReason, SearchDispatcher, SearchOutcome};
