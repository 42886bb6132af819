//! Files core: JSON-to-SQL translation pipeline.
//!
//! Dependency order, leaves first: [`schema`] → [`filter`] → [`query_def`] →
//! [`validate`] → [`sql`] → [`exec`].

pub mod exec;
pub mod filter;
pub mod query_def;
pub mod schema;
pub mod sql;
pub mod validate;

pub use exec::{execute, QueryMetadata, QueryResult, Row};
pub use filter::{FieldFilter, Filter, Operator};
pub use query_def::{Aggregation, Direction, Join, JoinType, OrderByEntry, QueryDefinition};
pub use sql::{build, BuiltQuery};
pub use validate::validate;
