pub mod manager;
pub mod query_builder;

pub use manager::{bind_params, Database, DatabaseError};
pub use query_builder::{PageInfo, Pagination, SelectQuery, SortDirection, SqlResult};
