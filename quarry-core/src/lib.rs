mod as_value;
mod attributes;
mod column;
mod condition;
mod config;
mod dispatch;
mod error;
mod hydrate;
mod pager;
mod payload;
mod relationship;
mod result_set;
mod row;
mod schema;
mod unique;
mod util;
mod value;

pub use ::anyhow::Context as ErrorContext;
pub use as_value::*;
pub use attributes::*;
pub use column::*;
pub use condition::*;
pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use hydrate::*;
pub use pager::*;
pub use payload::*;
pub use relationship::*;
pub use result_set::*;
pub use row::*;
pub use schema::*;
pub use unique::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;

/// Rows per page when a result set is paged without an explicit `rows` attribute.
pub const DEFAULT_PAGE_SIZE: u64 = 10;
