mod chaining;
mod counting;
mod library;
mod materialize;
mod paging;
mod persistence;
mod relationships;
mod unique;

use crate::{
    chaining::chaining,
    counting::counting,
    materialize::materialize,
    paging::paging,
    persistence::{bounded_writes, persistence},
    relationships::relationships,
    unique::unique,
};
pub use library::schema_def;
use log::LevelFilter;
use quarry::Schema;
use std::env;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run the whole suite against `schema`, built from [`schema_def`] over the channel under test.
///
/// Every scenario works on its own sources, the channel must start empty.
pub async fn execute_tests(schema: Schema) {
    chaining(&schema).await;
    materialize(&schema).await;
    counting(&schema).await;
    persistence(&schema).await;
    bounded_writes(&schema).await;
    unique(&schema).await;
    paging(&schema).await;
    relationships(&schema).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
