mod channel;
mod evaluate;
mod table;

pub use channel::*;
pub use table::*;
