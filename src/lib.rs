//! Non-blocking result sets over relational data.
//!
//! A [`ResultSet`] accumulates a condition and attributes without touching
//! storage. Reading it dispatches one payload through the [`DispatchChannel`]
//! of its [`Schema`] and hydrates the returned rows into [`Row`] or any type
//! deriving [`ResultClass`].

pub use quarry_core::*;
pub use quarry_macros::*;
