//! Custom field definitions and the values derived from them.

mod definition;
mod embedded;
mod query;
mod record_update;
mod statistic;

pub use definition::*;
pub use embedded::*;
pub use query::*;
pub use record_update::*;
pub use statistic::*;
