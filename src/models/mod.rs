pub mod query;
pub mod table;

pub use query::*;
pub use table::*;
