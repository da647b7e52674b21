mod outcome;
mod report;
mod table;

pub use outcome::*;
pub use report::*;
pub use table::*;
