pub mod measurement;
pub mod table;
pub mod value;

pub use measurement::*;
pub use table::*;
pub use value::*;
