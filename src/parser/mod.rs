pub mod container;
pub mod csv_reader;
pub mod helpers;
pub mod layout;
pub mod records;
pub mod stream;
pub mod text;
pub mod v3;
pub mod v4;

pub use container::*;
pub use csv_reader::{read_csv_table, CSV_SHEET_NAME};
pub use stream::*;
