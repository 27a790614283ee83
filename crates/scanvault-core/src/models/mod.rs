pub mod file_record;
pub mod scan;

pub use file_record::*;
pub use scan::*;
