pub mod progress;
pub mod report;
pub mod table;

pub use progress::Spinner;
