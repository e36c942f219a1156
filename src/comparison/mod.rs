//! Comparison fan-out and report fan-in.

pub mod fanout;
pub mod reducer;

pub use fanout::ComparisonFanOut;
pub use reducer::ReportReducer;
