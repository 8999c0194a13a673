pub mod aggregator;

pub use aggregator::{build, build_at};
