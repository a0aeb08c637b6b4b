pub mod cache;
pub mod crawler;
pub mod dispatch;
pub mod executor;
pub mod notifier;
pub mod relay;
pub mod remap;
pub mod report;
pub mod store;
pub mod targets;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use crawler::{CrawlOutcome, Crawler};
pub use report::CrawlReport;
