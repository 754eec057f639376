pub mod cache;
pub mod filter;
pub mod local;
pub mod orchestrator;

pub use cache::SearchCache;
pub use filter::{
    DateRange, FilterClass, FilterState, Period, SearchRequest, SortKey, ValueRange,
};
pub use local::{normalize_for_search, LocalFilter};
pub use orchestrator::{Presentation, ResultSource, SearchOrchestrator};
