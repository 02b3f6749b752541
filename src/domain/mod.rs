//! Shared data types passed between the seeker, processor, providers,
//! detector, and augmenter.

pub mod query;
pub mod research;
pub mod response;
pub mod result;

pub use query::{ContentType, KnowledgeQuery, Priority, QueryFilters, QueryMetadata, QueryType};
pub use research::{
    AugmentedTask, KeyFinding, ResearchContext, ResearchContextMetadata, ResearchFinding,
    ResearchRequirement, Task,
};
pub use response::{KnowledgeResponse, ResponseMetadata};
pub use result::{content_hash, dedup_signature, domain_of, Quality, SearchResult, SourceType};
