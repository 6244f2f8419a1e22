pub mod fit;
pub mod search;

pub use fit::{FitAnalysis, FitMethod, Recommendation};
pub use search::{CandidateMatch, QueryEngine, QueryError, RagAnswer, ResumeChunk, ResumeDetail, Source, build_context};
