pub mod engine;
pub mod preprocess;
pub mod scorer;

pub use engine::{decide, MatchDecision};
pub use preprocess::isolate_profile_region;
pub use scorer::{PhashScorer, SimilarityScorer};
