//! Analysis services
//!
//! Classification, endpoint matching and structured text recovery are pure,
//! synchronous computations; they own no shared state and can be called from
//! any thread.

pub mod classifier;
pub mod code_diff;
pub mod insights;
pub mod matcher;
pub mod path_normalizer;
pub mod stats;
pub mod suggestion_filter;
pub mod text_recovery;

pub use classifier::{classify, Classifier, ClassifierOptions, ClassifyError, P95Aggregation};
pub use code_diff::{diff_code, CodeDiff, DiffLine, DiffStats, LineChange};
pub use insights::generate_insights;
pub use matcher::{
    match_apis, match_untiered, match_with_reference, performance_issues, MatchReport,
    MatchStatus, Matcher, MatcherOptions, Tiering,
};
pub use suggestion_filter::{filter_suggestion, FilterVerdict, RejectReason};
pub use text_recovery::{recover, recover_as, RecoveryError};
