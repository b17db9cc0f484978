// Kempo Registry - Participant Identity Resolution
// Exposes all modules for use in the CLI, API server, and tests

pub mod normalize;
pub mod resolution;
pub mod similarity;
pub mod statistics;
pub mod store;

// Re-export commonly used types
pub use normalize::{normalize_email, normalize_name};
pub use resolution::{
    ConflictingParticipant, LookupError, MatchCandidate, ParticipantLookup, Registrant,
    Resolution, ResolutionEngine, SingleMatchPolicy, ValidationError,
};
pub use similarity::{similarity, DEFAULT_NAME_SIMILARITY_THRESHOLD};
pub use statistics::{
    outcomes_for, statistics_for, summarize, GeneralStatistics, MatchOutcome, MatchRecord,
    ParticipantStatistics,
};
pub use store::{
    count_participants, delete_participant, get_all_participants, get_matches_for_participant,
    get_participant, insert_match_result, insert_participant, load_roster_csv, setup_database,
    NewParticipant, SqliteLookup, StoredParticipant,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
