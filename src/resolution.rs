// Resolution Engine - Participant identity resolution
// Four-way outcome: exact duplicate, email conflict, ambiguous, or no match

use crate::normalize::{normalize_email, normalize_name};
use crate::similarity::{similarity, DEFAULT_NAME_SIMILARITY_THRESHOLD};
use crate::store::StoredParticipant;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// REGISTRANT (input)
// ============================================================================

/// Newly submitted registrant, raw text as typed by the user.
/// `birth_date` is an ISO `YYYY-MM-DD` calendar date, no time portion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registrant {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub email: String,
}

impl Registrant {
    /// Caller-side field validation. The engine assumes validated input;
    /// API handlers and the CLI run this gate before resolving.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("birth_date", &self.birth_date),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "Required field is empty".to_string(),
                });
            }
        }

        if !self.birth_date.trim().is_empty()
            && NaiveDate::parse_from_str(self.birth_date.trim(), "%Y-%m-%d").is_err()
        {
            errors.push(ValidationError {
                field: "birth_date".to_string(),
                message: "Expected calendar date in YYYY-MM-DD format".to_string(),
            });
        }

        if !self.email.trim().is_empty() && !self.email.contains('@') {
            errors.push(ValidationError {
                field: "email".to_string(),
                message: "Not a valid email address".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// CANDIDATE LOOKUP (injected collaborator)
// ============================================================================

/// Lookup capability the engine resolves against. Implementations own the
/// storage details; the engine only sees these three queries.
///
/// Stored emails are expected to be pre-normalized (lower-cased, trimmed),
/// so `find_by_email` and `count_by_email` are byte-exact matches.
pub trait ParticipantLookup {
    fn find_by_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<StoredParticipant>, LookupError>;

    /// All stored participants sharing the given `YYYY-MM-DD` birth date.
    /// Order is not significant.
    fn find_by_birth_date(&self, birth_date: &str) -> Result<Vec<StoredParticipant>, LookupError>;

    fn count_by_email(&self, normalized_email: &str) -> Result<i64, LookupError>;
}

/// Failure of the lookup collaborator. Propagated to the caller unchanged;
/// the engine never retries.
#[derive(Debug, Clone)]
pub struct LookupError {
    pub query: String,
    pub message: String,
}

impl LookupError {
    pub fn new(query: &str, message: impl ToString) -> Self {
        LookupError {
            query: query.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lookup {} failed: {}", self.query, self.message)
    }
}

impl std::error::Error for LookupError {}

// ============================================================================
// RESOLUTION (output)
// ============================================================================

/// Terminal classification for a registration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classification")]
pub enum Resolution {
    /// Confident identity - safe to reuse the existing record
    #[serde(rename = "EXACT")]
    Exact { existing_id: i64 },

    /// The email belongs to a different identity
    #[serde(rename = "EMAIL_CONFLICT")]
    EmailConflict { existing: ConflictingParticipant },

    /// Plausible-but-uncertain matches needing human confirmation
    #[serde(rename = "AMBIGUOUS")]
    Ambiguous { candidates: Vec<MatchCandidate> },

    /// No match - safe to create
    #[serde(rename = "NONE")]
    NoMatch,
}

impl Resolution {
    pub fn existing_id(&self) -> Option<i64> {
        match self {
            Resolution::Exact { existing_id } => Some(*existing_id),
            _ => None,
        }
    }
}

/// Public-safe fields of the record already holding a contested email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictingParticipant {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub email: String,
    pub club: String,
    pub weight: f64,
    pub grade: String,
}

impl From<&StoredParticipant> for ConflictingParticipant {
    fn from(p: &StoredParticipant) -> Self {
        ConflictingParticipant {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            birth_date: p.birth_date_day().to_string(),
            email: p.email.clone(),
            club: p.club.clone(),
            weight: p.weight,
            grade: p.grade.clone(),
        }
    }
}

/// Stored participant enriched with similarity scores against the
/// registrant. Ephemeral, produced per request. No email - candidate lists
/// go to humans for disambiguation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub club: String,
    pub weight: f64,
    pub grade: String,
    pub first_name_similarity: f64,
    pub last_name_similarity: f64,
}

impl MatchCandidate {
    fn scored(p: &StoredParticipant, first_name_similarity: f64, last_name_similarity: f64) -> Self {
        MatchCandidate {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            birth_date: p.birth_date_day().to_string(),
            club: p.club.clone(),
            weight: p.weight,
            grade: p.grade.clone(),
            first_name_similarity,
            last_name_similarity,
        }
    }
}

// ============================================================================
// RESOLUTION ENGINE
// ============================================================================

/// Policy for a single fuzzy candidate above threshold.
///
/// Auto-accepting a lone fuzzy match keeps registration friction low but
/// carries false-positive risk, so the choice is a policy knob rather than
/// a fixed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingleMatchPolicy {
    /// A lone fuzzy match above threshold resolves as `Exact`
    AutoAccept,

    /// A lone fuzzy match is still surfaced as `Ambiguous` for review
    AlwaysReview,
}

pub struct ResolutionEngine {
    /// Both name similarities must be strictly above this (default: 0.85)
    pub name_similarity_threshold: f64,

    /// What to do with exactly one fuzzy candidate (default: AutoAccept)
    pub single_match_policy: SingleMatchPolicy,
}

impl ResolutionEngine {
    /// Create engine with default threshold and policy
    pub fn new() -> Self {
        ResolutionEngine {
            name_similarity_threshold: DEFAULT_NAME_SIMILARITY_THRESHOLD,
            single_match_policy: SingleMatchPolicy::AutoAccept,
        }
    }

    /// Classify a registrant against the participant store.
    ///
    /// Ordered and short-circuiting: an email hit is terminal (exact or
    /// conflict), otherwise the birth-date cohort is scanned for an exact
    /// normalized-name match, then for fuzzy candidates. Read-only; lookup
    /// failures from either stage propagate unchanged.
    pub fn resolve(
        &self,
        lookup: &dyn ParticipantLookup,
        registrant: &Registrant,
    ) -> Result<Resolution, LookupError> {
        let norm_email = normalize_email(&registrant.email);
        let norm_first = normalize_name(&registrant.first_name);
        let norm_last = normalize_name(&registrant.last_name);

        // 1. Exact email match is terminal either way
        if let Some(existing) = lookup.find_by_email(&norm_email)? {
            if self.same_identity(&existing, &registrant.birth_date, &norm_first, &norm_last) {
                return Ok(Resolution::Exact {
                    existing_id: existing.id,
                });
            }

            return Ok(Resolution::EmailConflict {
                existing: ConflictingParticipant::from(&existing),
            });
        }

        // 2. Cohort sharing the exact birth date
        let same_birth = lookup.find_by_birth_date(&registrant.birth_date)?;

        // 3. Exact match on both normalized names
        let exact = same_birth.iter().find(|p| {
            normalize_name(&p.first_name) == norm_first && normalize_name(&p.last_name) == norm_last
        });

        if let Some(exact) = exact {
            return Ok(Resolution::Exact {
                existing_id: exact.id,
            });
        }

        // 4. Fuzzy scan: both names strictly above threshold
        let mut candidates = Vec::new();

        for p in &same_birth {
            let first_sim = similarity(&norm_first, &normalize_name(&p.first_name));
            let last_sim = similarity(&norm_last, &normalize_name(&p.last_name));

            if first_sim > self.name_similarity_threshold
                && last_sim > self.name_similarity_threshold
            {
                candidates.push(MatchCandidate::scored(p, first_sim, last_sim));
            }
        }

        match (candidates.len(), self.single_match_policy) {
            (0, _) => Ok(Resolution::NoMatch),
            (1, SingleMatchPolicy::AutoAccept) => Ok(Resolution::Exact {
                existing_id: candidates[0].id,
            }),
            _ => Ok(Resolution::Ambiguous { candidates }),
        }
    }

    /// Availability pre-check for registering a new account: true iff the
    /// email already belongs to a stored participant. Email identity is
    /// exact-or-nothing - no fuzzy matching here.
    pub fn is_email_taken(
        &self,
        lookup: &dyn ParticipantLookup,
        email: &str,
    ) -> Result<bool, LookupError> {
        let count = lookup.count_by_email(&normalize_email(email))?;
        Ok(count > 0)
    }

    /// Identity check behind an email hit: birth date equal on the
    /// date-only portion, both name similarities above threshold.
    fn same_identity(
        &self,
        existing: &StoredParticipant,
        birth_date: &str,
        norm_first: &str,
        norm_last: &str,
    ) -> bool {
        existing.birth_date_day() == birth_date
            && similarity(norm_first, &normalize_name(&existing.first_name))
                > self.name_similarity_threshold
            && similarity(norm_last, &normalize_name(&existing.last_name))
                > self.name_similarity_threshold
    }
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_participant(
        id: i64,
        first: &str,
        last: &str,
        birth_date: &str,
        email: &str,
    ) -> StoredParticipant {
        StoredParticipant {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            birth_date: birth_date.to_string(),
            email: email.to_string(),
            club: "Kempo Club Paris".to_string(),
            weight: 72.5,
            grade: "Ceinture noire".to_string(),
        }
    }

    fn create_test_registrant(first: &str, last: &str, birth_date: &str, email: &str) -> Registrant {
        Registrant {
            first_name: first.to_string(),
            last_name: last.to_string(),
            birth_date: birth_date.to_string(),
            email: email.to_string(),
        }
    }

    /// In-memory lookup over a fixed participant list
    struct MemoryLookup {
        participants: Vec<StoredParticipant>,
    }

    impl ParticipantLookup for MemoryLookup {
        fn find_by_email(
            &self,
            normalized_email: &str,
        ) -> Result<Option<StoredParticipant>, LookupError> {
            Ok(self
                .participants
                .iter()
                .find(|p| p.email == normalized_email)
                .cloned())
        }

        fn find_by_birth_date(
            &self,
            birth_date: &str,
        ) -> Result<Vec<StoredParticipant>, LookupError> {
            Ok(self
                .participants
                .iter()
                .filter(|p| p.birth_date_day() == birth_date)
                .cloned()
                .collect())
        }

        fn count_by_email(&self, normalized_email: &str) -> Result<i64, LookupError> {
            Ok(self
                .participants
                .iter()
                .filter(|p| p.email == normalized_email)
                .count() as i64)
        }
    }

    /// Lookup whose email stage always fails
    struct FailingLookup;

    impl ParticipantLookup for FailingLookup {
        fn find_by_email(&self, _: &str) -> Result<Option<StoredParticipant>, LookupError> {
            Err(LookupError::new("find_by_email", "store unreachable"))
        }

        fn find_by_birth_date(&self, _: &str) -> Result<Vec<StoredParticipant>, LookupError> {
            Err(LookupError::new("find_by_birth_date", "store unreachable"))
        }

        fn count_by_email(&self, _: &str) -> Result<i64, LookupError> {
            Err(LookupError::new("count_by_email", "store unreachable"))
        }
    }

    /// Lookup that answers the email stage but fails on the birth-date stage
    struct FailingBirthDateLookup;

    impl ParticipantLookup for FailingBirthDateLookup {
        fn find_by_email(&self, _: &str) -> Result<Option<StoredParticipant>, LookupError> {
            Ok(None)
        }

        fn find_by_birth_date(&self, _: &str) -> Result<Vec<StoredParticipant>, LookupError> {
            Err(LookupError::new("find_by_birth_date", "timeout"))
        }

        fn count_by_email(&self, _: &str) -> Result<i64, LookupError> {
            Ok(0)
        }
    }

    #[test]
    fn test_email_match_with_matching_identity_is_exact() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // Stored name carries a diacritic the registrant typed without
            participants: vec![create_test_participant(
                7, "Jéan", "Dupont", "1990-05-01", "jean@x.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::Exact { existing_id: 7 });
    }

    #[test]
    fn test_email_match_normalizes_registrant_email() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                7, "Jean", "Dupont", "1990-05-01", "jean@x.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "  Jean@X.COM ");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution.existing_id(), Some(7));
    }

    #[test]
    fn test_email_match_with_different_birth_date_is_conflict() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                7, "Jean", "Dupont", "1991-05-01", "jean@x.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        match resolution {
            Resolution::EmailConflict { existing } => {
                assert_eq!(existing.id, 7);
                assert_eq!(existing.birth_date, "1991-05-01");
                assert_eq!(existing.email, "jean@x.com");
                assert_eq!(existing.club, "Kempo Club Paris");
            }
            other => panic!("expected EmailConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_email_match_with_different_name_is_conflict() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                7, "Marie", "Lefevre", "1990-05-01", "jean@x.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert!(matches!(resolution, Resolution::EmailConflict { .. }));
    }

    #[test]
    fn test_conflict_compares_date_only_portion_of_stored_timestamp() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // Stores that keep a midnight timestamp still compare equal
            participants: vec![create_test_participant(
                7,
                "Jean",
                "Dupont",
                "1990-05-01T00:00:00",
                "jean@x.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::Exact { existing_id: 7 });
    }

    #[test]
    fn test_exact_name_match_in_birth_date_cohort() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // Same person registered under a different email
            participants: vec![create_test_participant(
                3, "Jéan", "Dupont", "1990-05-01", "old-address@y.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::Exact { existing_id: 3 });
    }

    #[test]
    fn test_no_match_anywhere_is_none() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                1, "Marie", "Lefevre", "1985-02-11", "marie@y.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::NoMatch);
    }

    #[test]
    fn test_single_fuzzy_candidate_auto_accepted() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // One typo in the first name, same birth date, different email
            participants: vec![create_test_participant(
                5,
                "Christofe",
                "Lemaitre",
                "1990-05-01",
                "christofe@y.com",
            )],
        };

        let registrant =
            create_test_registrant("Christophe", "Lemaitre", "1990-05-01", "christophe@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::Exact { existing_id: 5 });
    }

    #[test]
    fn test_single_fuzzy_candidate_under_review_policy_is_ambiguous() {
        let mut engine = ResolutionEngine::new();
        engine.single_match_policy = SingleMatchPolicy::AlwaysReview;

        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                5,
                "Christofe",
                "Lemaitre",
                "1990-05-01",
                "christofe@y.com",
            )],
        };

        let registrant =
            create_test_registrant("Christophe", "Lemaitre", "1990-05-01", "christophe@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        match resolution {
            Resolution::Ambiguous { candidates } => {
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].id, 5);
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_fuzzy_candidates_are_ambiguous() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![
                create_test_participant(5, "Christofe", "Lemaitre", "1990-05-01", "a@y.com"),
                create_test_participant(9, "Christophe", "Lemaittre", "1990-05-01", "b@y.com"),
            ],
        };

        let registrant =
            create_test_registrant("Christophe", "Lemaitre", "1990-05-01", "christophe@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        match resolution {
            Resolution::Ambiguous { candidates } => {
                assert_eq!(candidates.len(), 2);
                for c in &candidates {
                    assert!(c.first_name_similarity > engine.name_similarity_threshold);
                    assert!(c.last_name_similarity > engine.name_similarity_threshold);
                }
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_fuzzy_requires_both_names_above_threshold() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // First name close, last name unrelated
            participants: vec![create_test_participant(
                5, "Christofe", "Moreau", "1990-05-01", "a@y.com",
            )],
        };

        let registrant =
            create_test_registrant("Christophe", "Lemaitre", "1990-05-01", "christophe@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::NoMatch);
    }

    #[test]
    fn test_one_edit_in_short_name_stays_below_threshold() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            // "dupond" vs "dupont" scores 5/6, under the 0.85 threshold
            participants: vec![create_test_participant(
                5, "Jean", "Dupond", "1990-05-01", "a@y.com",
            )],
        };

        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        let resolution = engine.resolve(&lookup, &registrant).unwrap();

        assert_eq!(resolution, Resolution::NoMatch);
    }

    #[test]
    fn test_email_stage_failure_propagates() {
        let engine = ResolutionEngine::new();
        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");

        let err = engine.resolve(&FailingLookup, &registrant).unwrap_err();
        assert_eq!(err.query, "find_by_email");
    }

    #[test]
    fn test_birth_date_stage_failure_propagates() {
        let engine = ResolutionEngine::new();
        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");

        let err = engine
            .resolve(&FailingBirthDateLookup, &registrant)
            .unwrap_err();
        assert_eq!(err.query, "find_by_birth_date");
    }

    #[test]
    fn test_is_email_taken() {
        let engine = ResolutionEngine::new();
        let lookup = MemoryLookup {
            participants: vec![create_test_participant(
                7, "Jean", "Dupont", "1990-05-01", "jean@x.com",
            )],
        };

        assert!(engine.is_email_taken(&lookup, " Jean@X.com ").unwrap());
        assert!(!engine.is_email_taken(&lookup, "free@x.com").unwrap());
    }

    #[test]
    fn test_resolution_serializes_with_classification_tag() {
        let json = serde_json::to_value(Resolution::Exact { existing_id: 7 }).unwrap();
        assert_eq!(json["classification"], "EXACT");
        assert_eq!(json["existing_id"], 7);

        let json = serde_json::to_value(Resolution::NoMatch).unwrap();
        assert_eq!(json["classification"], "NONE");
    }

    #[test]
    fn test_validate_accepts_complete_registrant() {
        let registrant = create_test_registrant("Jean", "Dupont", "1990-05-01", "jean@x.com");
        assert!(registrant.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let registrant = create_test_registrant("", "Dupont", "", "jean@x.com");
        let errors = registrant.validate().unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"first_name"));
        assert!(fields.contains(&"birth_date"));
        assert!(!fields.contains(&"email"));
    }

    #[test]
    fn test_validate_rejects_malformed_birth_date_and_email() {
        let registrant = create_test_registrant("Jean", "Dupont", "01/05/1990", "not-an-email");
        let errors = registrant.validate().unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"birth_date"));
        assert!(fields.contains(&"email"));
    }
}
