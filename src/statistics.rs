// Participant Statistics - aggregate recorded match results per participant

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// MATCH RECORD (as stored)
// ============================================================================

/// A recorded match result between two participants. Points follow kempo
/// scoring vocabulary: ippons scored, keikokus (penalties) received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    pub id_participant1: i64,
    pub id_participant2: i64,
    /// None for an undecided or drawn match
    pub id_winner: Option<i64>,
    pub ippons_participant1: i64,
    pub ippons_participant2: i64,
    pub keikokus_participant1: i64,
    pub keikokus_participant2: i64,
    pub tournament_name: String,
    pub category_name: String,
    pub match_type: String,
}

// ============================================================================
// PER-PARTICIPANT VIEW
// ============================================================================

/// One match seen from a single participant's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub match_id: i64,
    pub opponent_id: i64,
    pub tournament_name: String,
    pub category_name: String,
    pub match_type: String,
    pub ippons_scored: i64,
    pub ippons_conceded: i64,
    pub keikokus_scored: i64,
    pub keikokus_conceded: i64,
    pub won: bool,
}

/// Orient each record the participant appears in to their side of the mat.
/// Records not involving the participant are skipped.
pub fn outcomes_for(participant_id: i64, records: &[MatchRecord]) -> Vec<MatchOutcome> {
    records
        .iter()
        .filter(|m| m.id_participant1 == participant_id || m.id_participant2 == participant_id)
        .map(|m| {
            let is_first = m.id_participant1 == participant_id;

            let (opponent_id, ippons_scored, ippons_conceded, keikokus_scored, keikokus_conceded) =
                if is_first {
                    (
                        m.id_participant2,
                        m.ippons_participant1,
                        m.ippons_participant2,
                        m.keikokus_participant1,
                        m.keikokus_participant2,
                    )
                } else {
                    (
                        m.id_participant1,
                        m.ippons_participant2,
                        m.ippons_participant1,
                        m.keikokus_participant2,
                        m.keikokus_participant1,
                    )
                };

            MatchOutcome {
                match_id: m.id,
                opponent_id,
                tournament_name: m.tournament_name.clone(),
                category_name: m.category_name.clone(),
                match_type: m.match_type.clone(),
                ippons_scored,
                ippons_conceded,
                keikokus_scored,
                keikokus_conceded,
                won: m.id_winner == Some(participant_id),
            }
        })
        .collect()
}

// ============================================================================
// AGGREGATE STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralStatistics {
    pub categories_played: usize,
    pub categories_won: usize,
    pub total_matches: usize,
    pub total_won: usize,
    pub total_lost: usize,
    /// Percentage rounded to two decimals; 0 with no matches
    pub win_rate: f64,
    pub ippons_scored: i64,
    pub ippons_conceded: i64,
    pub keikokus_scored: i64,
    pub keikokus_conceded: i64,
}

pub fn summarize(outcomes: &[MatchOutcome]) -> GeneralStatistics {
    let total_matches = outcomes.len();
    let total_won = outcomes.iter().filter(|o| o.won).count();

    let win_rate = if total_matches > 0 {
        (total_won as f64 / total_matches as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };

    let categories_played: HashSet<&str> =
        outcomes.iter().map(|o| o.category_name.as_str()).collect();
    let categories_won: HashSet<&str> = outcomes
        .iter()
        .filter(|o| o.won)
        .map(|o| o.category_name.as_str())
        .collect();

    GeneralStatistics {
        categories_played: categories_played.len(),
        categories_won: categories_won.len(),
        total_matches,
        total_won,
        total_lost: total_matches - total_won,
        win_rate,
        ippons_scored: outcomes.iter().map(|o| o.ippons_scored).sum(),
        ippons_conceded: outcomes.iter().map(|o| o.ippons_conceded).sum(),
        keikokus_scored: outcomes.iter().map(|o| o.keikokus_scored).sum(),
        keikokus_conceded: outcomes.iter().map(|o| o.keikokus_conceded).sum(),
    }
}

/// Full statistics payload for one participant: oriented matches plus
/// aggregate totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStatistics {
    pub matches: Vec<MatchOutcome>,
    pub general_statistics: GeneralStatistics,
}

pub fn statistics_for(participant_id: i64, records: &[MatchRecord]) -> ParticipantStatistics {
    let matches = outcomes_for(participant_id, records);
    let general_statistics = summarize(&matches);

    ParticipantStatistics {
        matches,
        general_statistics,
    }
}

// ============================================================================
// TESTS
// ============================================================================
