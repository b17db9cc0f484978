// Participant Store - SQLite persistence + the lookup queries the resolver consumes

use crate::normalize::normalize_email;
use crate::resolution::{LookupError, ParticipantLookup};
use crate::statistics::MatchRecord;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// DATA MODEL
// ============================================================================

/// Participant record as held by the store. The resolver treats these as
/// read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredParticipant {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub email: String,
    pub club: String,
    pub weight: f64,
    pub grade: String,
}

impl StoredParticipant {
    /// Date-only portion of the stored birth date. Stores that keep a
    /// timestamp column hand back `YYYY-MM-DDTHH:MM:SS`; comparisons always
    /// run on the part before the `T`.
    pub fn birth_date_day(&self) -> &str {
        self.birth_date
            .split('T')
            .next()
            .unwrap_or(&self.birth_date)
    }
}

/// Participant submitted for insertion, e.g. a roster CSV row.
/// Serde renames match the roster file headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipant {
    #[serde(rename = "First_Name")]
    pub first_name: String,

    #[serde(rename = "Last_Name")]
    pub last_name: String,

    #[serde(rename = "Birth_Date")]
    pub birth_date: String,

    #[serde(rename = "Email")]
    pub email: String,

    #[serde(rename = "Club")]
    pub club: String,

    #[serde(rename = "Weight")]
    pub weight: f64,

    #[serde(rename = "Grade")]
    pub grade: String,
}

impl NewParticipant {
    pub fn to_registrant(&self) -> crate::resolution::Registrant {
        crate::resolution::Registrant {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: self.birth_date.clone(),
            email: self.email.clone(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participant (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            email TEXT NOT NULL,
            club TEXT NOT NULL,
            weight REAL NOT NULL,
            grade TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS match_result (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            id_participant1 INTEGER NOT NULL,
            id_participant2 INTEGER NOT NULL,
            id_winner INTEGER,
            ippons_participant1 INTEGER NOT NULL DEFAULT 0,
            ippons_participant2 INTEGER NOT NULL DEFAULT 0,
            keikokus_participant1 INTEGER NOT NULL DEFAULT 0,
            keikokus_participant2 INTEGER NOT NULL DEFAULT 0,
            tournament_name TEXT NOT NULL,
            category_name TEXT NOT NULL,
            match_type TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // The two access paths the resolver queries
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participant_email ON participant(email)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participant_birth_date ON participant(birth_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_match_participants
         ON match_result(id_participant1, id_participant2)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// PARTICIPANT CRUD
// ============================================================================

/// Insert a participant and return the assigned id.
///
/// The email is normalized (lower-cased, trimmed) on the way in - the
/// resolver's email lookups are byte-exact and rely on the write path
/// folding first.
pub fn insert_participant(conn: &Connection, participant: &NewParticipant) -> Result<i64> {
    conn.execute(
        "INSERT INTO participant (
            first_name, last_name, birth_date, email, club, weight, grade
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            participant.first_name,
            participant.last_name,
            participant.birth_date,
            normalize_email(&participant.email),
            participant.club,
            participant.weight,
            participant.grade,
        ],
    )
    .context("Failed to insert participant")?;

    Ok(conn.last_insert_rowid())
}

pub fn get_participant(conn: &Connection, id: i64) -> Result<Option<StoredParticipant>> {
    let participant = conn
        .query_row(
            "SELECT id, first_name, last_name, birth_date, email, club, weight, grade
             FROM participant WHERE id = ?1",
            params![id],
            row_to_participant,
        )
        .optional()?;

    Ok(participant)
}

pub fn get_all_participants(conn: &Connection) -> Result<Vec<StoredParticipant>> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, birth_date, email, club, weight, grade
         FROM participant
         ORDER BY last_name ASC, first_name ASC",
    )?;

    let participants = stmt
        .query_map([], row_to_participant)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(participants)
}

/// Delete a participant; returns false when the id did not exist.
pub fn delete_participant(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM participant WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

pub fn count_participants(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM participant", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<StoredParticipant> {
    Ok(StoredParticipant {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        birth_date: row.get(3)?,
        email: row.get(4)?,
        club: row.get(5)?,
        weight: row.get(6)?,
        grade: row.get(7)?,
    })
}

// ============================================================================
// MATCH RESULTS
// ============================================================================

/// Insert a recorded match result and return the assigned id. The id on the
/// record itself is ignored - the store assigns it.
pub fn insert_match_result(conn: &Connection, result: &MatchRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO match_result (
            id_participant1, id_participant2, id_winner,
            ippons_participant1, ippons_participant2,
            keikokus_participant1, keikokus_participant2,
            tournament_name, category_name, match_type
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            result.id_participant1,
            result.id_participant2,
            result.id_winner,
            result.ippons_participant1,
            result.ippons_participant2,
            result.keikokus_participant1,
            result.keikokus_participant2,
            result.tournament_name,
            result.category_name,
            result.match_type,
        ],
    )
    .context("Failed to insert match result")?;

    Ok(conn.last_insert_rowid())
}

/// All recorded matches a participant appears in, on either side.
pub fn get_matches_for_participant(
    conn: &Connection,
    participant_id: i64,
) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, id_participant1, id_participant2, id_winner,
                ippons_participant1, ippons_participant2,
                keikokus_participant1, keikokus_participant2,
                tournament_name, category_name, match_type
         FROM match_result
         WHERE id_participant1 = ?1 OR id_participant2 = ?1
         ORDER BY id ASC",
    )?;

    let matches = stmt
        .query_map(params![participant_id], |row| {
            Ok(MatchRecord {
                id: row.get(0)?,
                id_participant1: row.get(1)?,
                id_participant2: row.get(2)?,
                id_winner: row.get(3)?,
                ippons_participant1: row.get(4)?,
                ippons_participant2: row.get(5)?,
                keikokus_participant1: row.get(6)?,
                keikokus_participant2: row.get(7)?,
                tournament_name: row.get(8)?,
                category_name: row.get(9)?,
                match_type: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(matches)
}

// ============================================================================
// ROSTER CSV
// ============================================================================

pub fn load_roster_csv(csv_path: &Path) -> Result<Vec<NewParticipant>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open roster CSV")?;

    let mut participants = Vec::new();

    for result in rdr.deserialize() {
        let participant: NewParticipant = result.context("Failed to deserialize roster row")?;
        participants.push(participant);
    }

    Ok(participants)
}

// ============================================================================
// LOOKUP ADAPTER
// ============================================================================

/// `ParticipantLookup` over a SQLite connection. Read-only: the resolver
/// never writes through this.
pub struct SqliteLookup<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLookup<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteLookup { conn }
    }
}

impl ParticipantLookup for SqliteLookup<'_> {
    fn find_by_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<StoredParticipant>, LookupError> {
        self.conn
            .query_row(
                "SELECT id, first_name, last_name, birth_date, email, club, weight, grade
                 FROM participant WHERE email = ?1",
                params![normalized_email],
                row_to_participant,
            )
            .optional()
            .map_err(|e| LookupError::new("find_by_email", e))
    }

    fn find_by_birth_date(&self, birth_date: &str) -> Result<Vec<StoredParticipant>, LookupError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, first_name, last_name, birth_date, email, club, weight, grade
                 FROM participant WHERE birth_date = ?1",
            )
            .map_err(|e| LookupError::new("find_by_birth_date", e))?;

        let participants = stmt
            .query_map(params![birth_date], row_to_participant)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| LookupError::new("find_by_birth_date", e))?;

        Ok(participants)
    }

    fn count_by_email(&self, normalized_email: &str) -> Result<i64, LookupError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM participant WHERE email = ?1",
                params![normalized_email],
                |row| row.get(0),
            )
            .map_err(|e| LookupError::new("count_by_email", e))
    }
}

// ============================================================================
// TESTS
// ============================================================================
