use anyhow::{bail, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;

use kempo_registry::{
    insert_participant, load_roster_csv, setup_database, Registrant, Resolution, ResolutionEngine,
    SqliteLookup,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => run_import(&args[2..]),
        Some("check") => run_check(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("Kempo Registry - participant identity resolution");
    println!();
    println!("Usage:");
    println!("  kempo-registry import <roster.csv> [registry.db]");
    println!("  kempo-registry check <registry.db> <first> <last> <YYYY-MM-DD> <email>");
}

fn run_import(args: &[String]) -> Result<()> {
    let Some(csv_path) = args.first() else {
        bail!("missing roster CSV path");
    };
    let db_path = args.get(1).map(String::as_str).unwrap_or("registry.db");

    println!("📂 Loading roster...");
    let roster = load_roster_csv(Path::new(csv_path))?;
    println!("✓ Loaded {} roster rows", roster.len());

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Registry opened: {}", db_path);

    let engine = ResolutionEngine::new();

    let mut inserted = 0;
    let mut duplicates = 0;
    let mut conflicts = 0;
    let mut ambiguous = 0;
    let mut invalid = 0;

    println!("\n🔍 Resolving identities...");
    for row in &roster {
        let registrant = row.to_registrant();

        if let Err(errors) = registrant.validate() {
            invalid += 1;
            for e in errors {
                eprintln!(
                    "  ! {} {} skipped: {}",
                    registrant.first_name, registrant.last_name, e
                );
            }
            continue;
        }

        let lookup = SqliteLookup::new(&conn);
        match engine.resolve(&lookup, &registrant)? {
            Resolution::NoMatch => {
                insert_participant(&conn, row)?;
                inserted += 1;
            }
            Resolution::Exact { existing_id } => {
                duplicates += 1;
                println!(
                    "  = {} {} already registered (id {})",
                    registrant.first_name, registrant.last_name, existing_id
                );
            }
            Resolution::EmailConflict { existing } => {
                conflicts += 1;
                println!(
                    "  ✗ {} {}: email {} belongs to {} {} (id {})",
                    registrant.first_name,
                    registrant.last_name,
                    existing.email,
                    existing.first_name,
                    existing.last_name,
                    existing.id
                );
            }
            Resolution::Ambiguous { candidates } => {
                ambiguous += 1;
                println!(
                    "  ? {} {}: {} similar participants need review",
                    registrant.first_name,
                    registrant.last_name,
                    candidates.len()
                );
            }
        }
    }

    println!("\n✓ Inserted: {}", inserted);
    println!("✓ Skipped duplicates: {}", duplicates);
    if conflicts > 0 {
        println!("✗ Email conflicts: {}", conflicts);
    }
    if ambiguous > 0 {
        println!("? Needing review: {}", ambiguous);
    }
    if invalid > 0 {
        println!("! Invalid rows: {}", invalid);
    }

    Ok(())
}

fn run_check(args: &[String]) -> Result<()> {
    let [db_path, first, last, birth_date, email] = args else {
        bail!("usage: check <registry.db> <first> <last> <YYYY-MM-DD> <email>");
    };

    let registrant = Registrant {
        first_name: first.clone(),
        last_name: last.clone(),
        birth_date: birth_date.clone(),
        email: email.clone(),
    };

    if let Err(errors) = registrant.validate() {
        for e in &errors {
            eprintln!("! {}", e);
        }
        bail!("invalid registrant");
    }

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;

    let engine = ResolutionEngine::new();
    let lookup = SqliteLookup::new(&conn);

    match engine.resolve(&lookup, &registrant)? {
        Resolution::Exact { existing_id } => {
            println!("EXACT: already registered as participant {}", existing_id);
        }
        Resolution::EmailConflict { existing } => {
            println!(
                "EMAIL_CONFLICT: {} is held by {} {} (id {}, born {})",
                existing.email,
                existing.first_name,
                existing.last_name,
                existing.id,
                existing.birth_date
            );
        }
        Resolution::Ambiguous { candidates } => {
            println!("AMBIGUOUS: {} similar participants", candidates.len());
            for c in &candidates {
                println!(
                    "  - id {} {} {} ({}, {}) name similarity {:.2}/{:.2}",
                    c.id,
                    c.first_name,
                    c.last_name,
                    c.birth_date,
                    c.club,
                    c.first_name_similarity,
                    c.last_name_similarity
                );
            }
        }
        Resolution::NoMatch => {
            println!("NONE: no existing participant matches - safe to create");
        }
    }

    Ok(())
}
