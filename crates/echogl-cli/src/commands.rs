//! Subcommand handlers

use crate::Command;
use anyhow::{Context, Result, bail};
use echogl_library::{EnrichReport, GameLibrary, GameRecord, LibraryEvent, ScanReport};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

pub async fn run(
    library: &mut GameLibrary,
    mut events: UnboundedReceiver<LibraryEvent>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Scan { no_enrich } => {
            if no_enrich {
                library.set_enrich_after_scan(false);
            }
            let outcome = library.start_scan().await.context("Scan failed")?;
            print_scan_report(&outcome.report);

            while let Ok(event) = events.try_recv() {
                if let LibraryEvent::EnrichFinished(report) = event {
                    print_enrich_report(&report);
                }
            }
        }

        Command::Enrich => {
            library.set_enrich_after_scan(false);
            let outcome = library.start_scan().await.context("Scan failed")?;
            print_scan_report(&outcome.report);

            let report = library.enrich().await.context("Enrichment failed")?;
            print_enrich_report(&report);
        }

        Command::List => {
            let games = library.get_all_games();
            if games.is_empty() {
                println!("No games stored. Run `echogl scan` first.");
            }
            for game in &games {
                let marker = if game.is_enriched() { "*" } else { " " };
                println!("{:>10} {} {}", game.id, marker, game.name);
            }
        }

        Command::Show { id } => {
            let Some(game) = library.get_game(id) else {
                bail!("No game with id {}", id);
            };
            print_game(&game);
        }

        Command::Cover { id, kind, refresh } => {
            let path = library
                .request_cover(id, kind, !refresh)
                .await
                .context("Cover task failed")?;

            let Some(path) = path else {
                bail!("No {} cover available for {}", kind, id);
            };

            if library.get_game(id).is_some()
                && let Err(e) = library.record_cover(id, kind, &path)
            {
                warn!("Could not store cover path: {}", e);
            }
            println!("{}", path.display());
        }

        Command::Launch { id } => {
            if library.get_game(id).is_none() {
                warn!("Game {} is not in the library, launching anyway", id);
            }
            library.launch(id).context("Launch failed")?;
        }
    }

    Ok(())
}

fn print_scan_report(report: &ScanReport) {
    println!(
        "Scanned {} librar{}: {} game(s), {} new, {} updated, {} skipped ({} ms)",
        report.roots,
        if report.roots == 1 { "y" } else { "ies" },
        report.games_found,
        report.games_added,
        report.games_updated,
        report.skipped,
        report.duration_ms
    );
    for error in &report.errors {
        println!("  error: {}", error);
    }
}

fn print_enrich_report(report: &EnrichReport) {
    println!(
        "Enriched {} of {} game(s): {} already done, {} not in catalog, {} failed ({} ms)",
        report.enriched,
        report.candidates,
        report.skipped,
        report.not_found,
        report.failed,
        report.duration_ms
    );
}

fn print_game(game: &GameRecord) {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("{} ({})", game.name, game.id);
    println!("  install path:   {}", game.install_path);
    println!(
        "  catalog id:     {}",
        game.catalog_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("  genres:         {}", show(&game.genres));
    println!("  platforms:      {}", show(&game.platforms));
    println!("  thumbnail:      {}", show(&game.cover_thumbnail_path));
    println!("  detail:         {}", show(&game.cover_detail_path));
    println!("  catalog cover:  {}", show(&game.cover_path));
    println!("  last scanned:   {}", show(&game.last_scanned));
    if let Some(summary) = &game.summary {
        println!();
        println!("{}", summary);
    }
}
