//! CLI command implementations.

use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Mode, Pattern};
use crate::engine::{PracticeEngine, StartOptions};
use crate::history::{recorder, HistoryStore, Postmortem};
use crate::progress::PatternStatus;
use crate::types::config::{Config, CONFIG_FILE};
use crate::types::errors::RehearseError;
use crate::RehearseResult;

use super::session::{self as live, fmt_duration, LineInput};

/// Creates `rehearse.toml` and `.rehearse/` in the target directory.
pub async fn init(path: Option<PathBuf>) -> RehearseResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!(path = %target_dir.display(), "Directory created");
    }

    let config_path = target_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use 'rehearse config' to modify.");
        return Ok(());
    }

    let data_dir = target_dir.join(".rehearse");
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!(".rehearse/ directory created");
    }

    update_gitignore(&target_dir)?;

    Config::default_config().save(&config_path)?;

    println!("rehearse initialized.");
    println!("Configuration: {}", config_path.display());
    println!("History:       .rehearse/history.db");
    println!();
    println!("Next steps:");
    println!("  1. Browse problems:    rehearse problems");
    println!("  2. Run a session:      rehearse start --mode core");
    println!("  3. Check your progress: rehearse progress");

    Ok(())
}

/// Adds `.rehearse/` to .gitignore, creating the file if needed.
fn update_gitignore(target_dir: &Path) -> RehearseResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = ".rehearse/";
    let comment = "# rehearse - local session history";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;
        if content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == ".rehearse")
        {
            tracing::debug!(".gitignore already lists .rehearse/");
            return Ok(());
        }

        let mut updated = content.trim_end().to_string();
        if !updated.is_empty() {
            updated.push_str("\n\n");
        }
        updated.push_str(comment);
        updated.push('\n');
        updated.push_str(entry);
        updated.push('\n');

        std::fs::write(&gitignore_path, updated)?;
        println!(".gitignore updated with .rehearse/");
    } else {
        std::fs::write(&gitignore_path, format!("{}\n{}\n", comment, entry))?;
        println!(".gitignore created with .rehearse/");
    }

    Ok(())
}

/// Engine for read-only commands. A missing history file reads as empty
/// instead of being created.
fn open_engine(config: &Config) -> RehearseResult<PracticeEngine> {
    let catalog = Catalog::from_config(&config.catalog)?;
    let store = if config.history.db_path.exists() {
        HistoryStore::from_config(&config.history)?
    } else {
        HistoryStore::open_in_memory()?
    };
    Ok(PracticeEngine::new(config.clone(), catalog, store))
}

fn parse_mode(mode: &str) -> RehearseResult<Mode> {
    mode.parse()
}

/// Runs one timed session and records its postmortem.
pub async fn start(
    mode: &str,
    pattern: Option<&str>,
    problem: Option<String>,
    duration: Option<u64>,
    config: &Config,
) -> RehearseResult<()> {
    let mut options = StartOptions::new(parse_mode(mode)?);
    if let Some(pattern) = pattern {
        options = options.with_pattern(pattern.parse()?);
    }
    options.problem_id = problem;
    options.duration_mins = duration;

    let mut engine = PracticeEngine::from_config(config.clone())?;
    let mut clock = engine.start(&options)?;

    println!("Plan:");
    for line in live::plan_lines(clock.session()) {
        println!("{}", line);
    }
    println!();

    let mut input = LineInput::new(tokio::io::stdin());
    live::drive(&engine, &mut clock, &mut input).await?;

    if !clock.status().is_recordable() {
        return Ok(());
    }

    let postmortem = loop {
        let reflection = live::collect_reflection(&clock, &mut input).await?;
        match recorder::prepare(clock.session(), &reflection) {
            Ok(postmortem) => break postmortem,
            Err(RehearseError::MissingReflection(fields)) if !input.is_eof() => {
                println!(
                    "✗ A failed session needs: {}. Let's go through it again.\n",
                    fields.join(", ")
                );
            }
            Err(e) => return Err(e),
        }
    };

    loop {
        match engine.append(&postmortem).await {
            Ok(stored) => {
                println!("\n✓ Postmortem recorded ({})", stored.session_id);
                break;
            }
            Err(e) if e.is_retryable() => {
                println!("\n✗ Could not write history: {}", e);
                let answer = input.ask("Retry? [Y/n]").await?;
                if input.is_eof() || answer.eq_ignore_ascii_case("n") {
                    print_unsaved(&postmortem)?;
                    return Ok(());
                }
            }
            Err(e) => {
                print_unsaved(&postmortem)?;
                return Err(e);
            }
        }
    }

    if let Some(weakest) = engine.weakest_pattern(options.mode)? {
        println!("Weakest {} pattern right now: {}", options.mode, weakest);
    }

    Ok(())
}

fn print_unsaved(postmortem: &Postmortem) -> RehearseResult<()> {
    println!("Postmortem was not saved. Keep a copy:");
    println!("{}", serde_json::to_string_pretty(postmortem)?);
    Ok(())
}

/// Lists catalog problems.
pub async fn problems(mode: Option<&str>, pattern: Option<&str>, config: &Config) -> RehearseResult<()> {
    let catalog = Catalog::from_config(&config.catalog)?;
    let pattern = pattern.map(str::parse::<Pattern>).transpose()?;
    let modes = match mode {
        Some(mode) => vec![parse_mode(mode)?],
        None => Mode::ALL.to_vec(),
    };

    for mode in modes {
        let problems = catalog.list(mode, pattern);
        if problems.is_empty() {
            continue;
        }
        println!("{} ({} problems)", mode, problems.len());
        for problem in problems {
            println!(
                "  {:<36} {:<8} {}",
                problem.id, problem.difficulty, problem.title
            );
        }
        println!();
    }

    Ok(())
}

/// Prints the progress dashboard.
pub async fn progress(mode: &str, json: bool, config: &Config) -> RehearseResult<()> {
    let mode = parse_mode(mode)?;
    let engine = open_engine(config)?;
    let dashboard = engine.dashboard(mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    println!("Progress ({})\n", mode);
    println!(
        "Sessions: {}   Passed: {}   Streak: {} day(s)",
        dashboard.total_sessions, dashboard.passes, dashboard.streak_days
    );
    println!();
    println!(
        "  {:<18} {:>8} {:>6} {:>10} {:>9}  status",
        "pattern", "attempts", "pass%", "confidence", "avg time"
    );
    for row in &dashboard.patterns {
        let icon = match row.status {
            PatternStatus::Mastered => "✓",
            PatternStatus::Practicing => "~",
            PatternStatus::NeedsWork => "✗",
            PatternStatus::NotStarted => "○",
        };
        println!(
            "{} {:<18} {:>8} {:>5.0}% {:>10.2} {:>9}  {}",
            icon,
            row.stat.pattern,
            row.stat.attempts,
            row.stat.pass_rate * 100.0,
            row.stat.confidence,
            row.stat
                .avg_time_to_solution
                .map(fmt_duration)
                .unwrap_or_else(|| "-".to_string()),
            row.status
        );
    }

    if !dashboard.pending_drills.is_empty() {
        println!("\nMicro-drills to repeat:");
        for drill in &dashboard.pending_drills {
            println!("  • [{}] {}", drill.pattern, drill.drill);
        }
    }

    Ok(())
}

/// Prints the weakest pattern and the ranking behind it.
pub async fn weakest(mode: &str, config: &Config) -> RehearseResult<()> {
    let mode = parse_mode(mode)?;
    let engine = open_engine(config)?;

    match engine.weakest_pattern(mode)? {
        Some(pattern) => println!("Weakest {} pattern: {}", mode, pattern),
        None => {
            println!("No {} problems in the catalog.", mode);
            return Ok(());
        }
    }

    println!("\nRanking (weakest first):");
    for (i, stat) in engine.ranked_patterns(mode)?.iter().enumerate() {
        println!(
            "  {}. {:<18} confidence {:.2} over {} attempt(s)",
            i + 1,
            stat.pattern,
            stat.confidence,
            stat.attempts
        );
    }

    Ok(())
}

/// Prints bug-class frequencies.
pub async fn bugs(config: &Config) -> RehearseResult<()> {
    let engine = open_engine(config)?;
    let histogram = engine.bug_class_histogram()?;

    if histogram.is_empty() {
        println!("No failed sessions recorded.");
        return Ok(());
    }

    let widest = histogram.iter().map(|(_, n)| *n).max().unwrap_or(1);
    println!("Bug classes (failed sessions):");
    for (class, count) in histogram {
        let bar = "█".repeat((count * 20).div_ceil(widest));
        println!("  {:<20} {:>3} {}", class, count, bar);
    }

    Ok(())
}

/// Prints a pattern's time-to-solution series.
pub async fn trend(pattern: &str, config: &Config) -> RehearseResult<()> {
    let pattern: Pattern = pattern.parse()?;
    let engine = open_engine(config)?;
    let points = engine.trend(pattern)?;

    if points.is_empty() {
        println!("No sessions recorded for {}.", pattern);
        return Ok(());
    }

    println!("Trend for {}:", pattern);
    for point in &points {
        let icon = if point.outcome.is_pass() { "✓" } else { "✗" };
        println!(
            "  {} {}  {}",
            icon,
            point.at.format("%Y-%m-%d %H:%M"),
            fmt_duration(point.time_to_solution)
        );
    }

    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if points.len() > 1 {
            let delta = last.time_to_solution.as_secs() as i64 - first.time_to_solution.as_secs() as i64;
            let direction = if delta < 0 { "faster" } else { "slower" };
            println!(
                "\n{} than the first attempt by {}",
                direction,
                fmt_duration(std::time::Duration::from_secs(delta.unsigned_abs()))
            );
        }
    }

    Ok(())
}

fn no_history(config: &Config) -> bool {
    if config.history.db_path.exists() {
        return false;
    }
    println!("No history yet.");
    println!("Run 'rehearse start' to record your first session.");
    true
}

fn print_postmortem_line(postmortem: &Postmortem) {
    let icon = if postmortem.is_pass() { "✓" } else { "✗" };
    println!(
        "{} {}  {:<36} {:>6}  {}",
        icon,
        postmortem.recorded_at.format("%Y-%m-%d %H:%M"),
        postmortem.problem_id,
        fmt_duration(postmortem.time_to_solution()),
        postmortem
            .bug_class
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default()
    );
}

/// Lists the most recent postmortems.
pub async fn history(limit: usize, config: &Config) -> RehearseResult<()> {
    if no_history(config) {
        return Ok(());
    }

    let store = HistoryStore::from_config(&config.history)?;
    let records = store.all()?;
    println!("{} postmortem(s) recorded\n", records.len());

    let skip = records.len().saturating_sub(limit);
    for postmortem in records.iter().skip(skip).rev() {
        print_postmortem_line(postmortem);
    }

    Ok(())
}

/// Shows the most recent postmortem in full.
pub async fn last(config: &Config) -> RehearseResult<()> {
    if no_history(config) {
        return Ok(());
    }

    let store = HistoryStore::from_config(&config.history)?;
    let Some(pm) = store.last()? else {
        println!("No postmortems recorded yet.");
        return Ok(());
    };

    println!("Session:   {}", pm.session_id);
    println!("Problem:   {} ({}, {})", pm.problem_id, pm.pattern, pm.mode);
    println!("Outcome:   {} ({})", pm.outcome, pm.completion_status);
    println!("Time:      {}", fmt_duration(pm.time_to_solution()));
    if let Some(rating) = pm.self_confidence {
        println!("Rating:    {}/5", rating);
    }
    if let Some(phase) = pm.truncated_phase {
        println!("Cut off:   {}", phase.label());
    }
    if let Some(class) = &pm.bug_class {
        println!("Bug class: {}", class);
    }
    for (label, value) in [
        ("Fix rule", &pm.fix_rule),
        ("Drill", &pm.micro_drill),
        ("Test", &pm.test_note),
        ("Notes", &pm.notes),
    ] {
        if !value.is_empty() {
            println!("{:<10} {}", format!("{}:", label), value);
        }
    }
    println!("Recorded:  {}", pm.recorded_at.to_rfc3339());

    Ok(())
}

/// Writes the history as JSON Lines.
pub async fn export(output: &Path, config: &Config) -> RehearseResult<()> {
    if no_history(config) {
        return Ok(());
    }

    let store = HistoryStore::from_config(&config.history)?;
    let count = store.export_jsonl(output)?;
    println!("✓ {} postmortem(s) exported to {}", count, output.display());

    Ok(())
}

/// Re-hashes every record.
pub async fn verify(config: &Config) -> RehearseResult<()> {
    if no_history(config) {
        return Ok(());
    }

    let store = HistoryStore::from_config(&config.history)?;
    let report = store.verify()?;

    if report.is_clean() {
        println!("✓ {} record(s) verified", report.total);
        return Ok(());
    }

    println!("✗ {} of {} record(s) failed verification", report.corrupted.len(), report.total);
    for seq in &report.corrupted {
        println!("  record #{}", seq);
    }
    Err(RehearseError::other(format!(
        "{} corrupted history record(s)",
        report.corrupted.len()
    )))
}

/// Edits configuration interactively.
pub async fn config_cmd(config_path: &Path) -> RehearseResult<()> {
    use super::interactive::{run_interactive_config, show_config_summary};

    if config_path.exists() {
        let config = Config::load(config_path)?;
        show_config_summary(&config);
    }

    run_interactive_config(config_path)
}

/// Checks configuration, catalog and history.
pub async fn doctor(config: &Config) -> RehearseResult<()> {
    println!("Checking rehearse setup...\n");

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    println!("✓ Configuration loaded");
    for issue in config.validate() {
        issues.push(issue);
    }

    match Catalog::from_config(&config.catalog) {
        Ok(catalog) => {
            println!("✓ Catalog: {} problems", catalog.len());
            for mode in Mode::ALL {
                let missing: Vec<String> = mode
                    .patterns()
                    .iter()
                    .filter(|p| catalog.list(mode, Some(**p)).is_empty())
                    .map(|p| p.to_string())
                    .collect();
                if !missing.is_empty() {
                    warnings.push(format!(
                        "{} patterns without problems: {}",
                        mode,
                        missing.join(", ")
                    ));
                }
            }
        }
        Err(e) => issues.push(format!("Catalog could not be loaded: {}", e)),
    }

    if config.history.db_path.exists() {
        match HistoryStore::from_config(&config.history).and_then(|s| s.verify()) {
            Ok(report) if report.is_clean() => {
                println!("✓ History: {} record(s), digests intact", report.total)
            }
            Ok(report) => issues.push(format!(
                "{} history record(s) failed verification",
                report.corrupted.len()
            )),
            Err(e) => issues.push(format!("History unavailable: {}", e)),
        }
    } else {
        warnings.push(format!(
            "No history at {} yet (created by the first session)",
            config.history.db_path.display()
        ));
    }

    println!();
    if issues.is_empty() && warnings.is_empty() {
        println!("✓ All good. rehearse is ready.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for warning in warnings {
                println!("  ⚠ {}", warning);
            }
        }
        if !issues.is_empty() {
            println!("Problems:");
            for issue in &issues {
                println!("  ✗ {}", issue);
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(RehearseError::other(format!(
            "doctor found {} problem(s)",
            issues.len()
        )))
    }
}

/// Shows version.
pub fn version() {
    println!("rehearse {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Timed interview rehearsal: phase timer, postmortems, weak-spot analytics");
}
