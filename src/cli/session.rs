//! Terminal session loop: clock ticks raced against typed commands, plus
//! the reflection questions asked once the session ends.

use std::io::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::time::MissedTickBehavior;

use crate::catalog::Pattern;
use crate::engine::PracticeEngine;
use crate::history::{BugClass, Reflection, SELF_CONFIDENCE};
use crate::session::{CompletionStatus, Outcome, Phase, Session, SessionClock, SessionEvent};
use crate::RehearseResult;

const HELP: &str = "Commands: Enter/n = next phase, p = pass, f = fail, s = status, q = abandon";

/// Line-oriented input shared by the session loop and the reflection
/// questions. One reader for the whole command so no typed line is lost.
pub struct LineInput<R> {
    lines: Lines<BufReader<R>>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            eof: false,
        }
    }

    /// Next line without its terminator; `None` once input is closed.
    pub async fn next_line(&mut self) -> RehearseResult<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let line = self.lines.next_line().await?;
        if line.is_none() {
            self.eof = true;
        }
        Ok(line)
    }

    /// Prints `prompt` and reads one answer. Closed input answers "".
    pub async fn ask(&mut self, prompt: &str) -> RehearseResult<String> {
        print!("{}: ", prompt);
        std::io::stdout().flush()?;
        let answer = self.next_line().await?.unwrap_or_default();
        if self.eof {
            println!();
        }
        Ok(answer.trim().to_string())
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

/// Runs the clock until the session completes, times out or is abandoned.
pub async fn drive<R: AsyncRead + Unpin>(
    engine: &PracticeEngine,
    clock: &mut SessionClock,
    input: &mut LineInput<R>,
) -> RehearseResult<()> {
    let bar = session_bar(clock.session());
    bar.suspend(|| {
        println!(
            "Session {} · {} ({}) · {} min",
            clock.session().id,
            clock.session().problem.title,
            clock.session().problem.id,
            clock.session().plan.overall_limit().as_secs() / 60
        );
        println!("{}", HELP);
    });

    let interval = Duration::from_millis(engine.config().session.tick_interval_ms.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut quit_armed = false;
    let events = engine.dispatch(clock).await?;
    render(&bar, clock.session(), &events);

    while !clock.status().is_final() {
        tokio::select! {
            _ = ticker.tick() => {
                engine.tick(clock);
            }
            line = input.next_line() => {
                match line? {
                    Some(command) => {
                        quit_armed =
                            handle_command(engine, clock, command.trim(), quit_armed, &bar);
                    }
                    None => {
                        bar.suspend(|| println!("Input closed."));
                        engine.abandon(clock);
                    }
                }
            }
        }

        let events = engine.dispatch(clock).await?;
        render(&bar, clock.session(), &events);
        update_bar(&bar, clock);
    }

    bar.finish_and_clear();
    Ok(())
}

/// Applies one typed command. Returns whether a first `q` is pending.
fn handle_command(
    engine: &PracticeEngine,
    clock: &mut SessionClock,
    command: &str,
    quit_armed: bool,
    bar: &ProgressBar,
) -> bool {
    match command.to_lowercase().as_str() {
        "" | "n" | "next" => {
            if clock.phase().is_done() {
                bar.suspend(|| println!("All phases done. Type p (pass) or f (fail) to finish."));
            } else {
                engine.advance(clock);
            }
        }
        "p" | "pass" => {
            engine.finish(clock, Outcome::Pass);
        }
        "f" | "fail" => {
            engine.finish(clock, Outcome::Fail);
        }
        "q" | "quit" if quit_armed => {
            engine.abandon(clock);
        }
        "q" | "quit" => {
            bar.suspend(|| println!("Press q again to abandon. Abandoned sessions are not recorded."));
            return true;
        }
        "s" | "status" => {
            let session = clock.session();
            let now = chrono::Utc::now();
            bar.suspend(|| {
                println!(
                    "{} · {} in phase · {} left",
                    session.phase.label(),
                    fmt_duration(session.phase_elapsed_at(now)),
                    fmt_duration(session.remaining_at(now))
                )
            });
        }
        "h" | "?" | "help" => bar.suspend(|| println!("{}", HELP)),
        other => bar.suspend(|| println!("Unknown command '{}'. {}", other, HELP)),
    }
    false
}

fn render(bar: &ProgressBar, session: &Session, events: &[SessionEvent]) {
    for event in events {
        bar.suspend(|| match event {
            SessionEvent::PhaseEntered { phase, prompt } if phase.is_done() => {
                println!("\n■ {}", phase.label());
                println!("  {}", prompt);
            }
            SessionEvent::PhaseEntered { phase, prompt } => {
                let target = session.plan.target(*phase);
                if target.is_zero() {
                    println!("\n▶ {}", phase.label());
                } else {
                    println!("\n▶ {} (target {})", phase.label(), fmt_duration(target));
                }
                println!("  {}", prompt);
            }
            SessionEvent::PhaseOverrun { phase, target } => {
                println!(
                    "⚠ {} is past its {} target. Press Enter to move on.",
                    phase.label(),
                    fmt_duration(*target)
                );
            }
            SessionEvent::TimedOut { truncated } => match truncated {
                Some(phase) => println!("\n⏰ Time is up during {}.", phase.label()),
                None => println!("\n⏰ Time is up."),
            },
            SessionEvent::Finished { outcome } => {
                println!(
                    "\n✓ Finished ({}) in {}",
                    outcome,
                    fmt_duration(session.time_to_solution())
                );
            }
            SessionEvent::Abandoned { phase } => {
                println!(
                    "\n✗ Session abandoned during {}. Nothing will be recorded.",
                    phase.label()
                );
            }
        });
    }
}

fn session_bar(session: &Session) -> ProgressBar {
    let bar = ProgressBar::new(session.plan.overall_limit().as_secs());
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_prefix(session.problem.id.clone());
    bar
}

fn update_bar(bar: &ProgressBar, clock: &SessionClock) {
    let session = clock.session();
    let now = chrono::Utc::now();
    bar.set_position(session.elapsed_at(now).as_secs());
    bar.set_message(format!(
        "{} · {} / {}",
        session.phase.label(),
        fmt_duration(session.elapsed_at(now)),
        fmt_duration(session.plan.overall_limit())
    ));
}

/// `mm:ss`.
pub fn fmt_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Asks the postmortem questions for a finished session.
pub async fn collect_reflection<R: AsyncRead + Unpin>(
    clock: &SessionClock,
    input: &mut LineInput<R>,
) -> RehearseResult<Reflection> {
    let session = clock.session();
    let mut reflection = Reflection::default();

    if session.status == CompletionStatus::TimedOut && session.outcome.is_none() {
        while !input.is_eof() {
            let answer = input.ask("Did your tests pass? [p/f]").await?;
            match answer.parse::<Outcome>() {
                Ok(outcome) => {
                    reflection.outcome = Some(outcome);
                    break;
                }
                Err(_) if answer.starts_with(['p', 'P']) => {
                    reflection.outcome = Some(Outcome::Pass);
                    break;
                }
                Err(_) if answer.starts_with(['f', 'F']) => {
                    reflection.outcome = Some(Outcome::Fail);
                    break;
                }
                Err(_) => println!("Please answer p or f."),
            }
        }
    }

    let outcome = match session.status {
        CompletionStatus::TimedOut => reflection.outcome.or(session.outcome),
        _ => session.outcome,
    }
    .unwrap_or(Outcome::Fail);
    let required = if outcome.is_pass() { "optional" } else { "required" };

    println!("\nPostmortem ({})", outcome);

    let pattern = input
        .ask(&format!("Pattern used [{}]", session.problem.pattern))
        .await?;
    if !pattern.is_empty() {
        match pattern.parse::<Pattern>() {
            Ok(p) => reflection.pattern_used = Some(p),
            Err(e) => println!("  {} (keeping {})", e, session.problem.pattern),
        }
    }

    reflection.bug_class = input
        .ask(&format!(
            "Bug class ({}; or your own tag) [{}]",
            BugClass::RECOMMENDED.join(", "),
            required
        ))
        .await?;
    reflection.fix_rule = input
        .ask(&format!("Fix rule, one line for next time [{}]", required))
        .await?;
    reflection.micro_drill = input
        .ask(&format!("Micro-drill to repeat [{}]", required))
        .await?;
    reflection.test_note = input
        .ask(&format!("Regression test to add [{}]", required))
        .await?;
    reflection.notes = input.ask("Notes [optional]").await?;

    loop {
        let answer = input
            .ask(&format!(
                "Confidence {}-{}, 5 = could teach it [optional]",
                SELF_CONFIDENCE.start(),
                SELF_CONFIDENCE.end()
            ))
            .await?;
        if answer.is_empty() {
            break;
        }
        match answer.parse::<u8>() {
            Ok(rating) if SELF_CONFIDENCE.contains(&rating) => {
                reflection.self_confidence = Some(rating);
                break;
            }
            _ => println!(
                "Please answer {} to {}, or leave it empty.",
                SELF_CONFIDENCE.start(),
                SELF_CONFIDENCE.end()
            ),
        }
    }

    Ok(reflection)
}

/// Phase label list used by `start` when it prints the plan.
pub fn plan_lines(session: &Session) -> Vec<String> {
    Phase::ORDER
        .iter()
        .filter(|p| !p.is_done())
        .map(|p| {
            let target = session.plan.target(*p);
            if target.is_zero() {
                format!("  {:<24} checkpoint", p.label())
            } else {
                format!("  {:<24} {}", p.label(), fmt_duration(target))
            }
        })
        .collect()
}
