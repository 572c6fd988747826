//! Interactive configuration editor.

use std::path::Path;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::catalog::Mode;
use crate::types::config::{Config, ModePlanConfig};
use crate::RehearseResult;

/// Runs the configuration menu and saves on request.
pub fn run_interactive_config(config_path: &Path) -> RehearseResult<()> {
    let theme = ColorfulTheme::default();

    println!("\n🔧 rehearse configuration\n");

    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        println!("Creating a new configuration...\n");
        Config::default_config()
    };

    loop {
        let options = vec![
            "General",
            "Session timer",
            "Problem selection",
            "Progress scoring",
            "Storage",
            "Save and quit",
            "Quit without saving",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What do you want to configure?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_general(&theme, &mut config)?,
            1 => configure_session(&theme, &mut config)?,
            2 => configure_selector(&theme, &mut config)?,
            3 => configure_progress(&theme, &mut config)?,
            4 => configure_storage(&theme, &mut config)?,
            5 => {
                let issues = config.validate();
                if !issues.is_empty() {
                    println!("\n✗ Not saved, fix these first:");
                    for issue in issues {
                        println!("  - {}", issue);
                    }
                    println!();
                    continue;
                }
                config.save(config_path)?;
                println!("\n✓ Configuration saved to: {}\n", config_path.display());
                break;
            }
            6 => {
                if Confirm::with_theme(&theme)
                    .with_prompt("Really quit without saving?")
                    .default(false)
                    .interact()?
                {
                    println!("\nLeaving without saving.\n");
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn configure_general(theme: &ColorfulTheme, config: &mut Config) -> RehearseResult<()> {
    println!("\n📋 General\n");

    let log_levels = vec!["error", "warn", "info", "debug", "trace"];
    let current_idx = log_levels
        .iter()
        .position(|&l| l == config.general.log_level)
        .unwrap_or(1);

    let log_level_idx = Select::with_theme(theme)
        .with_prompt("Log level")
        .items(&log_levels)
        .default(current_idx)
        .interact()?;
    config.general.log_level = log_levels[log_level_idx].to_string();

    let log_formats = vec!["text", "json"];
    let current_format_idx = log_formats
        .iter()
        .position(|&f| f == config.general.log_format)
        .unwrap_or(0);

    let log_format_idx = Select::with_theme(theme)
        .with_prompt("Log format")
        .items(&log_formats)
        .default(current_format_idx)
        .interact()?;
    config.general.log_format = log_formats[log_format_idx].to_string();

    println!("\n✓ General settings updated.\n");
    Ok(())
}

fn configure_session(theme: &ColorfulTheme, config: &mut Config) -> RehearseResult<()> {
    println!("\n⏱  Session timer\n");

    config.session.auto_advance = Confirm::with_theme(theme)
        .with_prompt("Advance automatically when a phase target elapses?")
        .default(config.session.auto_advance)
        .interact()?;

    config.session.bell = Confirm::with_theme(theme)
        .with_prompt("Ring the terminal bell on phase changes?")
        .default(config.session.bell)
        .interact()?;

    let modes = vec!["core", "specialized", "Back"];
    loop {
        let selection = Select::with_theme(theme)
            .with_prompt("Edit phase targets for")
            .items(&modes)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_plan(theme, Mode::Core, &mut config.session.core)?,
            1 => configure_plan(theme, Mode::Specialized, &mut config.session.specialized)?,
            _ => break,
        }
    }

    Ok(())
}

fn configure_plan(theme: &ColorfulTheme, mode: Mode, plan: &mut ModePlanConfig) -> RehearseResult<()> {
    println!("\n⚙️  {} plan (minutes)\n", mode);

    plan.overall_limit_mins = Input::with_theme(theme)
        .with_prompt("Overall limit")
        .default(plan.overall_limit_mins)
        .validate_with(|v: &u64| if *v > 0 { Ok(()) } else { Err("must be > 0") })
        .interact_text()?;

    let targets = &mut plan.targets;
    for (label, value) in [
        ("Restate problem", &mut targets.restate_problem),
        ("Write tests", &mut targets.write_tests),
        ("Baseline prompt", &mut targets.baseline_prompt),
        ("Implement", &mut targets.implement),
        ("Invariant prompt", &mut targets.invariant_prompt),
        ("Edge cases", &mut targets.edge_cases),
    ] {
        *value = Input::with_theme(theme)
            .with_prompt(label)
            .default(*value)
            .interact_text()?;
    }

    if plan.targets.total() > plan.overall_limit_mins {
        println!(
            "⚠ Targets add up to {} min, over the {} min limit.",
            plan.targets.total(),
            plan.overall_limit_mins
        );
    }

    println!("\n✓ {} plan updated.\n", mode);
    Ok(())
}

fn configure_selector(theme: &ColorfulTheme, config: &mut Config) -> RehearseResult<()> {
    println!("\n🎯 Problem selection\n");

    config.selector.exclude_recent = Input::with_theme(theme)
        .with_prompt("Skip the N most recently practised problems")
        .default(config.selector.exclude_recent)
        .interact_text()?;

    println!("\n✓ Selection updated.\n");
    Ok(())
}

fn configure_progress(theme: &ColorfulTheme, config: &mut Config) -> RehearseResult<()> {
    println!("\n📈 Progress scoring\n");

    let progress = &mut config.progress;

    progress.decay = Input::with_theme(theme)
        .with_prompt("Weight decay per older attempt (0-1]")
        .default(progress.decay)
        .validate_with(|v: &f64| {
            if *v > 0.0 && *v <= 1.0 {
                Ok(())
            } else {
                Err("must be in (0, 1]")
            }
        })
        .interact_text()?;

    progress.min_samples = Input::with_theme(theme)
        .with_prompt("Attempts before a score is trusted")
        .default(progress.min_samples)
        .interact_text()?;

    progress.reliable_threshold = Input::with_theme(theme)
        .with_prompt("Reliable threshold (0-1)")
        .default(progress.reliable_threshold)
        .interact_text()?;

    progress.mastery_threshold = Input::with_theme(theme)
        .with_prompt("Mastery threshold (0-1)")
        .default(progress.mastery_threshold)
        .interact_text()?;

    println!("\n✓ Scoring updated.\n");
    Ok(())
}

fn configure_storage(theme: &ColorfulTheme, config: &mut Config) -> RehearseResult<()> {
    println!("\n💾 Storage\n");

    let db_path: String = Input::with_theme(theme)
        .with_prompt("History database")
        .default(config.history.db_path.display().to_string())
        .interact_text()?;
    config.history.db_path = db_path.into();

    let catalog: String = Input::with_theme(theme)
        .with_prompt("Catalog file (empty for the bundled catalog)")
        .default(
            config
                .catalog
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()?;
    config.catalog.path = match catalog.trim() {
        "" => None,
        path => Some(path.into()),
    };

    println!("\n✓ Storage updated.\n");
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Prints the current configuration.
pub fn show_config_summary(config: &Config) {
    println!("\n┌─────────────────────────────────────────┐");
    println!("│         Current configuration           │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Log level: {:<28} │", config.general.log_level);
    println!("│ Log format: {:<27} │", config.general.log_format);
    println!("├─────────────────────────────────────────┤");
    println!("│ Session                                 │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Auto-advance: {:<25} │", yes_no(config.session.auto_advance));
    println!("│ Bell: {:<33} │", yes_no(config.session.bell));
    for mode in Mode::ALL {
        let plan = config.session.plan_for(mode);
        println!(
            "│ {:<12} {:<26} │",
            format!("{}:", mode),
            format!(
                "{} min ({} min in targets)",
                plan.overall_limit_mins,
                plan.targets.total()
            )
        );
    }
    println!("├─────────────────────────────────────────┤");
    println!("│ Selection and scoring                   │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Skip recent: {:<26} │", config.selector.exclude_recent);
    println!("│ Decay: {:<32} │", config.progress.decay);
    println!("│ Min samples: {:<26} │", config.progress.min_samples);
    println!(
        "│ Reliable / mastery: {:<19} │",
        format!(
            "{:.2} / {:.2}",
            config.progress.reliable_threshold, config.progress.mastery_threshold
        )
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Storage                                 │");
    println!("├─────────────────────────────────────────┤");
    println!("│ History: {:<30} │", config.history.db_path.display());
    println!(
        "│ Catalog: {:<30} │",
        config
            .catalog
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "bundled".to_string())
    );
    println!("└─────────────────────────────────────────┘");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_config_summary() {
        let mut config = Config::default_config();
        show_config_summary(&config);

        config.catalog.path = Some("catalog.toml".into());
        show_config_summary(&config);
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(yes_no(true), "yes");
        assert_eq!(yes_no(false), "no");
    }
}
