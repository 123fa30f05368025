use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use toolchain_patcher::config::{self, PatcherConfig};
use toolchain_patcher::discover::{find_candidates, find_wide};
use toolchain_patcher::environment::{check_environment, suggested_export, EnvironmentStatus};
use toolchain_patcher::{
    backup, AssumeYes, Confirm, EndTier, FixError, FixOutcome, Fixer, Question, Recovery,
    SkipReason, StartSource,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolchain-patcher")]
#[command(
    about = "Make CubeMX arm-none-eabi CMake toolchain files resolve the toolchain from the environment",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to $TOOLCHAIN_PATCHER_CONFIG, then <root>/toolchain-patcher.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix toolchain files (searches the root directory when no file is given)
    Fix {
        /// Toolchain files to fix
        files: Vec<PathBuf>,

        /// Directory to search when no file is given
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Answer yes to every question
        #[arg(short, long)]
        yes: bool,

        /// Show what would change without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report the state of toolchain files without modifying them
    Check {
        /// Toolchain files to check
        files: Vec<PathBuf>,

        /// Directory to search when no file is given
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a toolchain file from one of its snapshots
    Restore {
        /// Toolchain file to restore
        file: PathBuf,

        /// Snapshot to restore from (defaults to the newest)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Only list the available snapshots
        #[arg(short, long)]
        list: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Fix {
            files,
            root,
            yes,
            dry_run,
            diff,
        } => cmd_fix(cli.config, files, root, yes, dry_run, diff),

        Commands::Check { files, root, json } => cmd_check(cli.config, files, root, json),

        Commands::Restore {
            file,
            snapshot,
            list,
            yes,
        } => cmd_restore(file, snapshot, list, yes),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("toolchain_patcher={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Asks on the terminal; anything but "y"/"yes" (or end of input) is no.
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, question: &Question) -> bool {
        print!("{} {} ", question, "(y/n):".bold());
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => {
                println!();
                false
            }
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }
}

fn confirm_policy(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalConfirm)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().context("cannot determine current directory")?;
    Ok(cwd.join(path))
}

fn load_config(explicit: Option<&Path>, root: &Path) -> Result<PatcherConfig> {
    config::resolve(explicit, root).context("failed to load configuration")
}

fn banner(title: &str) {
    let rule = "=".repeat(50);
    println!("{}", rule.blue());
    println!("{}", title.bold());
    println!("{}", rule.blue());
    println!();
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Collect the files to work on: explicit paths, or discovery under `root`.
///
/// Returns `None` when nothing was found and the user declined a wider search.
fn collect_targets(
    files: Vec<PathBuf>,
    root: &Path,
    config: &PatcherConfig,
    confirm: &mut dyn Confirm,
) -> Result<Option<Vec<PathBuf>>> {
    if !files.is_empty() {
        return Ok(Some(files));
    }

    println!("No file given, searching {} for toolchain files...", root.display());
    let found = find_candidates(root, &config.discovery.patterns)?;
    if !found.is_empty() {
        println!("Found {} candidate file(s)", found.len());
        return Ok(Some(found));
    }

    println!("{}", "No CMake toolchain file found".yellow());
    println!("  Possible causes: the file was deleted or moved, or lives in an unusual place.");
    println!(
        "  Check for snapshots: ls cmake/*{}*",
        backup::BACKUP_MARKER.trim_matches('.')
    );
    println!("  Or name the file explicitly: toolchain-patcher fix <FILE>");
    println!();

    let question = Question::WidenSearch {
        root: root.to_path_buf(),
    };
    if !confirm.confirm(&question) {
        return Ok(None);
    }

    let wide = find_wide(root);
    if wide.is_empty() {
        return Ok(None);
    }
    println!("Found {} possible toolchain file(s):", wide.len());
    for file in &wide {
        println!("  - {}", file.display());
    }
    Ok(Some(wide))
}

/// Offer snapshot recovery for explicitly named files that do not exist.
fn handle_missing(missing: &[PathBuf], confirm: &mut dyn Confirm) -> Result<()> {
    for file in missing {
        eprintln!("{} File not found: {}", "✗".red(), file.display());
        match toolchain_patcher::recover_missing(file, confirm)? {
            Recovery::NoSnapshots => {
                println!("  No snapshots found. Regenerate the project with STM32CubeMX,");
                println!("  or look for a copy elsewhere.");
            }
            Recovery::Declined { snapshots } => {
                println!("  Available snapshots:");
                for snapshot in &snapshots {
                    println!("    - {}", snapshot.path.display());
                }
                println!("  Restore manually: toolchain-patcher restore {}", file.display());
            }
            Recovery::Restored { snapshot } => {
                println!(
                    "{} Restored {} -> {}",
                    "✓".green(),
                    snapshot.path.display(),
                    file.display()
                );
                println!("  Run the fix again to patch the restored file.");
            }
        }
    }
    Ok(())
}

/// Returns false when the user chose to stop.
fn check_toolchain_env(config: &PatcherConfig, confirm: &mut dyn Confirm) -> bool {
    let var = &config.resolution.env_var;
    match check_environment(var, &config.resolution.tool_prefix) {
        EnvironmentStatus::Unset => {
            println!("{} {} is not set", "⊙".yellow(), var);
            println!("  Suggested:");
            println!("    {}", suggested_export(var));
            println!("    # or add it to ~/.zshrc or ~/.bashrc");
            println!();
            confirm.confirm(&Question::MissingEnvironment { var: var.clone() })
        }
        EnvironmentStatus::Set {
            dir,
            compiler_found,
        } => {
            println!("{} {} = {}", "✓".green(), var, dir.display());
            if !compiler_found {
                println!(
                    "{}",
                    format!(
                        "  Warning: {}gcc not found under {}/bin, check the path",
                        config.resolution.tool_prefix,
                        dir.display()
                    )
                    .yellow()
                );
            }
            true
        }
    }
}

fn cmd_fix(
    config_path: Option<PathBuf>,
    files: Vec<PathBuf>,
    root: PathBuf,
    yes: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    banner("CubeMX CMake toolchain fixer");
    let mut confirm = confirm_policy(yes);
    let config = load_config(config_path.as_deref(), &root)?;

    // 1. Explicit files must exist; otherwise offer recovery and stop
    let explicit: Vec<PathBuf> = files.iter().map(|f| absolute(f)).collect::<Result<_>>()?;
    let missing: Vec<PathBuf> = explicit.iter().filter(|f| !f.exists()).cloned().collect();
    if !missing.is_empty() {
        handle_missing(&missing, confirm.as_mut())?;
        std::process::exit(1);
    }

    // 2. Determine target files
    let Some(targets) = collect_targets(explicit, &root, &config, confirm.as_mut())? else {
        eprintln!("{}", "No toolchain files to fix".red());
        std::process::exit(1);
    };

    // 3. Check the toolchain environment variable
    if !check_toolchain_env(&config, confirm.as_mut()) {
        println!("Stopped; nothing was changed.");
        return Ok(());
    }

    if dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
    }

    // 4. Fix each file
    let fixer = Fixer::new(&config.resolution).with_dry_run(dry_run);
    let results = fixer.fix_batch(&targets, confirm.as_mut());

    let mut total_fixed = 0;
    let mut total_skipped = 0;
    let mut total_failed = 0;

    for (file, result) in results {
        println!();
        match result {
            Ok(FixOutcome::Fixed {
                file,
                snapshot,
                plan,
                overridden,
            }) => {
                println!("{} Fixed {}", "✓".green(), file.display());
                print_overrides(&overridden);
                println!("  Snapshot: {}", snapshot.path.display());
                print_plan_summary(&plan);
                if show_diff {
                    display_diff(&file, &plan.original, &plan.patched);
                }
                total_fixed += 1;
            }
            Ok(FixOutcome::WouldFix {
                file,
                plan,
                overridden,
            }) => {
                println!("{} Would fix {}", "✓".green(), file.display());
                print_overrides(&overridden);
                print_plan_summary(&plan);
                if show_diff {
                    display_diff(&file, &plan.original, &plan.patched);
                }
                total_fixed += 1;
            }
            Ok(FixOutcome::Skipped { file, reason }) => {
                println!("{} Skipped {} ({})", "⊘".cyan(), file.display(), reason);
                total_skipped += 1;
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                if let FixError::RegionNotFound { .. } = e {
                    eprintln!("  The file may not be a standard STM32CubeMX toolchain file.");
                }
                if let FixError::Write { snapshot, .. } = &e {
                    eprintln!(
                        "  Restore with: toolchain-patcher restore {} --snapshot {}",
                        file.display(),
                        snapshot.display()
                    );
                }
                total_failed += 1;
            }
        }
    }

    // 5. Summary
    println!();
    println!("{}", "Summary:".bold());
    let fixed_label = if dry_run { "would be fixed" } else { "fixed" };
    println!("  {} {}", format!("{}", total_fixed).green(), fixed_label);
    println!("  {} skipped", format!("{}", total_skipped).cyan());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_fixed > 0 && !dry_run {
        println!();
        println!("Try building:");
        println!("  cmake --preset Debug");
        println!("  cmake --build --preset Debug");
        println!("If {} is not set yet:", config.resolution.env_var);
        println!("  {}", suggested_export(&config.resolution.env_var));
    }

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_overrides(overridden: &[SkipReason]) {
    for reason in overridden {
        let line = match reason {
            SkipReason::NotTargetDialect => "  Warning: may not be a CubeMX toolchain file",
            SkipReason::AlreadyFixed => "  Warning: already referenced the toolchain variable, patched again",
            SkipReason::NoChange => continue,
        };
        println!("{}", line.yellow());
    }
}

fn print_plan_summary(plan: &toolchain_patcher::FixPlan) {
    let region = plan.region.region;
    let start = match plan.region.start_source {
        StartSource::Anchor => "prefix declaration",
        StartSource::CompilerIdentifier { .. } => "after compiler ID settings",
        StartSource::ExistingBlock { .. } => "previous resolution block",
    };
    let end = match plan.region.end_tier {
        EndTier::SectionMarker { .. } => "next section",
        EndTier::SizeDeclaration { .. } => "size tool declaration",
        EndTier::DefaultWindow => "default window",
        EndTier::ExistingBlock { .. } => "end of previous resolution block",
    };
    println!(
        "  Replaced lines {}-{} (start: {}, end: {})",
        region.start + 1,
        region.end,
        start,
        end
    );
    if plan.splice.dropped > 0 {
        println!(
            "  Dropped {} superseded line(s) after the block",
            plan.splice.dropped
        );
    }
    if plan.splice.next_section.is_none() {
        println!(
            "{}",
            "  Warning: no following section found; kept remaining lines minus toolchain declarations"
                .yellow()
        );
    }
}

fn cmd_check(
    config_path: Option<PathBuf>,
    files: Vec<PathBuf>,
    root: PathBuf,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path.as_deref(), &root)?;
    let targets = if files.is_empty() {
        find_candidates(&root, &config.discovery.patterns)?
    } else {
        files.iter().map(|f| absolute(f)).collect::<Result<_>>()?
    };

    let fixer = Fixer::new(&config.resolution);
    let mut inspections = Vec::new();
    let mut failed = 0;

    for file in &targets {
        match fixer.inspect(file) {
            Ok(inspection) => inspections.push(inspection),
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                failed += 1;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&inspections)?);
    } else {
        println!("{}", "Toolchain File Status".bold());
        println!();
        if inspections.is_empty() && failed == 0 {
            println!("{}", "No toolchain files found".yellow());
        }
        for inspection in &inspections {
            let state = if inspection.already_fixed {
                "FIXED".green().bold()
            } else if inspection.target_dialect {
                "NEEDS FIX".yellow().bold()
            } else {
                "UNRECOGNIZED".cyan().bold()
            };
            println!("{} {}", state, inspection.file.display());
            match &inspection.region {
                Some(report) => println!(
                    "  toolchain block: lines {}-{} (anchor at line {})",
                    report.region.start + 1,
                    report.region.end,
                    report.anchor + 1
                ),
                None => println!("  {}", "no TOOLCHAIN_PREFIX definition".dimmed()),
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_restore(file: PathBuf, snapshot: Option<PathBuf>, list: bool, yes: bool) -> Result<()> {
    let file = absolute(&file)?;
    let snapshots = backup::list_snapshots(&file)?;

    if list {
        if snapshots.is_empty() {
            println!("No snapshots of {}", file.display());
        }
        for s in &snapshots {
            println!("{}", s.path.display());
        }
        return Ok(());
    }

    let source = match snapshot {
        Some(path) => absolute(&path)?,
        None => match snapshots.last() {
            Some(latest) => latest.path.clone(),
            None => anyhow::bail!("No snapshots of {} found", file.display()),
        },
    };

    let mut confirm = confirm_policy(yes);
    let question = Question::RestoreSnapshot {
        file: file.clone(),
        snapshot: source.clone(),
    };
    if !confirm.confirm(&question) {
        println!("Nothing restored.");
        return Ok(());
    }

    backup::restore(&file, &source)
        .with_context(|| format!("failed to restore {}", file.display()))?;
    println!(
        "{} Restored {} -> {}",
        "✓".green(),
        source.display(),
        file.display()
    );
    Ok(())
}
