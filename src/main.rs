use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use hub_patcher::apply::{apply_rules, RuleOutcome};
use hub_patcher::artifact;
use hub_patcher::config::{load_from_path, RuleSet};
use hub_patcher::safety::WorkspaceGuard;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "hub-patcher")]
#[command(about = "Fragment-based patching for the 3D hub visualization source", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply rule sets to a workspace
    Apply {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific rule file to apply (otherwise applies all in rules/)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Dry run - fold the rules in memory without writing the artifact
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check which rules would apply without writing anything
    Status {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// List discovered rule sets and their rule ids
    List {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            workspace,
            rules,
            dry_run,
            diff,
        } => cmd_apply(workspace, rules, dry_run, diff),

        Commands::Status { workspace } => cmd_status(workspace),

        Commands::List { workspace } => cmd_list(workspace),
    }
}

/// Helper: Discover all .toml rule files in a rules/ directory.
///
/// Discovery order:
/// 1. `<workspace>/rules` (allows keeping rule files alongside the target).
/// 2. `./rules` relative to the current working directory (typical when
///    running from the hub-patcher repo).
fn discover_rule_files(workspace: &Path) -> Result<Vec<PathBuf>> {
    let cwd_rules_dir = env::current_dir().ok().map(|cwd| cwd.join("rules"));
    let workspace_rules_dir = workspace.join("rules");

    let candidate_dirs: Vec<PathBuf> = std::iter::once(workspace_rules_dir)
        .chain(cwd_rules_dir)
        .collect();

    for rules_dir in candidate_dirs {
        if !rules_dir.exists() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&rules_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml rule files found in either ./rules or {}/rules",
        workspace.display()
    )
}

/// Resolve workspace path using multiple detection strategies
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. HUB_WORKSPACE environment variable
/// 3. Auto-detect by walking up from the current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    // 1. Explicit flag (highest priority)
    if let Some(path) = cli_workspace {
        return Ok(path.canonicalize()?);
    }

    // 2. Environment variable
    if let Ok(env_path) = env::var("HUB_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: HUB_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    // 3. Auto-detect from current directory
    if let Some(path) = auto_detect_workspace() {
        println!(
            "{}",
            format!("Auto-detected workspace: {}", path.display()).dimmed()
        );
        return Ok(path);
    }

    // 4. Helpful error with multiple solutions
    anyhow::bail!(
        "{}\n{}\n  {}\n  {}\n  {}",
        "Could not find hub workspace.".red(),
        "Try one of:".bold(),
        "1. cd into the site checkout: cd /path/to/site && hub-patcher apply",
        "2. Specify explicitly: hub-patcher apply --workspace /path/to/site",
        "3. Set environment variable: export HUB_WORKSPACE=/path/to/site"
    )
}

/// Auto-detect workspace by walking up from the current directory, looking
/// for a rules/ directory that contains at least one .toml file.
fn auto_detect_workspace() -> Option<PathBuf> {
    let current = env::current_dir().ok()?;

    for ancestor in current.ancestors() {
        let rules_dir = ancestor.join("rules");
        if !rules_dir.is_dir() {
            continue;
        }

        let has_toml = std::fs::read_dir(&rules_dir)
            .ok()?
            .flatten()
            .any(|e| e.path().extension().and_then(|s| s.to_str()) == Some("toml"));

        if has_toml {
            return Some(ancestor.to_path_buf());
        }
    }

    None
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

struct Totals {
    replaced: usize,
    already_applied: usize,
    skipped: usize,
    failed: usize,
}

fn report_outcomes(rule_set: &RuleSet, reports: &[hub_patcher::RuleReport], totals: &mut Totals) {
    let artifact = &rule_set.meta.artifact;
    for report in reports {
        match &report.outcome {
            RuleOutcome::Replaced {
                replacements,
                bytes_delta,
            } => {
                println!(
                    "{} {}: Replaced in {} ({} occurrence{}, {:+} bytes)",
                    "✓".green(),
                    report.id,
                    artifact,
                    replacements,
                    if *replacements == 1 { "" } else { "s" },
                    bytes_delta
                );
                totals.replaced += 1;
            }
            RuleOutcome::AlreadyApplied => {
                println!(
                    "{} {}: Already applied to {}",
                    "⊙".yellow(),
                    report.id,
                    artifact
                );
                totals.already_applied += 1;
            }
            RuleOutcome::Skipped { hint } => {
                println!("{} {}: Skipped (no match)", "⊘".cyan(), report.id);
                if let Some(hint) = hint {
                    println!("  {}", format!("nearest candidate: {}", hint).dimmed());
                }
                totals.skipped += 1;
            }
        }
    }
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    rules: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let guard = WorkspaceGuard::new(&workspace)?;

    let rule_files = if let Some(path) = rules {
        vec![path]
    } else {
        discover_rule_files(&workspace)?
    };

    println!("Workspace: {}", workspace.display());
    println!();

    let mut totals = Totals {
        replaced: 0,
        already_applied: 0,
        skipped: 0,
        failed: 0,
    };

    for rule_file in rule_files {
        println!("Loading rules from {}...", rule_file.display());

        let rule_set = match load_from_path(&rule_file) {
            Ok(rs) => rs,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                totals.failed += 1;
                continue;
            }
        };

        if dry_run {
            println!("{}", "  [DRY RUN - artifact will not be written]".cyan());
        }

        let artifact_path = match guard.validate_path(&rule_set.meta.artifact) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), rule_set.meta.name, e);
                totals.failed += rule_set.rules.len();
                continue;
            }
        };

        let original = match artifact::load(&artifact_path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                totals.failed += rule_set.rules.len();
                continue;
            }
        };

        let (patched, reports) = match apply_rules(&original, &rule_set.rules) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                totals.failed += 1;
                continue;
            }
        };

        report_outcomes(&rule_set, &reports, &mut totals);

        if show_diff && patched != original {
            display_diff(&artifact_path, &original, &patched);
        }

        if patched != original && !dry_run {
            // Re-validate right before the write to close the TOCTOU window
            let write_path = match guard.revalidate(&artifact_path) {
                Ok(path) => path,
                Err(e) => {
                    eprintln!("{} {}: {}", "✗".red(), rule_set.meta.name, e);
                    totals.failed += 1;
                    continue;
                }
            };
            if let Err(e) = artifact::save(&write_path, &patched) {
                eprintln!("{} {}", "✗".red(), e);
                totals.failed += 1;
                continue;
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} replaced", format!("{}", totals.replaced).green());
    println!(
        "  {} already applied",
        format!("{}", totals.already_applied).yellow()
    );
    println!("  {} skipped", format!("{}", totals.skipped).cyan());
    println!("  {} failed", format!("{}", totals.failed).red());

    if totals.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let guard = WorkspaceGuard::new(&workspace)?;
    let rule_files = discover_rule_files(&workspace)?;

    println!("{}", "Rule Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut would_apply = Vec::new();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();
    let mut failed = Vec::new();

    // Read-only evaluation: fold in memory, never write
    for rule_file in rule_files {
        let rule_set = match load_from_path(&rule_file) {
            Ok(rs) => rs,
            Err(e) => {
                failed.push((rule_file.display().to_string(), e.to_string()));
                continue;
            }
        };

        let text = match guard
            .validate_path(&rule_set.meta.artifact)
            .map_err(anyhow::Error::from)
            .and_then(|path| artifact::load(&path).map_err(anyhow::Error::from))
        {
            Ok(text) => text,
            Err(e) => {
                failed.push((rule_set.meta.name.clone(), e.to_string()));
                continue;
            }
        };

        let (_, reports) = match apply_rules(&text, &rule_set.rules) {
            Ok(result) => result,
            Err(e) => {
                failed.push((rule_set.meta.name.clone(), e.to_string()));
                continue;
            }
        };

        for report in reports {
            match report.outcome {
                RuleOutcome::Replaced { .. } => would_apply.push(report.id),
                RuleOutcome::AlreadyApplied => applied.push(report.id),
                RuleOutcome::Skipped { hint } => {
                    let reason = match hint {
                        Some(h) => format!("no match; nearest candidate: {h}"),
                        None => "no match".to_string(),
                    };
                    skipped.push((report.id, reason));
                }
            }
        }
    }

    if !would_apply.is_empty() {
        println!(
            "{} {} ({} rules)",
            "✓".green(),
            "WOULD APPLY".green().bold(),
            would_apply.len()
        );
        for id in &would_apply {
            println!("  - {}", id);
        }
        println!();
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊙".yellow(),
            "ALREADY APPLIED".yellow().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "{} {} ({})",
            "✗".red(),
            "FAILED".red().bold(),
            failed.len()
        );
        for (name, reason) in &failed {
            println!("  - {} ({})", name, reason.dimmed());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let rule_files = discover_rule_files(&workspace)?;

    for rule_file in rule_files {
        let rule_set = load_from_path(&rule_file)?;

        println!("{}", rule_set.meta.name.bold());
        if let Some(description) = &rule_set.meta.description {
            println!("  {}", description.dimmed());
        }
        println!("  file: {}", rule_file.display());
        println!("  artifact: {}", rule_set.meta.artifact);
        println!("  rules:");
        for rule in &rule_set.rules {
            println!("    - {}", rule.id);
        }
        println!();
    }

    Ok(())
}
