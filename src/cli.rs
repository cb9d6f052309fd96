use crate::{
    catalog,
    engine::{LoadOrderEngine, ResolveReport},
    lookup::TableLookup,
    profile::{self, LoadProfile},
};
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    catalog: Option<PathBuf>,
    profile: Option<PathBuf>,
    lookup: Option<PathBuf>,
    format: OutputFormat,
    write: bool,
}

enum CliCommand {
    List,
    Inactive,
    Sort,
    Resolve,
    Check,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, options) = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("loadsmith v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        _ => run_command(command, options),
    }
}

fn parse_args(args: &[String]) -> Result<(CliCommand, GlobalOptions)> {
    let mut command = None;
    let mut options = GlobalOptions {
        catalog: None,
        profile: None,
        lookup: None,
        format: OutputFormat::Text,
        write: false,
    };

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--catalog" | "-c" => {
                let Some(path) = iter.next() else {
                    bail!("--catalog requires a path");
                };
                options.catalog = Some(PathBuf::from(path));
            }
            "--profile" | "-p" => {
                let Some(path) = iter.next() else {
                    bail!("--profile requires a path");
                };
                options.profile = Some(PathBuf::from(path));
            }
            "--lookup" => {
                let Some(path) = iter.next() else {
                    bail!("--lookup requires a path");
                };
                options.lookup = Some(PathBuf::from(path));
            }
            "--format" | "-f" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires text or json");
                };
                let Some(format) = OutputFormat::parse(value) else {
                    bail!("unknown format {value}");
                };
                options.format = format;
            }
            "--write" | "-w" => options.write = true,
            "--help" | "-h" | "help" => command = Some(CliCommand::Help),
            "--version" | "-V" | "version" => command = Some(CliCommand::Version),
            "list" => command = Some(CliCommand::List),
            "inactive" => command = Some(CliCommand::Inactive),
            "sort" => command = Some(CliCommand::Sort),
            "resolve" => command = Some(CliCommand::Resolve),
            "check" => command = Some(CliCommand::Check),
            other => bail!("unknown argument {other}"),
        }
    }

    Ok((command.unwrap_or(CliCommand::Help), options))
}

fn run_command(command: CliCommand, options: GlobalOptions) -> Result<()> {
    let Some(catalog_path) = options.catalog.clone() else {
        bail!("--catalog <path> is required");
    };
    let catalog = catalog::load_catalog(&catalog_path)?;

    let profile_path = match options.profile.clone() {
        Some(path) => path,
        None => profile::default_profile_path()?,
    };
    let mut profile = LoadProfile::load_or_create(&profile_path)?;

    let mut engine = LoadOrderEngine::new();
    if let Some(lookup_path) = &options.lookup {
        engine.set_lookup(Box::new(TableLookup::load(lookup_path)?));
    }
    engine.initialize(catalog, &profile.active)?;

    if options.format == OutputFormat::Text {
        for id in engine.unresolved_ids() {
            println!("Warning: unknown mod id in profile: {id}");
        }
    }

    match command {
        CliCommand::List => print_active(&engine, options.format),
        CliCommand::Inactive => print_inactive(&engine, options.format),
        CliCommand::Sort => {
            let changed = engine.sort_active_list();
            if options.format == OutputFormat::Text {
                if changed {
                    println!("Load order sorted");
                } else {
                    println!("Load order unchanged (already sorted, or a cycle was found)");
                }
            }
            print_active(&engine, options.format);
        }
        CliCommand::Resolve => {
            let report = engine.resolve_dependencies();
            print_resolve(&report, options.format)?;
        }
        CliCommand::Check => print_issues(&engine, options.format)?,
        CliCommand::Help | CliCommand::Version => {}
    }

    if options.write {
        profile.active = engine.active_ids();
        profile.save(&profile_path)?;
        if options.format == OutputFormat::Text {
            println!("Profile written to {}", profile_path.display());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ListRow<'a> {
    position: usize,
    id: &'a str,
    name: &'a str,
    has_issue: bool,
    issue_text: &'a str,
}

fn print_active(engine: &LoadOrderEngine, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<ListRow<'_>> = engine
                .active_ordered()
                .map(|(position, item)| ListRow {
                    position,
                    id: &item.id,
                    name: item.display_name(),
                    has_issue: item.has_issue,
                    issue_text: &item.issue_text,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Text => {
            for (position, item) in engine.active_ordered() {
                let marker = if item.has_issue { "!" } else { " " };
                println!("{position:>4} {marker} {}", item.display_name());
            }
        }
    }
}

fn print_inactive(engine: &LoadOrderEngine, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let ids: Vec<&str> = engine.inactive().map(|item| item.id.as_str()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&ids).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Text => {
            for item in engine.inactive() {
                println!("{}", item.display_name());
            }
        }
    }
}

fn print_resolve(report: &ResolveReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            if report.added.is_empty() {
                println!("No dependencies needed activation");
            } else {
                println!("Activated {} dependenc(ies):", report.added.len());
                for id in &report.added {
                    println!("  {id}");
                }
            }
            for entry in &report.missing {
                let reference = entry.workshop_id.as_deref().unwrap_or("no reference");
                let name = if entry.name.is_empty() {
                    &entry.id
                } else {
                    &entry.name
                };
                println!(
                    "Missing: {name} ({reference}) required by {}",
                    entry.required_by.join(", ")
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct IssueRow<'a> {
    id: &'a str,
    name: &'a str,
    issue_text: &'a str,
}

fn print_issues(engine: &LoadOrderEngine, format: OutputFormat) -> Result<()> {
    let rows: Vec<IssueRow<'_>> = engine
        .active_ordered()
        .filter(|(_, item)| item.has_issue)
        .map(|(_, item)| IssueRow {
            id: &item.id,
            name: item.display_name(),
            issue_text: &item.issue_text,
        })
        .collect();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No issues found");
                return Ok(());
            }
            for row in rows {
                println!("{}:", row.name);
                for line in row.issue_text.lines() {
                    println!("  {line}");
                }
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("loadsmith");
    println!("  list                    Show the active load order");
    println!("  inactive                Show inactive mods");
    println!("  sort                    Sort the active order by constraints");
    println!("  resolve                 Activate missing dependencies");
    println!("  check                   Report load-order issues");
    println!("  --catalog <path>        Catalog JSON (required)");
    println!("  --profile <path>        Profile JSON (default: user data dir)");
    println!("  --lookup <path>         Metadata lookup table JSON");
    println!("  --format <text|json>    Output format");
    println!("  --write                 Write the resulting order back to the profile");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_command_and_options() {
        let (command, options) = parse_args(&args(&[
            "sort", "--catalog", "mods.json", "--format", "json", "-w",
        ]))
        .unwrap();
        assert!(matches!(command, CliCommand::Sort));
        assert_eq!(options.catalog, Some(PathBuf::from("mods.json")));
        assert!(options.format == OutputFormat::Json);
        assert!(options.write);
    }

    #[test]
    fn defaults_to_help() {
        let (command, _) = parse_args(&[]).unwrap();
        assert!(matches!(command, CliCommand::Help));
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
        assert!(parse_args(&args(&["--format", "yaml"])).is_err());
    }
}
