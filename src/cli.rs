use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use deauthguard::config::Config;
use deauthguard::gate::Verdict;
use deauthguard::models::{EntryCandidate, ImportDocument, MatchMode};
use deauthguard::store::RemoveTarget;
use deauthguard::DeauthGuard;

#[derive(Parser)]
#[command(name = "deauthguard")]
#[command(author, version, about = "Whitelist engine protecting wireless networks from deauth attacks")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a network to the whitelist
    Add {
        /// Hardware address (aa:bb:cc:dd:ee:ff, hyphen/dot separators accepted)
        #[arg(short, long)]
        bssid: Option<String>,

        /// Broadcast name (1-32 characters)
        #[arg(short, long)]
        ssid: Option<String>,

        /// Treat the ssid as a shell-glob pattern (*, ?, classes)
        #[arg(short, long)]
        wildcard: bool,

        /// Match the observed name against this case-insensitive regex
        #[arg(short, long, value_name = "PATTERN")]
        regex: Option<String>,

        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,

        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Add the entry disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove entries by id, bssid, or ssid
    Remove {
        /// Numeric entry id, or a bssid/ssid string (removes all
        /// matches). A number is tried as an id first, then as an ssid.
        identifier: String,
    },

    /// Enable or disable an entry
    Toggle {
        /// Entry id
        id: u64,

        /// Disable instead of enable
        #[arg(long)]
        disable: bool,
    },

    /// List whitelisted networks
    List {
        /// Output format (table, json, simple)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show whitelist statistics
    Stats,

    /// Run the decision gate once against an observed access point
    Check {
        /// Observed hardware address
        #[arg(short, long)]
        bssid: Option<String>,

        /// Observed broadcast name
        #[arg(short, long)]
        ssid: Option<String>,
    },

    /// Import entries from a whitelist document
    Import {
        /// JSON document file
        file: PathBuf,
    },

    /// Export the whitelist document
    Export {
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show recent audit records
    Audit {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Table row for the network list
#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Table row for audit records
#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Details")]
    details: String,
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Add {
            bssid,
            ssid,
            wildcard,
            regex,
            description,
            tags,
            disabled,
        } => cmd_add(config, bssid, ssid, wildcard, regex, description, tags, disabled),
        Commands::Remove { identifier } => cmd_remove(config, identifier),
        Commands::Toggle { id, disable } => cmd_toggle(config, id, !disable),
        Commands::List { format } => cmd_list(config, format),
        Commands::Stats => cmd_stats(config),
        Commands::Check { bssid, ssid } => cmd_check(config, bssid, ssid),
        Commands::Import { file } => cmd_import(config, file),
        Commands::Export { output } => cmd_export(config, output),
        Commands::Audit { limit } => cmd_audit(config, limit),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    config: Config,
    bssid: Option<String>,
    ssid: Option<String>,
    wildcard: bool,
    regex: Option<String>,
    description: String,
    tags: Vec<String>,
    disabled: bool,
) -> Result<()> {
    anyhow::ensure!(
        !(wildcard && regex.is_some()),
        "--wildcard and --regex are mutually exclusive"
    );

    let mode = if regex.is_some() {
        MatchMode::Regex
    } else if wildcard {
        MatchMode::Wildcard
    } else {
        MatchMode::Exact
    };

    let candidate = EntryCandidate {
        bssid,
        ssid,
        mode,
        regex_pattern: regex,
        enabled: !disabled,
        description,
        tags,
    };

    let engine = DeauthGuard::new(config)?;
    let id = engine
        .add_network(&candidate)
        .context("failed to add network")?;
    println!("{} entry {}", "Added:".green().bold(), id);
    Ok(())
}

fn cmd_remove(config: Config, identifier: String) -> Result<()> {
    let engine = DeauthGuard::new(config)?;
    let target = RemoveTarget::parse(&identifier);

    let mut removed = engine.remove_network(&target);
    // A purely numeric ssid parses as an id; when no id matched, retry
    // the raw string as a name sweep.
    if !removed && matches!(target, RemoveTarget::Id(_)) {
        removed = engine.remove_network(&RemoveTarget::Name(identifier.clone()));
    }

    if removed {
        println!("{} {}", "Removed:".green().bold(), identifier);
    } else {
        println!(
            "{} no entry matches {}",
            "Note:".yellow().bold(),
            identifier
        );
    }
    Ok(())
}

fn cmd_toggle(config: Config, id: u64, enabled: bool) -> Result<()> {
    let engine = DeauthGuard::new(config)?;

    if engine.toggle_network(id, enabled) {
        println!(
            "{} entry {} {}",
            "Toggled:".green().bold(),
            id,
            if enabled { "enabled" } else { "disabled" }
        );
    } else {
        println!("{} no entry with id {}", "Note:".yellow().bold(), id);
    }
    Ok(())
}

fn cmd_list(config: Config, format: String) -> Result<()> {
    let engine = DeauthGuard::new(config)?;
    let networks = engine.list_networks();

    if networks.is_empty() {
        println!("Whitelist is empty");
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&networks)?);
        }
        "simple" => {
            for entry in &networks {
                println!("{}\t{}", entry.id, entry.display_name());
            }
        }
        _ => {
            let rows: Vec<NetworkRow> = networks
                .iter()
                .map(|e| NetworkRow {
                    id: e.id,
                    bssid: e
                        .bssid
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    ssid: e.ssid.clone().unwrap_or_else(|| "-".to_string()),
                    mode: e.mode.to_string(),
                    enabled: if e.enabled { "yes" } else { "no" }.to_string(),
                    added: e.added_date.format("%Y-%m-%d %H:%M").to_string(),
                    description: e.description.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn cmd_stats(config: Config) -> Result<()> {
    let engine = DeauthGuard::new(config)?;
    let stats = engine.stats();

    println!("{}", "Whitelist Statistics".bold());
    println!("Total networks:    {}", stats.total_networks);
    println!("Enabled networks:  {}", stats.enabled_networks);
    println!("BSSID entries:     {}", stats.bssid_entries);
    println!("SSID entries:      {}", stats.ssid_entries);
    println!("Wildcard entries:  {}", stats.wildcard_entries);
    println!("Regex entries:     {}", stats.regex_entries);
    println!(
        "Last updated:      {}",
        stats
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    Ok(())
}

fn cmd_check(config: Config, bssid: Option<String>, ssid: Option<String>) -> Result<()> {
    anyhow::ensure!(
        bssid.is_some() || ssid.is_some(),
        "provide --bssid and/or --ssid"
    );

    let engine = DeauthGuard::new(config)?;
    let verdict = engine.check_access_point(bssid.as_deref(), ssid.as_deref());

    if verdict.is_block() {
        println!("{} network is whitelisted", "BLOCK:".green().bold());
    } else {
        println!("{} network is not whitelisted", "ALLOW:".yellow().bold());
    }

    // The exit status carries the verdict for scripted callers.
    let code = verdict_exit_code(verdict);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Exit status for a `check` run: 0 when the network is protected,
/// 1 when the attack would be allowed.
fn verdict_exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Block => 0,
        Verdict::Allow => 1,
    }
}

fn cmd_import(config: Config, file: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let fragment: ImportDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file: {}", file.display()))?;

    let total = fragment.networks.len();
    let engine = DeauthGuard::new(config)?;

    // A fresh backup before the batch lands.
    if engine.config().auto_backup {
        engine.backup();
    }

    let imported = engine.import_networks(&fragment);
    println!(
        "{} {} of {} entries",
        "Imported:".green().bold(),
        imported,
        total
    );
    Ok(())
}

fn cmd_export(config: Config, output: Option<PathBuf>) -> Result<()> {
    let engine = DeauthGuard::new(config)?;
    let document = engine.export_networks();
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            println!(
                "{} {} entries to {}",
                "Exported:".green().bold(),
                document.networks.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_audit(config: Config, limit: usize) -> Result<()> {
    let records = deauthguard::audit::read_records(&config.audit_log_file, limit)
        .with_context(|| {
            format!(
                "Failed to read audit log: {}",
                config.audit_log_file.display()
            )
        })?;

    if records.is_empty() {
        println!("Audit log is empty");
        return Ok(());
    }

    let rows: Vec<AuditRow> = records
        .iter()
        .map(|r| AuditRow {
            time: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            action: r.action.to_string(),
            details: r.details.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn cli_config(dir: &TempDir) -> PathBuf {
        let config = Config {
            whitelist_file: dir.path().join("whitelist.json"),
            audit_log_file: dir.path().join("audit.log"),
            strict_enforcement: false,
            auto_backup: false,
            default_entries: Vec::new(),
        };
        let path = dir.path().join("config.toml");
        config.save(&path).unwrap();
        path
    }

    fn run(config: &Path, command: Commands) -> Result<()> {
        run_command(Cli {
            config: Some(config.to_path_buf()),
            debug: false,
            command,
        })
    }

    fn add_ssid(ssid: &str) -> Commands {
        Commands::Add {
            bssid: None,
            ssid: Some(ssid.to_string()),
            wildcard: false,
            regex: None,
            description: String::new(),
            tags: Vec::new(),
            disabled: false,
        }
    }

    #[test]
    fn add_propagates_rejections_as_errors() {
        let dir = TempDir::new().unwrap();
        let config = cli_config(&dir);

        run(&config, add_ssid("HomeNet")).unwrap();
        let err = run(&config, add_ssid("HomeNet")).unwrap_err();
        assert!(err.to_string().contains("failed to add network"));
    }

    #[test]
    fn numeric_ssid_is_removable_after_id_miss() {
        let dir = TempDir::new().unwrap();
        let config = cli_config(&dir);

        run(&config, add_ssid("12345")).unwrap();
        run(
            &config,
            Commands::Remove {
                identifier: "12345".to_string(),
            },
        )
        .unwrap();

        let engine = DeauthGuard::new(Config::load(&config).unwrap()).unwrap();
        assert!(engine.list_networks().is_empty());
    }

    #[test]
    fn check_exit_status_carries_the_verdict() {
        assert_eq!(verdict_exit_code(Verdict::Block), 0);
        assert_ne!(verdict_exit_code(Verdict::Allow), 0);
    }
}
