//! `pwdreg` - CLI for pwdregistry
//!
//! This binary provides the command-line interface for submitting requests,
//! reviewing them, and maintaining and reporting on the Registry.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::Parser;

use pwdregistry::cli::{
    output, BackupCommand, Cli, Command, ConfigCommand, EditCommand, ImportCommand,
    MemberCommand, OutputFormat, PendingCommand, RecordArgs, ReportCommand, SearchCommand,
};
use pwdregistry::intake::deliver_notification;
use pwdregistry::notify::notifier_from_config;
use pwdregistry::report::search_by_name;
use pwdregistry::{
    init_logging, AccessGate, AdminToken, Backups, Config, Importer, Moderator, PendingQueue,
    PhoneKey, Record, Registry, Summary,
};

/// Everything a command needs, opened once per invocation.
#[derive(Debug)]
struct App {
    config: Config,
    queue: PendingQueue,
    registry: Registry,
    backups: Backups,
    secret: Option<String>,
}

impl App {
    fn open(config: Config, secret: Option<String>) -> Result<Self> {
        let (queue, registry, backups) =
            pwdregistry::open(&config).context("failed to open the data files")?;
        Ok(Self {
            config,
            queue,
            registry,
            backups,
            secret,
        })
    }

    fn admin(&self) -> Result<AdminToken> {
        let Some(secret) = self.secret.as_deref() else {
            bail!("this command needs the admin secret; pass --secret or set PWDREG_SECRET");
        };
        AccessGate::from_config(&self.config)
            .grant(secret)
            .context("admin access denied")
    }

    fn moderator(&self) -> Moderator<'_> {
        Moderator::new(&self.queue, &self.registry)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    if cli.command.requires_admin() && cli.secret.is_none() {
        bail!("this command needs the admin secret; pass --secret or set PWDREG_SECRET");
    }

    let app = App::open(config, cli.secret)?;

    // Execute the command
    match cli.command {
        Command::Submit(args) => handle_submit(&app, args).await,
        Command::Pending(cmd) => handle_pending(&app, cmd),
        Command::Member(cmd) => handle_member(&app, cmd),
        Command::Import(cmd) => handle_import(&app, &cmd),
        Command::Backup(cmd) => handle_backup(&app, cmd),
        Command::Report(cmd) => handle_report(&app, &cmd),
        Command::Search(cmd) => handle_search(&app, &cmd),
        Command::Config(cmd) => handle_config(&app.config, cmd),
    }
}

async fn handle_submit(app: &App, args: RecordArgs) -> Result<()> {
    let entry = app.queue.submit(&Record::from(args))?;
    println!(
        "Request received for {} and queued for review (id {}).",
        entry.record.name, entry.id
    );

    // The request is already saved; a failed notification is only a warning
    let notifier = notifier_from_config(&app.config);
    if let Err(e) =
        deliver_notification(notifier.as_ref(), &app.config.notify.operator_address, &entry).await
    {
        eprintln!("warning: the operator could not be notified: {e}");
    }
    Ok(())
}

fn handle_pending(app: &App, cmd: PendingCommand) -> Result<()> {
    let token = app.admin()?;
    match cmd {
        PendingCommand::List { format } => {
            let listing = app.queue.list_pending()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
                _ if listing.is_empty() => println!("No pending requests."),
                OutputFormat::Plain => print!("{}", output::pending_plain(&listing)),
                OutputFormat::Table => print!("{}", output::pending_table(&listing)),
            }
        }
        PendingCommand::Approve { id } => {
            let outcome = app
                .moderator()
                .approve(&token, &id)
                .context("run `pwdreg pending list` to see the current queue")?;
            println!(
                "Approved {} and added to the Registry.",
                outcome.record.identifier()
            );
        }
        PendingCommand::Reject { id } => {
            let outcome = app
                .moderator()
                .reject(&token, &id)
                .context("run `pwdreg pending list` to see the current queue")?;
            println!("Rejected {}.", outcome.record.identifier());
        }
    }
    Ok(())
}

fn handle_member(app: &App, cmd: MemberCommand) -> Result<()> {
    match cmd {
        MemberCommand::Add(args) => {
            app.admin()?;
            let record = app.registry.add_member(&Record::from(args))?;
            println!("Added {} to the Registry.", record.identifier());
        }
        MemberCommand::Delete { name, identifier } => {
            let token = app.admin()?;
            let Some(selector) = MemberCommand::delete_selector(name, identifier) else {
                bail!("pass exactly one of --name or --identifier");
            };
            let removed = app.registry.delete_member(&token, &selector)?;
            println!("Deleted {}.", removed.identifier());
        }
        MemberCommand::Edit(edit) => handle_edit(app, &edit)?,
        MemberCommand::List { format } => {
            let records = app.registry.list()?;
            print_records(&records.iter().collect::<Vec<_>>(), format)?;
        }
    }
    Ok(())
}

fn handle_edit(app: &App, edit: &EditCommand) -> Result<()> {
    let token = app.admin()?;
    let current = app.registry.find_by_identifier(&edit.identifier)?;
    let key = PhoneKey::of(&current);
    let update = edit.update_for(&current);
    let count = app.registry.update_member(&token, &key, &update)?;
    println!("Updated {count} member record(s) with phone {key}.");
    Ok(())
}

fn handle_import(app: &App, cmd: &ImportCommand) -> Result<()> {
    let token = app.admin()?;
    let importer = Importer::new(
        app.registry.store(),
        &app.backups,
        app.config.upload.expected_columns.clone(),
    );
    let report = importer
        .import(&token, &cmd.file, cmd.mode)
        .with_context(|| format!("failed to import {}", cmd.file.display()))?;

    if let Some(backup) = &report.backup {
        println!("Backup saved to {}", backup.display());
    }
    println!(
        "Imported {} rows ({:?}); {} duplicates dropped; Registry now holds {} members.",
        report.rows_read, report.mode, report.duplicates_dropped, report.total_after
    );
    Ok(())
}

fn handle_backup(app: &App, cmd: BackupCommand) -> Result<()> {
    match cmd {
        BackupCommand::Create => {
            let token = app.admin()?;
            match app.backups.create(&token)? {
                Some(backup) => println!("Backup saved to {}", backup.path.display()),
                None => println!("No Registry file yet, nothing to back up."),
            }
        }
        BackupCommand::List { json } => {
            let backups = app.backups.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&backups)?);
            } else if backups.is_empty() {
                println!("No backups in {}", app.backups.backup_dir().display());
            } else {
                print!("{}", output::backups_plain(&backups));
            }
        }
        BackupCommand::Restore { file } => {
            let token = app.admin()?;
            if let Err(e) = app.backups.restore(&token, &file) {
                if e.is_locked_file() {
                    return Err(anyhow::Error::new(e)
                        .context("the Registry file is locked; close it in other programs and retry"));
                }
                return Err(e.into());
            }
            println!("Registry restored from {}", file.display());
        }
    }
    Ok(())
}

fn handle_report(app: &App, cmd: &ReportCommand) -> Result<()> {
    let records = app.registry.list()?;
    let filter = cmd.filter();
    let kept = filter.apply(&records);
    let summary = Summary::of(kept.iter().copied());

    match cmd.format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "filter": filter,
                "summary": summary,
                "ward_options": filter.ward_options(&records),
                "records": if cmd.records { kept.clone() } else { Vec::new() },
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain | OutputFormat::Table => {
            print!("{}", output::summary_text(&summary));
            if !filter.sub_counties.is_empty() {
                println!();
                println!("Wards: {}", filter.ward_options(&records).join(", "));
            }
            if cmd.records {
                println!();
                print_records(&kept, cmd.format)?;
            }
        }
    }
    Ok(())
}

fn handle_search(app: &App, cmd: &SearchCommand) -> Result<()> {
    let records = app.registry.list()?;
    let hits = search_by_name(&records, &cmd.query);
    if hits.is_empty() && cmd.format != OutputFormat::Json {
        println!("No members match \"{}\".", cmd.query.trim());
        return Ok(());
    }
    print_records(&hits, cmd.format)
}

fn print_records(records: &[&Record], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => print!("{}", output::records_plain(records.iter().copied())),
        OutputFormat::Table => print!("{}", output::records_table(records.iter().copied())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let mut shown = config.clone();
            shown.access.admin_secret = "<redacted>".to_string();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Registry:           {}", config.registry_path().display());
                println!("  Pending queue:      {}", config.pending_path().display());
                println!("  Backups:            {}", config.backup_dir().display());
                println!();
                println!("[Access]");
                println!(
                    "  Admin secret:       {}",
                    if config.uses_default_secret() {
                        "built-in default"
                    } else {
                        "configured"
                    }
                );
                println!();
                println!("[Upload]");
                println!(
                    "  Expected columns:   {}",
                    config.upload.expected_columns.join(", ")
                );
                println!();
                println!("[Notify]");
                println!("  Enabled:            {}", config.notify.enabled);
                println!("  Operator:           {}", config.notify.operator_address);
                println!("  Channel:            {:?}", config.notify.channel);
                println!("  Outbox:             {}", config.outbox_path().display());
                println!();
                println!("[Locations]");
                println!(
                    "  Sub-counties:       {}{}",
                    config.location_catalog().sub_counties().count(),
                    if config.locations.sub_counties.is_none() {
                        " (built-in)"
                    } else {
                        ""
                    }
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
