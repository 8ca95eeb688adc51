//! `lims` command-line interface.
//!
//! Operates on the lab rooted at `--root` (default: current directory),
//! whose state lives in `.lims/`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use lims::core::money::Money;
use lims::core::types::LifecycleStatus;
use lims::error::LimsError;
use lims::exit_codes;
use lims::io::audit_log::JsonlAuditLog;
use lims::io::config::{LabConfig, load_config};
use lims::io::init::{InitOptions, LimsPaths, init_lab};
use lims::io::render::render_request_summary;
use lims::io::request_store::JsonRequestStore;
use lims::service::{BillingPreview, LabService, NewRequest, ValidationMode, preview_billing};

type FileService = LabService<JsonRequestStore, JsonlAuditLog>;

#[derive(Parser)]
#[command(
    name = "lims",
    version,
    about = "Laboratory request tracking: analysis status and billing"
)]
struct Cli {
    /// Lab root containing `.lims/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.lims/` with an empty request store and default config.
    Init {
        /// Overwrite an existing `.lims/` (requests are discarded).
        #[arg(short, long)]
        force: bool,
    },
    /// Register a request; prints the new id.
    Create {
        #[arg(long)]
        patient_id: String,
        #[arg(long)]
        patient_name: String,
        /// Ordered analyses as `CODE` or `CODE:NAME`.
        #[arg(long = "test", value_name = "CODE[:NAME]", value_parser = parse_test)]
        tests: Vec<(String, String)>,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        subtotal: Money,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        discount: Money,
    },
    /// One line per request.
    List,
    /// Print a request summary.
    Show { id: String },
    /// Enter a result; an empty VALUE clears it.
    Result {
        id: String,
        code: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Mark an analysis as flagged, or clear the flag.
    Flag {
        id: String,
        code: String,
        #[arg(long)]
        clear: bool,
    },
    /// Explicitly move a request to TARGET.
    Status { id: String, target: LifecycleStatus },
    /// Return a published or rejected request to `received`.
    Restore { id: String },
    /// Re-price a request.
    Bill {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        subtotal: Money,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        discount: Money,
    },
    /// Record a payment.
    Pay {
        id: String,
        #[arg(allow_hyphen_values = true)]
        amount: Money,
    },
    /// Compute a bill without storing anything.
    Preview {
        #[arg(long, allow_hyphen_values = true)]
        subtotal: Money,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        discount: Money,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        paid: Money,
    },
    /// Audit trail of one request.
    History { id: String },
}

fn main() {
    lims::logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(root, force),
        Command::Create {
            patient_id,
            patient_name,
            tests,
            subtotal,
            discount,
        } => {
            let (_, service) = open_lab(root)?;
            let request = service.create_request(NewRequest {
                patient_id,
                patient_name,
                analyses: tests,
                subtotal,
                discount,
            })?;
            println!("{}", request.id);
            Ok(())
        }
        Command::List => {
            let (_, service) = open_lab(root)?;
            for request in service.list()? {
                println!(
                    "{}  {:<9}  {}  due {}",
                    request.id,
                    request.status.as_str(),
                    request.patient_name,
                    request.billing.due
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let (config, service) = open_lab(root)?;
            let request = service.get(&id)?;
            println!("{}", render_request_summary(&config, &request)?);
            Ok(())
        }
        Command::Result { id, code, value } => {
            let (_, service) = open_lab(root)?;
            let (request, outcome) = service.enter_result(&id, &code, &value)?;
            print!("{} {}: {}", request.id, code, outcome.completion.as_str());
            if outcome.status_changed() {
                print!("; status {} -> {}", outcome.previous_status, outcome.status);
            }
            if outcome.reopened {
                print!(" (verification re-opened)");
            }
            println!();
            Ok(())
        }
        Command::Flag { id, code, clear } => {
            let (_, service) = open_lab(root)?;
            let request = service.flag_analysis(&id, &code, !clear)?;
            println!("{}: {}", request.id, request.status);
            Ok(())
        }
        Command::Status { id, target } => {
            let (_, service) = open_lab(root)?;
            let request = service.transition(&id, target)?;
            println!("{}: {}", request.id, request.status);
            Ok(())
        }
        Command::Restore { id } => {
            let (_, service) = open_lab(root)?;
            let request = service.restore(&id)?;
            println!("{}: {}", request.id, request.status);
            Ok(())
        }
        Command::Bill {
            id,
            subtotal,
            discount,
        } => {
            let (_, service) = open_lab(root)?;
            let request = service.update_billing(&id, subtotal, discount)?;
            let billing = request.billing;
            println!(
                "{}: billed {}, discount {}, paid {}, due {}",
                request.id, billing.billed, billing.discount, billing.paid, billing.due
            );
            Ok(())
        }
        Command::Pay { id, amount } => {
            let (_, service) = open_lab(root)?;
            let (request, update) = service.record_payment(&id, amount)?;
            println!(
                "{}: applied {}, paid {}, due {}",
                request.id, update.applied, update.new_paid, update.new_due
            );
            Ok(())
        }
        Command::Preview {
            subtotal,
            discount,
            paid,
        } => cmd_preview(root, subtotal, discount, paid),
        Command::History { id } => {
            let (_, service) = open_lab(root)?;
            for record in service.history(&id)? {
                println!(
                    "{}  v{}  {}",
                    record.at,
                    record.version,
                    record.event.describe()
                );
            }
            Ok(())
        }
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let paths = init_lab(root, &InitOptions { force })?;
    println!("initialized {}", paths.lims_dir.display());
    Ok(())
}

/// Preview works outside an initialized lab; config only supplies the mode.
fn cmd_preview(root: &Path, subtotal: Money, discount: Money, paid: Money) -> Result<()> {
    let paths = LimsPaths::new(root);
    let config = load_config(&paths.config_path)?;
    let BillingPreview {
        breakdown: preview,
        warnings,
    } = preview_billing(subtotal, discount, paid);
    if config.validation == ValidationMode::Strict && !warnings.is_empty() {
        return Err(LimsError::Rejected(warnings).into());
    }
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }
    println!("subtotal {}", preview.subtotal);
    println!("discount {}", preview.discount);
    println!("total    {}", preview.total);
    println!("paid     {}", preview.paid);
    println!("balance  {}", preview.balance);
    Ok(())
}

fn open_lab(root: &Path) -> Result<(LabConfig, FileService)> {
    let paths = LimsPaths::new(root);
    paths.ensure_initialized()?;
    let config = load_config(&paths.config_path)?;
    let store = JsonRequestStore::new(
        paths.store_path,
        paths.schema_path,
        config.id_prefix.clone(),
    );
    let audit = JsonlAuditLog::new(paths.audit_path);
    let service = LabService::new(store, audit, config.validation);
    Ok((config, service))
}

fn exit_code(err: &anyhow::Error) -> i32 {
    let lims_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<LimsError>());
    match lims_error {
        Some(err) if err.is_rejection() => exit_codes::REJECTED,
        _ => exit_codes::INVALID,
    }
}

fn parse_test(raw: &str) -> Result<(String, String), String> {
    let (code, name) = match raw.split_once(':') {
        Some((code, name)) => (code.trim(), name.trim()),
        None => (raw.trim(), raw.trim()),
    };
    if code.is_empty() {
        return Err(format!("missing analysis code in '{}'", raw));
    }
    let name = if name.is_empty() { code } else { name };
    Ok((code.to_string(), name.to_string()))
}
