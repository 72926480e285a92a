use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use brainalyze::backend::auth::AuthClient;
use brainalyze::backend::datastore::PostgrestClient;
use brainalyze::backend::inference::AnalysisClient;
use brainalyze::cancel::CancelToken;
use brainalyze::chat::ChatSession;
use brainalyze::export::{fetch_heatmap, PdfExporter};
use brainalyze::report::{ReportAssembler, ReportLoad};
use brainalyze::session::{SessionContext, SessionManager};
use brainalyze::upload::{AnalysisOrchestrator, UploadedScan};

#[derive(Parser)]
#[command(name = "brainalyze")]
#[command(version = brainalyze::config::APP_VERSION)]
#[command(about = "Brainalyze MRI analysis client")]
struct Cli {
    /// Account email
    #[arg(long, global = true, env = "BRAINALYZE_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "BRAINALYZE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the account credentials
    Login,
    /// Submit an MRI scan for analysis
    Analyze {
        /// Path to the scan file
        file: PathBuf,
    },
    /// Show the current report
    Report,
    /// Export the current report as a PDF
    Export {
        /// Output directory (defaults to ~/Brainalyze/exports)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Chat about the current report
    Chat,
}

fn main() -> ExitCode {
    brainalyze::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let auth = AuthClient::from_env();
    let store = PostgrestClient::from_env();
    let manager = SessionManager::new();

    // No session is persisted between runs; every command signs in fresh.
    let email = cli.email.ok_or("Missing --email (or BRAINALYZE_EMAIL)")?;
    let password = cli
        .password
        .ok_or("Missing --password (or BRAINALYZE_PASSWORD)")?;
    let session = manager
        .sign_in(&auth, &store, &email, &password)
        .map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Login => {
            println!(
                "Signed in as {} ({:?})",
                session.display_name(),
                session.profile.role,
            );
        }
        Commands::Analyze { file } => {
            let scan = UploadedScan::from_path(&file)
                .map_err(|e| format!("Could not read {}: {e}", file.display()))?;
            println!("Selected {} ({:.2} MB)", scan.file_name, scan.size_mb());

            let inference = AnalysisClient::from_env();
            let orchestrator = AnalysisOrchestrator::new(&inference, &store);
            let result = orchestrator
                .submit(&scan, &session, &CancelToken::new())
                .map_err(|e| e.to_string())?;

            if result.tumor_detected {
                println!(
                    "Tumor detected: {} ({:.2}% confidence)",
                    result.tumor_type,
                    result.confidence * 100.0,
                );
            } else {
                println!(
                    "No tumor detected ({:.2}% confidence)",
                    result.confidence * 100.0,
                );
            }
        }
        Commands::Report => match load_report(&store, &session)? {
            Some(view) => print_report(&view),
            None => {}
        },
        Commands::Export { out } => {
            let Some(view) = load_report(&store, &session)? else {
                return Ok(());
            };
            let heatmap = view
                .gradcam_url
                .as_deref()
                .and_then(fetch_heatmap);
            let exporter = match out {
                Some(dir) => PdfExporter::new(dir),
                None => PdfExporter::default_location(),
            };
            let written = exporter
                .export(Some(&view), heatmap.as_deref())
                .map_err(|e| e.to_string())?;
            if let Some(path) = written {
                println!("Report saved to {}", path.display());
            }
        }
        Commands::Chat => {
            let Some(view) = load_report(&store, &session)? else {
                return Ok(());
            };
            chat_loop(ChatSession::new(view));
        }
    }
    Ok(())
}

/// One composed report load, with the not-found reasons printed as terminal
/// states rather than errors.
fn load_report(
    store: &PostgrestClient,
    session: &SessionContext,
) -> Result<Option<brainalyze::models::report::ReportView>, String> {
    let assembler = ReportAssembler::new(store);
    let load = assembler
        .load(Some(session), &CancelToken::new())
        .map_err(|e| e.to_string())?;
    match load {
        ReportLoad::Found(view) => Ok(Some(view)),
        ReportLoad::NotFound(reason) => {
            println!("{}", reason.message());
            Ok(None)
        }
    }
}

fn print_report(view: &brainalyze::models::report::ReportView) {
    println!("MRI Analysis Report - {}", view.patient_name);
    println!("Date: {}", view.display_date());
    if view.tumor_detected {
        println!("Diagnosis: {}", view.tumor_type);
    } else {
        println!("Diagnosis: No tumor detected");
    }
    println!(
        "Confidence: {} ({})",
        view.confidence_display(),
        view.confidence_band().class_name(),
    );
    if let Some(size) = &view.tumor_size {
        println!("Size: {size}");
    }
    if let Some(location) = &view.tumor_location {
        println!("Location: {location}");
    }
    if let Some(severity) = &view.severity {
        println!("Severity: {severity}");
    }
    if let Some(description) = &view.description {
        println!("\n{description}");
    }
    if !view.recommendations.is_empty() {
        println!("\nRecommendations:");
        for (i, rec) in view.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
    }
    println!("\nModel: {}", view.ai_model);
}

fn chat_loop(mut session: ChatSession) {
    for message in session.transcript() {
        println!("assistant: {}", message.text);
    }
    println!("(empty line to quit)");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        if line.trim().is_empty() {
            break;
        }

        session.send(&line);
        while session.pending() > 0 {
            for message in session.poll() {
                println!("assistant: {}", message.text);
            }
            if session.pending() > 0 {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
        }
    }
}
