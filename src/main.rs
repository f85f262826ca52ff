use cantina::application::jobs::JobResponse;
use cantina::application::notifications::{NotificationSettings, WeeklySummaryJob};
use cantina::application::outbox::OutboxDispatcher;
use cantina::application::replay::ReplaySession;
use cantina::config::Config;
use cantina::error::CantinaError;
use cantina::infrastructure::rest::RestBackendClient;
use cantina::infrastructure::zapi::ZapiClient;
use cantina::interfaces::csv::operation_reader::OperationReader;
use cantina::interfaces::csv::wallet_writer::WalletWriter;
use cantina::telemetry;
use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "cantina", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an operations CSV through the local engine and print the final wallets
    Replay {
        /// Operations CSV file
        input: PathBuf,
    },
    /// Deliver one batch of pending outbox messages
    DispatchOutbox,
    /// Queue the weekly spending summary for every guardian
    WeeklySummary,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay { input } => replay(input).await,
        Command::DispatchOutbox => {
            let response = dispatch_outbox().await;
            finish(response)
        }
        Command::WeeklySummary => {
            let response = weekly_summary().await;
            finish(response)
        }
    }
}

async fn replay(input: PathBuf) -> Result<()> {
    let config = Config::load().into_diagnostic()?;
    let mut session = ReplaySession::in_memory(NotificationSettings::from(&config.notifications));

    let file = File::open(input).into_diagnostic()?;
    for (row, operation) in OperationReader::new(file).operations().enumerate() {
        match operation {
            Ok(operation) => {
                if let Err(e) = session.apply(operation).await {
                    warn!(row = row + 1, error = %e, "operation rejected");
                }
            }
            Err(e) => {
                warn!(row = row + 1, error = %e, "unreadable operation");
            }
        }
    }

    let reports = session.report().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = WalletWriter::new(stdout.lock());
    writer.write_wallets(&reports).into_diagnostic()?;

    Ok(())
}

async fn dispatch_outbox() -> JobResponse {
    let run = async {
        let config = Config::load()?;
        let store = RestBackendClient::new(&config.backend)?;
        let sender = ZapiClient::new(config.zapi.clone(), config.backend.timeout())?;
        let dispatcher =
            OutboxDispatcher::new(Box::new(store), Box::new(sender), config.outbox.batch_size);
        Ok::<_, CantinaError>(dispatcher.run_once().await?)
    };
    JobResponse::from_result(run.await, JobResponse::from)
}

async fn weekly_summary() -> JobResponse {
    let run = async {
        let config = Config::load()?;
        let backend = RestBackendClient::new(&config.backend)?;
        let job = WeeklySummaryJob::new(
            Box::new(backend.clone()),
            Box::new(backend),
            NotificationSettings::from(&config.notifications),
        );
        Ok::<_, CantinaError>(job.run(Utc::now()).await?)
    };
    JobResponse::from_result(run.await, |queued| {
        JobResponse::ok(format!("weekly report queued {queued}"))
    })
}

fn finish(response: JobResponse) -> Result<()> {
    println!("{response}");
    if response.is_success() {
        Ok(())
    } else {
        error!(status = response.status, body = %response.body, "job failed");
        Err(miette!("job failed with status {}", response.status))
    }
}
