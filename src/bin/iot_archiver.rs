use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use iot_archiver::config::{DEFAULT_BUCKET, DEFAULT_CONN_STRING, DEFAULT_TABLE_NAMES};
use iot_archiver::{
    ArchiveConfig, ArchiveStore, Archiver, Error, LazyStore, ObjectStoreSink, PgSource,
};

#[derive(Parser, Debug)]
#[command(name = "iot-archiver")]
#[command(about = "Archive expired IoT rows from Postgres to parquet on S3, then purge them")]
struct Cli {
    /// Postgres connection string of the source database
    #[arg(long, env = "PG_CONN_STRING", hide_env_values = true, default_value = DEFAULT_CONN_STRING)]
    pg_conn_string: String,

    /// Destination S3 bucket
    #[arg(long, env = "S3_BUCKET", default_value = DEFAULT_BUCKET)]
    s3_bucket: String,

    /// Comma-separated list of source tables
    #[arg(long, env = "TABLE_NAMES", default_value = DEFAULT_TABLE_NAMES)]
    table_names: String,

    /// Local path for the parquet file before upload (default: <tmp>/archive.parquet)
    #[arg(long, env = "ARCHIVE_STAGING_PATH")]
    staging_path: Option<PathBuf>,
}

impl Cli {
    fn archive_config(&self) -> Result<ArchiveConfig, Error> {
        let mut config = ArchiveConfig::from_table_list(&self.table_names, &self.s3_bucket)?;
        if let Some(path) = &self.staging_path {
            config.staging_path = path.clone();
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        eprintln!("panic recovered: {info}\nstack trace:\n{backtrace}");
    }));

    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
        // The hook has already printed the diagnostic.
        Err(_) => ExitCode::FAILURE,
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.archive_config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(archive(&cli.pg_conn_string, &config))
}

async fn archive(conn_string: &str, config: &ArchiveConfig) -> Result<()> {
    let mut source = PgSource::connect(conn_string)
        .await
        .map_err(|source| Error::Connect {
            target: "postgres",
            source,
        })?;
    info!("Successfully connected to database");

    let store = LazyStore::new(&config.bucket, |bucket| {
        info!("Configuring S3 client");
        let sink = ObjectStoreSink::s3_from_env(bucket)?;
        Ok(Box::new(sink) as Box<dyn ArchiveStore>)
    });

    let mut archiver = Archiver::new(config);
    let report = archiver.run_once(&mut source, &store).await?;
    if report.key.is_some() {
        info!(
            "Run complete: archived {} records, deleted {} rows",
            report.archived,
            report.total_deleted()
        );
    }
    Ok(())
}
