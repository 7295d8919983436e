use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use dir_fuzz::{BaseRequest, DispatchOptions, FuzzEvent, ScanController, ScanOptions, TcpDispatcher};
use pathfuzz_core::HttpService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

mod config;
mod logging;
mod output;

use output::{now_rfc3339, OutputFormat, ResultWriter, RunInfo};

#[derive(Debug, Parser)]
#[command(name = "pathfuzz", version, about = "Directory fuzzer for captured HTTP requests")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./pathfuzz.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log run progress (info level)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log every attempt (debug level)
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Replay a captured request once per wordlist entry, appending the entry to its directory
    Fuzz {
        /// Raw HTTP request as saved from the proxy (request line, headers, optional body)
        request: PathBuf,
        /// Service the request was captured against, e.g. https://app.example:8443
        #[arg(long)]
        target: String,
        /// Newline-delimited wordlist. Default: a small built-in list.
        #[arg(long, value_name = "FILE")]
        wordlist: Option<PathBuf>,
        /// Timeout per connect/read/write step in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Requests per second; 0 disables pacing
        #[arg(long)]
        qps: Option<u32>,
        /// Skip TLS certificate verification
        #[arg(long, default_value_t = false)]
        insecure: bool,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Output file (overwrites). Stdout if omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json (requires --out)
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Wordlist stats (usable entries and unique entries)
    Wordlist {
        file: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FuzzSettings {
    wordlist: Option<PathBuf>,
    timeout_ms: u64,
    qps: u32,
    insecure: bool,
    format: OutputFormat,
}

/// Flags win over the config file, which wins over built-in defaults.
fn resolve_settings(
    cfg: Option<&config::FuzzConfig>,
    wordlist: Option<PathBuf>,
    timeout_ms: Option<u64>,
    qps: Option<u32>,
    insecure: bool,
    format: Option<OutputFormat>,
) -> FuzzSettings {
    let cfg = cfg.cloned().unwrap_or_default();
    FuzzSettings {
        wordlist: wordlist.or(cfg.wordlist),
        timeout_ms: timeout_ms.or(cfg.timeout_ms).unwrap_or(DispatchOptions::default().timeout_ms),
        qps: qps.or(cfg.qps).unwrap_or(0),
        insecure: insecure || cfg.insecure.unwrap_or(false),
        format: format
            .or_else(|| cfg.format.as_deref().and_then(OutputFormat::from_config))
            .unwrap_or(OutputFormat::Text),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level(cli.verbose, cli.debug))?;
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("pathfuzz {} (core {})", env!("CARGO_PKG_VERSION"), pathfuzz_core::version());
        }
        Commands::Wordlist { file } => {
            let words = dir_fuzz::wordlist::load(&file)?;
            let unique = words.iter().collect::<std::collections::HashSet<_>>().len();
            let obj = serde_json::json!({ "file": file, "total": words.len(), "unique": unique });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Fuzz { request, target, wordlist, timeout_ms, qps, insecure, format, out, csv } => {
            let settings = resolve_settings(
                loaded_cfg.as_ref().and_then(|c| c.fuzz.as_ref()),
                wordlist,
                timeout_ms,
                qps,
                insecure,
                format,
            );
            let raw = std::fs::read(&request).map_err(|e| anyhow!("failed to read {}: {}", request.display(), e))?;
            let service = HttpService::from_url(&target)?;
            let base = BaseRequest::capture(service, &raw)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_fuzz(base, settings, out, csv))?;
        }
    }
    Ok(())
}

async fn run_fuzz(base: BaseRequest, settings: FuzzSettings, out: Option<PathBuf>, csv: bool) -> Result<()> {
    let (sink, mut rx) = dir_fuzz::channel();
    let dispatcher = Arc::new(TcpDispatcher::new(DispatchOptions { timeout_ms: settings.timeout_ms, insecure: settings.insecure }));
    let ctl = ScanController::with_options(
        dispatcher,
        Arc::new(sink),
        ScanOptions { qps: settings.qps, ..Default::default() },
    );
    if let Some(path) = &settings.wordlist {
        ctl.import_wordlist(path)?;
    }
    let total = ctl.wordlist_len();
    let run = RunInfo { run_id: uuid::Uuid::now_v7().to_string(), target: base.url(), started_at: now_rfc3339() };
    let mut writer = ResultWriter::new(settings.format, out.as_deref(), csv, run)?;

    ctl.capture(base);
    let handle = ctl.start().ok_or_else(|| anyhow!("scan did not start"))?;

    let ctl_sig = ctl.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctl_sig.cancel();
        }
    });

    let mut handle = handle;
    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => on_event(&mut writer, event)?,
            joined = &mut handle => {
                while let Ok(event) = rx.try_recv() {
                    on_event(&mut writer, event)?;
                }
                break joined?;
            }
        }
    };
    writer.finish(outcome, total)
}

fn on_event(writer: &mut ResultWriter, event: FuzzEvent) -> Result<()> {
    match event {
        FuzzEvent::Result(r) => writer.write(&r)?,
        FuzzEvent::Progress(p) => debug!(progress = p, "progress"),
        FuzzEvent::Status(s) => eprintln!("{}", s),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_over_defaults() {
        let cfg = config::FuzzConfig {
            timeout_ms: Some(2500),
            qps: Some(3),
            wordlist: Some(PathBuf::from("cfg.txt")),
            format: Some("jsonl".into()),
            insecure: Some(true),
        };
        let s = resolve_settings(Some(&cfg), None, Some(100), None, false, None);
        assert_eq!(s.timeout_ms, 100);
        assert_eq!(s.qps, 3);
        assert_eq!(s.wordlist, Some(PathBuf::from("cfg.txt")));
        assert_eq!(s.format, OutputFormat::Jsonl);
        assert!(s.insecure);

        let d = resolve_settings(None, None, None, None, false, None);
        assert_eq!(d.timeout_ms, 10_000);
        assert_eq!(d.qps, 0);
        assert_eq!(d.format, OutputFormat::Text);
        assert!(!d.insecure);
    }

    #[test]
    fn cli_parses_fuzz_command() {
        let cli = Cli::try_parse_from([
            "pathfuzz", "fuzz", "req.txt", "--target", "https://h", "--format", "jsonl", "--qps", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Fuzz { request, target, format, qps, .. } => {
                assert_eq!(request, PathBuf::from("req.txt"));
                assert_eq!(target, "https://h");
                assert_eq!(format, Some(OutputFormat::Jsonl));
                assert_eq!(qps, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
