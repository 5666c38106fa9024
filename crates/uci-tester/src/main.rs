// UCI engine test harness

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use uci_tester::config::{HarnessConfig, timeout_from_secs};
use uci_tester::{ConsoleTranscript, SessionError, run_session};

/// エンジンを起動して UCI の基本手順（handshake / position / go / quit）を一通り流す。
///
/// 例:
///   `cargo run -p uci-tester -- ./minimax_engine`
///   `cargo run -p uci-tester -- /usr/games/stockfish --go "go movetime 300" --timeout 2`
#[derive(Parser, Debug)]
#[command(author, version, about = "UCI engine test harness", long_about = None)]
struct Args {
    /// Path to the engine executable (default: ./minimax_engine)
    engine: Option<PathBuf>,

    /// TOML config file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to wait for each expected reply
    #[arg(long)]
    timeout: Option<f64>,

    /// Position sent with `position fen`
    #[arg(long)]
    fen: Option<String>,

    /// Search command (e.g. "go movetime 300")
    #[arg(long)]
    go: Option<String>,

    /// Milliseconds to wait for the engine to exit after quit before killing it
    #[arg(long)]
    quit_grace_ms: Option<u64>,

    /// Exit non-zero if any expected reply was not received
    #[arg(long)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(args) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(path) = args.engine {
        cfg.engine.path = path;
    }
    if let Some(secs) = args.timeout {
        timeout_from_secs(secs)?;
        cfg.session.timeout_secs = secs;
    }
    if let Some(fen) = args.fen {
        cfg.session.fen = fen;
    }
    if let Some(go) = args.go {
        cfg.session.go = go;
    }
    if let Some(ms) = args.quit_grace_ms {
        cfg.engine.quit_grace_ms = ms;
    }
    cfg.session.strict |= args.strict;
    cfg.validate()?;

    let session_cfg = cfg.session_config()?;
    log::debug!(
        "engine={} timeout={:?} quit_grace={:?}",
        session_cfg.engine.path.display(),
        session_cfg.timeout,
        Duration::from_millis(cfg.engine.quit_grace_ms)
    );

    let mut transcript = ConsoleTranscript::stdout();
    let report = match run_session(&session_cfg, &mut transcript) {
        Ok(report) => report,
        Err(e @ SessionError::Write { .. }) => {
            bail!("engine exited prematurely: {e}")
        }
        Err(e) => return Err(e.into()),
    };

    if cfg.session.strict && !report.all_matched() {
        let missing: Vec<&str> = report
            .unmatched()
            .filter_map(|r| r.reply.as_ref().map(|b| b.keyword()))
            .collect();
        bail!("expected replies not received: {}", missing.join(", "));
    }
    Ok(())
}
