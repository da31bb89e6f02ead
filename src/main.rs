use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use fern::colors::{Color, ColoredLevelConfig};
use lens_engine::{Engine, EngineConfig};
use structopt::StructOpt;

/// Command-line configuration for the Lens indexing service.
///
/// Grounded on `lnx-server/src/main.rs::Settings`, trimmed to the options
/// this binary actually needs: it opens an index, runs its batch queue
/// consumer, and waits for a shutdown signal. There is no HTTP/RPC surface
/// here (spec.md Non-goals) — embedders call into `lens_engine::Engine`
/// directly.
#[derive(Debug, StructOpt)]
#[structopt(name = "lens", about = "Content-indexing and search service for a content-addressed store")]
struct Settings {
    /// Directory holding the persistent search index. Created if absent.
    #[structopt(long, short = "d", env = "LENS_INDEX_DIR", parse(from_os_str))]
    index_dir: PathBuf,

    /// Logging verbosity (off, error, warn, info, debug, trace).
    #[structopt(long, short = "l", env = "LENS_LOG_LEVEL", default_value = "info")]
    log_level: log::LevelFilter,

    /// Disable ANSI colors in log output.
    #[structopt(long, env = "LENS_PLAIN_LOGS")]
    plain_logs: bool,

    /// Additionally write logs to this file.
    #[structopt(long, env = "LENS_LOG_FILE", parse(from_os_str))]
    log_file: Option<PathBuf>,
}

fn setup_logger(settings: &Settings) -> anyhow::Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let plain = settings.plain_logs;
    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            if plain {
                out.finish(format_args!(
                    "[{} {} {}] {}",
                    timestamp,
                    record.level(),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{} {} {}] {}",
                    timestamp,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            }
        })
        .level(settings.log_level)
        .chain(std::io::stdout());

    if let Some(path) = &settings.log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_args();
    setup_logger(&settings)?;

    log::info!("opening index at {}", settings.index_dir.display());
    let engine = Arc::new(Engine::open(&settings.index_dir, EngineConfig::default())?);

    let runner = {
        let engine = engine.clone();
        thread::spawn(move || engine.run())
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for shutdown signal");
    });

    log::info!("shutdown signal received, closing engine");
    engine.close();
    runner.join().expect("queue consumer thread panicked");

    Ok(())
}
