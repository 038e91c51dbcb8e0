/*!
 * mvptimer kernel entry point.
 *
 * Loads configuration, restores the ledger and window cache from the data
 * directory, connects the presentation sink and runs the refresh loop until
 * Ctrl-C.
 */

use anyhow::Context;
use mvptimer_kernel::config::MvpTimerConfig;
use mvptimer_kernel::cycle::{CycleRunner, RefreshCycle};
use mvptimer_kernel::health::HealthTracker;
use mvptimer_kernel::http::{spawn_http_server, AppState};
use mvptimer_kernel::ledger::KillLedger;
use mvptimer_kernel::render::Flavor;
use mvptimer_kernel::sinks::{spawn_presentation_task, ConsoleSink, DiscordSink, PresentationSink};
use mvptimer_kernel::source::{FluxCpSource, MobDbLookup};
use mvptimer_kernel::state::{board_channel, shutdown_channel};
use mvptimer_kernel::windows::{WindowCache, WindowResolver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mvptimer_kernel=info")),
        )
        .init();

    let cfg = MvpTimerConfig::load().context("invalid configuration")?;
    info!(base_url = %cfg.base_url, data_dir = %cfg.data_dir.display(), "mvptimer starting");

    std::fs::create_dir_all(&cfg.data_dir).unwrap_or_else(|e| {
        warn!(error = %e, "failed to create data dir");
    });

    let ledger = KillLedger::load(cfg.ledger_path());
    let cache = WindowCache::load(cfg.windows_path());

    let source = FluxCpSource::new(&cfg.base_url, cfg.credentials.clone(), cfg.server_tz)
        .context("failed to build website client")?;
    if let Err(e) = source.login().await {
        warn!(error = %e, "initial login failed, will retry on first refresh");
    }
    let lookup = MobDbLookup::new(&cfg.mob_db_url).context("failed to build mob db client")?;
    let resolver = WindowResolver::new(cache, Box::new(lookup));

    let cycle = RefreshCycle::new(Box::new(source), ledger, resolver, cfg.max_stale_minutes);
    let (board_tx, board_rx) = board_channel();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let runner = CycleRunner::new(cycle, board_tx, HealthTracker::new());

    let sink: Box<dyn PresentationSink> = match &cfg.discord {
        Some(discord) => Box::new(
            DiscordSink::connect(discord, cfg.render_options(Flavor::Discord))
                .await
                .context("discord setup failed")?,
        ),
        None => Box::new(ConsoleSink::new(cfg.render_options(Flavor::Plain))),
    };
    let mut tasks = vec![spawn_presentation_task(sink, board_rx.clone())];

    if let Some(addr) = cfg.http_addr {
        let app_state = AppState {
            boards: board_rx,
            runner: runner.clone(),
            render_options: cfg.render_options(Flavor::Plain),
            api_key: cfg.api_key.clone(),
        };
        let server = spawn_http_server(addr, app_state, shutdown_rx.clone())
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tasks.push(server);
    }

    let refresh = runner.spawn_periodic(cfg.update_period, shutdown_rx);

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    refresh.await.context("refresh loop panicked")?;
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "task ended abnormally");
        }
    }
    info!("bye");
    Ok(())
}
