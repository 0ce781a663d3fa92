use std::io::BufRead;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crossplay_combat::combat::timeout::TimeoutScheduler;
use crossplay_combat::combat::CombatModeController;
use crossplay_combat::config::CombatConfig;
use crossplay_combat::console::Console;
use crossplay_combat::events::{self, EventQueue};
use crossplay_combat::host::world::InMemoryWorld;
use crossplay_combat::host::Collaborators;
use crossplay_combat::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Crossplay Combat v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = CombatConfig::load_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    info!(
        "Configuration loaded: timeout={}s, death_radius={}, tick={}ms",
        config.pvp_timeout.as_secs(),
        config.death_radius,
        config.tick_interval.as_millis()
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    #[cfg(feature = "metrics_server")]
    {
        let metrics_port: u16 = std::env::var("METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9090);

        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) =
                crossplay_combat::metrics::start_metrics_server(metrics_clone, metrics_port).await
            {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Host world and controller
    let world = Arc::new(InMemoryWorld::new(config.clone()));
    let host = Collaborators::from_world(world.clone(), &config);
    let tick = config.tick_interval;
    let controller = CombatModeController::with_scheduler(
        config,
        host,
        metrics.clone(),
        TimeoutScheduler::with_runtime(Handle::current()),
    );

    // Console thread feeds the event queue, tick loop drains it
    let queue = EventQueue::default();
    let console = Console::new(world, controller.clone(), metrics, queue.sender());
    std::thread::spawn(move || run_console(console));

    let tick_loop = events::start_tick_loop(controller.clone(), queue, tick);
    info!("Ready. Type 'help' for commands.");

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = tick_loop => {
            if let Err(e) = result {
                error!("Tick loop error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    // Cleanup
    controller.shutdown();
    info!("Stopped");

    Ok(())
}

fn run_console(console: Console) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console read error: {}", e);
                break;
            }
        };

        match console.run_line(&line) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }
    info!("Console closed");
}
