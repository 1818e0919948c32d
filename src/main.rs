use bakery_sim::lifecycle::tracing::setup_tracing;
use bakery_sim::lifecycle::{BakerySystem, SystemError};
use bakery_sim::model::SimulationConfig;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), SystemError> {
    setup_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "Loading configuration");
            SimulationConfig::from_json_file(&path)?
        }
        None => SimulationConfig::default(),
    };

    let mut system = BakerySystem::start(config).inspect_err(|e| error!(error = %e, "Startup failed"))?;

    // Ctrl-C evacuates the shop instead of killing the process
    let control = system.control_client();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, evacuating");
            if let Err(e) = control.request_evacuation().await {
                warn!(error = %e, "evacuation request not delivered");
            }
        }
    });

    let reason = system.run().await;
    info!(?reason, "Simulation finished");

    let report = system.shutdown().await?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => info!("Final report:\n{json}"),
        Err(e) => warn!(error = %e, "report not serializable"),
    }
    Ok(())
}
