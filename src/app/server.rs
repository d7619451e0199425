use std::sync::Arc;

use tracing::info;

use crate::control;
use crate::controller::TestController;
use crate::error::AppResult;

use super::settings::ServeSettings;
use super::signals::termination;

/// Serves the control plane until Ctrl+C/SIGTERM, then stops any active run.
pub(crate) async fn run_server(settings: ServeSettings) -> AppResult<()> {
    let controller = Arc::new(
        TestController::new().with_container_host(settings.container_host),
    );
    let listener = control::bind(settings.listen).await?;

    control::serve(
        listener,
        Arc::clone(&controller),
        settings.auth_token,
        termination(),
    )
    .await?;

    if controller.stop().await.is_ok() {
        info!("Stopped running traffic test on shutdown");
    }
    Ok(())
}
