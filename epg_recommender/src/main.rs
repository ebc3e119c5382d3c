use anyhow::Context;
use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use epg_recommender::{configuration::get_configuration, startup::Application};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration().context("Failed to read configuration")?;

    let tracing_subscriber = get_tracing_subscriber(
        "epg_recommender".into(),
        configuration.application.log_level.clone(),
        std::io::stdout,
    );
    init_tracing_subscriber(tracing_subscriber)?;

    let application = Application::build(configuration, None)
        .await
        .context("Failed to build application")?;

    application.run_until_stopped().await?;

    info!("👋 Bye!");
    Ok(())
}
