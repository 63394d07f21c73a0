//! Minimal CLI exercising the façade against a real server: loads a
//! config file, connects, creates a node, reads it back, and exits.

use coord_client::{acl, config::ClientConfig, data::CreateMode, watcher_fn, Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load();
    simple_logger::init_with_level(config.log.level.as_level())?;

    let default_watcher = watcher_fn(|event| {
        log::info!("watch event: {event:?}");
    });

    let client = Client::connect(&config, Some(default_watcher), None)?;

    let created = client
        .create("/coord-client-demo", b"", &acl::open_acl_unsafe(), CreateMode::Persistent)
        .await?;
    log::info!("created {created}");

    let (data, stat) = client.get_data(&created, None).await?;
    log::info!("data={data:?}, version={}", stat.version);

    client.close().await?;
    Ok(())
}
