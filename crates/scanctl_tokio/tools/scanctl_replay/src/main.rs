use std::io::Read;

use anyhow::{bail, Context, Result};
use tracing::info;

use scanctl_replay::config::Config;
use scanctl_replay::replay;
use scanctl_tokio::Phase;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_args();

    let input = match &config.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read payloads from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read payloads from stdin")?;
            buf
        }
    };
    let payloads = replay::parse_payloads(&input).context("decode payloads")?;

    info!(
        payloads = payloads.len(),
        mode = ?config.mode,
        media = config.media_available,
        "replay started"
    );

    let report = replay::run(&config, payloads).await;

    for detection in &report.detections {
        println!(
            "{}",
            serde_json::to_string(detection).context("encode detection")?
        );
    }
    for event in &report.phases {
        info!(
            transition = event.transition.label(),
            from = event.from.label(),
            to = event.to.label(),
            "phase"
        );
    }
    info!(
        delivered = report.detections.len(),
        unheard = report.unheard,
        initialize = report.calls.initialize,
        start = report.calls.start,
        stop = report.calls.stop,
        "replay finished"
    );

    if report.final_phase == Phase::Failed {
        match report.errors.first() {
            Some(err) => bail!("controller failed: {err}"),
            None => bail!("controller failed"),
        }
    }
    Ok(())
}
