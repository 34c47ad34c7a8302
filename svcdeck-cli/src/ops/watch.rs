//! Live registry view: re-render on every change until Ctrl+C.

use super::output::OutputFormat;
use super::resources::print_table;
use super::ui::{print_header, print_hint, print_info};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use svcdeck_core::testing::MemoryBackend;
use svcdeck_core::{
    CommandFacade, Metrics, PushChannel, PushRecord, Registry, RegistryOptions, ResourceConfig,
    Status,
};
use tracing::{info, warn};

/// Coalesce bursts of changes into one frame.
const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const DEMO_TICK: Duration = Duration::from_secs(1);

fn render(registry: &Registry, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&registry.snapshots())?);
        }
        OutputFormat::Table => {
            execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
            print_header("👀 WATCH");
            print_table(registry);
            println!();
            print_hint("Press Ctrl+C to exit");
        }
    }
    Ok(())
}

pub async fn watch_registry(registry: &Registry, output: OutputFormat) -> anyhow::Result<()> {
    let mut changes = registry.changes();
    changes.borrow_and_update();
    render(registry, output)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                tokio::time::sleep(FRAME_INTERVAL).await;
                changes.borrow_and_update();
                render(registry, output)?;
            }
        }
    }
    if output == OutputFormat::Table {
        println!();
        print_info("Watch stopped.");
    }
    Ok(())
}

fn demo_resources() -> Vec<ResourceConfig> {
    let mut gateway = ResourceConfig::service("gateway", "API Gateway");
    gateway.service_name = Some("GatewaySvc".into());
    gateway.installable = true;
    let mut reports = ResourceConfig::service("reports", "Report Worker");
    reports.service_name = Some("ReportSvc".into());
    let mut kiosk = ResourceConfig::directory("kiosk", "Kiosk Web", "/srv/kiosk");
    kiosk.description = "static front-end bundle".into();
    vec![
        gateway,
        reports,
        ResourceConfig::service("sync", "Sync Agent"),
        kiosk,
    ]
}

/// Run the live view against the in-memory backend with periodic metric ticks.
pub async fn run_demo(output: OutputFormat) -> anyhow::Result<()> {
    let channel = PushChannel::new();
    let backend = Arc::new(MemoryBackend::with_channel(channel.clone()).with_resources(demo_resources()));
    backend.set_latency(Duration::from_millis(300));
    let registry = Registry::new(
        CommandFacade::new(backend.clone()),
        &channel,
        RegistryOptions::default(),
    );
    registry.init().await?;
    info!(resources = registry.len(), "demo registry ready");

    // 一个服务已在运行，另一个启动时失败以展示回滚
    backend.set_status(
        "gateway",
        Status::Running,
        Some(Metrics {
            pid: 4120,
            create_time: chrono::Utc::now().timestamp_millis() - 3_600_000,
            cpu: 2.5,
            mem: 104_857_600,
            ..Metrics::zeroed()
        }),
    );
    backend.tick();
    backend.fail_next(svcdeck_core::Command::Start, "port 8443 already in use");

    let actions = {
        let registry = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DEMO_TICK).await;
            if let Err(e) = registry.start("reports").await {
                warn!(error = %e, "demo start failed");
            }
            tokio::time::sleep(DEMO_TICK).await;
            if let Err(e) = registry.start("sync").await {
                warn!(error = %e, "demo start failed");
            }
        })
    };
    let ticker = {
        let backend = backend.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DEMO_TICK);
            loop {
                interval.tick().await;
                backend.tick();
            }
        })
    };
    // 模拟一次外部崩溃
    let crash = {
        let backend = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DEMO_TICK * 6).await;
            backend.set_status("sync", Status::Error, None);
            backend.emit(vec![PushRecord::status("sync", Status::Error)]);
        })
    };

    let result = watch_registry(&registry, output).await;
    actions.abort();
    ticker.abort();
    crash.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_fixture_ids_are_unique() {
        let resources = demo_resources();
        let mut ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), resources.len());
        assert!(resources.iter().any(|r| r.is_directory()));
    }
}
