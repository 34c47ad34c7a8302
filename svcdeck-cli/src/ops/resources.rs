//! Read-only resource views: list, get, metrics, plus explorer.

use super::output::{print_json, OutputFormat};
use super::ui::{
    format_bytes, format_state, metrics_summary, print_empty, print_header, print_hint, print_kv,
    print_section, print_success, print_table_header, truncate,
};
use crossterm::style::Stylize;
use svcdeck_core::{Registry, Resource, ResourceState, SyncError};

pub(crate) fn lookup(registry: &Registry, id: &str) -> anyhow::Result<Resource> {
    registry
        .get(id)
        .ok_or_else(|| SyncError::NotFound(id.to_string()).into())
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Print the registry as a table with a counts line.
pub fn print_table(registry: &Registry) {
    let states = registry.snapshots();
    if states.is_empty() {
        print_empty("No resources found. Use 'create <file>' to add one.");
        return;
    }

    let counts = registry.counts();
    println!(
        "  Total: {}  |  {} Running  |  {} Stopped  |  {} Directories",
        counts.total.to_string().white().bold(),
        counts.running.to_string().green(),
        counts.stopped.to_string().dark_grey(),
        counts.directories.to_string().cyan()
    );
    println!();

    print_table_header(&[("ID", 24), ("NAME", 20), ("METRICS", 44), ("STATUS", 14)]);
    let now = now_ms();
    for state in &states {
        println!(
            "  {:<24} {:<20} {:<44} {}",
            truncate(&state.config.id, 24).cyan(),
            truncate(&state.config.name, 18),
            metrics_summary(state, now),
            format_state(state.status, state.loading)
        );
    }
}

pub async fn list_resources(registry: &Registry, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => print_json(&registry.snapshots())?,
        OutputFormat::Table => {
            print_header("📋 RESOURCES");
            print_table(registry);
            println!();
            print_hint("Use 'get <id>' to see resource details");
        }
    }
    Ok(())
}

pub fn print_resource(state: &ResourceState) {
    let cfg = &state.config;
    print_section("Resource");
    print_kv("ID", &cfg.id);
    print_kv("Name", &cfg.name);
    if !cfg.description.is_empty() {
        print_kv("Description", &cfg.description);
    }
    print_kv("Type", if cfg.is_service() { "service" } else { "directory" });
    if !cfg.path.is_empty() {
        print_kv("Path", &cfg.path);
    }
    if let Some(name) = &cfg.service_name {
        print_kv("Service", name);
    }
    print_kv("Installable", if cfg.installable { "yes" } else { "no" });

    print_section("State");
    print_kv("Status", &format_state(state.status, state.loading));
    print_kv("Metrics", &metrics_summary(state, now_ms()));
    if let Some(modified) = state.metrics.last_modified {
        let when = chrono::DateTime::from_timestamp_millis(modified)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| modified.to_string());
        print_kv("Modified", &when);
    }
}

pub async fn get_resource(
    registry: &Registry,
    id: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let state = lookup(registry, id)?.snapshot();
    match output {
        OutputFormat::Json => print_json(&state)?,
        OutputFormat::Table => {
            print_header(&format!("🔎 RESOURCE: {}", id.to_uppercase()));
            print_resource(&state);
            println!();
        }
    }
    Ok(())
}

pub async fn show_metrics(
    registry: &Registry,
    id: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resource = lookup(registry, id)?;
    let metrics = resource.refresh_metrics().await?;
    match output {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Table => {
            print_header(&format!("📈 METRICS: {}", id.to_uppercase()));
            if resource.is_directory() {
                print_kv(
                    "Size",
                    &metrics
                        .total_size
                        .map(|s| format_bytes(s.max(0) as u64))
                        .unwrap_or_else(|| "-".into()),
                );
            } else {
                print_kv("PID", &metrics.pid.to_string());
                print_kv("CPU", &format!("{:.1}%", metrics.cpu));
                print_kv("Memory", &format_bytes(metrics.mem));
            }
            println!();
        }
    }
    Ok(())
}

pub async fn open_explorer(registry: &Registry, id: &str) -> anyhow::Result<()> {
    lookup(registry, id)?.open_explorer().await?;
    print_success(&format!("Opened explorer for {}", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use svcdeck_core::testing::MemoryBackend;
    use svcdeck_core::{CommandFacade, PushChannel, RegistryOptions, ResourceConfig};

    #[tokio::test]
    async fn lookup_reports_missing_ids() {
        let channel = PushChannel::new();
        let backend = Arc::new(
            MemoryBackend::new().with_resources([ResourceConfig::service("svc1", "Gateway")]),
        );
        let registry = Registry::new(
            CommandFacade::new(backend),
            &channel,
            RegistryOptions::default(),
        );
        registry.init().await.unwrap();

        assert!(lookup(&registry, "svc1").is_ok());
        let err = lookup(&registry, "ghost").unwrap_err();
        assert_eq!(err.to_string(), "resource not found: ghost");
    }
}
