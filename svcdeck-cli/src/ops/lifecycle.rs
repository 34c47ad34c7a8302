//! Start / stop through the engine so the optimistic transition and rollback apply.

use super::output::{print_json, OutputFormat};
use super::resources::{lookup, print_resource};
use super::ui::{finish_progress_error, finish_progress_success, print_error, print_header, print_progress};
use svcdeck_core::{Registry, Resource};

#[derive(Clone, Copy)]
pub enum Action {
    Start,
    Stop,
}

impl Action {
    fn verb(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Action::Start => ("▶️  START", "Starting", "Started"),
            Action::Stop => ("⏹️  STOP", "Stopping", "Stopped"),
        }
    }

    async fn apply(self, resource: &Resource) -> svcdeck_core::Result<()> {
        match self {
            Action::Start => resource.start().await,
            Action::Stop => resource.stop().await,
        }
    }
}

pub async fn run_action(
    registry: &Registry,
    id: &str,
    action: Action,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resource = lookup(registry, id)?;
    match output {
        OutputFormat::Json => {
            action.apply(&resource).await?;
            print_json(&resource.snapshot())?;
        }
        OutputFormat::Table => {
            let (title, progress, done) = action.verb();
            print_header(&format!("{}: {}", title, id.to_uppercase()));
            print_progress(progress);
            match action.apply(&resource).await {
                Ok(()) => {
                    finish_progress_success(done);
                    print_resource(&resource.snapshot());
                    println!();
                }
                Err(e) => {
                    finish_progress_error(&format!("{} failed", progress));
                    println!();
                    print_error(&e.to_string());
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use svcdeck_core::testing::MemoryBackend;
    use svcdeck_core::{Command, CommandFacade, PushChannel, RegistryOptions, ResourceConfig};

    async fn registry(backend: Arc<MemoryBackend>) -> Registry {
        let registry = Registry::new(
            CommandFacade::new(backend),
            &PushChannel::new(),
            RegistryOptions::default(),
        );
        registry.init().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn json_start_reports_running() {
        let backend = Arc::new(
            MemoryBackend::new().with_resources([ResourceConfig::service("svc1", "Gateway")]),
        );
        let registry = registry(backend).await;
        run_action(&registry, "svc1", Action::Start, OutputFormat::Json)
            .await
            .unwrap();
        assert!(registry.get("svc1").unwrap().is_running());
    }

    #[tokio::test]
    async fn failure_propagates_backend_message() {
        let backend = Arc::new(
            MemoryBackend::new().with_resources([ResourceConfig::service("svc1", "Gateway")]),
        );
        backend.fail_next(Command::Start, "port in use");
        let registry = registry(backend).await;
        let err = run_action(&registry, "svc1", Action::Start, OutputFormat::Table)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "start failed: port in use");
        assert!(registry.get("svc1").unwrap().is_stopped());
    }
}
