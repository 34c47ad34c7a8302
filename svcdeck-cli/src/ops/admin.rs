//! Install / update / create / delete. These wait for backend confirmation before touching state.

use super::output::{print_json, OutputFormat};
use super::resources::{lookup, print_resource};
use super::ui::{finish_progress_error, finish_progress_success, print_header, print_progress, print_success};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use svcdeck_core::{InstallFile, Registry, ResourceConfig, ResourcePatch};

/// Read payload files; the file name (without directories) becomes the install name.
pub fn read_install_files(paths: &[PathBuf]) -> anyhow::Result<Vec<InstallFile>> {
    if paths.is_empty() {
        anyhow::bail!("no install files given");
    }
    paths
        .iter()
        .map(|path| {
            let data =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("not a file: {}", path.display()))?;
            Ok(InstallFile::new(name, data))
        })
        .collect()
}

pub fn load_config(path: &Path) -> anyhow::Result<ResourceConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ResourceConfig = serde_json::from_str(&data)
        .with_context(|| format!("invalid resource config in {}", path.display()))?;
    Ok(config)
}

pub async fn install_resource(
    registry: &Registry,
    id: &str,
    paths: &[PathBuf],
    output: OutputFormat,
) -> anyhow::Result<()> {
    let resource = lookup(registry, id)?;
    let files = read_install_files(paths)?;
    let total: usize = files.iter().map(|f| f.data.len()).sum();

    if output == OutputFormat::Table {
        print_header(&format!("📦 INSTALL: {}", id.to_uppercase()));
        print_progress(&format!("Uploading {} file(s), {} bytes", files.len(), total));
    }
    match resource.install(&files).await {
        Ok(()) => match output {
            OutputFormat::Json => print_json(&resource.snapshot())?,
            OutputFormat::Table => {
                finish_progress_success("Installed");
                print_resource(&resource.snapshot());
                println!();
            }
        },
        Err(e) => {
            if output == OutputFormat::Table {
                finish_progress_error(&e.to_string());
            }
            return Err(e.into());
        }
    }
    Ok(())
}

pub async fn update_resource(
    registry: &Registry,
    id: &str,
    patch: ResourcePatch,
    output: OutputFormat,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        anyhow::bail!("nothing to update; pass at least one field");
    }
    let saved = registry.save(id, &patch).await?;
    match output {
        OutputFormat::Json => print_json(&saved)?,
        OutputFormat::Table => {
            print_success(&format!("Resource '{}' updated", saved.id));
            if let Some(resource) = registry.get(&saved.id) {
                print_resource(&resource.snapshot());
                println!();
            }
        }
    }
    Ok(())
}

pub async fn create_resource(
    registry: &Registry,
    file: &Path,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_config(file)?;
    let resource = registry.create(config).await?;
    match output {
        OutputFormat::Json => print_json(&resource.snapshot())?,
        OutputFormat::Table => {
            print_success(&format!("Resource '{}' created", resource.id()));
            print_resource(&resource.snapshot());
            println!();
        }
    }
    Ok(())
}

pub async fn delete_resource(registry: &Registry, id: &str) -> anyhow::Result<()> {
    registry.delete(id).await?;
    print_success(&format!("Resource '{}' deleted", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use svcdeck_core::testing::MemoryBackend;
    use svcdeck_core::{Command, CommandFacade, PushChannel, RegistryOptions, ResourceKind};
    use tempfile::TempDir;

    async fn registry(backend: Arc<MemoryBackend>) -> Registry {
        let registry = Registry::new(
            CommandFacade::new(backend),
            &PushChannel::new(),
            RegistryOptions::default(),
        );
        registry.init().await.unwrap();
        registry
    }

    #[test]
    fn install_files_keep_base_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.zip");
        fs::write(&path, b"PK\x03\x04").unwrap();

        let files = read_install_files(&[path]).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "app.zip");
        assert_eq!(files[0].data, b"PK\x03\x04");

        assert!(read_install_files(&[]).is_err());
        assert!(read_install_files(&[dir.path().join("missing.bin")]).is_err());
    }

    #[test]
    fn config_file_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kiosk.json");
        fs::write(
            &path,
            r#"{"name":"Kiosk","type":"directory","path":"/srv/kiosk","installable":true}"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.kind, ResourceKind::Directory);
        assert!(config.id.is_empty());

        fs::write(&path, "{").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[tokio::test]
    async fn create_then_delete_via_registry() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = registry(backend.clone()).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("svc.json");
        fs::write(&path, r#"{"name":"Worker","type":"service"}"#).unwrap();

        create_resource(&registry, &path, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);
        let id = registry.items()[0].id();

        delete_resource(&registry, &id).await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(backend.calls(Command::Delete), 1);
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let backend = Arc::new(
            MemoryBackend::new().with_resources([ResourceConfig::service("svc1", "Gateway")]),
        );
        let registry = registry(backend.clone()).await;
        assert!(
            update_resource(&registry, "svc1", ResourcePatch::default(), OutputFormat::Json)
                .await
                .is_err()
        );
        assert_eq!(backend.calls(Command::Save), 0);
    }
}
