//! Bootstrap orchestration: pick a metadata source, gather identity and
//! settings, hand off the result.
//!
//! Resolution runs once per process lifetime, sequentially — candidate
//! ordering defines precedence, so nothing here is concurrent. A source that
//! is wholly unavailable is skipped silently; a source that is available but
//! cannot produce valid settings is a boot failure (after one registry
//! fallback attempt through the endpoint it handed out).

use std::path::Path;

use crate::config::{Config, SOURCE_CONFIG_DRIVE, SOURCE_FILE};
use crate::config_drive::ConfigDriveSource;
use crate::document::Networks;
use crate::error::KeelError;
use crate::file;
use crate::metadata::{self, MetadataSource};
use crate::reader::MountedDiskReader;
use crate::registry;
use crate::resolver::HickoryResolver;
use crate::settings::Settings;

/// Everything the resolution subsystem hands to downstream consumers.
/// Identity fields are best-effort — not every environment provides them —
/// but `settings` passed the agent-id validity gate.
#[derive(Debug)]
pub struct Resolved {
    pub source: &'static str,
    pub instance_id: Option<String>,
    pub public_key: Option<String>,
    pub server_name: Option<String>,
    pub networks: Option<Networks>,
    pub settings: Settings,
}

/// Construct the configured sources in priority order.
pub fn build_sources(config: &Config) -> Vec<Box<dyn MetadataSource>> {
    let mut sources: Vec<Box<dyn MetadataSource>> = Vec::new();
    for name in config.agent.source_order() {
        match name.as_str() {
            SOURCE_CONFIG_DRIVE => sources.push(Box::new(ConfigDriveSource::new(
                Box::new(HickoryResolver),
                Box::new(MountedDiskReader),
                config.config_drive.disk_paths.clone(),
                config.config_drive.metadata_file.clone(),
                config.config_drive.userdata_file.clone(),
            ))),
            SOURCE_FILE => sources.push(Box::new(file::local(
                &config.file.metadata_path,
                &config.file.userdata_path,
                &config.file.settings_path,
            ))),
            other => tracing::warn!(source = other, "ignoring unknown metadata source"),
        }
    }
    sources
}

/// Probe each configured source and report availability, in order.
/// Used by the `probe` command; probing has no side effect beyond the
/// sources' own caches, which are discarded with them.
pub fn probe_report(config: &Config) -> Vec<(&'static str, bool)> {
    build_sources(config)
        .iter_mut()
        .map(|s| (s.name(), s.is_available()))
        .collect()
}

struct Gathered {
    source: &'static str,
    instance_id: Option<String>,
    public_key: Option<String>,
    server_name: Option<String>,
    networks: Option<Networks>,
    settings: Result<Settings, KeelError>,
    registry_endpoint: Option<Result<String, KeelError>>,
}

/// Synchronous part of resolution: probe, select, query. May block on
/// DNS when a source resolves its registry endpoint, hence the
/// `block_in_place` wrapper in [`resolve`].
fn gather(sources: &mut [Box<dyn MetadataSource>]) -> Result<Gathered, KeelError> {
    let index = metadata::first_available(sources).ok_or(KeelError::NoSourceAvailable)?;
    let source = &sources[index];
    tracing::info!(source = source.name(), "resolving settings");

    let instance_id = best_effort("instance id", source.instance_id());
    let public_key = best_effort("public key", source.public_key());
    let server_name = best_effort("server name", source.server_name());
    let networks = best_effort("networks", source.networks()).flatten();

    let settings = source.settings();
    let registry_endpoint = if settings.is_err() {
        Some(source.registry_endpoint())
    } else {
        None
    };

    Ok(Gathered {
        source: source.name(),
        instance_id,
        public_key,
        server_name,
        networks,
        settings,
        registry_endpoint,
    })
}

fn best_effort<T>(what: &str, result: Result<T, KeelError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "{what} not provided by metadata source");
            None
        }
    }
}

/// Resolve settings through the configured sources.
///
/// Requires a multi-threaded runtime: the source getters may block on DNS
/// and run under `block_in_place`.
pub async fn resolve(config: &Config) -> Result<Resolved, KeelError> {
    let gathered = {
        let mut sources = build_sources(config);
        tokio::task::block_in_place(|| gather(&mut sources))?
    };

    let settings = match gathered.settings {
        Ok(settings) => settings,
        Err(settings_err) => match gathered.registry_endpoint {
            Some(Ok(endpoint)) => {
                tracing::info!(
                    %endpoint,
                    error = %settings_err,
                    "source settings unusable, fetching from registry"
                );
                registry::fetch_settings(&endpoint).await?
            }
            Some(Err(endpoint_err)) => {
                tracing::debug!(error = %endpoint_err, "no registry endpoint to fall back to");
                return Err(settings_err);
            }
            None => return Err(settings_err),
        },
    };

    tracing::info!(
        source = gathered.source,
        agent_id = %settings.agent_id,
        mbus = %settings.mbus,
        "settings resolved"
    );

    Ok(Resolved {
        source: gathered.source,
        instance_id: gathered.instance_id,
        public_key: gathered.public_key,
        server_name: gathered.server_name,
        networks: gathered.networks,
        settings,
    })
}

/// Persist resolved settings for later restarts and downstream readers.
pub async fn persist(settings: &Settings, path: &Path) -> Result<(), KeelError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| KeelError::Io {
                context: format!("creating directory {}", parent.display()),
                source: e,
            })?;
    }

    let json = facet_json::to_string(settings).map_err(|e| KeelError::Io {
        context: format!("serializing settings: {e}"),
        source: std::io::Error::other(e.to_string()),
    })?;

    tokio::fs::write(path, json.as_bytes())
        .await
        .map_err(|e| KeelError::Io {
            context: format!("writing settings to {}", path.display()),
            source: e,
        })?;

    tracing::info!(path = %path.display(), "persisted resolved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings;

    struct FakeSource {
        name: &'static str,
        available: bool,
        user_data_json: &'static [u8],
        endpoint: Option<String>,
    }

    impl FakeSource {
        fn user_data(&self) -> Result<crate::document::UserData, KeelError> {
            crate::document::parse_user_data(self.user_data_json, self.name)
        }
    }

    impl MetadataSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }
        fn is_available(&mut self) -> bool {
            self.available
        }
        fn instance_id(&self) -> Result<String, KeelError> {
            Ok("i-fake".into())
        }
        fn public_key(&self) -> Result<String, KeelError> {
            Err(KeelError::MissingField {
                document: "instance metadata",
                field: "openssh-key",
            })
        }
        fn server_name(&self) -> Result<String, KeelError> {
            self.user_data()?
                .server_name()
                .map(str::to_string)
                .ok_or(KeelError::MissingField {
                    document: "user data",
                    field: "server name",
                })
        }
        fn networks(&self) -> Result<Option<Networks>, KeelError> {
            Ok(self.user_data()?.network_map())
        }
        fn registry_endpoint(&self) -> Result<String, KeelError> {
            self.endpoint.clone().ok_or(KeelError::MissingField {
                document: "user data",
                field: "registry endpoint",
            })
        }
        fn settings(&self) -> Result<Settings, KeelError> {
            settings::assemble(&self.user_data()?)
        }
    }

    async fn resolve_sources(mut sources: Vec<Box<dyn MetadataSource>>) -> Result<Resolved, KeelError> {
        let gathered = tokio::task::block_in_place(|| gather(&mut sources))?;
        // Mirror resolve()'s fallback without needing a full Config.
        let settings = match gathered.settings {
            Ok(s) => s,
            Err(e) => match gathered.registry_endpoint {
                Some(Ok(endpoint)) => registry::fetch_settings(&endpoint).await?,
                _ => return Err(e),
            },
        };
        Ok(Resolved {
            source: gathered.source,
            instance_id: gathered.instance_id,
            public_key: gathered.public_key,
            server_name: gathered.server_name,
            networks: gathered.networks,
            settings,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_available_source_wins() {
        let sources: Vec<Box<dyn MetadataSource>> = vec![
            Box::new(FakeSource {
                name: "config-drive",
                available: false,
                user_data_json: b"{}",
                endpoint: None,
            }),
            Box::new(FakeSource {
                name: "file",
                available: true,
                user_data_json: br#"{"server":{"name":"web-0"},"agent_id":"A","mbus":"M"}"#,
                endpoint: None,
            }),
        ];
        let resolved = resolve_sources(sources).await.unwrap();
        assert_eq!(resolved.source, "file");
        assert_eq!(resolved.settings.agent_id, "A");
        assert_eq!(resolved.server_name.as_deref(), Some("web-0"));
        assert_eq!(resolved.instance_id.as_deref(), Some("i-fake"));
        // Best-effort identity: the missing key is tolerated.
        assert_eq!(resolved.public_key, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_source_available_is_an_error() {
        let sources: Vec<Box<dyn MetadataSource>> = vec![Box::new(FakeSource {
            name: "config-drive",
            available: false,
            user_data_json: b"{}",
            endpoint: None,
        })];
        let err = resolve_sources(sources).await.unwrap_err();
        assert!(matches!(err, KeelError::NoSourceAvailable));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registry_fallback_through_local_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let settings_file = dir.path().join("settings.json");
        std::fs::write(&settings_file, r#"{"agent_id":"From-Registry","mbus":"M"}"#).unwrap();

        let sources: Vec<Box<dyn MetadataSource>> = vec![Box::new(FakeSource {
            name: "file",
            available: true,
            // No agent id in user data: settings() fails the validity gate.
            user_data_json: b"{}",
            endpoint: Some(settings_file.display().to_string()),
        })];
        let resolved = resolve_sources(sources).await.unwrap();
        assert_eq!(resolved.settings.agent_id, "From-Registry");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn settings_failure_without_endpoint_propagates() {
        let sources: Vec<Box<dyn MetadataSource>> = vec![Box::new(FakeSource {
            name: "file",
            available: true,
            user_data_json: b"{}",
            endpoint: None,
        })];
        let err = resolve_sources(sources).await.unwrap_err();
        assert_eq!(err.to_string(), "Metadata does not provide settings");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persist_writes_settings_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("resolved-settings.json");
        let settings = Settings {
            agent_id: "A".into(),
            mbus: "nats://h:4222".into(),
            ..Settings::default()
        };
        persist(&settings, &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"agent_id\""));
        assert!(written.contains("\"A\""));
    }

    #[test]
    fn build_sources_follows_configured_order() {
        let mut config = Config::default();
        config.agent.sources = vec!["file".into(), "config-drive".into()];
        let sources = build_sources(&config);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name(), "file");
        assert_eq!(sources[1].name(), "config-drive");
    }
}
