//! File-based metadata source — the fallback of last resort for
//! environments that inject bootstrap documents straight into the guest
//! filesystem.
//!
//! Availability is nothing more than "the settings marker file exists";
//! content is never inspected at probe time. Documents are read per getter
//! from three independent paths.

use std::path::PathBuf;

use crate::document::{self, InstanceMetadata, Networks, UserData};
use crate::error::KeelError;
use crate::metadata::MetadataSource;
use crate::reader::FileSystem;
use crate::settings::{self, Settings};

pub struct FileSource {
    fs: Box<dyn FileSystem>,
    metadata_path: PathBuf,
    userdata_path: PathBuf,
    settings_path: PathBuf,
}

impl FileSource {
    pub fn new(
        fs: Box<dyn FileSystem>,
        metadata_path: impl Into<PathBuf>,
        userdata_path: impl Into<PathBuf>,
        settings_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            metadata_path: metadata_path.into(),
            userdata_path: userdata_path.into(),
            settings_path: settings_path.into(),
        }
    }

    fn read_instance_metadata(&self) -> Result<InstanceMetadata, KeelError> {
        let location = self.metadata_path.display().to_string();
        let raw = self
            .fs
            .read(&self.metadata_path)
            .map_err(|e| KeelError::DocumentUnreadable {
                document: "instance metadata",
                location: location.clone(),
                source: e,
            })?;
        document::parse_instance_metadata(&raw, &location)
    }

    fn read_user_data(&self) -> Result<UserData, KeelError> {
        let location = self.userdata_path.display().to_string();
        let raw = self
            .fs
            .read(&self.userdata_path)
            .map_err(|e| KeelError::DocumentUnreadable {
                document: "user data",
                location: location.clone(),
                source: e,
            })?;
        document::parse_user_data(&raw, &location)
    }
}

impl MetadataSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    /// Existence of the settings file is the whole signal — a last-resort
    /// source must not be more demanding than "a marker is present".
    fn is_available(&mut self) -> bool {
        let present = self.fs.exists(&self.settings_path);
        if present {
            tracing::info!(path = %self.settings_path.display(), "settings file present");
        }
        present
    }

    fn instance_id(&self) -> Result<String, KeelError> {
        let metadata = self.read_instance_metadata()?;
        if metadata.instance_id.is_empty() {
            return Err(KeelError::MissingField {
                document: "instance metadata",
                field: "instance-id",
            });
        }
        Ok(metadata.instance_id)
    }

    fn public_key(&self) -> Result<String, KeelError> {
        let metadata = self.read_instance_metadata()?;
        metadata
            .openssh_key()
            .map(str::to_string)
            .ok_or(KeelError::MissingField {
                document: "instance metadata",
                field: "openssh-key",
            })
    }

    fn server_name(&self) -> Result<String, KeelError> {
        let user_data = self.read_user_data()?;
        user_data
            .server_name()
            .map(str::to_string)
            .ok_or(KeelError::MissingField {
                document: "user data",
                field: "server name",
            })
    }

    fn networks(&self) -> Result<Option<Networks>, KeelError> {
        Ok(self.read_user_data()?.network_map())
    }

    /// Declared endpoint when the user-data file exists; otherwise the
    /// settings-file path itself — telling the caller to read settings from
    /// that local path instead of fetching remotely. Purely presence-based.
    fn registry_endpoint(&self) -> Result<String, KeelError> {
        if !self.fs.exists(&self.userdata_path) {
            return Ok(self.settings_path.display().to_string());
        }
        let user_data = self.read_user_data()?;
        user_data
            .registry_endpoint()
            .map(str::to_string)
            .ok_or(KeelError::MissingField {
                document: "user data",
                field: "registry endpoint",
            })
    }

    /// No settings-path fallback here, deliberately: a missing user-data
    /// file is a wrapped read error. The settings path is only ever handed
    /// out as a registry endpoint, never read as a settings document by
    /// this source itself.
    fn settings(&self) -> Result<Settings, KeelError> {
        settings::assemble(&self.read_user_data()?)
    }
}

/// Convenience constructor over the real filesystem.
pub fn local(
    metadata_path: impl Into<PathBuf>,
    userdata_path: impl Into<PathBuf>,
    settings_path: impl Into<PathBuf>,
) -> FileSource {
    FileSource::new(
        Box::new(crate::reader::LocalFs),
        metadata_path,
        userdata_path,
        settings_path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn write(&self, name: &str, contents: &str) {
            std::fs::write(self.path(name), contents).unwrap();
        }

        fn source(&self) -> FileSource {
            local(
                self.path("instance-metadata.json"),
                self.path("user-data.json"),
                self.path("settings.json"),
            )
        }
    }

    // ── availability ──────────────────────────────────────

    #[test]
    fn unavailable_without_settings_file() {
        let fx = Fixture::new();
        assert!(!fx.source().is_available());
    }

    #[test]
    fn available_from_existence_alone_even_when_empty() {
        let fx = Fixture::new();
        fx.write("settings.json", "");
        assert!(fx.source().is_available());
    }

    // ── instance id / public key ──────────────────────────

    #[test]
    fn instance_id_from_metadata_file() {
        let fx = Fixture::new();
        fx.write("instance-metadata.json", r#"{"instance-id":"i-7"}"#);
        assert_eq!(fx.source().instance_id().unwrap(), "i-7");
    }

    #[test]
    fn instance_id_missing_file_is_read_error() {
        let fx = Fixture::new();
        let err = fx.source().instance_id().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn instance_id_bad_json_is_parse_error() {
        let fx = Fixture::new();
        fx.write("instance-metadata.json", "bad-json");
        assert!(matches!(
            fx.source().instance_id().unwrap_err(),
            KeelError::DocumentMalformed { .. }
        ));
    }

    #[test]
    fn instance_id_empty_after_parse_is_missing_field() {
        let fx = Fixture::new();
        fx.write("instance-metadata.json", r#"{"instance-id":""}"#);
        assert!(matches!(
            fx.source().instance_id().unwrap_err(),
            KeelError::MissingField { field: "instance-id", .. }
        ));
    }

    #[test]
    fn public_key_from_metadata_file() {
        let fx = Fixture::new();
        fx.write(
            "instance-metadata.json",
            r#"{"instance-id":"i-7","public-keys":{"0":{"openssh-key":"ssh-ed25519 AAA"}}}"#,
        );
        assert_eq!(fx.source().public_key().unwrap(), "ssh-ed25519 AAA");
    }

    // ── server name / networks ────────────────────────────

    #[test]
    fn server_name_from_user_data() {
        let fx = Fixture::new();
        fx.write("user-data.json", r#"{"server":{"name":"web-0"}}"#);
        assert_eq!(fx.source().server_name().unwrap(), "web-0");
    }

    #[test]
    fn server_name_missing_file_is_error() {
        let fx = Fixture::new();
        assert!(fx.source().server_name().is_err());
    }

    #[test]
    fn networks_round_trip() {
        let fx = Fixture::new();
        fx.write(
            "user-data.json",
            r#"{"networks":{"net1":{"type":"manual","ip":"1.2.3.4","netmask":"255.255.255.0","gateway":"1.2.3.1","default":["dns"],"dns":["8.8.8.8"],"mac":"m1"},"net2":{"type":"dynamic","mac":"m2"}}}"#,
        );
        let nets = fx.source().networks().unwrap().unwrap();
        assert_eq!(nets.len(), 2);
        assert_eq!(nets["net1"].kind, "manual");
        assert_eq!(nets["net1"].ip, "1.2.3.4");
        assert_eq!(nets["net2"].kind, "dynamic");
        assert_eq!(nets["net2"].mac, "m2");
    }

    #[test]
    fn networks_absent_map_is_none() {
        let fx = Fixture::new();
        fx.write("user-data.json", "{}");
        assert_eq!(fx.source().networks().unwrap(), None);
    }

    #[test]
    fn networks_unreadable_file_is_not_found_error() {
        let fx = Fixture::new();
        let err = fx.source().networks().unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("reading user data"));
    }

    // ── registry endpoint fallback ────────────────────────

    #[test]
    fn registry_endpoint_from_user_data_when_present() {
        let fx = Fixture::new();
        fx.write("user-data.json", r#"{"registry":{"endpoint":"fake-registry-endpoint"}}"#);
        assert_eq!(
            fx.source().registry_endpoint().unwrap(),
            "fake-registry-endpoint"
        );
    }

    #[test]
    fn registry_endpoint_falls_back_to_settings_path() {
        let fx = Fixture::new();
        let endpoint = fx.source().registry_endpoint().unwrap();
        assert_eq!(endpoint, fx.path("settings.json").display().to_string());
    }

    // ── settings ──────────────────────────────────────────

    #[test]
    fn settings_from_user_data() {
        let fx = Fixture::new();
        fx.write(
            "user-data.json",
            r#"{"registry":{"endpoint":"e"},"agent_id":"Agent-Foo","mbus":"Agent-Mbus"}"#,
        );
        let settings = fx.source().settings().unwrap();
        assert_eq!(settings.agent_id, "Agent-Foo");
        assert_eq!(settings.mbus, "Agent-Mbus");
        assert_eq!(settings.registry_endpoint, "e");
    }

    #[test]
    fn settings_without_agent_id_fail_with_exact_message() {
        let fx = Fixture::new();
        fx.write(
            "user-data.json",
            r#"{"registry":{"endpoint":"e"},"mbus":"Agent-Mbus"}"#,
        );
        let err = fx.source().settings().unwrap_err();
        assert_eq!(err.to_string(), "Metadata does not provide settings");
    }

    #[test]
    fn settings_missing_user_data_is_read_error_not_fallback() {
        let fx = Fixture::new();
        fx.write("settings.json", r#"{"agent_id":"A"}"#);
        let err = fx.source().settings().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn settings_malformed_user_data_is_parse_error() {
        let fx = Fixture::new();
        fx.write("user-data.json", r#"{"INCORRECT JSON": ,"#);
        assert!(matches!(
            fx.source().settings().unwrap_err(),
            KeelError::DocumentMalformed { .. }
        ));
    }
}
