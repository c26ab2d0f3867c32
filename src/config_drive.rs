//! Config-drive metadata source.
//!
//! Probes an ordered list of candidate disk locations for the two bootstrap
//! documents. The metadata payload is parsed eagerly at probe time — identity
//! must be reliable, so a bad document voids availability. The user-data
//! payload is cached raw and parsed lazily by each getter that needs it, so
//! one malformed optional document cannot take down the whole source.

use crate::document::{self, InstanceMetadata, Networks, UserData};
use crate::error::KeelError;
use crate::metadata::MetadataSource;
use crate::reader::DiskReader;
use crate::resolver::{self, DnsResolver};
use crate::settings::{self, Settings};

const METADATA_DOC: &str = "config drive metadata";
const USER_DATA_DOC: &str = "config drive user data";

pub struct ConfigDriveSource {
    resolver: Box<dyn DnsResolver>,
    reader: Box<dyn DiskReader>,
    disk_paths: Vec<String>,
    metadata_file: String,
    userdata_file: String,

    // Populated by the most recent successful probe; getters re-parse from
    // these bytes so repeated probing can never hand out torn state.
    raw_metadata: Option<Vec<u8>>,
    raw_user_data: Option<Vec<u8>>,
    location: String,
}

impl ConfigDriveSource {
    pub fn new(
        resolver: Box<dyn DnsResolver>,
        reader: Box<dyn DiskReader>,
        disk_paths: Vec<String>,
        metadata_file: impl Into<String>,
        userdata_file: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            reader,
            disk_paths,
            metadata_file: metadata_file.into(),
            userdata_file: userdata_file.into(),
            raw_metadata: None,
            raw_user_data: None,
            location: String::new(),
        }
    }

    /// Parse the cached metadata payload. Before a successful probe the
    /// cache is empty and parsing fails, which is the defined outcome for
    /// querying an unprobed source.
    fn instance_metadata(&self) -> Result<InstanceMetadata, KeelError> {
        document::parse_instance_metadata(
            self.raw_metadata.as_deref().unwrap_or(b""),
            &self.location,
        )
    }

    fn user_data(&self) -> Result<UserData, KeelError> {
        document::parse_user_data(
            self.raw_user_data.as_deref().unwrap_or(b""),
            &self.location,
        )
    }
}

impl MetadataSource for ConfigDriveSource {
    fn name(&self) -> &'static str {
        "config-drive"
    }

    fn is_available(&mut self) -> bool {
        if self.disk_paths.is_empty() {
            return false;
        }

        for location in &self.disk_paths {
            let file_names = [self.metadata_file.as_str(), self.userdata_file.as_str()];
            let payloads = match self.reader.read_files(location, &file_names) {
                Ok(p) if p.len() == 2 => p,
                Ok(_) => {
                    tracing::debug!(%location, "candidate returned wrong payload count");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(%location, error = %e, "candidate location unreadable");
                    continue;
                }
            };

            // First usable read wins and ends the scan. A metadata parse
            // failure at this point means the drive contents cannot be
            // trusted, so the whole source is unavailable.
            let mut payloads = payloads.into_iter();
            let raw_metadata = payloads.next().unwrap_or_default();
            let raw_user_data = payloads.next().unwrap_or_default();

            match document::parse_instance_metadata(&raw_metadata, location) {
                Ok(_) => {
                    tracing::info!(%location, "config drive found");
                    self.raw_metadata = Some(raw_metadata);
                    self.raw_user_data = Some(raw_user_data);
                    self.location = location.clone();
                    return true;
                }
                Err(e) => {
                    tracing::warn!(%location, error = %e, "config drive metadata unparsable");
                    return false;
                }
            }
        }

        false
    }

    fn instance_id(&self) -> Result<String, KeelError> {
        let metadata = self.instance_metadata()?;
        if metadata.instance_id.is_empty() {
            return Err(KeelError::MissingField {
                document: METADATA_DOC,
                field: "instance-id",
            });
        }
        Ok(metadata.instance_id)
    }

    fn public_key(&self) -> Result<String, KeelError> {
        let metadata = self.instance_metadata()?;
        metadata
            .openssh_key()
            .map(str::to_string)
            .ok_or(KeelError::MissingField {
                document: METADATA_DOC,
                field: "openssh-key",
            })
    }

    fn server_name(&self) -> Result<String, KeelError> {
        let user_data = self.user_data()?;
        user_data
            .server_name()
            .map(str::to_string)
            .ok_or(KeelError::MissingField {
                document: USER_DATA_DOC,
                field: "server name",
            })
    }

    fn networks(&self) -> Result<Option<Networks>, KeelError> {
        Ok(self.user_data()?.network_map())
    }

    fn registry_endpoint(&self) -> Result<String, KeelError> {
        let user_data = self.user_data()?;
        let endpoint = user_data
            .registry_endpoint()
            .ok_or(KeelError::MissingField {
                document: USER_DATA_DOC,
                field: "registry endpoint",
            })?;
        resolver::resolve_endpoint(self.resolver.as_ref(), user_data.nameservers(), endpoint)
    }

    fn settings(&self) -> Result<Settings, KeelError> {
        settings::assemble(&self.user_data()?)
    }
}
