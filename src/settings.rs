//! Canonical settings model and the user-data -> settings assembler.

use facet::Facet;

use crate::document::{Networks, UserData};
use crate::error::KeelError;

/// The agent's operating configuration, handed to downstream subsystems
/// once resolution completes.
///
/// A `Settings` value is only valid with a non-empty `agent_id`; the
/// assembler enforces this, so holders of a `Settings` never re-check.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct Settings {
    #[facet(default)]
    pub agent_id: String,
    #[facet(default)]
    pub mbus: String,
    #[facet(default)]
    pub registry_endpoint: String,
    pub networks: Option<Networks>,
}

/// Map a parsed user data document into `Settings`. Pure, no I/O.
///
/// Fails with `MissingSettings` when the document carries no agent id —
/// an assembled settings value without one must never be returned.
pub fn assemble(user_data: &UserData) -> Result<Settings, KeelError> {
    if user_data.agent_id.is_empty() {
        return Err(KeelError::MissingSettings);
    }

    Ok(Settings {
        agent_id: user_data.agent_id.clone(),
        mbus: user_data.mbus.clone(),
        registry_endpoint: user_data
            .registry_endpoint()
            .unwrap_or_default()
            .to_string(),
        networks: user_data.network_map(),
    })
}
