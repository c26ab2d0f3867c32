//! The metadata source capability set and priority-order selection.
//!
//! Callers are polymorphic over this trait, never over a concrete variant.
//! `is_available` is the only operation that mutates the instance (it owns
//! the probe cache), which the `&mut self` receiver makes explicit: getters
//! read the snapshot taken by the most recent successful probe and must not
//! be called before one succeeded.

use crate::document::Networks;
use crate::error::KeelError;
use crate::settings::Settings;

pub trait MetadataSource {
    /// Short name for logs and the `probe` command.
    fn name(&self) -> &'static str;

    /// Probe the environment and cache raw documents on success. Never
    /// fails loudly — every probe error degrades to `false` so the
    /// bootstrap sequence can try the next source.
    fn is_available(&mut self) -> bool;

    fn instance_id(&self) -> Result<String, KeelError>;

    fn public_key(&self) -> Result<String, KeelError>;

    fn server_name(&self) -> Result<String, KeelError>;

    /// `Ok(None)` when the network map is absent — "let the platform
    /// auto-detect networking", not an error.
    fn networks(&self) -> Result<Option<Networks>, KeelError>;

    fn registry_endpoint(&self) -> Result<String, KeelError>;

    fn settings(&self) -> Result<Settings, KeelError>;
}

/// Probe sources in priority order; index of the first one reporting
/// availability. Earlier sources are authoritative, so probing is
/// sequential and stops at the first hit.
pub fn first_available(sources: &mut [Box<dyn MetadataSource>]) -> Option<usize> {
    for (i, source) in sources.iter_mut().enumerate() {
        if source.is_available() {
            tracing::debug!(source = source.name(), "metadata source available");
            return Some(i);
        }
        tracing::debug!(source = source.name(), "metadata source unavailable, trying next");
    }
    None
}
