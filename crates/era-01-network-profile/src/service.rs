//! # Profile Selection
//!
//! One-shot selection of the active network profile. The selector is owned
//! by the runtime and handed to every component that needs the profile;
//! there is no re-selection API.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::domain::{ChainParamsError, Network, NetworkProfile, ProfileBuilder, ProfileRecord};
use crate::ports::BlockHasher;

/// Holds the process's single active profile.
#[derive(Default)]
pub struct ProfileSelector {
    active: OnceLock<Arc<NetworkProfile>>,
    hasher: Option<Arc<dyn BlockHasher>>,
}

impl std::fmt::Debug for ProfileSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSelector")
            .field("active", &self.active.get().map(|p| p.network))
            .field("hasher", &self.hasher.is_some())
            .finish()
    }
}

impl ProfileSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector that verifies genesis identity with `hasher`.
    pub fn with_hasher(hasher: Arc<dyn BlockHasher>) -> Self {
        Self {
            active: OnceLock::new(),
            hasher: Some(hasher),
        }
    }

    /// Build, verify and activate the stock profile for `network`.
    pub fn select(&self, network: Network) -> Result<Arc<NetworkProfile>, ChainParamsError> {
        self.select_with(ProfileBuilder::new(ProfileRecord::for_network(network)))
    }

    /// Activate a profile built from a customised builder (operator port
    /// overrides and the like).
    pub fn select_with(&self, builder: ProfileBuilder) -> Result<Arc<NetworkProfile>, ChainParamsError> {
        if self.active.get().is_some() {
            return Err(ChainParamsError::AlreadySelected);
        }

        let profile = Arc::new(builder.build(self.hasher.as_deref())?);
        self.active
            .set(Arc::clone(&profile))
            .map_err(|_| ChainParamsError::AlreadySelected)?;

        info!(network = %profile.network, port = profile.default_port, "Network profile selected");
        Ok(profile)
    }

    /// The active profile.
    pub fn current(&self) -> Result<Arc<NetworkProfile>, ChainParamsError> {
        self.active.get().cloned().ok_or(ChainParamsError::NotSelected)
    }

    pub fn is_selected(&self) -> bool {
        self.active.get().is_some()
    }
}
