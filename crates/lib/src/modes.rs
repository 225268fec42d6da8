//! Mode registry: the catalog of backend behavior profiles.
//!
//! Sourced from `GET /modes` when the backend is reachable, otherwise the built-in catalog.

use serde::{Deserialize, Serialize};

use crate::api::Mode;

pub const DEFAULT_MODE_ID: &str = "general";

/// Built-in four-entry catalog used when the backend is offline.
pub fn default_modes() -> Vec<Mode> {
    vec![
        Mode::new(
            "general",
            "General Assistant",
            "Helpful AI assistant for general questions",
        ),
        Mode::new(
            "coding",
            "Coding Assistant",
            "Programming help and technical guidance",
        ),
        Mode::new(
            "business",
            "Business Consultant",
            "Professional business advice and strategy",
        ),
        Mode::new(
            "creative",
            "Creative Writing",
            "Creative writing and content creation",
        ),
    ]
}

/// Non-empty list of modes with a never-failing lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Mode>", into = "Vec<Mode>")]
pub struct ModeRegistry {
    modes: Vec<Mode>,
}

impl From<Vec<Mode>> for ModeRegistry {
    fn from(modes: Vec<Mode>) -> Self {
        Self::new(modes)
    }
}

impl From<ModeRegistry> for Vec<Mode> {
    fn from(registry: ModeRegistry) -> Self {
        registry.modes
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self {
            modes: default_modes(),
        }
    }
}

impl ModeRegistry {
    /// Build from a fetched catalog; an empty catalog is replaced by the defaults.
    pub fn new(modes: Vec<Mode>) -> Self {
        if modes.is_empty() {
            log::warn!("backend returned no modes, using built-in catalog");
            return Self::default();
        }
        Self { modes }
    }

    /// Mode with the given id, or the first catalog entry.
    pub fn lookup(&self, id: &str) -> &Mode {
        self.modes
            .iter()
            .find(|m| m.id == id)
            .unwrap_or(&self.modes[0])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modes.iter().any(|m| m.id == id)
    }

    pub fn all(&self) -> &[Mode] {
        &self.modes
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
