//! Translation of provider lifecycle states into fencing power states.

/// Power state as seen by the fencing framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Target is running.
    On,
    /// Target is powered off (or being deleted).
    Off,
    /// State cannot be ascertained, including transitional states.
    Unknown,
}

impl PowerState {
    /// Lowercase name used in logs and the `list-status` output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server lifecycle values documented by the Hetzner Cloud API.
///
/// Both the status reader and the fleet lister go through this table, so a
/// raw value always maps to the same power state.
pub const STATE_TABLE: &[(&str, PowerState)] = &[
    ("initializing", PowerState::Unknown),
    ("starting", PowerState::Unknown),
    ("running", PowerState::On),
    ("stopping", PowerState::Unknown),
    ("off", PowerState::Off),
    ("deleting", PowerState::Off),
    ("rebuilding", PowerState::Unknown),
    ("migrating", PowerState::Unknown),
    ("unknown", PowerState::Unknown),
];

/// Map a raw provider status onto a [`PowerState`].
///
/// Values missing from [`STATE_TABLE`] yield [`PowerState::Unknown`]; a
/// target is never reported off unless the provider said so.
#[must_use]
pub fn map_state(raw: &str) -> PowerState {
    STATE_TABLE
        .iter()
        .find(|(status, _)| *status == raw)
        .map_or(PowerState::Unknown, |(_, state)| *state)
}

/// One fenceable compute instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Canonical string form of the provider id.
    pub id: String,
    /// Human readable name, not guaranteed unique.
    pub name: String,
    /// Raw lifecycle status reported by the provider.
    pub provider_state: String,
    /// Mapped power state.
    pub state: PowerState,
}

impl Target {
    /// Build a target from its provider fields, mapping the raw status.
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider_state: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider_state: provider_state.to_string(),
            state: map_state(provider_state),
        }
    }
}
