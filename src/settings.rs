//! Runtime settings loaded from environment variables.

const DEFAULT_SINGLE_FLIGHT: bool = false;

/// Tuning knobs for the board services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSettings {
    /// Reject a drop while another transition is still in flight.
    pub single_flight: bool,
}

impl BoardSettings {
    /// - `BOARD_SINGLE_FLIGHT`: `true` / `false` (default false)
    #[must_use]
    pub fn from_env() -> Self {
        Self { single_flight: env_parse("BOARD_SINGLE_FLIGHT", DEFAULT_SINGLE_FLIGHT) }
    }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self { single_flight: DEFAULT_SINGLE_FLIGHT }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
