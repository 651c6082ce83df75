use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::model::WeekStart;

pub const DEFAULT_CYCLE_WEEKS: u32 = 12;
pub const DEFAULT_MIN_BLOCK_MINUTES: u32 = 30;
pub const DEFAULT_AUTHENTIC_WEEKLY_CAP: u32 = 14;

const ENV_WEEK_START: &str = "PLANNER_WEEK_START";
const ENV_CYCLE_WEEKS: &str = "PLANNER_CYCLE_WEEKS";
const ENV_MIN_BLOCK_MINUTES: &str = "PLANNER_MIN_BLOCK_MINUTES";
const ENV_AUTHENTIC_WEEKLY_CAP: &str = "PLANNER_AUTHENTIC_WEEKLY_CAP";

/// Tunables shared by the calendar and scoring components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    pub week_start: WeekStart,
    pub cycle_weeks: u32,
    /// Shortest block height drawn on the day grid. Overlap checks ignore it.
    pub min_block_minutes: u32,
    pub authentic_weekly_cap: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            cycle_weeks: DEFAULT_CYCLE_WEEKS,
            min_block_minutes: DEFAULT_MIN_BLOCK_MINUTES,
            authentic_weekly_cap: DEFAULT_AUTHENTIC_WEEKLY_CAP,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment, keeping defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup_lenient(|key| std::env::var(key).ok())
    }

    pub fn from_lookup_lenient<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_WEEK_START) {
            match WeekStart::parse(&value) {
                Some(week_start) => config.week_start = week_start,
                None => debug!(%value, "ignoring unknown week start"),
            }
        }
        if let Some(weeks) = read_positive(&lookup, ENV_CYCLE_WEEKS) {
            config.cycle_weeks = weeks;
        }
        if let Some(minutes) = read_positive(&lookup, ENV_MIN_BLOCK_MINUTES) {
            config.min_block_minutes = minutes;
        }
        if let Some(cap) = read_positive(&lookup, ENV_AUTHENTIC_WEEKLY_CAP) {
            config.authentic_weekly_cap = cap;
        }
        config
    }

    /// Like [`EngineConfig::from_lookup_lenient`], but rejects unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_WEEK_START) {
            config.week_start =
                WeekStart::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    key: ENV_WEEK_START,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(ENV_CYCLE_WEEKS) {
            config.cycle_weeks = parse_positive(ENV_CYCLE_WEEKS, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_BLOCK_MINUTES) {
            config.min_block_minutes = parse_positive(ENV_MIN_BLOCK_MINUTES, &value)?;
        }
        if let Some(value) = lookup(ENV_AUTHENTIC_WEEKLY_CAP) {
            config.authentic_weekly_cap = parse_positive(ENV_AUTHENTIC_WEEKLY_CAP, &value)?;
        }
        Ok(config)
    }
}

fn read_positive<F>(lookup: &F, key: &'static str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match parse_positive(key, &value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            debug!(%err, "ignoring environment override");
            None
        }
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
