//! Factory configuration, loaded from TOML.

use {
    crate::error::BalancerError,
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    std::{
        fmt::{self, Display, Formatter},
        path::Path,
        time::Duration,
    },
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_PAUSE_WINDOW_DURATION: Duration = DAY.saturating_mul(270);
const MAX_BUFFER_PERIOD_DURATION: Duration = DAY.saturating_mul(90);

/// Version document of a factory or of the pools it creates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Version {
    pub name: String,
    pub version: u32,
    pub deployment: String,
}

/// Formats the document as `{"name":…,"version":…,"deployment":…}`.
impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FactoryConfig {
    pub factory_version: Version,
    pub pool_version: Version,

    /// How long after the factory is deployed its pools can be paused.
    #[serde(with = "humantime_serde", default = "default_pause_window_duration")]
    pub pause_window_duration: Duration,

    /// How long a pool stays paused after the pause window ends.
    #[serde(with = "humantime_serde", default = "default_buffer_period_duration")]
    pub buffer_period_duration: Duration,
}

fn default_pause_window_duration() -> Duration {
    DAY * 90
}

fn default_buffer_period_duration() -> Duration {
    DAY * 30
}

impl FactoryConfig {
    pub fn new(factory_version: Version, pool_version: Version) -> Self {
        Self {
            factory_version,
            pool_version,
            pause_window_duration: default_pause_window_duration(),
            buffer_period_duration: default_buffer_period_duration(),
        }
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let config: Self = toml::from_str(data).context("invalid factory config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading factory config {path:?}"))?;
        Self::from_toml(&data).with_context(|| format!("loading factory config {path:?}"))
    }

    pub fn validate(&self) -> Result<(), BalancerError> {
        if self.pause_window_duration > MAX_PAUSE_WINDOW_DURATION {
            return Err(BalancerError::MaxPauseWindowDuration);
        }
        if self.buffer_period_duration > MAX_BUFFER_PERIOD_DURATION {
            return Err(BalancerError::MaxBufferPeriodDuration);
        }
        Ok(())
    }
}
