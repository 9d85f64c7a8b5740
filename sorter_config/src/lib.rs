#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the sorter control core.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Decimal quantities (speeds, gains, dead-band) accept either a quoted literal
//!   (`"1.25"`, parsed exactly) or a plain TOML number (quantized to 6 decimals).
use serde::Deserialize;
use serde::de::{Deserializer, Error as _};
use sorter_traits::Fixed;

#[derive(Debug, Deserialize)]
pub struct LineCfg {
    /// Commanded main line speed (m/s).
    #[serde(deserialize_with = "de_fixed")]
    pub target_speed: Fixed,
    /// Control tick period in milliseconds; also sizes the smoothing window.
    pub loop_period_ms: u64,
    /// Lower clamp for the commanded speed.
    #[serde(default, deserialize_with = "de_fixed")]
    pub min_output: Fixed,
    /// Upper clamp for the commanded speed.
    #[serde(deserialize_with = "de_fixed")]
    pub max_output: Fixed,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PidCfg {
    #[serde(deserialize_with = "de_fixed")]
    pub kp: Fixed,
    #[serde(deserialize_with = "de_fixed")]
    pub ki: Fixed,
    #[serde(deserialize_with = "de_fixed")]
    pub kd: Fixed,
    /// Symmetric clamp for the integral accumulator.
    #[serde(deserialize_with = "de_fixed")]
    pub integral_limit: Fixed,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: Fixed::from_raw(500_000),
            ki: Fixed::from_raw(100_000),
            kd: Fixed::ZERO,
            integral_limit: Fixed::from_int(10),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StabilityCfg {
    /// Tolerance around the target within which the line counts as on target.
    #[serde(deserialize_with = "de_fixed")]
    pub deadband: Fixed,
    /// Continuous dwell inside the dead-band required before reporting stable.
    pub stable_hold_ms: u64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            deadband: Fixed::from_raw(50_000),
            stable_hold_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OriginCfg {
    /// Polling cadence of the origin sensors (ms).
    pub poll_ms: u64,
    /// GPIO input for the first origin sensor (hardware builds only).
    pub first_sensor_pin: Option<u8>,
    /// GPIO input for the second origin sensor (hardware builds only).
    pub second_sensor_pin: Option<u8>,
    /// Treat low level as blocked when true.
    pub active_low: bool,
}

impl Default for OriginCfg {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            first_sensor_pin: None,
            second_sensor_pin: None,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    /// Number of carts on the simulated ring, zero cart included.
    pub cart_count: u32,
    /// Origin polls per cart pitch; must leave room for the zero cart pattern.
    pub polls_per_cart: u32,
    /// Fraction of the remaining speed error closed per speed command (0, 1].
    #[serde(deserialize_with = "de_fixed")]
    pub response: Fixed,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            cart_count: 60,
            polls_per_cart: 6,
            response: Fixed::from_raw(200_000),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub line: LineCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub stability: StabilityCfg,
    #[serde(default)]
    pub origin: OriginCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DecimalToml {
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_fixed<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
where
    D: Deserializer<'de>,
{
    match DecimalToml::deserialize(deserializer)? {
        DecimalToml::Int(v) => Ok(Fixed::from_int(v)),
        DecimalToml::Float(v) => {
            Fixed::from_f64(v).ok_or_else(|| D::Error::custom("decimal must be finite"))
        }
        DecimalToml::Text(s) => s
            .parse::<Fixed>()
            .map_err(|e| D::Error::custom(format!("invalid decimal {s:?}: {e}"))),
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Line
        if self.line.loop_period_ms == 0 {
            eyre::bail!("line.loop_period_ms must be >= 1");
        }
        if self.line.loop_period_ms > 10_000 {
            eyre::bail!("line.loop_period_ms is unreasonably large (>10s)");
        }
        if self.line.min_output > self.line.max_output {
            eyre::bail!("line.min_output must be <= line.max_output");
        }
        if self.line.target_speed.is_negative() {
            eyre::bail!("line.target_speed must be >= 0");
        }
        if self.line.target_speed < self.line.min_output
            || self.line.target_speed > self.line.max_output
        {
            eyre::bail!("line.target_speed must lie within [min_output, max_output]");
        }

        // PID
        if self.pid.kp.is_negative() || self.pid.ki.is_negative() || self.pid.kd.is_negative() {
            eyre::bail!("pid gains must be >= 0");
        }
        if self.pid.integral_limit.is_negative() {
            eyre::bail!("pid.integral_limit must be >= 0");
        }

        // Stability
        if self.stability.deadband.is_negative() {
            eyre::bail!("stability.deadband must be >= 0");
        }
        if self.stability.stable_hold_ms > 5 * 60 * 1000 {
            eyre::bail!("stability.stable_hold_ms is unreasonably large (>5min)");
        }

        // Origin
        if self.origin.poll_ms == 0 {
            eyre::bail!("origin.poll_ms must be >= 1");
        }
        if self.origin.first_sensor_pin.is_some()
            && self.origin.first_sensor_pin == self.origin.second_sensor_pin
        {
            eyre::bail!("origin sensors must use distinct pins");
        }

        // Simulation
        if self.simulation.cart_count < 2 {
            eyre::bail!("simulation.cart_count must be >= 2");
        }
        if self.simulation.polls_per_cart < 4 {
            eyre::bail!("simulation.polls_per_cart must be >= 4");
        }
        if self.simulation.response <= Fixed::ZERO || self.simulation.response > Fixed::ONE {
            eyre::bail!("simulation.response must be in (0, 1]");
        }

        Ok(())
    }
}
