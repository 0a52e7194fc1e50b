use std::path::Path;

use anyhow::{bail, Context as _};
use fivebar_geom::{Angle, Config, ConfigBuilder, LenExt as _};
use serde::{Deserialize, Serialize};

/// The on-disk description of a mechanism, in millimetres and degrees.
///
/// Missing fields take the default mechanism's values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanismFile {
    pub first_link: f64,
    pub second_link: f64,
    pub motor_distance: f64,
    pub pen_offset: f64,
    pub step_angle: f64,
}

impl Default for MechanismFile {
    fn default() -> Self {
        Config::default().into()
    }
}

impl From<Config> for MechanismFile {
    fn from(c: Config) -> Self {
        MechanismFile {
            first_link: c.first_link.get(),
            second_link: c.second_link.get(),
            motor_distance: c.motor_distance.get(),
            pen_offset: c.pen_offset.get(),
            step_angle: c.step_angle.to_degrees(),
        }
    }
}

impl MechanismFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("first_link", self.first_link),
            ("second_link", self.second_link),
            ("motor_distance", self.motor_distance),
            ("step_angle", self.step_angle),
        ] {
            if !(v.is_finite() && v > 0.0) {
                bail!("{name} must be positive, got {v}");
            }
        }
        if !(self.pen_offset.is_finite() && self.pen_offset >= 0.0) {
            bail!("pen_offset must not be negative, got {}", self.pen_offset);
        }
        Ok(())
    }

    pub fn config(&self) -> Config {
        ConfigBuilder::default()
            .with_first_link(self.first_link.mm())
            .with_second_link(self.second_link.mm())
            .with_motor_distance(self.motor_distance.mm())
            .with_pen_offset(self.pen_offset.mm())
            .with_step_angle(Angle::degrees(self.step_angle))
            .build()
    }
}

/// Reads a mechanism file, or returns the default mechanism if there's no path.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mechanism file {}", path.display()))?;
    let mech: MechanismFile = serde_json::from_str(&text)
        .with_context(|| format!("invalid mechanism file {}", path.display()))?;
    mech.validate()?;
    log::debug!("mechanism {mech:?}");
    Ok(mech.config())
}
