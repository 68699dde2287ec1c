//! Machine profiles - JSON-described target machines
//!
//! A profile carries what the CLSF does not: B-axis travel, whether the
//! control runs a dynamic work offset, and per-tool spindle speed and
//! length-compensation mode keyed by CLSF tool name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Tool length compensation mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Compensation {
    /// Vertical tool, G43
    #[serde(rename = "G43", alias = "vertical")]
    #[default]
    Vertical,
    /// Tool center point control for tilted tools, G234
    #[serde(rename = "G234", alias = "multi_axis")]
    MultiAxis,
}

impl Compensation {
    pub fn code(self) -> &'static str {
        match self {
            Compensation::Vertical => "G43",
            Compensation::MultiAxis => "G234",
        }
    }
}

/// Spindle and compensation settings for a named tool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ToolSettings {
    /// Spindle speed, RPM
    pub speed: u32,
    pub compensation: Compensation,
}

/// Rotary axis travel, degrees (inclusive)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TravelLimits {
    pub min: f64,
    pub max: f64,
}

impl TravelLimits {
    pub fn contains(&self, degrees: f64) -> bool {
        degrees >= self.min && degrees <= self.max
    }
}

impl Default for TravelLimits {
    fn default() -> Self {
        Self {
            min: -35.0,
            max: 110.0,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("cannot read machine profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid machine profile: {0}")]
    Json(#[from] serde_json::Error),

    #[error("B-axis limits are inverted: min {min} > max {max}")]
    InvertedLimits { min: f64, max: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MachineProfile {
    pub name: String,

    /// B (tilt) axis travel
    pub b_axis: TravelLimits,

    /// Activate G254 after each tool load and let the control compensate
    /// for the rotary position instead of rotating coordinates here.
    pub dynamic_work_offset: bool,

    /// Settings by CLSF tool name
    pub tools: HashMap<String, ToolSettings>,
}

impl Default for MachineProfile {
    /// Haas UMC-750
    fn default() -> Self {
        let mill = |compensation| ToolSettings {
            speed: 1500,
            compensation,
        };

        Self {
            name: "Haas UMC-750".to_string(),
            b_axis: TravelLimits::default(),
            dynamic_work_offset: false,
            tools: HashMap::from([
                ("MILL".to_string(), mill(Compensation::Vertical)),
                ("BALL_MILL".to_string(), mill(Compensation::MultiAxis)),
                ("MILL_MULTI_AXIS".to_string(), mill(Compensation::MultiAxis)),
            ]),
        }
    }
}

impl MachineProfile {
    /// Load a profile from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a profile; fields that are absent take the UMC-750 defaults.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: MachineProfile = serde_json::from_str(json)?;
        if profile.b_axis.min > profile.b_axis.max {
            return Err(ProfileError::InvertedLimits {
                min: profile.b_axis.min,
                max: profile.b_axis.max,
            });
        }
        Ok(profile)
    }

    pub fn tool_settings(&self, name: &str) -> Option<ToolSettings> {
        self.tools.get(name).copied()
    }
}
