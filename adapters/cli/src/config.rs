//! TOML settings file and its validation into typed configurations.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use fleet_console_core::{EntityClass, ViewportLimits};
use fleet_console_system_polling::PollingConfig;
use fleet_console_system_proximity::{ProximityPolicy, DEFAULT_HIDE_THRESHOLD_PX};
use fleet_console_world::{ConsoleConfig, DEFAULT_CELL_SIZE_PX};
use serde::Deserialize;

/// Settings as written in the configuration file. Every section is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ConsoleSettings {
    pub(crate) window: WindowSettings,
    map: MapSettings,
    viewport: ViewportSettings,
    polling: PollingSettings,
    proximity: ProximitySettings,
    interaction: InteractionSettings,
}

/// `[window]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WindowSettings {
    pub(crate) title: String,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Fleet Console".to_owned(),
            width: 1280,
            height: 800,
            vsync: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MapSettings {
    cell_size_px: f64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            cell_size_px: DEFAULT_CELL_SIZE_PX,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ViewportSettings {
    min_scale: f64,
    max_scale: f64,
    zoom_speed: f64,
    button_step: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            min_scale: ViewportLimits::DEFAULT_MIN_SCALE,
            max_scale: ViewportLimits::DEFAULT_MAX_SCALE,
            zoom_speed: ViewportLimits::DEFAULT_ZOOM_SPEED,
            button_step: ViewportLimits::DEFAULT_BUTTON_STEP,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PollingSettings {
    grid_ms: u64,
    robots_ms: u64,
    goals_ms: u64,
    paths_ms: u64,
    objects_ms: u64,
    request_timeout_ms: u64,
}

impl PollingSettings {
    fn interval_ms(&self, class: EntityClass) -> u64 {
        match class {
            EntityClass::Grid => self.grid_ms,
            EntityClass::Robots => self.robots_ms,
            EntityClass::Goals => self.goals_ms,
            EntityClass::Paths => self.paths_ms,
            EntityClass::Objects => self.objects_ms,
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            grid_ms: 1000,
            robots_ms: 1000,
            goals_ms: 1000,
            paths_ms: 1000,
            objects_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProximitySettings {
    hide_path_threshold_px: f64,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            hide_path_threshold_px: DEFAULT_HIDE_THRESHOLD_PX,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InteractionSettings {
    confirmation_ms: u64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            confirmation_ms: 1500,
        }
    }
}

/// Typed configurations of every component.
#[derive(Clone, Debug)]
pub(crate) struct ValidatedSettings {
    pub(crate) console: ConsoleConfig,
    pub(crate) polling: PollingConfig,
    pub(crate) proximity: ProximityPolicy,
    pub(crate) window: WindowSettings,
}

impl ConsoleSettings {
    /// Reads settings from `path`, falling back to defaults without one.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse settings toml contents")
    }

    /// Checks every value and builds the component configurations.
    pub(crate) fn validate(&self) -> Result<ValidatedSettings> {
        let viewport = ViewportLimits::new(
            self.viewport.min_scale,
            self.viewport.max_scale,
            self.viewport.zoom_speed,
            self.viewport.button_step,
        )
        .context("invalid [viewport] settings")?;
        let console = ConsoleConfig::new(
            self.map.cell_size_px,
            viewport,
            Duration::from_millis(self.interaction.confirmation_ms),
        )
        .context("invalid [map] or [interaction] settings")?;

        let mut polling =
            PollingConfig::new(Duration::from_millis(self.polling.request_timeout_ms))
                .context("invalid [polling] settings")?;
        for class in EntityClass::ALL {
            polling = polling
                .with_interval(
                    class,
                    Duration::from_millis(self.polling.interval_ms(class)),
                )
                .context("invalid [polling] settings")?;
        }

        let proximity = ProximityPolicy::new(self.proximity.hide_path_threshold_px)
            .context("invalid [proximity] settings")?;

        if self.window.width <= 0 || self.window.height <= 0 {
            anyhow::bail!(
                "invalid [window] settings: size must be positive (received {}x{})",
                self.window.width,
                self.window.height
            );
        }

        Ok(ValidatedSettings {
            console,
            polling,
            proximity,
            window: self.window.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = ConsoleSettings::from_toml_str("").expect("empty settings parse");
        let validated = settings.validate().expect("defaults are valid");

        assert_eq!(validated.console, ConsoleConfig::default());
        assert_eq!(validated.polling, PollingConfig::default());
        assert_eq!(validated.window.title, "Fleet Console");
    }

    #[test]
    fn sections_override_individual_values() {
        let settings = ConsoleSettings::from_toml_str(
            r#"
            [map]
            cell_size_px = 8.0

            [polling]
            robots_ms = 200

            [window]
            vsync = false
            "#,
        )
        .expect("settings parse");
        let validated = settings.validate().expect("settings are valid");

        assert_eq!(validated.console.cell_size_px(), 8.0);
        assert_eq!(
            validated.polling.interval(EntityClass::Robots),
            Duration::from_millis(200)
        );
        assert_eq!(
            validated.polling.interval(EntityClass::Goals),
            Duration::from_millis(1000)
        );
        assert!(!validated.window.vsync);
        assert_eq!(validated.window.width, 1280);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConsoleSettings::from_toml_str("[map]\ncell_px = 3").is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let zero_interval = ConsoleSettings::from_toml_str("[polling]\npaths_ms = 0")
            .expect("settings parse");
        let inverted_scale =
            ConsoleSettings::from_toml_str("[viewport]\nmin_scale = 4.0\nmax_scale = 2.0")
                .expect("settings parse");
        let negative_threshold =
            ConsoleSettings::from_toml_str("[proximity]\nhide_path_threshold_px = -1.0")
                .expect("settings parse");

        assert!(zero_interval.validate().is_err());
        assert!(inverted_scale.validate().is_err());
        assert!(negative_threshold.validate().is_err());
    }
}
