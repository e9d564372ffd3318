//! User configuration from the `.ini` next to the DLL. A `[colors]` section
//! maps display names to hex codes; a `[dyes]` section holds a few switches.
//! Nothing in here is fatal: a missing or broken file just means defaults
//! and an empty color list.

use std::path::Path;

use ini::Ini;

use crate::catalog;

/// Behavior switches, read before logging is even set up.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Log at trace level and mirror to a console.
    pub debug: bool,
    /// Delay (in milliseconds) before the mod initializes. Raising this can
    /// work around load-order issues with other DLL mods.
    pub initialize_delay: u64,
    /// Disables peer sync entirely, for players worried about invasions.
    pub client_side_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            initialize_delay: 0,
            client_side_only: false,
        }
    }
}

/// A validated color definition from the config file.
#[derive(Clone, Debug)]
pub struct ColorDef {
    pub name: String,
    pub hex: String,
    pub rgb: [f32; 3],
}

/// Read the settings section. Silent on purpose: this runs before the log
/// sink exists so it can configure the log sink.
pub fn read_settings(path: &Path) -> Settings {
    let Ok(file) = Ini::load_from_file(path) else {
        return Settings::default();
    };
    settings_from_ini(&file)
}

fn settings_from_ini(file: &Ini) -> Settings {
    let mut settings = Settings::default();
    let Some(section) = file.section(Some("dyes")) else {
        return settings;
    };

    if let Some(value) = section.get("debug") {
        settings.debug = parse_bool(value).unwrap_or(settings.debug);
    }
    if let Some(value) = section.get("initialize_delay") {
        settings.initialize_delay = value.trim().parse().unwrap_or(settings.initialize_delay);
    }
    if let Some(value) = section.get("client_side_only") {
        settings.client_side_only = parse_bool(value).unwrap_or(settings.client_side_only);
    }
    settings
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read and validate the `[colors]` section in file order. Invalid entries
/// are logged and skipped, never fatal.
pub fn read_colors(path: &Path) -> Vec<ColorDef> {
    match Ini::load_from_file(path) {
        Ok(file) => {
            let colors = colors_from_ini(&file);
            tracing::info!("Loaded {} color definitions from {}", colors.len(), path.display());
            colors
        }
        Err(error) => {
            tracing::warn!("Failed to read config from {}: {error}", path.display());
            Vec::new()
        }
    }
}

fn colors_from_ini(file: &Ini) -> Vec<ColorDef> {
    let Some(section) = file.section(Some("colors")) else {
        tracing::warn!("Config has no [colors] section; the dye menu will be empty");
        return Vec::new();
    };

    let mut colors = Vec::new();
    for (name, hex) in section.iter() {
        match catalog::parse_hex_code(hex) {
            Some(rgb) => {
                tracing::info!("Added color definition \"{name} = {hex}\"");
                colors.push(ColorDef {
                    name: name.to_string(),
                    hex: hex.to_string(),
                    rgb,
                });
            }
            None => {
                tracing::warn!("Invalid color definition \"{name} = {hex}\"");
            }
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_colors_in_file_order() {
        let file = Ini::load_from_str(
            "[colors]\n\
             Scarlet = #ff2400\n\
             Gold = #ffd700\n\
             Sky = #08f\n",
        )
        .unwrap();

        let colors = colors_from_ini(&file);
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[0].name, "Scarlet");
        assert_eq!(colors[1].name, "Gold");
        // Short form expands per nibble.
        assert_eq!(colors[2].rgb, [0.0, 0x88 as f32 / 255.0, 1.0]);
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let file = Ini::load_from_str(
            "[colors]\n\
             Good = #112233\n\
             NoHash = 112233\n\
             TooShort = #1122\n\
             NotHex = #zzzzzz\n",
        )
        .unwrap();

        let colors = colors_from_ini(&file);
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].name, "Good");
    }

    #[test]
    fn missing_sections_mean_defaults() {
        let file = Ini::load_from_str("").unwrap();
        assert!(colors_from_ini(&file).is_empty());

        let settings = settings_from_ini(&file);
        assert!(!settings.debug);
        assert_eq!(settings.initialize_delay, 0);
        assert!(!settings.client_side_only);
    }

    #[test]
    fn reads_settings_switches() {
        let file = Ini::load_from_str(
            "[dyes]\n\
             debug = true\n\
             initialize_delay = 5000\n\
             client_side_only = 1\n",
        )
        .unwrap();

        let settings = settings_from_ini(&file);
        assert!(settings.debug);
        assert_eq!(settings.initialize_delay, 5000);
        assert!(settings.client_side_only);
    }

    #[test]
    fn garbage_settings_fall_back_to_defaults() {
        let file = Ini::load_from_str(
            "[dyes]\n\
             debug = maybe\n\
             initialize_delay = soon\n",
        )
        .unwrap();

        let settings = settings_from_ini(&file);
        assert!(!settings.debug);
        assert_eq!(settings.initialize_delay, 0);
    }
}
