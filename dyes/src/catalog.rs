//! The ordered lists of colors and intensities the player can pick from.
//! Colors come from the user's config file, intensities are a fixed ladder.
//! Menu label strings are rendered once here so the per-frame paths and the
//! message hook never have to format anything.

use crate::messages;

/// A selectable dye color. The index into [`Catalog::colors`] is the stable
/// identity used by the state store, the menus, and the resolver.
#[derive(Clone, Debug)]
pub struct ColorOption {
    pub name: String,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    /// Markup for a small colored rectangle, prefixed to menu labels.
    pub swatch: String,
    pub selected_message: String,
    pub deselected_message: String,
}

/// A selectable intensity step.
#[derive(Clone, Debug)]
pub struct IntensityOption {
    pub label: String,
    pub multiplier: f32,
    pub swatch: String,
    pub selected_message: String,
    pub deselected_message: String,
}

/// The intensity ladder. The swatch hex codes approximate each step as a
/// shade of gray so the menu gives some visual feedback.
const INTENSITY_LADDER: [(&str, &str, f32); 10] = [
    ("1", "#1e1e1e", 0.125),
    ("2", "#3d3d3d", 0.25),
    ("3", "#4d4d4d", 0.5),
    ("4", "#656565", 1.0),
    ("5", "#7f7f7f", 2.0),
    ("6", "#9a9a9a", 4.0),
    ("7", "#b2b2b2", 8.0),
    ("8", "#c9c9c9", 16.0),
    ("9", "#e1e1e1", 32.0),
    ("10", "#ffffff", 64.0),
];

#[derive(Debug)]
pub struct Catalog {
    colors: Vec<ColorOption>,
    intensities: Vec<IntensityOption>,
    rtl: bool,
}

impl Catalog {
    /// An empty color list plus the standard intensity ladder. `rtl` flips
    /// the icon/text order of every rendered label.
    pub fn new(rtl: bool) -> Self {
        let mut catalog = Catalog {
            colors: Vec::new(),
            intensities: Vec::with_capacity(INTENSITY_LADDER.len()),
            rtl,
        };
        for (label, hex, multiplier) in INTENSITY_LADDER {
            catalog.add_intensity(label, hex, multiplier);
        }
        catalog
    }

    /// Append a color option. `rgb` must already be validated unit floats;
    /// `hex` is only used for the swatch markup.
    pub fn add_color(&mut self, name: &str, hex: &str, rgb: [f32; 3]) {
        let swatch = format_swatch(hex);
        let label = format!("{swatch}{name}");
        self.colors.push(ColorOption {
            name: name.to_string(),
            red: rgb[0],
            green: rgb[1],
            blue: rgb[2],
            selected_message: messages::format_option_message(&label, true, self.rtl),
            deselected_message: messages::format_option_message(&label, false, self.rtl),
            swatch,
        });
    }

    fn add_intensity(&mut self, label: &str, hex: &str, multiplier: f32) {
        let swatch = format_swatch(hex);
        let full_label = format!("{swatch}{label}");
        self.intensities.push(IntensityOption {
            label: label.to_string(),
            multiplier,
            selected_message: messages::format_option_message(&full_label, true, self.rtl),
            deselected_message: messages::format_option_message(&full_label, false, self.rtl),
            swatch,
        });
    }

    pub fn colors(&self) -> &[ColorOption] {
        &self.colors
    }

    pub fn intensities(&self) -> &[IntensityOption] {
        &self.intensities
    }

    pub fn color(&self, index: usize) -> Option<&ColorOption> {
        self.colors.get(index)
    }

    pub fn intensity(&self, index: usize) -> Option<&IntensityOption> {
        self.intensities.get(index)
    }

    pub fn is_rtl(&self) -> bool {
        self.rtl
    }
}

/// Markup for a colored rectangle. The font face doesn't exist; the game's
/// text renderer has no fallback and draws the glyph as a solid block in the
/// requested color.
pub fn format_swatch(hex: &str) -> String {
    format!("<FONT FACE='Bingus Sans' COLOR='{hex}'>*</FONT> ")
}

/// Parse an HTML-style `#RGB` or `#RRGGBB` color code into unit floats.
pub fn parse_hex_code(code: &str) -> Option<[f32; 3]> {
    let digits = code.strip_prefix('#')?;
    if digits.len() != 3 && digits.len() != 6 {
        return None;
    }

    let mut nibbles = [0u32; 6];
    for (i, chr) in digits.chars().enumerate() {
        nibbles[i] = chr.to_digit(16)?;
    }

    let channels = if digits.len() == 3 {
        [nibbles[0] * 0x11, nibbles[1] * 0x11, nibbles[2] * 0x11]
    } else {
        [
            nibbles[0] * 0x10 + nibbles[1],
            nibbles[2] * 0x10 + nibbles[3],
            nibbles[4] * 0x10 + nibbles[5],
        ]
    };

    Some(channels.map(|c| c as f32 / 255.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex_codes() {
        assert_eq!(parse_hex_code("#ff0000"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_hex_code("#00FF00"), Some([0.0, 1.0, 0.0]));

        let [r, g, b] = parse_hex_code("#4d9a1e").unwrap();
        assert!((r - 0x4d as f32 / 255.0).abs() < f32::EPSILON);
        assert!((g - 0x9a as f32 / 255.0).abs() < f32::EPSILON);
        assert!((b - 0x1e as f32 / 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_three_digit_hex_codes() {
        // #f00 expands to #ff0000
        assert_eq!(parse_hex_code("#f00"), Some([1.0, 0.0, 0.0]));
        assert_eq!(parse_hex_code("#fff"), Some([1.0, 1.0, 1.0]));
    }

    #[test]
    fn rejects_malformed_hex_codes() {
        assert_eq!(parse_hex_code("ff0000"), None); // missing #
        assert_eq!(parse_hex_code("#ff00"), None); // wrong length
        assert_eq!(parse_hex_code("#gg0000"), None); // not hex
        assert_eq!(parse_hex_code("#"), None);
        assert_eq!(parse_hex_code(""), None);
    }

    #[test]
    fn catalog_preserves_color_order() {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);
        catalog.add_color("Blue", "#0000ff", [0.0, 0.0, 1.0]);

        assert_eq!(catalog.colors().len(), 2);
        assert_eq!(catalog.color(0).unwrap().name, "Red");
        assert_eq!(catalog.color(1).unwrap().name, "Blue");
        assert!(catalog.color(2).is_none());
    }

    #[test]
    fn intensity_ladder_is_fixed() {
        let catalog = Catalog::new(false);
        assert_eq!(catalog.intensities().len(), 10);
        assert_eq!(catalog.intensity(3).unwrap().multiplier, 1.0);
        assert_eq!(catalog.intensity(9).unwrap().multiplier, 64.0);
    }

    #[test]
    fn labels_are_prerendered_with_icon_variants() {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);

        let red = catalog.color(0).unwrap();
        assert!(red.selected_message.contains("Bingus Sans"));
        assert!(red.selected_message.contains("MENU_Lockon_01a.png"));
        assert!(red.deselected_message.contains("MENU_DummyTransparent.dds"));
        assert!(red.selected_message.ends_with("Red"));
    }

    #[test]
    fn rtl_labels_put_the_icon_last() {
        let mut catalog = Catalog::new(true);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);

        let red = catalog.color(0).unwrap();
        assert!(red.selected_message.starts_with("<FONT"));
        assert!(red.selected_message.ends_with(">"));
    }
}
