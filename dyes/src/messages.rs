//! Menu text served through the host's message lookup. The mod reserves a
//! private id range and answers queries inside it; everything else falls
//! through to the host's own tables.

use crate::catalog::Catalog;
use crate::target::DyeTarget;

/// Message ids understood by the lookup surface. Ids below the mod range are
/// vanilla entries referenced while inspecting dialog graphs.
pub mod msg_id {
    pub const CANCEL: i32 = 15_000_372;
    pub const SORT_CHEST: i32 = 15_000_395;
    /// The Convergence's training grounds statue has a sort-chest entry of
    /// its own but must not receive a dye menu.
    pub const CONVERGENCE_TRAINING_GROUNDS: i32 = 15_000_810;

    pub const MOD_RANGE_START: i32 = 670_000_000;
    pub const MOD_RANGE_END: i32 = 670_100_000;

    pub const APPLY_DYES: i32 = 670_000_000;
    pub const PRIMARY_COLOR: i32 = 670_000_003;
    pub const SECONDARY_COLOR: i32 = 670_000_004;
    pub const TERTIARY_COLOR: i32 = 670_000_005;
    pub const PRIMARY_INTENSITY: i32 = 670_000_006;
    pub const SECONDARY_INTENSITY: i32 = 670_000_007;
    pub const TERTIARY_INTENSITY: i32 = 670_000_008;
    pub const NONE_DESELECTED: i32 = 670_000_009;
    pub const NONE_SELECTED: i32 = 670_000_010;
    pub const BACK: i32 = 670_000_099;

    pub const INTENSITY_SELECTED_BASE: i32 = 670_010_000;
    pub const INTENSITY_DESELECTED_BASE: i32 = 670_020_000;
    pub const COLOR_SELECTED_BASE: i32 = 670_030_000;
    pub const COLOR_DESELECTED_BASE: i32 = 670_040_000;

    /// The live label for a dye target (e.g. "Primary color" with the
    /// current selection's swatch), by target index.
    pub fn dye_target_label(index: usize) -> i32 {
        PRIMARY_COLOR + index as i32
    }

    pub fn in_mod_range(id: i32) -> bool {
        (MOD_RANGE_START..MOD_RANGE_END).contains(&id)
    }
}

const SELECTED_ICON: &str =
    "<IMG SRC='img://MENU_Lockon_01a.png' WIDTH='20' HEIGHT='20' HSPACE='0' VSPACE='-1'>";
const DESELECTED_ICON: &str =
    "<IMG SRC='img://MENU_DummyTransparent.dds' WIDTH='20' HEIGHT='20' HSPACE='0' VSPACE='-1'>";
/// Narrow spacer used where a swatch would sit if a selection existed.
const SWATCH_SPACER: &str =
    "<IMG SRC='img://MENU_DummyTransparent.dds' WIDTH='12' HEIGHT='1' HSPACE='0' VSPACE='-1'> ";
/// Wide spacer that indents an unmarked row to line up with marked ones.
const ROW_SPACER: &str =
    "<IMG SRC='img://MENU_DummyTransparent.dds' WIDTH='32' HEIGHT='1' HSPACE='0' VSPACE='-1'> ";

/// Render a list row label with or without the "currently selected" bullet.
/// Right-to-left locales reverse the icon/text concatenation order.
pub fn format_option_message(label: &str, selected: bool, rtl: bool) -> String {
    let icon = if selected { SELECTED_ICON } else { DESELECTED_ICON };
    if rtl {
        format!("{label}{icon}")
    } else {
        format!("{icon}{label}")
    }
}

/// Fixed labels for one locale.
#[derive(Debug)]
pub struct Messages {
    pub apply_dyes: &'static str,
    pub primary_color: &'static str,
    pub secondary_color: &'static str,
    pub tertiary_color: &'static str,
    pub primary_intensity: &'static str,
    pub secondary_intensity: &'static str,
    pub tertiary_intensity: &'static str,
    pub none: &'static str,
    pub back: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Locale {
    pub messages: &'static Messages,
    pub rtl: bool,
}

static ENGLISH: Messages = Messages {
    apply_dyes: "Apply dyes",
    primary_color: "Primary color",
    secondary_color: "Secondary color",
    tertiary_color: "Tertiary color",
    primary_intensity: "Primary intensity",
    secondary_intensity: "Secondary intensity",
    tertiary_intensity: "Tertiary intensity",
    none: "None",
    back: "Back",
};

static GERMAN: Messages = Messages {
    apply_dyes: "Farbe auftragen",
    primary_color: "Farbe 1",
    secondary_color: "Farbe 2",
    tertiary_color: "Farbe 3",
    primary_intensity: "Stärke 1",
    secondary_intensity: "Stärke 2",
    tertiary_intensity: "Stärke 3",
    none: "Keine",
    back: "Zurück",
};

static FRENCH: Messages = Messages {
    apply_dyes: "Appliquer les couleurs",
    primary_color: "Couleur 1",
    secondary_color: "Couleur 2",
    tertiary_color: "Couleur 3",
    primary_intensity: "Intensité 1",
    secondary_intensity: "Intensité 2",
    tertiary_intensity: "Intensité 3",
    none: "Aucune",
    back: "Retour",
};

static ITALIAN: Messages = Messages {
    apply_dyes: "Applica colori",
    primary_color: "Colore 1",
    secondary_color: "Colore 2",
    tertiary_color: "Colore 3",
    primary_intensity: "Intensità 1",
    secondary_intensity: "Intensità 2",
    tertiary_intensity: "Intensità 3",
    none: "Nessuno",
    back: "Indietro",
};

static SPANISH: Messages = Messages {
    apply_dyes: "Aplicar tintes",
    primary_color: "Color 1",
    secondary_color: "Color 2",
    tertiary_color: "Color 3",
    primary_intensity: "Intensidad 1",
    secondary_intensity: "Intensidad 2",
    tertiary_intensity: "Intensidad 3",
    none: "Ninguno",
    back: "Atrás",
};

static JAPANESE: Messages = Messages {
    apply_dyes: "染色を適用",
    primary_color: "カラー 1",
    secondary_color: "カラー 2",
    tertiary_color: "カラー 3",
    primary_intensity: "濃さ 1",
    secondary_intensity: "濃さ 2",
    tertiary_intensity: "濃さ 3",
    none: "なし",
    back: "戻る",
};

static ARABIC: Messages = Messages {
    apply_dyes: "تطبيق الأصباغ",
    primary_color: "اللون 1",
    secondary_color: "اللون 2",
    tertiary_color: "اللون 3",
    primary_intensity: "الشدة 1",
    secondary_intensity: "الشدة 2",
    tertiary_intensity: "الشدة 3",
    none: "لا شيء",
    back: "رجوع",
};

/// Pick a label table by the platform's language name, falling back to
/// English for anything unrecognized.
pub fn for_language(language: &str) -> Locale {
    let (messages, rtl) = match language {
        "english" => (&ENGLISH, false),
        "german" => (&GERMAN, false),
        "french" => (&FRENCH, false),
        "italian" => (&ITALIAN, false),
        "spanish" | "latam" => (&SPANISH, false),
        "japanese" => (&JAPANESE, false),
        "arabic" => (&ARABIC, true),
        _ => (&ENGLISH, false),
    };
    Locale { messages, rtl }
}

/// Owns every string the message hook can serve: the fixed labels for the
/// chosen locale plus the six live dye-target labels, which are re-rendered
/// whenever the target-select screen opens so they show the persisted
/// selection's swatch.
#[derive(Debug)]
pub struct MessageTable {
    locale: Locale,
    target_labels: [String; 6],
    none_selected: String,
    none_deselected: String,
    back: String,
}

impl MessageTable {
    pub fn new(locale: Locale) -> Self {
        let m = locale.messages;
        let mut table = MessageTable {
            locale,
            target_labels: Default::default(),
            none_selected: compose(&[SELECTED_ICON, SWATCH_SPACER, m.none], locale.rtl),
            none_deselected: compose(&[ROW_SPACER, m.none], locale.rtl),
            back: compose(&[ROW_SPACER, m.back], locale.rtl),
        };
        for target in DyeTarget::ALL {
            table.target_labels[target.index()] = base_target_label(m, target).to_string();
        }
        table
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Re-render the six target labels against the persisted selections,
    /// given by target index. A selected color contributes its swatch to
    /// both itself and its paired intensity; an unselected one leaves a
    /// transparent spacer so the rows stay aligned.
    pub fn refresh_target_labels(&mut self, catalog: &Catalog, selected: &[Option<usize>; 6]) {
        let m = self.locale.messages;
        let rtl = self.locale.rtl;

        for color_target in [
            DyeTarget::PrimaryColor,
            DyeTarget::SecondaryColor,
            DyeTarget::TertiaryColor,
        ] {
            let intensity_target = color_target.paired_intensity().unwrap();
            let color_index = selected[color_target.index()];

            let (color_prefix, intensity_prefix) = match color_index.and_then(|i| catalog.color(i))
            {
                Some(color) => {
                    let intensity_swatch = selected[intensity_target.index()]
                        .and_then(|i| catalog.intensity(i))
                        .map(|i| i.swatch.clone())
                        .unwrap_or_else(|| SWATCH_SPACER.to_string());
                    (color.swatch.clone(), intensity_swatch)
                }
                None => (SWATCH_SPACER.to_string(), SWATCH_SPACER.to_string()),
            };

            self.target_labels[color_target.index()] =
                compose(&[&color_prefix, base_target_label(m, color_target)], rtl);
            self.target_labels[intensity_target.index()] = compose(
                &[&intensity_prefix, base_target_label(m, intensity_target)],
                rtl,
            );
        }
    }

    /// Answer a message query inside the reserved range. `None` means the
    /// caller must fall back to the host's own lookup.
    pub fn lookup<'a>(&'a self, catalog: &'a Catalog, id: i32) -> Option<&'a str> {
        use msg_id::*;

        if !in_mod_range(id) {
            return None;
        }

        match id {
            APPLY_DYES => return Some(self.locale.messages.apply_dyes),
            NONE_SELECTED => return Some(&self.none_selected),
            NONE_DESELECTED => return Some(&self.none_deselected),
            BACK => return Some(&self.back),
            PRIMARY_COLOR..=TERTIARY_INTENSITY => {
                return Some(&self.target_labels[(id - PRIMARY_COLOR) as usize]);
            }
            _ => {}
        }

        let color_count = catalog.colors().len() as i32;
        let intensity_count = catalog.intensities().len() as i32;

        if (COLOR_SELECTED_BASE..COLOR_SELECTED_BASE + color_count).contains(&id) {
            let index = (id - COLOR_SELECTED_BASE) as usize;
            return Some(&catalog.color(index)?.selected_message);
        }
        if (COLOR_DESELECTED_BASE..COLOR_DESELECTED_BASE + color_count).contains(&id) {
            let index = (id - COLOR_DESELECTED_BASE) as usize;
            return Some(&catalog.color(index)?.deselected_message);
        }
        if (INTENSITY_SELECTED_BASE..INTENSITY_SELECTED_BASE + intensity_count).contains(&id) {
            let index = (id - INTENSITY_SELECTED_BASE) as usize;
            return Some(&catalog.intensity(index)?.selected_message);
        }
        if (INTENSITY_DESELECTED_BASE..INTENSITY_DESELECTED_BASE + intensity_count).contains(&id) {
            let index = (id - INTENSITY_DESELECTED_BASE) as usize;
            return Some(&catalog.intensity(index)?.deselected_message);
        }

        None
    }
}

fn base_target_label(m: &Messages, target: DyeTarget) -> &'static str {
    match target {
        DyeTarget::PrimaryColor => m.primary_color,
        DyeTarget::SecondaryColor => m.secondary_color,
        DyeTarget::TertiaryColor => m.tertiary_color,
        DyeTarget::PrimaryIntensity => m.primary_intensity,
        DyeTarget::SecondaryIntensity => m.secondary_intensity,
        DyeTarget::TertiaryIntensity => m.tertiary_intensity,
    }
}

fn compose(parts: &[&str], rtl: bool) -> String {
    if rtl {
        parts.iter().rev().copied().collect()
    } else {
        parts.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);
        catalog.add_color("Blue", "#0000ff", [0.0, 0.0, 1.0]);
        catalog
    }

    #[test]
    fn ids_outside_the_reserved_range_fall_through() {
        let catalog = test_catalog();
        let table = MessageTable::new(for_language("english"));

        assert!(table.lookup(&catalog, msg_id::SORT_CHEST).is_none());
        assert!(table.lookup(&catalog, 0).is_none());
        assert!(table.lookup(&catalog, msg_id::MOD_RANGE_END).is_none());
    }

    #[test]
    fn serves_fixed_labels_and_option_rows() {
        let catalog = test_catalog();
        let table = MessageTable::new(for_language("english"));

        assert_eq!(table.lookup(&catalog, msg_id::APPLY_DYES), Some("Apply dyes"));
        assert!(table
            .lookup(&catalog, msg_id::COLOR_SELECTED_BASE + 1)
            .unwrap()
            .ends_with("Blue"));
        // Only as many rows as the catalog has colors.
        assert!(table.lookup(&catalog, msg_id::COLOR_SELECTED_BASE + 2).is_none());
    }

    #[test]
    fn target_labels_show_the_persisted_swatch() {
        let catalog = test_catalog();
        let mut table = MessageTable::new(for_language("english"));

        table.refresh_target_labels(&catalog, &[Some(0), None, None, Some(3), None, None]);

        let primary = table.lookup(&catalog, msg_id::PRIMARY_COLOR).unwrap();
        assert!(primary.contains("#ff0000"));
        let secondary = table.lookup(&catalog, msg_id::SECONDARY_COLOR).unwrap();
        assert!(secondary.contains("MENU_DummyTransparent.dds"));
        // The paired intensity inherits a swatch only while its color is set.
        let primary_intensity = table.lookup(&catalog, msg_id::PRIMARY_INTENSITY).unwrap();
        assert!(primary_intensity.contains("#656565"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let locale = for_language("klingon");
        assert_eq!(locale.messages.apply_dyes, "Apply dyes");
        assert!(!locale.rtl);
    }

    #[test]
    fn arabic_is_rtl_and_reverses_composition() {
        let locale = for_language("arabic");
        assert!(locale.rtl);

        let table = MessageTable::new(locale);
        let catalog = Catalog::new(true);
        let back = table.lookup(&catalog, msg_id::BACK).unwrap();
        assert!(back.ends_with("> "), "icon markup should trail the text");
    }
}
