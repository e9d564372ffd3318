//! Per-frame reconciliation. Each character update resolves the effective
//! dye values (persisted selections, with the highlighted-but-unconfirmed
//! menu row substituted while a picker is open) and writes them into the
//! character's material-modifier list and status-effect flags. Everything
//! here is recomputed every frame; the host zeroes the modifier storage on
//! its own schedule, so nothing may rely on values persisting between
//! frames.

use crate::catalog::Catalog;
use crate::store::{self, PlayerInventory};
use crate::target::{DyeTarget, DyeValue, DyeValues};

/// Material parameter names, one per tint channel. The first albedo slot
/// covers most of an armor model, the third covers accents; the fourth and
/// second are both minor detail channels and share the tertiary dye.
pub const PRIMARY_MATERIAL: &str = "[Albedo]_1_[Tint]";
pub const SECONDARY_MATERIAL: &str = "[Albedo]_3_[Tint]";
pub const TERTIARY_MATERIAL: &str = "[Albedo]_4_[Tint]";
pub const TERTIARY_MIRROR_MATERIAL: &str = "[Albedo]_2_[Tint]";

/// Status effects mirroring whether each dye slot is applied.
pub const DYE_SPEFFECT_IDS: [i32; 3] = [67_000_000, 67_000_001, 67_000_002];

/// Interval between dye-state broadcasts to connected players.
pub const NET_UPDATE_INTERVAL: f32 = 0.1;

/// The open picker, if any, and the row the player is hovering in it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preview {
    pub cursor: Option<DyeTarget>,
    pub focused_row: Option<usize>,
}

/// Resolve the local player's dye values from the persisted selections, with
/// the hovered menu row overriding whichever target the open picker edits.
/// The override is never written back; confirming is the commit state's job.
pub fn resolve_local(
    catalog: &Catalog,
    inventory: &impl PlayerInventory,
    preview: Preview,
) -> DyeValues {
    DyeValues {
        primary: resolve_slot(catalog, inventory, preview, DyeTarget::PrimaryColor),
        secondary: resolve_slot(catalog, inventory, preview, DyeTarget::SecondaryColor),
        tertiary: resolve_slot(catalog, inventory, preview, DyeTarget::TertiaryColor),
    }
}

fn resolve_slot(
    catalog: &Catalog,
    inventory: &impl PlayerInventory,
    preview: Preview,
    color_target: DyeTarget,
) -> DyeValue {
    let intensity_target = color_target.paired_intensity().unwrap();

    let mut color_index = store::get_selected(inventory, catalog, color_target);
    let mut intensity_index = store::get_selected(inventory, catalog, intensity_target);

    if let (Some(cursor), Some(row)) = (preview.cursor, preview.focused_row) {
        if cursor == color_target {
            // Row 0 of the color picker is "none"; hovering it previews
            // nothing and keeps the persisted color.
            if let Some(hovered) = row.checked_sub(1).filter(|&i| i < catalog.colors().len()) {
                color_index = Some(hovered);
            }
        } else if cursor == intensity_target && row < catalog.intensities().len() {
            intensity_index = Some(row);
        }
    }

    let color = color_index.and_then(|i| catalog.color(i));
    let intensity = intensity_index.and_then(|i| catalog.intensity(i));

    match (color, intensity) {
        (Some(color), Some(intensity)) => DyeValue {
            is_applied: true,
            red: color.red,
            green: color.green,
            blue: color.blue,
            intensity: intensity.multiplier,
        },
        _ => DyeValue::default(),
    }
}

/// One shader-parameter override to reconcile into a character's modifier
/// list this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModifierWrite {
    pub name: &'static str,
    pub material_id: i32,
    /// RGB, alpha, intensity. All five channels are written every time
    /// because the host clears the backing memory on its own schedule and a
    /// partial update would leave stale zeros.
    pub channels: [f32; 5],
}

/// A character's material-modifier list, reduced to the find-or-append
/// contract the reconciliation needs.
pub trait ModifierList {
    /// Overwrite the entry with this name in place, returning false when no
    /// such entry exists yet.
    fn overwrite(&mut self, write: &ModifierWrite) -> bool;
    fn append(&mut self, write: &ModifierWrite);
}

/// The modifier writes implied by a set of resolved dyes, in a stable order.
pub fn modifier_writes(values: &DyeValues) -> Vec<ModifierWrite> {
    let mut writes = Vec::with_capacity(4);
    let mut push = |name: &'static str, value: &DyeValue| {
        writes.push(ModifierWrite {
            name,
            material_id: 1,
            channels: [value.red, value.green, value.blue, 1.0, value.intensity],
        });
    };

    if values.primary.is_applied {
        push(PRIMARY_MATERIAL, &values.primary);
    }
    if values.secondary.is_applied {
        push(SECONDARY_MATERIAL, &values.secondary);
    }
    if values.tertiary.is_applied {
        push(TERTIARY_MATERIAL, &values.tertiary);
        push(TERTIARY_MIRROR_MATERIAL, &values.tertiary);
    }
    writes
}

/// Upsert every applied dye into the modifier list: overwrite the entry with
/// the matching parameter name, else append one.
pub fn apply_modifiers(list: &mut impl ModifierList, values: &DyeValues) {
    for write in modifier_writes(values) {
        if !list.overwrite(&write) {
            list.append(&write);
        }
    }
}

/// A character's status-effect flags, reduced to what the dye mirror needs.
pub trait StatusEffects {
    fn has(&self, effect_id: i32) -> bool;
    fn apply(&mut self, effect_id: i32);
    fn clear(&mut self, effect_id: i32);
}

/// Mirror `is_applied` per slot onto the dye status effects, only issuing a
/// call when the current flag disagrees with the desired one.
pub fn sync_status_effects(effects: &mut impl StatusEffects, values: &DyeValues) {
    let applied = [
        values.primary.is_applied,
        values.secondary.is_applied,
        values.tertiary.is_applied,
    ];
    for (effect_id, desired) in DYE_SPEFFECT_IDS.into_iter().zip(applied) {
        if effects.has(effect_id) != desired {
            if desired {
                effects.apply(effect_id);
            } else {
                effects.clear(effect_id);
            }
        }
    }
}

/// Accumulates frame time and fires once per broadcast interval.
#[derive(Debug, Default)]
pub struct SendThrottle {
    accumulated: f32,
}

impl SendThrottle {
    pub fn tick(&mut self, delta_time: f32) -> bool {
        self.accumulated += delta_time;
        if self.accumulated > NET_UPDATE_INTERVAL {
            self.accumulated -= NET_UPDATE_INTERVAL;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::FakeInventory;
    use crate::store::DEFAULT_INTENSITY_INDEX;

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);
        catalog.add_color("Blue", "#0000ff", [0.0, 0.0, 1.0]);
        catalog
    }

    #[derive(Default)]
    struct FakeModifierList {
        entries: Vec<ModifierWrite>,
    }

    impl ModifierList for FakeModifierList {
        fn overwrite(&mut self, write: &ModifierWrite) -> bool {
            for entry in &mut self.entries {
                if entry.name == write.name {
                    *entry = *write;
                    return true;
                }
            }
            false
        }
        fn append(&mut self, write: &ModifierWrite) {
            self.entries.push(*write);
        }
    }

    #[derive(Default)]
    struct FakeStatusEffects {
        active: Vec<i32>,
        calls: usize,
    }

    impl StatusEffects for FakeStatusEffects {
        fn has(&self, effect_id: i32) -> bool {
            self.active.contains(&effect_id)
        }
        fn apply(&mut self, effect_id: i32) {
            self.calls += 1;
            self.active.push(effect_id);
        }
        fn clear(&mut self, effect_id: i32) {
            self.calls += 1;
            self.active.retain(|&id| id != effect_id);
        }
    }

    #[test]
    fn selected_red_resolves_to_applied_red() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        store::set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(0));

        let values = resolve_local(&catalog, &inventory, Preview::default());
        assert!(values.primary.is_applied);
        assert_eq!(values.primary.red, 1.0);
        assert_eq!(values.primary.green, 0.0);
        assert_eq!(values.primary.blue, 0.0);
        // Intensity falls back to the default 1.0x step.
        assert_eq!(
            values.primary.intensity,
            catalog.intensity(DEFAULT_INTENSITY_INDEX).unwrap().multiplier
        );
        assert!(!values.secondary.is_applied);
        assert!(!values.tertiary.is_applied);
    }

    #[test]
    fn empty_catalog_applies_nothing() {
        let catalog = Catalog::new(false);
        let inventory = FakeInventory::loaded();

        let values = resolve_local(&catalog, &inventory, Preview::default());
        assert_eq!(values, DyeValues::default());

        let mut list = FakeModifierList::default();
        apply_modifiers(&mut list, &values);
        assert!(list.entries.is_empty());
    }

    #[test]
    fn hovering_a_row_previews_it_without_persisting() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        store::set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(0));

        // Hovering row 2 (color index 1) of the open primary color picker.
        let preview = Preview {
            cursor: Some(DyeTarget::PrimaryColor),
            focused_row: Some(2),
        };
        let values = resolve_local(&catalog, &inventory, preview);
        assert_eq!(values.primary.blue, 1.0);
        assert_eq!(values.primary.red, 0.0);

        // Nothing was written through.
        assert_eq!(
            store::get_selected(&inventory, &catalog, DyeTarget::PrimaryColor),
            Some(0)
        );

        // Row 0 is "none" and previews nothing.
        let preview = Preview {
            cursor: Some(DyeTarget::PrimaryColor),
            focused_row: Some(0),
        };
        let values = resolve_local(&catalog, &inventory, preview);
        assert_eq!(values.primary.red, 1.0);

        // An out-of-range row keeps the persisted value.
        let preview = Preview {
            cursor: Some(DyeTarget::PrimaryColor),
            focused_row: Some(99),
        };
        let values = resolve_local(&catalog, &inventory, preview);
        assert_eq!(values.primary.red, 1.0);
    }

    #[test]
    fn intensity_preview_overrides_only_its_own_slot() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        store::set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(0));
        store::set_selected(&mut inventory, &catalog, DyeTarget::SecondaryColor, Some(1));

        let preview = Preview {
            cursor: Some(DyeTarget::PrimaryIntensity),
            focused_row: Some(9),
        };
        let values = resolve_local(&catalog, &inventory, preview);
        assert_eq!(values.primary.intensity, 64.0);
        assert_eq!(
            values.secondary.intensity,
            catalog.intensity(DEFAULT_INTENSITY_INDEX).unwrap().multiplier
        );
    }

    #[test]
    fn upsert_is_idempotent_in_content() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        store::set_selected(&mut inventory, &catalog, DyeTarget::TertiaryColor, Some(1));

        let values = resolve_local(&catalog, &inventory, Preview::default());
        let mut list = FakeModifierList::default();
        apply_modifiers(&mut list, &values);
        let first = list.entries.clone();
        // Tertiary writes its own channel plus the mirror.
        assert_eq!(first.len(), 2);

        apply_modifiers(&mut list, &values);
        assert_eq!(list.entries, first);
    }

    #[test]
    fn all_five_channels_are_written() {
        let values = DyeValues {
            primary: DyeValue {
                is_applied: true,
                red: 0.25,
                green: 0.5,
                blue: 0.75,
                intensity: 2.0,
            },
            ..Default::default()
        };
        let writes = modifier_writes(&values);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].name, PRIMARY_MATERIAL);
        assert_eq!(writes[0].channels, [0.25, 0.5, 0.75, 1.0, 2.0]);
    }

    #[test]
    fn status_effects_only_change_on_disagreement() {
        let mut effects = FakeStatusEffects::default();
        let mut values = DyeValues::default();
        values.primary.is_applied = true;

        sync_status_effects(&mut effects, &values);
        assert_eq!(effects.calls, 1);
        assert!(effects.has(DYE_SPEFFECT_IDS[0]));

        // Same state again: no further calls.
        sync_status_effects(&mut effects, &values);
        assert_eq!(effects.calls, 1);

        values.primary.is_applied = false;
        sync_status_effects(&mut effects, &values);
        assert_eq!(effects.calls, 2);
        assert!(!effects.has(DYE_SPEFFECT_IDS[0]));
    }

    #[test]
    fn throttle_fires_once_per_interval() {
        let mut throttle = SendThrottle::default();
        let mut fires = 0;
        for _ in 0..60 {
            if throttle.tick(1.0 / 60.0) {
                fires += 1;
            }
        }
        // A second of 60fps frames crosses the 100ms boundary ~10 times.
        assert!((9..=10).contains(&fires), "fired {fires} times");
    }
}
