//! Dye selections persist as hidden sentinel goods in the player's save
//! inventory: one disjoint goods-id range per dye target, where the presence
//! of `base + index` means that option is selected. The inventory is the only
//! host container that rides in the save file, so selections survive without
//! touching the save format. The invariant is at most one sentinel per range.

use crate::catalog::Catalog;
use crate::target::DyeTarget;

/// Item-type tag for goods when calling the host's inventory functions.
pub const GOODS_ITEM_TYPE: u32 = 0x4000_0000;

/// Goods sub-type that the inventory UI never renders.
pub const HIDDEN_GOODS_TYPE: u8 = 13;

/// First goods id of each target's sentinel range, by target index.
const GOODS_RANGE_BASES: [u32; 6] = [
    6_700_000, // primary color
    6_710_000, // secondary color
    6_720_000, // tertiary color
    6_730_000, // primary intensity
    6_740_000, // secondary intensity
    6_750_000, // tertiary intensity
];

/// Intensity read when no sentinel is present, matching the pre-mod look.
pub const DEFAULT_INTENSITY_INDEX: usize = 3;

/// Access to the local player's save inventory. Implemented against the live
/// game by the agent and by in-memory fakes in tests.
pub trait PlayerInventory {
    /// Whether a session with a loaded player currently exists. When this is
    /// false every store operation is a no-op; load screens hit this
    /// constantly and it is not an error.
    fn available(&self) -> bool;
    fn has_item(&self, goods_id: u32) -> bool;
    fn add_item(&mut self, goods_id: u32);
    fn remove_item(&mut self, goods_id: u32);
}

/// The sentinel goods-id range for a target: `(first id, length)`.
pub fn goods_range(catalog: &Catalog, target: DyeTarget) -> (u32, usize) {
    let len = if target.is_color() {
        catalog.colors().len()
    } else {
        catalog.intensities().len()
    };
    (GOODS_RANGE_BASES[target.index()], len)
}

/// Whether a goods id falls inside any sentinel range for this catalog.
pub fn is_sentinel_goods_id(catalog: &Catalog, goods_id: u32) -> bool {
    DyeTarget::ALL.iter().any(|&target| {
        let (base, len) = goods_range(catalog, target);
        goods_id >= base && goods_id < base + len as u32
    })
}

/// The persisted selection for a target: the first sentinel present in its
/// range, else the per-category default (colors have none, intensities read
/// as the 1.0x step).
pub fn get_selected(
    inventory: &impl PlayerInventory,
    catalog: &Catalog,
    target: DyeTarget,
) -> Option<usize> {
    if !inventory.available() {
        return None;
    }

    let (base, len) = goods_range(catalog, target);
    for index in 0..len {
        if inventory.has_item(base + index as u32) {
            return Some(index);
        }
    }

    if target.is_color() || len == 0 {
        None
    } else {
        Some(DEFAULT_INTENSITY_INDEX.min(len - 1))
    }
}

/// Replace the persisted selection for a target. Every sentinel in the range
/// is removed first, so the at-most-one invariant holds after any sequence of
/// calls. Clearing a color also clears its paired intensity; an intensity
/// without a color is meaningless.
pub fn set_selected(
    inventory: &mut impl PlayerInventory,
    catalog: &Catalog,
    target: DyeTarget,
    index: Option<usize>,
) {
    if !inventory.available() {
        return;
    }

    let (base, len) = goods_range(catalog, target);
    for existing in 0..len {
        let goods_id = base + existing as u32;
        if inventory.has_item(goods_id) {
            inventory.remove_item(goods_id);
        }
    }

    match index {
        Some(index) if index < len => inventory.add_item(base + index as u32),
        Some(index) => {
            tracing::warn!("Ignoring out-of-range selection {index} for {target:?}");
        }
        None => {
            if let Some(paired) = target.paired_intensity() {
                set_selected(inventory, catalog, paired, None);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    /// In-memory stand-in for the save inventory.
    #[derive(Default)]
    pub(crate) struct FakeInventory {
        pub available: bool,
        pub items: HashSet<u32>,
    }

    impl FakeInventory {
        pub fn loaded() -> Self {
            FakeInventory {
                available: true,
                items: HashSet::new(),
            }
        }
    }

    impl PlayerInventory for FakeInventory {
        fn available(&self) -> bool {
            self.available
        }
        fn has_item(&self, goods_id: u32) -> bool {
            self.items.contains(&goods_id)
        }
        fn add_item(&mut self, goods_id: u32) {
            self.items.insert(goods_id);
        }
        fn remove_item(&mut self, goods_id: u32) {
            self.items.remove(&goods_id);
        }
    }

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);
        catalog.add_color("Green", "#00ff00", [0.0, 1.0, 0.0]);
        catalog.add_color("Blue", "#0000ff", [0.0, 0.0, 1.0]);
        catalog
    }

    #[test]
    fn selections_round_trip() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();

        for index in 0..catalog.colors().len() {
            set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(index));
            assert_eq!(
                get_selected(&inventory, &catalog, DyeTarget::PrimaryColor),
                Some(index)
            );
        }
    }

    #[test]
    fn at_most_one_sentinel_per_range() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();

        for index in [0, 2, 1, 2, 0] {
            set_selected(&mut inventory, &catalog, DyeTarget::SecondaryColor, Some(index));
            let (base, len) = goods_range(&catalog, DyeTarget::SecondaryColor);
            let present = (0..len)
                .filter(|i| inventory.has_item(base + *i as u32))
                .count();
            assert_eq!(present, 1);
        }
    }

    #[test]
    fn clearing_a_color_clears_its_intensity() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();

        set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(1));
        set_selected(&mut inventory, &catalog, DyeTarget::PrimaryIntensity, Some(7));
        assert_eq!(
            get_selected(&inventory, &catalog, DyeTarget::PrimaryIntensity),
            Some(7)
        );

        set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, None);
        assert_eq!(get_selected(&inventory, &catalog, DyeTarget::PrimaryColor), None);
        // The intensity sentinel is gone too; the read falls back to default.
        assert_eq!(
            get_selected(&inventory, &catalog, DyeTarget::PrimaryIntensity),
            Some(DEFAULT_INTENSITY_INDEX)
        );
        assert!(inventory.items.is_empty());
    }

    #[test]
    fn intensity_defaults_to_the_middle_step() {
        let catalog = test_catalog();
        let inventory = FakeInventory::loaded();

        assert_eq!(
            get_selected(&inventory, &catalog, DyeTarget::TertiaryIntensity),
            Some(DEFAULT_INTENSITY_INDEX)
        );
        assert_eq!(get_selected(&inventory, &catalog, DyeTarget::TertiaryColor), None);
    }

    #[test]
    fn no_session_means_no_ops() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::default();

        assert_eq!(get_selected(&inventory, &catalog, DyeTarget::PrimaryColor), None);
        assert_eq!(
            get_selected(&inventory, &catalog, DyeTarget::PrimaryIntensity),
            None
        );

        set_selected(&mut inventory, &catalog, DyeTarget::PrimaryColor, Some(0));
        assert!(inventory.items.is_empty());
    }

    #[test]
    fn empty_catalog_reads_as_nothing() {
        let catalog = Catalog::new(false);
        let inventory = FakeInventory::loaded();

        assert_eq!(get_selected(&inventory, &catalog, DyeTarget::PrimaryColor), None);
        // Intensities still exist (the ladder is fixed) but colors do not.
        assert!(catalog.colors().is_empty());
    }

    #[test]
    fn sentinel_ranges_are_disjoint() {
        let catalog = test_catalog();
        for (i, &a) in DyeTarget::ALL.iter().enumerate() {
            for &b in &DyeTarget::ALL[i + 1..] {
                let (base_a, len_a) = goods_range(&catalog, a);
                let (base_b, len_b) = goods_range(&catalog, b);
                assert!(
                    base_a + len_a as u32 <= base_b || base_b + len_b as u32 <= base_a,
                    "{a:?} and {b:?} overlap"
                );
            }
        }
    }
}
