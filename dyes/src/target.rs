/// One of the six addressable dye selections: a color or an intensity for
/// each of the three tint channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DyeTarget {
    PrimaryColor,
    SecondaryColor,
    TertiaryColor,
    PrimaryIntensity,
    SecondaryIntensity,
    TertiaryIntensity,
}

impl DyeTarget {
    pub const ALL: [DyeTarget; 6] = [
        DyeTarget::PrimaryColor,
        DyeTarget::SecondaryColor,
        DyeTarget::TertiaryColor,
        DyeTarget::PrimaryIntensity,
        DyeTarget::SecondaryIntensity,
        DyeTarget::TertiaryIntensity,
    ];

    /// Stable position used for goods-id ranges and message tables.
    pub fn index(self) -> usize {
        match self {
            DyeTarget::PrimaryColor => 0,
            DyeTarget::SecondaryColor => 1,
            DyeTarget::TertiaryColor => 2,
            DyeTarget::PrimaryIntensity => 3,
            DyeTarget::SecondaryIntensity => 4,
            DyeTarget::TertiaryIntensity => 5,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(
            self,
            DyeTarget::PrimaryColor | DyeTarget::SecondaryColor | DyeTarget::TertiaryColor
        )
    }

    /// The intensity selection that becomes meaningless when this color is
    /// cleared, if this is a color target.
    pub fn paired_intensity(self) -> Option<DyeTarget> {
        match self {
            DyeTarget::PrimaryColor => Some(DyeTarget::PrimaryIntensity),
            DyeTarget::SecondaryColor => Some(DyeTarget::SecondaryIntensity),
            DyeTarget::TertiaryColor => Some(DyeTarget::TertiaryIntensity),
            _ => None,
        }
    }

    pub fn paired_color(self) -> Option<DyeTarget> {
        match self {
            DyeTarget::PrimaryIntensity => Some(DyeTarget::PrimaryColor),
            DyeTarget::SecondaryIntensity => Some(DyeTarget::SecondaryColor),
            DyeTarget::TertiaryIntensity => Some(DyeTarget::TertiaryColor),
            _ => None,
        }
    }
}

/// The resolved dye for a single tint channel. Recomputed from the persisted
/// selections (and any live preview) every frame, never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DyeValue {
    pub is_applied: bool,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub intensity: f32,
}

/// The full set of resolved dyes for one character.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DyeValues {
    pub primary: DyeValue,
    pub secondary: DyeValue,
    pub tertiary: DyeValue,
}
