//! Status-effect param injection. The dye status effects and their VFX rows
//! don't exist in the game's param tables, so the repository lookups are
//! detoured to serve mod-owned rows for the reserved ids whenever the host's
//! own lookup comes back empty.

use std::mem;

use retour::static_detour;

use dyes::error::InitError;
use dyes::resolve::DYE_SPEFFECT_IDS;

use crate::cs::{
    SpEffectParam, SpEffectParamLookup, SpEffectVfxParam, SpEffectVfxParamLookup,
};
use crate::game::pattern;

/// Material-ex param ids referenced from the VFX rows, one per dye slot.
const DYE_MATERIAL_PARAM_IDS: [i32; 3] = [6_700_000, 6_700_001, 6_700_002];

static PRIMARY_SPEFFECT: SpEffectParam = SpEffectParam::dye_marker(DYE_SPEFFECT_IDS[0]);
static SECONDARY_SPEFFECT: SpEffectParam = SpEffectParam::dye_marker(DYE_SPEFFECT_IDS[1]);
static TERTIARY_SPEFFECT: SpEffectParam = SpEffectParam::dye_marker(DYE_SPEFFECT_IDS[2]);

static PRIMARY_VFX: SpEffectVfxParam = SpEffectVfxParam::dye_material(DYE_MATERIAL_PARAM_IDS[0]);
static SECONDARY_VFX: SpEffectVfxParam = SpEffectVfxParam::dye_material(DYE_MATERIAL_PARAM_IDS[1]);
static TERTIARY_VFX: SpEffectVfxParam = SpEffectVfxParam::dye_material(DYE_MATERIAL_PARAM_IDS[2]);

static_detour! {
    static FindSpEffectParam: unsafe extern "system" fn(*mut SpEffectParamLookup, i32);
    static FindSpEffectVfxParam: unsafe extern "system" fn(*mut SpEffectVfxParamLookup, i32);
}

// 41 8d 50 0f          lea edx, [r8 + 15]
// e8 ?? ?? ?? ??       call SoloParamRepositoryImp::GetParamResCap
// 48 85 c0             test rax, rax
// 0f 84 ?? ?? ?? ??    jz end_label
const FIND_SPEFFECT_PARAM_PATTERN: &str = concat!(
    "01000001 10001101 01010000 00001111",
    "11101000 ........ ........ ........ ........",
    "01001000 10000101 11000000",
    "00001111 10000100 ........ ........ ........ ........",
);
const FIND_SPEFFECT_PARAM_OFFSET: isize = -114;

// 41 8d 50 10          lea edx, [r8 + 16]
// e8 ?? ?? ?? ??       call SoloParamRepositoryImp::GetParamResCap
// 48 85 c0             test rax, rax
// 74 ??                jz end_label
const FIND_SPEFFECT_VFX_PARAM_PATTERN: &str = concat!(
    "01000001 10001101 01010000 00010000",
    "11101000 ........ ........ ........ ........",
    "01001000 10000101 11000000",
    "01110100 ........",
);
const FIND_SPEFFECT_VFX_PARAM_OFFSET: isize = -106;

pub(crate) unsafe fn install() -> Result<(), InitError> {
    let find_sp_effect = pattern::scan_function(
        "find_sp_effect_param",
        FIND_SPEFFECT_PARAM_PATTERN,
        FIND_SPEFFECT_PARAM_OFFSET,
    )?;
    FindSpEffectParam
        .initialize(mem::transmute(find_sp_effect), |result, id| unsafe {
            find_sp_effect_param_detour(result, id)
        })
        .map_err(|e| InitError::Hook("find_sp_effect_param", e.to_string()))?;
    FindSpEffectParam
        .enable()
        .map_err(|e| InitError::Hook("find_sp_effect_param", e.to_string()))?;

    let find_vfx = pattern::scan_function(
        "find_sp_effect_vfx_param",
        FIND_SPEFFECT_VFX_PARAM_PATTERN,
        FIND_SPEFFECT_VFX_PARAM_OFFSET,
    )?;
    FindSpEffectVfxParam
        .initialize(mem::transmute(find_vfx), |result, id| unsafe {
            find_sp_effect_vfx_param_detour(result, id)
        })
        .map_err(|e| InitError::Hook("find_sp_effect_vfx_param", e.to_string()))?;
    FindSpEffectVfxParam
        .enable()
        .map_err(|e| InitError::Hook("find_sp_effect_vfx_param", e.to_string()))?;

    Ok(())
}

unsafe fn find_sp_effect_param_detour(result: *mut SpEffectParamLookup, id: i32) {
    FindSpEffectParam.call(result, id);

    let Some(result) = result.as_mut() else {
        return;
    };
    if !result.row.is_null() {
        return;
    }

    let row = if id == DYE_SPEFFECT_IDS[0] {
        &PRIMARY_SPEFFECT
    } else if id == DYE_SPEFFECT_IDS[1] {
        &SECONDARY_SPEFFECT
    } else if id == DYE_SPEFFECT_IDS[2] {
        &TERTIARY_SPEFFECT
    } else {
        return;
    };

    result.row = row as *const _ as *mut SpEffectParam;
    result.id = id;
    result.unk0c = 4;
}

unsafe fn find_sp_effect_vfx_param_detour(result: *mut SpEffectVfxParamLookup, id: i32) {
    FindSpEffectVfxParam.call(result, id);

    let Some(result) = result.as_mut() else {
        return;
    };
    if !result.row.is_null() {
        return;
    }

    let row = if id == DYE_SPEFFECT_IDS[0] {
        &PRIMARY_VFX
    } else if id == DYE_SPEFFECT_IDS[1] {
        &SECONDARY_VFX
    } else if id == DYE_SPEFFECT_IDS[2] {
        &TERTIARY_VFX
    } else {
        return;
    };

    result.row = row as *const _ as *mut SpEffectVfxParam;
    result.id = id;
    result.unk10 = 1;
}
