//! The per-frame entry point. Every player-character update resolves the
//! effective dyes for that character and reconciles its material modifiers
//! and status effects; the local player also feeds the periodic peer
//! broadcast. A second, smaller detour stamps a marker into characters the
//! game builds by copying the local player (mimics), so they pick up the
//! same dyes on their own updates.

use std::mem;
use std::sync::OnceLock;

use retour::static_detour;
use tracing::warn;

use dyes::error::InitError;
use dyes::resolve::{self, ModifierList, ModifierWrite, Preview, StatusEffects};
use dyes::sync;
use dyes::target::DyeValues;

use crate::cs::{self, GameVector, MaterialModifier, PlayerIns, WorldChrMan};
use crate::game::pattern;
use crate::hooks::inventory::LiveInventory;
use crate::singleton;
use crate::Mod;

/// Value stamped into the copied equipment block to mark a mimic.
const PLAYER_COPY_MARKER: i32 = 0;

static_detour! {
    static PlayerUpdate: unsafe extern "system" fn(*mut PlayerIns, f32);
    static CopyPlayerData: unsafe extern "system" fn(*mut PlayerIns, *mut PlayerIns);
}

// CS::PlayerIns::Update(float delta_time), found by a flag store in its body.
//
// 84 c0                         test al, al
// 74 09                         je +9
// c6 87 ?? ?? ?? ?? 01          mov byte ptr [rdi + ????], 1
// eb 0a                         jmp +10
// c7 87 ?? ?? ?? ?? 00000000    mov dword ptr [rdi + ????], 0
const PLAYER_UPDATE_PATTERN: &str = concat!(
    "10000100 11000000",
    "01110100 00001001",
    "11000110 10000111 ........ ........ ........ ........ 00000001",
    "11101011 00001010",
    "11000111 10000111 ........ ........ ........ ........ 00000000 00000000 00000000 00000000",
);
const PLAYER_UPDATE_OFFSET: isize = -203;

// CopyPlayerCharacterData(PlayerIns *target, PlayerIns *source)
//
// c7 44 24 30 00 00 00 00      mov dword ptr [rsp + 0x30], 0
// 48 8d 54 24 28               lea rdx, [rsp + 0x28]
// 48 8b 8b 80 05 00 00         mov rcx, [rbx + 0x580]
// e8 ?? ?? ?? ??               call PlayerGameData::PopulatePcInfoBuffer
const COPY_PLAYER_DATA_PATTERN: &str = concat!(
    "11000111 01000100 00100100 00110000 00000000 00000000 00000000 00000000",
    "01001000 10001101 01010100 00100100 00101000",
    "01001000 10001011 10001011 10000000 00000101 00000000 00000000",
    "11101000 ........ ........ ........ ........",
);
const COPY_PLAYER_DATA_OFFSET: isize = -216;

// ChrIns::ApplySpEffect(ChrIns*, int sp_effect_id, bool unk)
//
// 48 8b c4             mov rax, rsp
// 48 89 58 10          mov [rax + 0x10], rbx
// 48 89 70 18          mov [rax + 0x18], rsi
// 57                   push rdi
// 48 83 ec 40          sub rsp, 0x40
// 8b f2                mov esi, edx
// 48 8b d9             mov rbx, rcx
const APPLY_SPEFFECT_PATTERN: &str = concat!(
    "01001000 10001011 11000100",
    "01001000 10001001 01011000 00010000",
    "01001000 10001001 01110000 00011000",
    "01010111",
    "01001000 10000011 11101100 01000000",
    "10001011 11110010",
    "01001000 10001011 11011001",
);

// ChrIns::ClearSpEffect(ChrIns*, int sp_effect_id)
//
// 40 53                push rbx
// 48 83 ec 20          sub rsp, 0x20
// 8b da                mov ebx, edx
// 48 8b d1             mov rdx, rcx
// e8 ?? ?? ?? ??       call SpecialEffect::RemoveById
const CLEAR_SPEFFECT_PATTERN: &str = concat!(
    "01000000 01010011",
    "01001000 10000011 11101100 00100000",
    "10001011 11011010",
    "01001000 10001011 11010001",
    "11101000 ........ ........ ........ ........",
);

type ApplySpEffectFn = unsafe extern "system" fn(*mut PlayerIns, i32, bool);
type ClearSpEffectFn = unsafe extern "system" fn(*mut PlayerIns, i32);

struct SpEffectFns {
    apply: ApplySpEffectFn,
    clear: ClearSpEffectFn,
}

static SPEFFECT_FNS: OnceLock<SpEffectFns> = OnceLock::new();

pub(crate) unsafe fn install() -> Result<(), InitError> {
    // The status-effect mirror is a nice-to-have that depends on the host
    // version; losing it must not take the whole mod down.
    match scan_sp_effect_fns() {
        Ok(fns) => {
            let _ = SPEFFECT_FNS.set(fns);
        }
        Err(error) => warn!("Status-effect mirroring disabled: {error}"),
    }

    let update = pattern::scan_function("player_update", PLAYER_UPDATE_PATTERN, PLAYER_UPDATE_OFFSET)?;
    PlayerUpdate
        .initialize(mem::transmute(update), player_update_detour)
        .map_err(|e| InitError::Hook("player_update", e.to_string()))?;
    PlayerUpdate
        .enable()
        .map_err(|e| InitError::Hook("player_update", e.to_string()))?;

    let copy = pattern::scan_function(
        "copy_player_data",
        COPY_PLAYER_DATA_PATTERN,
        COPY_PLAYER_DATA_OFFSET,
    )?;
    CopyPlayerData
        .initialize(mem::transmute(copy), copy_player_data_detour)
        .map_err(|e| InitError::Hook("copy_player_data", e.to_string()))?;
    CopyPlayerData
        .enable()
        .map_err(|e| InitError::Hook("copy_player_data", e.to_string()))?;

    Ok(())
}

fn scan_sp_effect_fns() -> Result<SpEffectFns, InitError> {
    let apply = pattern::scan_function("apply_sp_effect", APPLY_SPEFFECT_PATTERN, 0)?;
    let clear = pattern::scan_function("clear_sp_effect", CLEAR_SPEFFECT_PATTERN, 0)?;
    unsafe {
        Ok(SpEffectFns {
            apply: mem::transmute(apply),
            clear: mem::transmute(clear),
        })
    }
}

fn player_update_detour(player: *mut PlayerIns, delta_time: f32) {
    unsafe {
        PlayerUpdate.call(player, delta_time);
        if let Some(state) = crate::instance() {
            update_character(state, player, delta_time);
        }
    }
}

/// Stamp characters built by copying the local player, so their updates take
/// the local-player branch.
fn copy_player_data_detour(target: *mut PlayerIns, source: *mut PlayerIns) {
    unsafe {
        CopyPlayerData.call(target, source);

        let Ok(Some(world_chr_man)) = singleton::get_instance::<WorldChrMan>() else {
            return;
        };
        if !source.is_null() && std::ptr::eq(source, (*world_chr_man).main_player) {
            if let Some(target) = target.as_mut() {
                target.set_gear_marker(PLAYER_COPY_MARKER);
            }
        }
    }
}

unsafe fn update_character(state: &'static Mod, player_ptr: *mut PlayerIns, delta_time: f32) {
    let Some(player) = player_ptr.as_mut() else {
        return;
    };
    let Ok(Some(world_chr_man)) = singleton::get_instance::<WorldChrMan>() else {
        return;
    };
    let main_player = (*world_chr_man).main_player;
    if main_player.is_null() {
        return;
    }

    let is_local = std::ptr::eq(player_ptr, main_player);
    let is_mimic = !is_local && player.gear_marker() == Some(PLAYER_COPY_MARKER);

    if is_local || is_mimic {
        let inventory = LiveInventory::current();
        let preview = Preview {
            cursor: state
                .controller
                .lock()
                .ok()
                .and_then(|controller| controller.cursor()),
            focused_row: cs::focused_list_row(),
        };
        let values = resolve::resolve_local(&state.catalog, &inventory, preview);
        apply_to_character(player, &values);

        if is_local && !state.client_side_only {
            let send_now = state
                .throttle
                .lock()
                .map(|mut throttle| throttle.tick(delta_time))
                .unwrap_or(false);
            if send_now {
                if let Ok(mut transport) = state.transport.lock() {
                    if let Some(transport) = transport.as_mut() {
                        sync::broadcast(transport, &values);
                    }
                }
            }
        }
    } else {
        if state.client_side_only {
            return;
        }
        let Some(session) = player.session_holder.network_session.as_ref() else {
            return;
        };
        let peer = session.steam_id;

        if let (Ok(mut peers), Ok(mut transport)) = (state.peers.lock(), state.transport.lock()) {
            if let Some(transport) = transport.as_mut() {
                peers.receive(transport);
            }
            let values = peers.get(peer);
            apply_to_character(player, &values);
        }
    }
}

unsafe fn apply_to_character(player: &mut PlayerIns, values: &DyeValues) {
    if let Some(modules) = player.chr_modules.as_mut() {
        if let Some(module) = modules.model_param_modifier_module.as_mut() {
            let mut list = LiveModifierList {
                modifiers: &mut module.modifiers,
            };
            resolve::apply_modifiers(&mut list, values);
        }
    }

    if SPEFFECT_FNS.get().is_some() {
        let mut effects = LiveStatusEffects { player };
        resolve::sync_status_effects(&mut effects, values);
    }
}

/// Find-or-append over the character's modifier vector. The whole entry is
/// rewritten on a hit because the game zeroes this storage on its own
/// schedule.
struct LiveModifierList<'a> {
    modifiers: &'a mut GameVector<MaterialModifier>,
}

impl ModifierList for LiveModifierList<'_> {
    fn overwrite(&mut self, write: &ModifierWrite) -> bool {
        unsafe {
            for modifier in self.modifiers.as_mut_slice() {
                if wide_eq(modifier.name, write.name) {
                    write_modifier(modifier, write);
                    return true;
                }
            }
        }
        false
    }

    fn append(&mut self, write: &ModifierWrite) {
        unsafe {
            let mut modifier = MaterialModifier {
                name: wide_param_name(write.name),
                material_id: 0,
                value1: 0.0,
                value2: 0.0,
                value3: 0.0,
                value4: 0.0,
                value5: 0.0,
            };
            write_modifier(&mut modifier, write);
            self.modifiers.push(modifier);
        }
    }
}

fn write_modifier(modifier: &mut MaterialModifier, write: &ModifierWrite) {
    modifier.material_id = write.material_id;
    modifier.value1 = write.channels[0];
    modifier.value2 = write.channels[1];
    modifier.value3 = write.channels[2];
    modifier.value4 = write.channels[3];
    modifier.value5 = write.channels[4];
}

/// Compare a null-terminated UTF-16 name against a parameter name.
unsafe fn wide_eq(mut wide: *const u16, name: &str) -> bool {
    if wide.is_null() {
        return false;
    }
    for expected in name.encode_utf16() {
        if *wide != expected {
            return false;
        }
        wide = wide.add(1);
    }
    *wide == 0
}

/// Stable UTF-16 storage for the handful of parameter names the mod writes.
fn wide_param_name(name: &'static str) -> *const u16 {
    static NAMES: OnceLock<Vec<(&'static str, Box<[u16]>)>> = OnceLock::new();
    let names = NAMES.get_or_init(|| {
        [
            resolve::PRIMARY_MATERIAL,
            resolve::SECONDARY_MATERIAL,
            resolve::TERTIARY_MATERIAL,
            resolve::TERTIARY_MIRROR_MATERIAL,
        ]
        .into_iter()
        .map(|name| {
            let wide: Box<[u16]> = name.encode_utf16().chain(std::iter::once(0)).collect();
            (name, wide)
        })
        .collect()
    });

    names
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, wide)| wide.as_ptr())
        .unwrap_or(std::ptr::null())
}

struct LiveStatusEffects<'a> {
    player: &'a mut PlayerIns,
}

impl StatusEffects for LiveStatusEffects<'_> {
    fn has(&self, effect_id: i32) -> bool {
        unsafe {
            self.player
                .special_effects
                .as_ref()
                .map(|effects| effects.contains(effect_id))
                .unwrap_or(false)
        }
    }

    fn apply(&mut self, effect_id: i32) {
        if let Some(fns) = SPEFFECT_FNS.get() {
            unsafe { (fns.apply)(self.player, effect_id, false) };
        }
    }

    fn clear(&mut self, effect_id: i32) {
        if let Some(fns) = SPEFFECT_FNS.get() {
            unsafe { (fns.clear)(self.player, effect_id) };
        }
    }
}
