//! Bindings for the host structures the mod reads and writes. Layouts cover
//! only the fields in use; everything in between is opaque padding. Offsets
//! match the current patch line of the game.

use std::mem;
use std::ptr;

use crate::singleton::{self, RuntimeClass};

/// Engine-side allocator handle, reached through vftable calls the way the
/// game itself does.
#[repr(C)]
pub struct DlAllocator {
    vftable: *const usize,
}

impl DlAllocator {
    /// The allocate method sits at vftable slot 10.
    pub unsafe fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        let allocate: unsafe extern "system" fn(*mut DlAllocator, usize, usize) -> *mut u8 =
            mem::transmute(*self.vftable.add(10));
        allocate(self, size, alignment)
    }

    /// Deallocate sits right after allocate.
    pub unsafe fn deallocate(&mut self, allocation: *mut u8) {
        let deallocate: unsafe extern "system" fn(*mut DlAllocator, *mut u8) =
            mem::transmute(*self.vftable.add(11));
        deallocate(self, allocation)
    }
}

/// The engine's vector layout: allocator, begin, end, capacity end.
#[repr(C)]
pub struct GameVector<T> {
    allocator: *mut DlAllocator,
    begin: *mut T,
    end: *mut T,
    capacity_end: *mut T,
}

impl<T> GameVector<T> {
    pub fn len(&self) -> usize {
        if self.begin.is_null() {
            return 0;
        }
        unsafe { self.end.offset_from(self.begin).max(0) as usize }
    }

    pub unsafe fn as_mut_slice(&mut self) -> &mut [T] {
        if self.begin.is_null() {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.begin, self.len())
    }

    pub unsafe fn as_slice(&self) -> &[T] {
        if self.begin.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.begin, self.len())
    }

    /// Append using spare capacity, growing through the vector's own
    /// allocator when full, like the engine's push_back does.
    pub unsafe fn push(&mut self, value: T) {
        if self.end == self.capacity_end {
            if !self.grow() {
                return;
            }
        }
        ptr::write(self.end, value);
        self.end = self.end.add(1);
    }

    unsafe fn grow(&mut self) -> bool {
        let Some(allocator) = self.allocator.as_mut() else {
            return false;
        };

        let len = self.len();
        let new_capacity = (len * 2).max(4);
        let allocation = allocator.allocate(new_capacity * mem::size_of::<T>(), 0x10) as *mut T;
        if allocation.is_null() {
            return false;
        }

        if !self.begin.is_null() {
            ptr::copy_nonoverlapping(self.begin, allocation, len);
            allocator.deallocate(self.begin as *mut u8);
        }

        self.begin = allocation;
        self.end = allocation.add(len);
        self.capacity_end = allocation.add(new_capacity);
        true
    }
}

/// One named shader-parameter override on a character. The name points at
/// UTF-16 storage owned by whoever inserted the entry.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MaterialModifier {
    pub name: *const u16,
    pub material_id: i32,
    pub value1: f32,
    pub value2: f32,
    pub value3: f32,
    pub value4: f32,
    pub value5: f32,
}

#[repr(C)]
pub struct ChrModelParamModifierModule {
    vftable: usize,
    owner: *mut PlayerIns,
    pub modifiers: GameVector<MaterialModifier>,
}

#[repr(C)]
pub struct ChrModules {
    unk00: [u8; 0x18],
    pub model_param_modifier_module: *mut ChrModelParamModifierModule,
}

/// Intrusive list of the status effects active on a character.
#[repr(C)]
pub struct SpecialEffects {
    pub head: *mut SpecialEffectEntry,
}

#[repr(C)]
pub struct SpecialEffectEntry {
    param_row: usize,
    pub id: i32,
    _pad0c: u32,
    unk10: [u8; 0x20],
    pub next: *mut SpecialEffectEntry,
}

impl SpecialEffects {
    pub unsafe fn contains(&self, effect_id: i32) -> bool {
        let mut current = self.head;
        while let Some(entry) = current.as_ref() {
            if entry.id == effect_id {
                return true;
            }
            current = entry.next;
        }
        false
    }
}

/// The equipment id block inside ChrAsm. The trailing slots are never
/// written by the game, which makes them a safe place to stamp markers that
/// ride along when the game copies equipment wholesale.
#[repr(C)]
pub struct ChrAsmGearParamIds {
    pub slots: [i32; 22],
    pub unused1: i32,
    pub unused2: i32,
    pub unused3: i32,
    pub unused4: i32,
}

#[repr(C)]
pub struct ChrAsm {
    unk00: [u8; 0x8],
    pub gear_param_ids: ChrAsmGearParamIds,
}

/// Opaque; only ever handed to the game's own inventory functions.
#[repr(C)]
pub struct EquipInventoryData {
    unk00: [u8; 0x150],
}

#[repr(C)]
pub struct EquipGameData {
    unk00: [u8; 0x70],
    pub chr_asm: ChrAsm,
    unke0: [u8; 0x78],
    pub equip_inventory_data: EquipInventoryData,
}

#[repr(C)]
pub struct PlayerGameData {
    unk00: [u8; 0x2b8],
    pub equip_game_data: EquipGameData,
}

#[repr(C)]
pub struct NetworkSession {
    vftable: usize,
    pub steam_id: u64,
}

#[repr(C)]
pub struct SessionHolder {
    pub network_session: *mut NetworkSession,
}

/// A player character instance. Remote players and mimic copies share this
/// layout with the local player.
#[repr(C)]
pub struct PlayerIns {
    unk000: [u8; 0x178],
    pub special_effects: *mut SpecialEffects,
    unk180: [u8; 0x10],
    pub chr_modules: *mut ChrModules,
    unk198: [u8; 0x3e8],
    pub game_data: *mut PlayerGameData,
    pub session_holder: SessionHolder,
}

impl PlayerIns {
    /// The marker slot in the copied equipment block, if the save data is
    /// reachable.
    pub unsafe fn gear_marker(&self) -> Option<i32> {
        let game_data = self.game_data.as_ref()?;
        Some(game_data.equip_game_data.chr_asm.gear_param_ids.unused4)
    }

    pub unsafe fn set_gear_marker(&mut self, value: i32) {
        if let Some(game_data) = self.game_data.as_mut() {
            game_data.equip_game_data.chr_asm.gear_param_ids.unused4 = value;
        }
    }
}

#[repr(C)]
pub struct WorldChrMan {
    unk00: [u8; 0x1e508],
    pub main_player: *mut PlayerIns,
}

impl RuntimeClass for WorldChrMan {
    const NAME: &'static str = "WorldChrMan";
}

#[repr(C)]
pub struct MsgRepository {
    unk00: [u8; 0x20],
}

impl RuntimeClass for MsgRepository {
    const NAME: &'static str = "MsgRepository";
}

#[repr(C)]
pub struct GridControl {
    vftable: usize,
    unk08: [u8; 0xc8],
    /// Rows added to the current list dialog.
    pub entry_count: i32,
    /// The highlighted row.
    pub focused_entry: i32,
}

#[repr(C)]
pub struct CsEventListDialog {
    vftable: usize,
    unk08: [u8; 0x48],
    pub grid_control: *mut GridControl,
}

#[repr(C)]
pub struct CsPopupMenu {
    vftable: usize,
    pub owner: *mut CsMenuMan,
    pub active_dialog: *mut CsEventListDialog,
}

#[repr(C)]
pub struct CsMenuMan {
    vftable: usize,
    unk08: [u8; 0x78],
    pub popup_menu: *mut CsPopupMenu,
}

impl RuntimeClass for CsMenuMan {
    const NAME: &'static str = "CSMenuMan";
}

/// The highlighted row of the topmost list dialog, when one is open and the
/// highlight is in bounds.
pub unsafe fn focused_list_row() -> Option<usize> {
    let menu_man = singleton::get_instance::<CsMenuMan>().ok()??.as_ref()?;
    let popup_menu = menu_man.popup_menu.as_ref()?;
    let dialog = popup_menu.active_dialog.as_ref()?;
    let grid = dialog.grid_control.as_ref()?;

    if grid.focused_entry >= 0 && grid.focused_entry < grid.entry_count {
        Some(grid.focused_entry as usize)
    } else {
        None
    }
}

#[repr(C)]
pub struct SessionPlayerEntry {
    unk00: [u8; 0x10],
    pub steam_id: u64,
    unk18: [u8; 0x48],
}

#[repr(C)]
pub struct CsSessionManager {
    unk00: [u8; 0xe8],
    pub player_entries: GameVector<SessionPlayerEntry>,
}

impl RuntimeClass for CsSessionManager {
    const NAME: &'static str = "CSSessionManager";
}

// --- Talkscript (EzState) graphs -------------------------------------------

/// Borrowed array as the state machine stores it: pointer plus count.
#[repr(C)]
pub struct EzSpan<T> {
    pub elements: *mut T,
    pub count: usize,
}

impl<T> EzSpan<T> {
    pub const fn empty() -> Self {
        EzSpan {
            elements: ptr::null_mut(),
            count: 0,
        }
    }

    pub const fn new(elements: *mut T, count: usize) -> Self {
        EzSpan { elements, count }
    }

    pub unsafe fn as_slice(&self) -> &[T] {
        if self.elements.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.elements, self.count)
    }
}

impl<T> Clone for EzSpan<T> {
    fn clone(&self) -> Self {
        EzSpan {
            elements: self.elements,
            count: self.count,
        }
    }
}

impl<T> Copy for EzSpan<T> {}

/// A byte-coded condition or argument expression.
pub type EzExpression = EzSpan<u8>;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct EzEvent {
    pub command: i32,
    _pad04: i32,
    pub args: EzSpan<EzExpression>,
}

impl EzEvent {
    pub const fn new(command: i32, args: EzSpan<EzExpression>) -> Self {
        EzEvent {
            command,
            _pad04: 0,
            args,
        }
    }
}

#[repr(C)]
pub struct EzTransition {
    pub target_state: *mut EzState,
    pub evaluator: EzSpan<u8>,
}

#[repr(C)]
pub struct EzState {
    pub id: i32,
    _pad04: i32,
    pub transitions: EzSpan<*mut EzTransition>,
    pub entry_events: EzSpan<EzEvent>,
    pub exit_events: EzSpan<EzEvent>,
    pub while_events: EzSpan<EzEvent>,
}

impl EzState {
    pub const fn empty() -> Self {
        EzState {
            id: 0,
            _pad04: 0,
            transitions: EzSpan::empty(),
            entry_events: EzSpan::empty(),
            exit_events: EzSpan::empty(),
            while_events: EzSpan::empty(),
        }
    }
}

#[repr(C)]
pub struct EzStateGroup {
    pub id: i32,
    _pad04: i32,
    pub states: EzSpan<EzState>,
    pub initial_state: *mut EzState,
}

#[repr(C)]
pub struct EzStateMachine {
    pub state_group: *mut EzStateGroup,
}

// --- Param rows served for the mod's reserved ids ---------------------------

/// Goods row backing the sentinel items. Hidden from the inventory UI and
/// capped at one copy so the save never accumulates duplicates.
#[repr(C)]
pub struct EquipParamGoods {
    unk00: [u8; 0x68],
    pub max_num: i16,
    unk6a: [u8; 0x2a],
    pub goods_type: u8,
    unk95: [u8; 0x11b],
}

impl EquipParamGoods {
    pub const fn hidden_sentinel() -> Self {
        EquipParamGoods {
            unk00: [0; 0x68],
            max_num: 1,
            unk6a: [0; 0x2a],
            goods_type: dyes::store::HIDDEN_GOODS_TYPE,
            unk95: [0; 0x11b],
        }
    }
}

#[repr(C)]
pub struct EquipParamGoodsLookup {
    pub id: i32,
    pub unk04: i32,
    pub row: *mut EquipParamGoods,
}

/// A do-nothing status effect whose only job is to reference a VFX row.
#[repr(C)]
pub struct SpEffectParam {
    icon_id: i32,
    condition_hp: f32,
    pub effect_endurance: f32,
    motion_interval: f32,
    max_hp_rate: f32,
    pub fall_damage_rate: f32,
    pub soul_rate: f32,
    pub equip_weight_change_rate: f32,
    pub all_item_weight_change_rate: f32,
    pub soul_steal_rate: f32,
    pub life_reduction_rate: f32,
    pub hp_recover_rate: f32,
    unk30: [u8; 0x168],
    pub vfx_id: i32,
    unk19c: [u8; 0x9c],
    /// effectTargetSelf .. effectTargetSelfTarget
    pub target_flags: [u8; 8],
    /// vowType0 .. vowType15
    pub vow_type_flags: [u8; 16],
    unk250: [u8; 0xa8],
}

impl SpEffectParam {
    pub const fn dye_marker(vfx_id: i32) -> Self {
        SpEffectParam {
            icon_id: -1,
            condition_hp: -1.0,
            effect_endurance: -1.0,
            motion_interval: 0.0,
            max_hp_rate: 1.0,
            fall_damage_rate: 1.0,
            soul_rate: 1.0,
            equip_weight_change_rate: 1.0,
            all_item_weight_change_rate: 1.0,
            soul_steal_rate: 1.0,
            life_reduction_rate: 1.0,
            hp_recover_rate: 1.0,
            unk30: [0; 0x168],
            vfx_id,
            unk19c: [0; 0x9c],
            target_flags: [1; 8],
            vow_type_flags: [1; 16],
            unk250: [0; 0xa8],
        }
    }
}

#[repr(C)]
pub struct SpEffectParamLookup {
    pub row: *mut SpEffectParam,
    pub id: i32,
    pub unk0c: u8,
}

#[repr(C)]
pub struct SpEffectVfxParam {
    unk00: [u8; 0x20],
    pub material_param_id: i32,
    unk24: [u8; 0x14],
    pub play_category: u8,
    unk39: [u8; 0x1f],
}

impl SpEffectVfxParam {
    pub const fn dye_material(material_param_id: i32) -> Self {
        SpEffectVfxParam {
            unk00: [0; 0x20],
            material_param_id,
            unk24: [0; 0x14],
            play_category: 7,
            unk39: [0; 0x1f],
        }
    }
}

#[repr(C)]
pub struct SpEffectVfxParamLookup {
    pub id: i32,
    pub row: *mut SpEffectVfxParam,
    pub unk10: u16,
}
