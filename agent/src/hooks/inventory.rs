//! Save-inventory plumbing. Two scanned host functions give presence checks
//! and add/remove for goods; a detour on the goods-param lookup makes the
//! sentinel ids resolve to a hidden row so the game accepts them as real
//! items without rendering them anywhere.

use std::mem;
use std::sync::OnceLock;

use retour::static_detour;

use dyes::error::InitError;
use dyes::store::{self, PlayerInventory};

use crate::cs::{EquipInventoryData, EquipParamGoods, EquipParamGoodsLookup, WorldChrMan};
use crate::game::pattern;
use crate::singleton;

// AddRemoveItem(ItemType item_type, unsigned int item_id, int quantity)
type AddRemoveItemFn = unsafe extern "system" fn(u64, u32, i32);
// CS::EquipInventoryData::GetInventoryId(int *item_id)
type GetInventoryIdFn = unsafe extern "system" fn(*mut EquipInventoryData, *mut i32) -> i32;

struct InventoryFns {
    add_remove_item: AddRemoveItemFn,
    get_inventory_id: GetInventoryIdFn,
}

static FNS: OnceLock<InventoryFns> = OnceLock::new();

static_detour! {
    static GetEquipParamGoods: unsafe extern "system" fn(*mut EquipParamGoodsLookup, i32);
}

/// The row every sentinel id resolves to.
static SENTINEL_GOOD: EquipParamGoods = EquipParamGoods::hidden_sentinel();

// 8b 99 90 01 00 00    mov ebx, [rcx + 0x190]
// 41 83 c8 ff          or r8d, -1
// 8b d3                mov edx, ebx
// b9 00 00 00 40       mov ecx, item_type_goods
// e8 ?? ?? ?? ??       call AddRemoveItem
const ADD_REMOVE_ITEM_PATTERN: &str = concat!(
    "10001011 10011001 10010000 00000001 00000000 00000000",
    "01000001 10000011 11001000 11111111",
    "10001011 11010011",
    "10111001 00000000 00000000 00000000 01000000",
    "11101000 [........ ........ ........ ........]",
);

// 48 8d 8f 58 01 00 00 lea rcx, [rdi + 0x158]
// e8 ?? ?? ?? ??       call CS::EquipInventoryData::GetInventoryId
// 8b d8                mov ebx, eax
// 85 c0                test eax, eax
// 78 6a                js fail_label
const GET_INVENTORY_ID_PATTERN: &str = concat!(
    "01001000 10001101 10001111 01011000 00000001 00000000 00000000",
    "11101000 [........ ........ ........ ........]",
    "10001011 11011000",
    "10000101 11000000",
    "01111000 01101010",
);

// 41 8d 50 03          lea edx, [r8 + 3]
// e8 ?? ?? ?? ??       call SoloParamRepositoryImp::GetParamResCap
// 48 85 c0             test rax, rax
// 0f 84 ?? ?? ?? ??    jz end_label
const GET_EQUIP_PARAM_GOODS_PATTERN: &str = concat!(
    "01000001 10001101 01010000 00000011",
    "11101000 ........ ........ ........ ........",
    "01001000 10000101 11000000",
    "00001111 10000100 ........ ........ ........ ........",
);
const GET_EQUIP_PARAM_GOODS_OFFSET: isize = -106;

pub(crate) unsafe fn install() -> Result<(), InitError> {
    let add_remove_item =
        pattern::scan_relative_call("add_remove_item", ADD_REMOVE_ITEM_PATTERN)?;
    let get_inventory_id =
        pattern::scan_relative_call("get_inventory_id", GET_INVENTORY_ID_PATTERN)?;
    let _ = FNS.set(InventoryFns {
        add_remove_item: mem::transmute(add_remove_item),
        get_inventory_id: mem::transmute(get_inventory_id),
    });

    let lookup = pattern::scan_function(
        "get_equip_param_goods",
        GET_EQUIP_PARAM_GOODS_PATTERN,
        GET_EQUIP_PARAM_GOODS_OFFSET,
    )?;
    GetEquipParamGoods
        .initialize(mem::transmute(lookup), |result, id| unsafe {
            get_equip_param_goods_detour(result, id)
        })
        .map_err(|e| InitError::Hook("get_equip_param_goods", e.to_string()))?;
    GetEquipParamGoods
        .enable()
        .map_err(|e| InitError::Hook("get_equip_param_goods", e.to_string()))?;

    Ok(())
}

/// Serve the hidden sentinel row for the mod's goods ids, fall through for
/// everything else.
unsafe fn get_equip_param_goods_detour(result: *mut EquipParamGoodsLookup, id: i32) {
    if id >= 0 {
        if let Some(state) = crate::instance() {
            if store::is_sentinel_goods_id(&state.catalog, id as u32) {
                if let Some(result) = result.as_mut() {
                    result.id = id;
                    result.unk04 = 3;
                    result.row = &SENTINEL_GOOD as *const _ as *mut EquipParamGoods;
                    return;
                }
            }
        }
    }

    GetEquipParamGoods.call(result, id);
}

/// The local player's inventory, or an unavailable stand-in while no map is
/// loaded.
pub(crate) struct LiveInventory {
    equip_inventory_data: *mut EquipInventoryData,
}

impl LiveInventory {
    pub fn current() -> LiveInventory {
        let equip_inventory_data = unsafe {
            singleton::get_instance::<WorldChrMan>()
                .ok()
                .flatten()
                .and_then(|world_chr_man| (*world_chr_man).main_player.as_mut())
                .and_then(|player| player.game_data.as_mut())
                .map(|game_data| {
                    &mut game_data.equip_game_data.equip_inventory_data as *mut EquipInventoryData
                })
                .unwrap_or(std::ptr::null_mut())
        };
        LiveInventory {
            equip_inventory_data,
        }
    }
}

impl PlayerInventory for LiveInventory {
    fn available(&self) -> bool {
        !self.equip_inventory_data.is_null() && FNS.get().is_some()
    }

    fn has_item(&self, goods_id: u32) -> bool {
        let Some(fns) = FNS.get() else {
            return false;
        };
        if self.equip_inventory_data.is_null() {
            return false;
        }
        let mut item_id = (store::GOODS_ITEM_TYPE + goods_id) as i32;
        unsafe { (fns.get_inventory_id)(self.equip_inventory_data, &mut item_id) != -1 }
    }

    fn add_item(&mut self, goods_id: u32) {
        if let Some(fns) = FNS.get() {
            unsafe { (fns.add_remove_item)(store::GOODS_ITEM_TYPE as u64, goods_id, 1) };
        }
    }

    fn remove_item(&mut self, goods_id: u32) {
        if let Some(fns) = FNS.get() {
            unsafe { (fns.add_remove_item)(store::GOODS_ITEM_TYPE as u64, goods_id, -1) };
        }
    }
}
