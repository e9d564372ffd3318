//! Message lookup detour. Queries for the mod's reserved id range are
//! answered from the message table; every other id falls through to the
//! host's own repository.

use std::mem;

use retour::static_detour;

use dyes::error::InitError;
use dyes::messages::msg_id;

use crate::cs::MsgRepository;
use crate::game::pattern;

/// Bnd id of the talk-event text category.
const MSGBND_EVENT_TEXT_FOR_TALK: u32 = 33;

static_detour! {
    static LookupEntry: unsafe extern "system" fn(*mut MsgRepository, u32, u32, i32) -> *const u16;
}

// 8b da                mov ebx, edx
// 44 8b ca             mov r9d, edx
// 33 d2                xor edx, edx
// 48 8b f9             mov rdi, rcx
// 44 8d 42 6f          lea r8d, [rdx + 0x6f]
// e8 ?? ?? ?? ??       call MsgRepositoryImp::LookupEntry
const LOOKUP_ENTRY_PATTERN: &str = concat!(
    "10001011 11011010",
    "01000100 10001011 11001010",
    "00110011 11010010",
    "01001000 10001011 11111001",
    "01000100 10001101 01000010 01101111",
    "11101000 [........ ........ ........ ........]",
);

pub(crate) unsafe fn install() -> Result<(), InitError> {
    let target = pattern::scan_relative_call("msg_lookup_entry", LOOKUP_ENTRY_PATTERN)?;

    LookupEntry
        .initialize(
            mem::transmute(target),
            |repository, unk, bnd_id, msg_id| unsafe {
                lookup_entry_detour(repository, unk, bnd_id, msg_id)
            },
        )
        .map_err(|e| InitError::Hook("msg_lookup_entry", e.to_string()))?;
    LookupEntry
        .enable()
        .map_err(|e| InitError::Hook("msg_lookup_entry", e.to_string()))?;

    Ok(())
}

unsafe fn lookup_entry_detour(
    repository: *mut MsgRepository,
    unk: u32,
    bnd_id: u32,
    id: i32,
) -> *const u16 {
    if bnd_id == MSGBND_EVENT_TEXT_FOR_TALK && msg_id::in_mod_range(id) {
        if let Some(state) = crate::instance() {
            if let Some(text) = state.wide_message(id) {
                return text;
            }
        }
    }

    LookupEntry.call(repository, unk, bnd_id, id)
}
