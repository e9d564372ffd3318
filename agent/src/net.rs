//! Peer messaging over the Steamworks networking-messages API. The game
//! already runs the Steam client, so the flat C interface is resolved
//! straight out of the loaded steam_api64.dll. The session roster comes from
//! the host's own session manager.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::mem;

use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

use dyes::error::{InitError, NetError};
use dyes::sync::{PeerId, PeerTransport, DYE_SYNC_CHANNEL};

use crate::cs::CsSessionManager;
use crate::singleton;

const STEAM_API_DLL: &str = "steam_api64.dll";

const IDENTITY_TYPE_STEAM_ID: i32 = 16;
const SEND_RELIABLE: c_int = 8;
const RESULT_OK: c_int = 1;
const RECEIVE_BATCH: usize = 100;

#[repr(C)]
struct SteamNetworkingIdentity {
    identity_type: i32,
    size: i32,
    steam_id: u64,
    padding: [u8; 120],
}

impl SteamNetworkingIdentity {
    fn steam_id(id: u64) -> Self {
        SteamNetworkingIdentity {
            identity_type: IDENTITY_TYPE_STEAM_ID,
            size: 8,
            steam_id: id,
            padding: [0; 120],
        }
    }
}

#[repr(C)]
struct SteamNetworkingMessage {
    data: *mut c_void,
    size: c_int,
    connection: u32,
    identity_peer: SteamNetworkingIdentity,
    connection_user_data: i64,
    time_received: i64,
    message_number: i64,
    free_data: Option<unsafe extern "system" fn(*mut SteamNetworkingMessage)>,
    release: Option<unsafe extern "system" fn(*mut SteamNetworkingMessage)>,
    channel: c_int,
    flags: c_int,
    user_data: i64,
}

type MessagesAccessorFn = unsafe extern "system" fn() -> *mut c_void;
type UserAccessorFn = unsafe extern "system" fn() -> *mut c_void;
type AppsAccessorFn = unsafe extern "system" fn() -> *mut c_void;
type SendMessageToUserFn = unsafe extern "system" fn(
    *mut c_void,
    *const SteamNetworkingIdentity,
    *const c_void,
    u32,
    c_int,
    c_int,
) -> c_int;
type ReceiveMessagesOnChannelFn = unsafe extern "system" fn(
    *mut c_void,
    c_int,
    *mut *mut SteamNetworkingMessage,
    c_int,
) -> c_int;
type GetSteamIdFn = unsafe extern "system" fn(*mut c_void) -> u64;
type GetCurrentGameLanguageFn = unsafe extern "system" fn(*mut c_void) -> *const c_char;

/// Resolved interface pointers plus the flat functions that drive them.
pub(crate) struct SteamTransport {
    messages: *mut c_void,
    user: *mut c_void,
    send_message_to_user: SendMessageToUserFn,
    receive_messages_on_channel: ReceiveMessagesOnChannelFn,
    get_steam_id: GetSteamIdFn,
}

// Confined to the simulation thread after resolution; the pointers are
// process-global interface singletons.
unsafe impl Send for SteamTransport {}

impl SteamTransport {
    pub fn resolve() -> Result<SteamTransport, InitError> {
        unsafe {
            let module = steam_module().ok_or(InitError::Messaging)?;

            let messages_accessor: MessagesAccessorFn = mem::transmute(
                resolve_symbol(module, "SteamAPI_SteamNetworkingMessages_SteamAPI_v002")
                    .ok_or(InitError::Messaging)?,
            );
            let user_accessor: UserAccessorFn = mem::transmute(
                resolve_symbol(module, "SteamAPI_SteamUser_v021").ok_or(InitError::Messaging)?,
            );
            let send_message_to_user: SendMessageToUserFn = mem::transmute(
                resolve_symbol(module, "SteamAPI_ISteamNetworkingMessages_SendMessageToUser")
                    .ok_or(InitError::Messaging)?,
            );
            let receive_messages_on_channel: ReceiveMessagesOnChannelFn = mem::transmute(
                resolve_symbol(
                    module,
                    "SteamAPI_ISteamNetworkingMessages_ReceiveMessagesOnChannel",
                )
                .ok_or(InitError::Messaging)?,
            );
            let get_steam_id: GetSteamIdFn = mem::transmute(
                resolve_symbol(module, "SteamAPI_ISteamUser_GetSteamID")
                    .ok_or(InitError::Messaging)?,
            );

            let messages = messages_accessor();
            let user = user_accessor();
            if messages.is_null() || user.is_null() {
                return Err(InitError::Messaging);
            }

            Ok(SteamTransport {
                messages,
                user,
                send_message_to_user,
                receive_messages_on_channel,
                get_steam_id,
            })
        }
    }
}

impl PeerTransport for SteamTransport {
    fn local_peer(&self) -> Option<PeerId> {
        let id = unsafe { (self.get_steam_id)(self.user) };
        (id != 0).then_some(id)
    }

    fn roster(&self) -> Vec<PeerId> {
        unsafe {
            let Ok(Some(session_manager)) = singleton::get_instance::<CsSessionManager>() else {
                return Vec::new();
            };
            (*session_manager)
                .player_entries
                .as_slice()
                .iter()
                .map(|entry| entry.steam_id)
                .collect()
        }
    }

    fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), NetError> {
        let identity = SteamNetworkingIdentity::steam_id(peer);
        let result = unsafe {
            (self.send_message_to_user)(
                self.messages,
                &identity,
                payload.as_ptr() as *const c_void,
                payload.len() as u32,
                SEND_RELIABLE,
                DYE_SYNC_CHANNEL,
            )
        };
        if result == RESULT_OK {
            Ok(())
        } else {
            Err(NetError::SendFailed(peer, result))
        }
    }

    fn drain(&mut self) -> Vec<(PeerId, Vec<u8>)> {
        let mut buffer: [*mut SteamNetworkingMessage; RECEIVE_BATCH] =
            [std::ptr::null_mut(); RECEIVE_BATCH];
        let count = unsafe {
            (self.receive_messages_on_channel)(
                self.messages,
                DYE_SYNC_CHANNEL,
                buffer.as_mut_ptr(),
                RECEIVE_BATCH as c_int,
            )
        };

        let mut received = Vec::with_capacity(count.max(0) as usize);
        for &message_ptr in buffer.iter().take(count.max(0) as usize) {
            unsafe {
                let Some(message) = message_ptr.as_ref() else {
                    continue;
                };
                let payload = std::slice::from_raw_parts(
                    message.data as *const u8,
                    message.size.max(0) as usize,
                )
                .to_vec();
                received.push((message.identity_peer.steam_id, payload));

                if let Some(release) = message.release {
                    release(message_ptr);
                }
            }
        }
        received
    }
}

/// The game's language as Steam reports it ("english", "french", ...).
pub(crate) fn steam_language() -> Option<String> {
    unsafe {
        let module = steam_module()?;
        let apps_accessor: AppsAccessorFn =
            mem::transmute(resolve_symbol(module, "SteamAPI_SteamApps_v008")?);
        let get_language: GetCurrentGameLanguageFn = mem::transmute(resolve_symbol(
            module,
            "SteamAPI_ISteamApps_GetCurrentGameLanguage",
        )?);

        let apps = apps_accessor();
        if apps.is_null() {
            return None;
        }
        let language = get_language(apps);
        if language.is_null() {
            return None;
        }
        Some(CStr::from_ptr(language).to_string_lossy().into_owned())
    }
}

unsafe fn steam_module() -> Option<HMODULE> {
    let wide: Vec<u16> = STEAM_API_DLL.encode_utf16().chain(std::iter::once(0)).collect();
    GetModuleHandleW(PCWSTR::from_raw(wide.as_ptr())).ok()
}

unsafe fn resolve_symbol(module: HMODULE, name: &str) -> Option<unsafe extern "system" fn() -> isize> {
    let c_name = format!("{name}\0");
    GetProcAddress(module, PCSTR::from_raw(c_name.as_ptr()))
}
