//! The in-process agent. Loaded into ELDEN RING as a DLL, it locates the
//! host structures the dye logic needs via pattern scans and singleton
//! discovery, installs the detours, and bridges the host's world to the
//! capability traits of the `dyes` crate.
#![cfg(windows)]

mod cs;
mod game;
mod hooks;
mod net;
mod singleton;

use std::collections::HashMap;
use std::ffi::c_void;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use windows::Win32::Foundation::{BOOL, HINSTANCE, HMODULE};
use windows::Win32::System::LibraryLoader::GetModuleFileNameW;
use windows::Win32::System::SystemServices::DLL_PROCESS_ATTACH;

use dyes::catalog::Catalog;
use dyes::config::{self, Settings};
use dyes::dialog::DialogController;
use dyes::error::InitError;
use dyes::messages::{self, msg_id, MessageTable};
use dyes::resolve::SendThrottle;
use dyes::sync::PeerCache;

const CONFIG_FILE: &str = "armor-dyes.ini";
const LOG_FILE: &str = "logs/armor-dyes.log";

/// Everything the detours share once initialization finishes. Gameplay logic
/// only ever runs on the host's simulation thread; the mutexes are there to
/// satisfy the static, not because anything contends on them.
pub(crate) struct Mod {
    pub catalog: Catalog,
    pub messages: Mutex<MessageTable>,
    pub controller: Mutex<DialogController>,
    pub peers: Mutex<PeerCache>,
    pub throttle: Mutex<SendThrottle>,
    pub transport: Mutex<Option<net::SteamTransport>>,
    pub client_side_only: bool,
    /// UTF-16 renditions of served messages, keyed by message id. The host
    /// keeps the returned pointers only within a frame, so entries can be
    /// dropped whenever their source strings re-render.
    wide_messages: Mutex<HashMap<i32, Box<[u16]>>>,
}

static MOD: OnceLock<Mod> = OnceLock::new();

/// The shared state, or `None` while the init thread is still working. The
/// frame detours can fire before initialization finishes and fall through.
pub(crate) fn instance() -> Option<&'static Mod> {
    MOD.get()
}

impl Mod {
    /// A stable UTF-16 pointer for a reserved-range message, encoding it on
    /// first use.
    pub(crate) fn wide_message(&self, id: i32) -> Option<*const u16> {
        let messages = self.messages.lock().ok()?;
        let mut cache = self.wide_messages.lock().ok()?;
        if !cache.contains_key(&id) {
            let text = messages.lookup(&self.catalog, id)?;
            let wide: Box<[u16]> = text.encode_utf16().chain(std::iter::once(0)).collect();
            cache.insert(id, wide);
        }
        cache.get(&id).map(|wide| wide.as_ptr())
    }

    /// Drop the cached renditions of the six live target labels after they
    /// re-render.
    pub(crate) fn invalidate_target_labels(&self) {
        if let Ok(mut cache) = self.wide_messages.lock() {
            for id in msg_id::PRIMARY_COLOR..=msg_id::TERTIARY_INTENSITY {
                cache.remove(&id);
            }
        }
    }
}

#[no_mangle]
extern "system" fn DllMain(instance: HINSTANCE, reason: u32, _reserved: *mut c_void) -> BOOL {
    if reason == DLL_PROCESS_ATTACH {
        let folder = dll_folder(instance);
        // Heavy initialization happens off the loader thread; the detours
        // tolerate the window where nothing is installed yet.
        thread::spawn(move || {
            let settings = config::read_settings(&folder.join(CONFIG_FILE));
            init_logging(&folder, settings.debug);
            info!("Armor dye mod version {}", env!("CARGO_PKG_VERSION"));

            if let Err(error) = setup(&folder, settings) {
                error!("Error initializing mod: {error}");
            }
        });
    }
    BOOL::from(true)
}

fn dll_folder(instance: HINSTANCE) -> PathBuf {
    let mut buffer = [0u16; 260];
    let length = unsafe { GetModuleFileNameW(HMODULE(instance.0), &mut buffer) } as usize;
    PathBuf::from(String::from_utf16_lossy(&buffer[..length]))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn init_logging(folder: &Path, debug: bool) {
    let log_path = folder.join(LOG_FILE);
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = fs::File::create(&log_path) else {
        return;
    };

    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn setup(folder: &Path, settings: Settings) -> Result<(), InitError> {
    game::ensure_elden_ring()?;

    if settings.initialize_delay > 0 {
        info!("Sleeping for {}ms...", settings.initialize_delay);
        thread::sleep(Duration::from_millis(settings.initialize_delay));
    }

    // The message repository comes up late during startup; nothing can be
    // served before it exists.
    singleton::wait_for::<cs::MsgRepository>(Duration::from_millis(100))?;

    let language = net::steam_language().unwrap_or_else(|| String::from("english"));
    let locale = messages::for_language(&language);
    info!("Using language \"{language}\"");

    let mut catalog = Catalog::new(locale.rtl);
    for color in config::read_colors(&folder.join(CONFIG_FILE)) {
        catalog.add_color(&color.name, &color.hex, color.rgb);
    }

    let transport = if settings.client_side_only {
        info!("Peer sync disabled by config");
        None
    } else {
        match net::SteamTransport::resolve() {
            Ok(transport) => Some(transport),
            Err(error) => {
                warn!("Peer sync disabled: {error}");
                None
            }
        }
    };

    let state = MOD.get_or_init(|| Mod {
        messages: Mutex::new(MessageTable::new(locale)),
        controller: Mutex::new(DialogController::default()),
        peers: Mutex::new(PeerCache::default()),
        throttle: Mutex::new(SendThrottle::default()),
        transport: Mutex::new(transport),
        client_side_only: settings.client_side_only,
        wide_messages: Mutex::new(HashMap::new()),
        catalog,
    });

    unsafe {
        info!("Hooking message lookups...");
        hooks::msg::install()?;
        info!("Hooking param lookups...");
        hooks::params::install()?;
        info!("Hooking inventory access...");
        hooks::inventory::install()?;
        info!("Hooking talkscripts...");
        hooks::talk::install(&state.catalog)?;
        info!("Hooking character updates...");
        hooks::update::install()?;
    }

    info!("Initialized mod");
    Ok(())
}
