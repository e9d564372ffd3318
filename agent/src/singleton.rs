//! Runtime-class singleton discovery. The game null-checks its singletons
//! with a recognizable instruction sequence that also references the class's
//! reflection metadata; scanning for every occurrence yields a name -> static
//! table covering WorldChrMan, CSMenuMan, MsgRepository, CSSessionManager and
//! friends without per-version offsets.

use std::collections::HashMap;
use std::mem;
use std::ops::Range;
use std::slice;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use broadsword::runtime;
use broadsword::scanner;

use dyes::error::{InitError, LookupError, SectionLookupError, SingletonMapError};

pub(crate) type SingletonMap = HashMap<String, usize>;

static SINGLETON_MAP: OnceLock<Result<SingletonMap, SingletonMapError>> = OnceLock::new();

/// A host class whose single instance is reachable through the reflection
/// name -> static table.
pub(crate) trait RuntimeClass {
    /// Must match the name carried by the class's runtime metadata.
    const NAME: &'static str;
}

/// Look up the live instance of a singleton'd host class. Some singletons
/// only exist in certain program states (WorldChrMan, for one, only while a
/// map is loaded), hence the `Result<Option<..>>`.
pub(crate) fn get_instance<T: RuntimeClass>() -> Result<Option<*mut T>, LookupError> {
    let table = match SINGLETON_MAP.get_or_init(build_singleton_table) {
        Ok(table) => table,
        Err(error) => return Err(LookupError::SingletonMapCreation(error.clone())),
    };

    let static_address = table
        .get(T::NAME)
        .copied()
        .ok_or(LookupError::NotFound)?;

    let instance = unsafe { *(static_address as *const usize) };
    if instance == 0 {
        Ok(None)
    } else {
        Ok(Some(instance as *mut T))
    }
}

/// Block until a singleton instance exists, polling in short sleeps. Used
/// once during startup for subsystems that come up late.
pub(crate) fn wait_for<T: RuntimeClass>(interval: Duration) -> Result<(), InitError> {
    loop {
        match get_instance::<T>() {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => thread::sleep(interval),
            Err(error) => return Err(InitError::Singleton(T::NAME, error)),
        }
    }
}

const NULL_CHECK_PATTERN: &str = concat!(
    //  0 MOV REG, [MEM]
    "01001... 10001011 00...101 [........ ........ ........ ........]",
    //  7 TEST REG, REG
    "01001... 10000101 11......",
    // 10 JNZ +2e
    "01110101 ........",
    // 12 LEA RCX, [runtime_class_metadata]
    "01001... 10001101 00001101 [........ ........ ........ ........]",
    // 19 CALL get_singleton_name
    "11101000 [........ ........ ........ ........]",
);

/// Walk the code section for singleton null checks and vet each candidate:
/// the static must sit in .data, the metadata pointer too, and the name
/// getter in .text. Calling the name getter with the metadata yields the
/// class name for the table.
fn build_singleton_table() -> Result<SingletonMap, SingletonMapError> {
    let (text_range, text_slice) = get_section(".text")
        .map_err(|e| SingletonMapError::Section(".text".to_string(), e))?;

    let (data_range, _) = get_section(".data")
        .map_err(|e| SingletonMapError::Section(".data".to_string(), e))?;

    let pattern = scanner::Pattern::from_bit_pattern(NULL_CHECK_PATTERN)
        .map_err(|_| SingletonMapError::Pattern)?;

    let capture_u32 = |bytes: &[u8]| -> Option<u32> {
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    };

    let mut results = SingletonMap::default();
    for candidate in scanner::simple::scan_all(text_slice, &pattern) {
        let (Some(static_offset), Some(metadata_offset), Some(fn_offset)) = (
            candidate.captures.first().and_then(|c| capture_u32(&c.bytes)),
            candidate.captures.get(1).and_then(|c| capture_u32(&c.bytes)),
            candidate.captures.get(2).and_then(|c| capture_u32(&c.bytes)),
        ) else {
            continue;
        };

        let candidate_base = text_range.start + candidate.location;

        // Pointer to the static holding the singleton instance.
        let static_address = candidate_base + 7 + static_offset as usize;
        if !data_range.contains(&static_address) {
            continue;
        }

        // Pointer to the reflection metadata.
        let metadata_address = candidate_base + 19 + metadata_offset as usize;
        if !data_range.contains(&metadata_address) {
            continue;
        }

        // char* get_singleton_name(metadata)
        let fn_address = candidate_base + 24 + fn_offset as usize;
        if !text_range.contains(&fn_address) {
            continue;
        }

        let get_singleton_name: extern "C" fn(usize) -> *const i8 =
            unsafe { mem::transmute(fn_address) };

        let cstr = unsafe { std::ffi::CStr::from_ptr(get_singleton_name(metadata_address)) };
        let name = cstr
            .to_str()
            .map_err(|_| SingletonMapError::MalformedName)?
            .to_string();

        results.insert(name, static_address);
    }

    tracing::debug!("Discovered {} runtime-class singletons", results.len());
    Ok(results)
}

fn get_section(section: &str) -> Result<(Range<usize>, &[u8]), SectionLookupError> {
    let module = get_game_module().ok_or(SectionLookupError::NoGameBase)?;

    let section_range = runtime::get_module_section_range(module, section)
        .map_err(|_| SectionLookupError::SectionNotFound)?;

    let section_slice = unsafe {
        slice::from_raw_parts(
            section_range.start as *const u8,
            section_range.end - section_range.start,
        )
    };

    Ok((section_range, section_slice))
}

/// Figure out what the game's module is called in this install.
fn get_game_module() -> Option<&'static str> {
    const MODULE_NAMES: [&str; 2] = ["eldenring.exe", "start_protected_game.exe"];

    MODULE_NAMES
        .into_iter()
        .find(|name| runtime::get_module_handle(name).is_ok())
}
