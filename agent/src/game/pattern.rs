use broadsword::{runtime, scanner};

use dyes::error::InitError;

/// Takes an instruction pattern and looks for its location in the game's
/// code section.
pub(crate) fn match_instruction_pattern(pattern: &str) -> Option<PatternResult> {
    // The code lives in .text; people sometimes rename the exe to dodge the
    // anti-cheat launcher, hence the fallback.
    let text_section = runtime::get_module_section_range("eldenring.exe", ".text")
        .or_else(|_| runtime::get_module_section_range("start_protected_game.exe", ".text"))
        .ok()?;

    let scan_slice = unsafe {
        std::slice::from_raw_parts(
            text_section.start as *const u8,
            text_section.end - text_section.start,
        )
    };

    let pattern = scanner::Pattern::from_bit_pattern(pattern).ok()?;

    scanner::simple::scan(scan_slice, &pattern).map(|result| PatternResult {
        location: text_section.start + result.location,
        captures: result
            .captures
            .into_iter()
            .map(|capture| PatternCapture {
                location: text_section.start + capture.location,
                bytes: capture.bytes,
            })
            .collect(),
    })
}

#[derive(Debug)]
pub(crate) struct PatternResult {
    pub location: usize,
    pub captures: Vec<PatternCapture>,
}

#[derive(Debug)]
pub(crate) struct PatternCapture {
    pub location: usize,
    pub bytes: Vec<u8>,
}

/// Resolve a captured rip-relative 32-bit operand to an absolute address.
pub(crate) fn resolve_relative_capture(capture: &PatternCapture) -> Option<usize> {
    let offset = i32::from_le_bytes(capture.bytes.as_slice().try_into().ok()?);
    let next_instruction = capture.location + 4;

    Some(if offset.is_negative() {
        next_instruction - offset.unsigned_abs() as usize
    } else {
        next_instruction + offset as usize
    })
}

/// Find a function by a pattern inside its body: the match location plus a
/// (usually negative) offset to the function start.
pub(crate) fn scan_function(
    name: &'static str,
    pattern: &str,
    offset: isize,
) -> Result<usize, InitError> {
    let result = match_instruction_pattern(pattern).ok_or(InitError::Pattern(name))?;
    Ok((result.location as isize + offset) as usize)
}

/// Find a function by a call site: the pattern's first capture is the rel32
/// operand of a `call` reaching it.
pub(crate) fn scan_relative_call(name: &'static str, pattern: &str) -> Result<usize, InitError> {
    let result = match_instruction_pattern(pattern).ok_or(InitError::Pattern(name))?;
    let capture = result.captures.first().ok_or(InitError::Pattern(name))?;
    resolve_relative_capture(capture).ok_or(InitError::Pattern(name))
}
