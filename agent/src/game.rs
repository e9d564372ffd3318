use pelite::pe::{Pe, PeView};
use windows::core::PCSTR;
use windows::Win32::System::LibraryLoader::GetModuleHandleA;

use dyes::error::GameDetectionError;

pub(crate) mod pattern;

const PRODUCT_NAME_ELDENRING: &str = "ELDEN RING™";

/// Confirm we were actually loaded into ELDEN RING before touching any of
/// its memory. The product name comes from the main module's PE version
/// resources.
pub(crate) fn ensure_elden_ring() -> Result<(), GameDetectionError> {
    let header = unsafe {
        let handle = GetModuleHandleA(PCSTR::null())
            .map_err(|_| GameDetectionError::NoMainModuleHandle)?;

        PeView::module(handle.0 as *const u8)
    };

    // Sanity check that the image has a code section before we commit to
    // scanning it later.
    header
        .section_headers()
        .iter()
        .find(|section| section.name_bytes() == b".text")
        .ok_or(GameDetectionError::MissingTextSection)?;

    let product_name = select_product_name(&header)?;
    if product_name == PRODUCT_NAME_ELDENRING {
        Ok(())
    } else {
        Err(GameDetectionError::UnknownProductName(product_name))
    }
}

/// Capture the product name from the PE header.
fn select_product_name(header: &PeView) -> Result<String, GameDetectionError> {
    let resources = header
        .resources()
        .map_err(|_| GameDetectionError::MissingPeResources)?;
    let version_info = resources
        .version_info()
        .map_err(|_| GameDetectionError::MissingPeVersionInfo)?;
    let language = version_info
        .translation()
        .first()
        .ok_or(GameDetectionError::MissingPeStringsLanguage)?;

    let mut product_name: Option<String> = None;
    version_info.strings(*language, |key, value| {
        if key == "ProductName" {
            product_name = Some(value.to_string())
        }
    });

    product_name.ok_or(GameDetectionError::MissingProductName)
}
