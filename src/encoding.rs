//! Single-byte text encoding used on the engine boundary.
//!
//! ngspice treats every string as raw bytes. Names and netlist lines are
//! exchanged as ISO-8859-15 so that the common Western European characters
//! survive the trip; anything outside that charset is rejected on the way in.

use std::ffi::{CStr, CString};

use encoding_rs::ISO_8859_15;

use crate::error::{OhmlinkError, Result};

/// Line terminator appended to each netlist line handed to `ngSpice_Circ`.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Encode `text` into engine bytes, without a terminator.
pub fn encode_bytes(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, unmappable) = ISO_8859_15.encode(text);
    if unmappable {
        return Err(OhmlinkError::InvalidString(format!(
            "'{}' has characters outside ISO-8859-15",
            text
        )));
    }
    Ok(bytes.into_owned())
}

/// Encode `text` into a NUL-terminated engine string.
pub fn encode(text: &str) -> Result<CString> {
    let bytes = encode_bytes(text)?;
    CString::new(bytes)
        .map_err(|_| OhmlinkError::InvalidString(format!("'{}' contains a NUL byte", text)))
}

/// Decode engine bytes. Every byte maps to a character, so this never fails.
pub fn decode(bytes: &[u8]) -> String {
    let (text, _) = ISO_8859_15.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Decode a NUL-terminated engine string.
pub fn decode_cstr(text: &CStr) -> String {
    decode(text.to_bytes())
}
