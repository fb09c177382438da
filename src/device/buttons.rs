//! Raw <-> logical key numbering.
//!
//! The panel reports keys starting at the top-right corner and walking
//! right-to-left along each row. Applications number keys from the top-left,
//! left-to-right, top-to-bottom:
//!
//! ```text
//!   raw (wire order)        logical
//!    5  4  3  2  1          1  2  3  4  5
//!   10  9  8  7  6          6  7  8  9 10
//!   15 14 13 12 11         11 12 13 14 15
//! ```
//!
//! The tables encode the physical wiring and are kept literal on purpose.

use crate::error::{PanelError, Result};

use super::protocol::BUTTON_COUNT;

/// `RAW_TO_LOGICAL[raw - 1]` is the logical number of raw key `raw`
pub const RAW_TO_LOGICAL: [u8; BUTTON_COUNT as usize] =
    [5, 4, 3, 2, 1, 10, 9, 8, 7, 6, 15, 14, 13, 12, 11];

/// `LOGICAL_TO_RAW[logical - 1]` is the raw number of logical key `logical`
pub const LOGICAL_TO_RAW: [u8; BUTTON_COUNT as usize] =
    [5, 4, 3, 2, 1, 10, 9, 8, 7, 6, 15, 14, 13, 12, 11];

/// Check that a key number lies in 1..=BUTTON_COUNT
pub fn validate_button(button: u8) -> Result<u8> {
    if (1..=BUTTON_COUNT).contains(&button) {
        Ok(button)
    } else {
        Err(PanelError::InvalidButtonNumber(button))
    }
}

/// Map a raw (wire order) key number to its logical number
pub fn raw_to_logical(raw: u8) -> Result<u8> {
    let raw = validate_button(raw)?;
    Ok(RAW_TO_LOGICAL[(raw - 1) as usize])
}

/// Map a logical key number to its raw (wire order) number
pub fn logical_to_raw(logical: u8) -> Result<u8> {
    let logical = validate_button(logical)?;
    Ok(LOGICAL_TO_RAW[(logical - 1) as usize])
}
