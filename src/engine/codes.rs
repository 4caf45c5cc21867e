//! X10 house and unit code tables.
//!
//! On the line, house letters and unit numbers are sent as 4-bit values that are not in
//! alphabetical or numeric order. Both tables are indexed by that 4-bit value; the reverse
//! lookups scan them.

/// House letter for each 4-bit house code.
pub const HOUSE_CODES: [u8; 16] = *b"MECKOGAINFDLPHBJ";

/// Unit number (1-16) for each 4-bit unit code.
pub const UNIT_CODES: [u8; 16] = [13, 5, 3, 11, 15, 7, 1, 9, 14, 6, 4, 12, 16, 8, 2, 10];

/// Returns the ASCII house letter for a 4-bit house code.
pub fn house_letter(code: u8) -> u8 {
    HOUSE_CODES[(code & 0x0f) as usize]
}

/// Returns the unit number for a 4-bit unit code.
pub fn unit_number(code: u8) -> u8 {
    UNIT_CODES[(code & 0x0f) as usize]
}

/// Finds the 4-bit code for an ASCII house letter (`b'A'..=b'P'`).
pub fn house_code(letter: u8) -> Option<u8> {
    HOUSE_CODES
        .iter()
        .position(|&c| c == letter)
        .map(|code| code as u8)
}

/// Finds the 4-bit code for a unit number (1-16).
pub fn unit_code(number: u8) -> Option<u8> {
    UNIT_CODES
        .iter()
        .position(|&n| n == number)
        .map(|code| code as u8)
}
