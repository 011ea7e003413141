//! Byte classes used by the challenge tokenizer.

const SPACE: u8 = 1 << 0;
const ALPHANUM: u8 = 1 << 1;

static TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
            table[i] |= SPACE;
        }
        if b.is_ascii_alphanumeric() {
            table[i] |= ALPHANUM;
        }
        i += 1;
    }
    table
}

/// Space, tab, CR or LF.
#[inline]
pub(crate) fn is_space(b: u8) -> bool {
    TABLE[b as usize] & SPACE != 0
}

/// ASCII letters and digits only.
#[inline]
pub(crate) fn is_alphanum(b: u8) -> bool {
    TABLE[b as usize] & ALPHANUM != 0
}
