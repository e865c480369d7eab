use primitive_types::U256;

pub const STRING_KEY_BYTES: usize = 32;

/// Ordered key from the first 32 bytes of `s`, left-aligned and zero padded.
///
/// Keys compare like the truncated byte strings, so a string sorts after every
/// proper prefix of itself and prefix scans work within the 32-byte window.
/// Strings sharing their first 32 bytes map to the same key.
pub fn string_key(s: &str) -> U256 {
    let bytes = s.as_bytes();
    let len = bytes.len().min(STRING_KEY_BYTES);
    let mut buf = [0u8; STRING_KEY_BYTES];
    buf[..len].copy_from_slice(&bytes[..len]);
    U256::from_big_endian(&buf)
}
