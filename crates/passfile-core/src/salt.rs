//! Salt generation and encoding for crypt-style hash settings.

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes consumed per salt
pub const SALT_BYTES: usize = 12;

/// Length of the encoded salt string
pub const SALT_CHARS: usize = 16;

/// Symbol set shared with crypt-style encoded hashes
const SALT_SYMBOLS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789./";

/// Generate cryptographically secure random salt bytes
pub fn generate_salt() -> [u8; SALT_BYTES] {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encode 12 random bytes as 16 salt symbols.
///
/// Each 3-byte group is read as a little-endian 24-bit value and split
/// into four 6-bit indexes into the symbol table, low bits first. Equal
/// inputs encode to equal output.
pub fn encode_salt(random: &[u8; SALT_BYTES]) -> String {
    let mut salt = String::with_capacity(SALT_CHARS);
    for group in random.chunks_exact(3) {
        let bits = u32::from(group[0]) | u32::from(group[1]) << 8 | u32::from(group[2]) << 16;
        for field in 0..4 {
            let index = (bits >> (6 * field)) & 0x3f;
            salt.push(SALT_SYMBOLS[index as usize] as char);
        }
    }
    salt
}
