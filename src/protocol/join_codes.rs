use rand::Rng;

/// Characters used in join codes: uppercase letters and digits, easy to read
/// aloud and paste.
const JOIN_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random join code of the requested length.
///
/// Uniqueness is not guaranteed here; callers retry on collision against the
/// store's code index.
pub fn generate_join_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..JOIN_CODE_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = JOIN_CODE_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Whether a string is shaped like a join code (length + charset).
pub fn is_valid_join_code(code: &str, length: usize) -> bool {
    code.len() == length
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
