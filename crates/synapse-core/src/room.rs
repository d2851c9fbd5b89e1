use rand::Rng;

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

/// Upper bound for any room code accepted from a client.
pub const MAX_ROOM_CODE_LEN: usize = 32;

/// Upper bound for a participant display name, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random room code such as `AB12CD`.
///
/// Uniqueness is the caller's concern: the room store regenerates on collision.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Returns true if `code` has the shape produced by [`generate_room_code`].
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Trim a room code received over the socket. Returns `None` if it is empty,
/// too long or contains control characters.
pub fn normalize_room_code(raw: &str) -> Option<&str> {
    let code = raw.trim();
    if code.is_empty() || code.len() > MAX_ROOM_CODE_LEN || code.chars().any(char::is_control) {
        return None;
    }
    Some(code)
}

/// Trim a display name. Returns `None` if it is empty, longer than
/// [`MAX_DISPLAY_NAME_LEN`] bytes or contains control characters.
pub fn normalize_display_name(raw: &str) -> Option<&str> {
    let name = raw.trim();
    if name.is_empty() || name.len() > MAX_DISPLAY_NAME_LEN || name.chars().any(char::is_control)
    {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..200 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "invalid room code: {code}");
        }
    }

    #[test]
    fn room_code_shape() {
        assert!(is_valid_room_code("AB12CD"));
        assert!(!is_valid_room_code("ab12cd"));
        assert!(!is_valid_room_code("AB12C"));
        assert!(!is_valid_room_code("AB12CD7"));
        assert!(!is_valid_room_code("AB-2CD"));
    }

    #[test]
    fn normalize_room_code_trims_and_rejects() {
        assert_eq!(normalize_room_code("  AB12CD "), Some("AB12CD"));
        assert_eq!(normalize_room_code("legacy-room"), Some("legacy-room"));
        assert_eq!(normalize_room_code("   "), None);
        assert_eq!(normalize_room_code(""), None);
        assert_eq!(normalize_room_code("a\u{0007}b"), None);
        assert_eq!(normalize_room_code(&"x".repeat(MAX_ROOM_CODE_LEN + 1)), None);
    }

    #[test]
    fn normalize_display_name_rules() {
        assert_eq!(normalize_display_name(" alice "), Some("alice"));
        assert_eq!(normalize_display_name(""), None);
        assert_eq!(normalize_display_name("bob\n"), Some("bob"));
        assert_eq!(normalize_display_name("b\nob"), None);
        assert_eq!(normalize_display_name(&"n".repeat(33)), None);
        assert_eq!(
            normalize_display_name(&"n".repeat(32)).map(str::len),
            Some(32)
        );
    }
}
