//! Small shared helpers: Luhn validation, session tokens, password hashing.

/// Check a numeric identifier against the Luhn checksum.
pub fn luhn_valid(number: i64) -> bool {
    (number % 10 + luhn_checksum(number / 10)) % 10 == 0
}

fn luhn_checksum(mut number: i64) -> i64 {
    let mut sum = 0;
    let mut position = 0;

    while number > 0 {
        let mut digit = number % 10;
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        sum += digit;
        number /= 10;
        position += 1;
    }

    sum % 10
}

/// 32 random bytes, hex-encoded. The raw value is the `Authorization` header.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_valid_numbers() {
        assert!(luhn_valid(5512703182881200));
        assert!(luhn_valid(2377225624));
        assert!(luhn_valid(79927398713));
    }

    #[test]
    fn luhn_rejects_invalid_numbers() {
        assert!(!luhn_valid(1));
        assert!(!luhn_valid(79927398710));
        assert!(!luhn_valid(5512703182881201));
    }

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("qwerty").unwrap();
        assert!(verify_password("qwerty", &hash));
        assert!(!verify_password("ytrewq", &hash));
        assert!(!verify_password("qwerty", "not-a-phc-string"));
    }
}
