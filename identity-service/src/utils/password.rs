use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use service_core::error::AppError;

/// Identifier stored alongside every verifier so the KDF can evolve.
pub const PASSWORD_ALGO: &str = "argon2id";

/// Well-formed Argon2id verifier that matches no password. Verifying
/// against it costs the same as a real verification, which keeps the
/// unknown-username path indistinguishable from the wrong-password path.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Hash a password with Argon2id and a fresh per-account salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("failed to hash password: {}", e)))?
        .to_string();

    Ok(hash)
}

/// Verify a password against a stored verifier. Comparison inside the
/// Argon2 verifier is constant-time.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("invalid stored verifier: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::AuthInvalid(anyhow::anyhow!("invalid credentials")))
}

/// Burn a full verification's worth of work when the username does not
/// exist, so response timing does not reveal which usernames are taken.
pub fn verify_dummy(password: &str) {
    let _ = verify_password(password, DUMMY_HASH);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Passw0rd!", &hash).is_ok());
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash_password("Passw0rd!").unwrap();
        let err = verify_password("passw0rd!", &hash).unwrap_err();
        assert!(matches!(err, AppError::AuthInvalid(_)));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("Passw0rd!").unwrap();
        let b = hash_password("Passw0rd!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dummy_hash_parses_and_never_matches() {
        assert!(PasswordHash::new(DUMMY_HASH).is_ok());
        assert!(verify_password("anything", DUMMY_HASH).is_err());
    }
}
