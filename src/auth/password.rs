//! bcrypt password hashes. The cost factor is part of the stored hash, so
//! changing it only affects passwords hashed afterwards.

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// `false` for a wrong password and for anything that is not a bcrypt hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
