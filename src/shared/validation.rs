//! Validation Utilities

/// Allowed username: 2-32 characters, ASCII alphanumeric or underscore.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 2 || username.len() > 32 {
        return Err("username must be 2-32 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("username may only contain letters, digits and underscore");
    }
    Ok(())
}

/// Password length bounds. The upper bound keeps the argon2 input sane.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 6 {
        return Err("password must be at least 6 characters");
    }
    if password.len() > 72 {
        return Err("password must be at most 72 characters");
    }
    Ok(())
}
