use crate::error::AuthError;

const SCHEME: &str = "bearer ";

/// Pull the token out of an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let header = header.trim();

    let scheme = header.get(..SCHEME.len()).ok_or(AuthError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(AuthError::Unauthorized);
    }

    let token = header[SCHEME.len()..].trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::Unauthorized);
    }

    Ok(token)
}
