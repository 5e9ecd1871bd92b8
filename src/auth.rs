use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Username/password pair accepted by the log viewer API
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Constant-time comparison of both fields
    fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Authentication middleware
/// Extracts and validates HTTP Basic credentials from the Authorization header
pub async fn auth_middleware(
    State(credentials): State<Arc<Credentials>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let (username, password) = extract_basic_credentials(auth_header)?;

    if !credentials.matches(&username, &password) {
        tracing::warn!(username = %username, "Rejected log viewer credentials");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    Ok(next.run(req).await)
}

/// Decode `Basic base64(username:password)`
fn extract_basic_credentials(auth_header: &str) -> Result<(String, String), AppError> {
    const BASIC_PREFIX: &str = "Basic ";

    let encoded = auth_header.strip_prefix(BASIC_PREFIX).ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Basic scheme".to_string())
    })?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Unauthorized("Malformed Basic credentials".to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| AppError::Unauthorized("Malformed Basic credentials".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AppError::Unauthorized("Malformed Basic credentials".to_string()))?;

    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_extract_basic_credentials_success() {
        let (user, pass) = extract_basic_credentials(&encode("admin:s3cr:et")).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "s3cr:et");
    }

    #[test]
    fn test_extract_basic_credentials_wrong_scheme() {
        let result = extract_basic_credentials("Bearer abc");
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_basic_credentials_without_colon() {
        let result = extract_basic_credentials(&encode("admin"));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_basic_credentials_bad_base64() {
        let result = extract_basic_credentials("Basic !!!");
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_match() {
        let credentials = Credentials::new("admin", "secret");
        assert!(credentials.matches("admin", "secret"));
        assert!(!credentials.matches("admin", "secre"));
        assert!(!credentials.matches("root", "secret"));
        assert!(!format!("{:?}", credentials).contains("secret"));
    }
}
