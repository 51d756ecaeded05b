//! Trusted identity header.
//!
//! The portal's session layer (or a gateway in front of it) resolves the
//! logged-in student and forwards the id in a header. This authenticator only
//! reads it; it must not be exposed to clients that can set the header freely.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

pub struct HeaderAuthenticator {
    header: String,
}

impl HeaderAuthenticator {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_lowercase(),
        }
    }
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let value = request
            .headers
            .get(&self.header)
            .map(|v| v.trim())
            .ok_or(AuthError::NotAuthenticated)?;

        if value.is_empty() {
            return Err(AuthError::InvalidCredentials(format!(
                "empty {} header",
                self.header
            )));
        }

        Ok(Identity::new(value, "header"))
    }

    fn method_name(&self) -> &'static str {
        "header"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn make_request(headers: Vec<(&str, &str)>) -> AuthRequest {
        AuthRequest {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_header_identity() {
        let auth = HeaderAuthenticator::new("X-User-Id");
        let request = make_request(vec![("X-User-Id", " 20231234 ")]);

        let identity = auth.authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id, "20231234");
        assert_eq!(identity.method, "header");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let auth = HeaderAuthenticator::new("x-user-id");
        let result = auth.authenticate(&make_request(vec![])).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_blank_header() {
        let auth = HeaderAuthenticator::new("x-user-id");
        let result = auth
            .authenticate(&make_request(vec![("x-user-id", "   ")]))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }
}
