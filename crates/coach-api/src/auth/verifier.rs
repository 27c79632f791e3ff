//! 신원 검증 트레이트 및 JWT 구현.
//!
//! 게이트웨이와 REST 추출기는 구체 토큰 형식 대신 `IdentityVerifier`
//! 트레이트에 의존합니다. 테스트에서는 가짜 구현을 주입합니다.

use async_trait::async_trait;

use super::jwt::{decode_token, JwtError};

/// 인증된 사용자 신원.
///
/// ID는 생성 시 소문자로 정규화됩니다. 인증 이후 연결의 신원은 변경되지
/// 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// 사용자 ID (소문자)
    pub id: String,
}

impl Identity {
    /// 새 신원 생성. ID는 소문자로 정규화됩니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().to_lowercase(),
        }
    }
}

/// 인증 실패 정보.
///
/// HTTP/WebSocket 표현과 무관한 값 타입입니다. 게이트웨이는
/// `status_code`를 close code 선택에, `client_message`를 close reason과
/// 에러 프레임에 사용합니다.
#[derive(Debug, Clone, thiserror::Error)]
#[error("auth failed ({status_code}): {client_message}")]
pub struct AuthError {
    /// 4xx/5xx 계열 상태 코드
    pub status_code: u16,
    /// 클라이언트에 노출 가능한 메시지
    pub client_message: String,
}

impl AuthError {
    /// 401 계열 인증 실패.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status_code: 401,
            client_message: message.into(),
        }
    }

    /// 토큰 누락.
    pub fn missing_token() -> Self {
        Self::unauthorized("Authentication token required")
    }

    /// 검증 경로 자체의 실패 (500 계열). 익명 신원으로 대체하지 않습니다.
    pub fn service_failure(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            client_message: message.into(),
        }
    }

    /// 인증 실패(4xx)인지 내부 오류(5xx)인지 구분.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }
}

/// 신원 검증 트레이트.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// 토큰을 검증하고 신원을 반환합니다.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// jsonwebtoken 기반 프로덕션 검증기.
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token_data = decode_token(token, &self.secret).map_err(|e| match e {
            JwtError::TokenExpired => AuthError::unauthorized("Token expired"),
            JwtError::InvalidToken | JwtError::DecodingError => {
                AuthError::unauthorized("Invalid authentication token")
            }
            JwtError::KeyError | JwtError::EncodingError(_) => {
                AuthError::service_failure("Authentication service error")
            }
        })?;

        Ok(Identity::new(token_data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    #[test]
    fn test_identity_lowercased() {
        let identity = Identity::new("User-ABC");
        assert_eq!(identity.id, "user-abc");
    }

    #[tokio::test]
    async fn test_jwt_verifier_accepts_valid_token() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let token = create_token(&Claims::new("User-123", 60), TEST_SECRET).unwrap();

        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.id, "user-123");
    }

    #[tokio::test]
    async fn test_jwt_verifier_rejects_garbage() {
        let verifier = JwtVerifier::new(TEST_SECRET);

        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err.status_code, 401);
        assert_eq!(err.client_message, "Invalid authentication token");
    }

    #[tokio::test]
    async fn test_jwt_verifier_rejects_expired() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let token = create_token(&Claims::new("user-123", -5), TEST_SECRET).unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert_eq!(err.status_code, 401);
        assert_eq!(err.client_message, "Token expired");
    }
}
