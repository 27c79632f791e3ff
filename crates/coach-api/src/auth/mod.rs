//! 인증 모듈.
//!
//! JWT 토큰 처리, 신원 검증 트레이트, REST 인증 추출기를 제공합니다.

pub mod jwt;
pub mod middleware;
pub mod verifier;

pub use jwt::{create_token, decode_token, Claims, JwtError};
pub use middleware::AuthenticatedUser;
pub use verifier::{AuthError, Identity, IdentityVerifier, JwtVerifier};
