//! 구독 채널 문법 및 권한 검사.
//!
//! 셋업 이벤트 채널은 `setups:<user_id>` 형태입니다. 사용자 ID 세그먼트는
//! 소문자 영숫자, `_`, `-`로 구성된 3~64자여야 합니다. 채널 비교와 소유자
//! 검사는 항상 소문자로 정규화하여 수행합니다.
//!
//! 하트비트는 채널에 속하지 않으며 모든 연결에 무조건 전달됩니다.

/// 셋업 채널 접두사.
pub const SETUP_CHANNEL_PREFIX: &str = "setups:";

/// 사용자 ID 세그먼트 최소 길이.
const USER_SEGMENT_MIN: usize = 3;

/// 사용자 ID 세그먼트 최대 길이.
const USER_SEGMENT_MAX: usize = 64;

/// 사용자의 셋업 채널명을 생성합니다.
///
/// 사용자 ID는 소문자로 정규화됩니다.
pub fn setup_channel(user_id: &str) -> String {
    format!("{}{}", SETUP_CHANNEL_PREFIX, user_id.to_lowercase())
}

/// 클라이언트가 보낸 채널명을 정규화합니다.
///
/// 소문자로 변환 후 `setups:[a-z0-9_-]{3,64}` 패턴을 검사합니다.
/// 패턴에 맞지 않으면 `None`을 반환합니다.
pub fn normalize_channel(raw: &str) -> Option<String> {
    let channel = raw.to_lowercase();
    let segment = channel.strip_prefix(SETUP_CHANNEL_PREFIX)?;

    if segment.len() < USER_SEGMENT_MIN || segment.len() > USER_SEGMENT_MAX {
        return None;
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return None;
    }

    Some(channel)
}

/// 인증된 사용자가 채널을 구독할 수 있는지 검사합니다.
///
/// 채널의 소유자 세그먼트가 사용자 ID와 대소문자 무시 일치할 때만
/// 허용합니다. `setups:` 형태가 아닌 채널은 항상 거부합니다.
pub fn authorize(identity_id: &str, channel: &str) -> bool {
    match channel.strip_prefix(SETUP_CHANNEL_PREFIX) {
        Some(owner) => owner.eq_ignore_ascii_case(identity_id),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_channel_lowercases() {
        assert_eq!(setup_channel("User-ABC"), "setups:user-abc");
        assert_eq!(setup_channel("user-123"), "setups:user-123");
    }

    #[test]
    fn test_normalize_valid() {
        assert_eq!(
            normalize_channel("setups:user-123"),
            Some("setups:user-123".to_string())
        );
        // 대문자는 소문자로 정규화
        assert_eq!(
            normalize_channel("SETUPS:User_42"),
            Some("setups:user_42".to_string())
        );
    }

    #[test]
    fn test_normalize_rejects_bad_shapes() {
        assert_eq!(normalize_channel("orders:user-123"), None);
        assert_eq!(normalize_channel("setups:"), None);
        assert_eq!(normalize_channel("setups:ab"), None); // 너무 짧음
        assert_eq!(normalize_channel(&format!("setups:{}", "a".repeat(65))), None);
        assert_eq!(normalize_channel("setups:user 123"), None);
        assert_eq!(normalize_channel("setups:user.123"), None);
        assert_eq!(normalize_channel(""), None);
    }

    #[test]
    fn test_authorize_owner_only() {
        assert!(authorize("user-123", "setups:user-123"));
        assert!(!authorize("user-123", "setups:other-user"));
    }

    #[test]
    fn test_authorize_case_insensitive() {
        assert!(authorize("User-ABC", "setups:user-abc"));
        assert!(authorize("user-abc", "setups:USER-ABC"));
    }

    #[test]
    fn test_authorize_rejects_non_setup_channels() {
        assert!(!authorize("user-123", "heartbeat"));
        assert!(!authorize("user-123", "market:user-123"));
        assert!(!authorize("user-123", ""));
    }
}
