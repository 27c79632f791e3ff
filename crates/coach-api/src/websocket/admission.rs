//! 연결 수용량 제어.
//!
//! 동시 WebSocket 연결 수에 상한을 둡니다. 검사와 슬롯 점유는 세마포어로
//! 원자적으로 수행되며, 인증보다 먼저 실행됩니다. 슬롯은 퍼밋 드롭 시
//! 정확히 한 번 반환됩니다.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 연결 수용량 제한기.
///
/// `max_connections`가 `None`이면 상한 없이 항상 허용합니다.
pub struct ConnectionLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max_connections: Option<usize>,
}

/// 점유된 연결 슬롯.
///
/// 드롭 시 슬롯이 반환됩니다. 소유권 기반이므로 종료 경로와 무관하게
/// 이중 반환이 불가능합니다.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionLimiter {
    /// 새 제한기 생성.
    ///
    /// # Arguments
    ///
    /// * `max_connections` - 동시 연결 상한. `None`이면 무제한.
    pub fn new(max_connections: Option<usize>) -> Self {
        Self {
            semaphore: max_connections.map(|max| Arc::new(Semaphore::new(max))),
            max_connections,
        }
    }

    /// 연결 슬롯 점유를 시도합니다.
    ///
    /// 상한에 도달했으면 `None`을 반환합니다. 대기하지 않습니다.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        match &self.semaphore {
            Some(semaphore) => match semaphore.clone().try_acquire_owned() {
                Ok(permit) => Some(AdmissionPermit {
                    _permit: Some(permit),
                }),
                Err(_) => None,
            },
            None => Some(AdmissionPermit { _permit: None }),
        }
    }

    /// 설정된 상한.
    pub fn max_connections(&self) -> Option<usize> {
        self.max_connections
    }

    /// 현재 사용 가능한 슬롯 수 (무제한이면 `None`).
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_admits() {
        let limiter = ConnectionLimiter::new(None);

        let mut permits = Vec::new();
        for _ in 0..1000 {
            permits.push(limiter.try_admit().unwrap());
        }
        assert_eq!(limiter.available(), None);
    }

    #[test]
    fn test_ceiling_rejects_excess() {
        let limiter = ConnectionLimiter::new(Some(2));

        let p1 = limiter.try_admit().unwrap();
        let _p2 = limiter.try_admit().unwrap();

        // 상한 도달 - 세 번째 연결은 거부
        assert!(limiter.try_admit().is_none());

        // 슬롯 반환 후 다시 허용
        drop(p1);
        assert!(limiter.try_admit().is_some());
    }

    #[test]
    fn test_permit_releases_once() {
        let limiter = ConnectionLimiter::new(Some(1));

        let permit = limiter.try_admit().unwrap();
        assert_eq!(limiter.available(), Some(0));

        drop(permit);
        assert_eq!(limiter.available(), Some(1));
    }
}
