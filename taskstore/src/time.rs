use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used for every `createdAt`/`updatedAt`/`lastActiveAt` timestamp field
/// across the domain layer so records stay comparable regardless of which
/// component stamped them.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
