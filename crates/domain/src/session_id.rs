//! Session-id convention: `{room_id}_session`, `{client_id}_session`, or
//! `{source}_{uuid8}_session`.

const SUFFIX: &str = "_session";

/// Build a room-scoped session id, the preferred form for IoT devices.
pub fn room_session_id(room_id: &str) -> String {
    format!("{room_id}{SUFFIX}")
}

/// Build a client-scoped session id (browser/web callers).
pub fn client_session_id(client_id: &str) -> String {
    format!("{client_id}{SUFFIX}")
}

/// Build a fallback session id from a transport source, with a random
/// 8-character id to avoid collisions across concurrent anonymous callers.
pub fn fallback_session_id(source: &str) -> String {
    let uuid8 = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("{source}_{uuid8}{SUFFIX}")
}

/// Extract the room id a session-id was derived from, if it looks like a
/// room-scoped id rather than a uuid-suffixed fallback.
///
/// Per the convention: a session-id ending in `_session` whose prefix
/// contains no digits in its last 8 characters is treated as a room id
/// (the uuid8 fallback form always has digits in that window).
pub fn extract_room_id(session_id: &str) -> Option<&str> {
    let prefix = session_id.strip_suffix(SUFFIX)?;
    if prefix.is_empty() {
        return None;
    }
    let tail_start = prefix.len().saturating_sub(8);
    let tail = &prefix[tail_start..];
    if tail.chars().any(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_session_round_trips() {
        let id = room_session_id("kitchen");
        assert_eq!(id, "kitchen_session");
        assert_eq!(extract_room_id(&id), Some("kitchen"));
    }

    #[test]
    fn fallback_session_is_not_a_room_id() {
        let id = fallback_session_id("api");
        assert!(id.ends_with("_session"));
        assert_eq!(extract_room_id(&id), None);
    }

    #[test]
    fn non_session_suffixed_string_has_no_room() {
        assert_eq!(extract_room_id("kitchen"), None);
    }

    #[test]
    fn empty_prefix_has_no_room() {
        assert_eq!(extract_room_id("_session"), None);
    }
}
