//! The only place a room or group name may be computed. Every other module
//! asks here, so one guest/student <-> admin pair can never end up split
//! across differently-cased rooms.

use crate::session::Identity;

/// Group every anonymous connection joins, used for admin presence pushes.
pub const GUEST_GROUP: &str = "chat_guests";

const GROUP_PREFIX: &str = "chat_";
const ADMIN_SUFFIX: &str = "_admin";

pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Room a fresh connection is bound to. Authenticated non-admin accounts are
/// forced into their single support thread no matter what room the client
/// asked for; guests and the admin get the requested name as-is.
pub fn for_connection(identity: &Identity, raw: &str) -> String {
    match identity {
        Identity::Student { username } => for_student(username),
        Identity::Admin { .. } | Identity::Anonymous { .. } => normalize(raw),
    }
}

pub fn for_guest(guest_id: &str) -> String {
    normalize(&format!("{guest_id}{ADMIN_SUFFIX}"))
}

pub fn for_student(username: &str) -> String {
    normalize(&format!("student_{username}{ADMIN_SUFFIX}"))
}

pub fn group(room: &str) -> String {
    format!("{GROUP_PREFIX}{room}")
}

/// Visible name for the guest side of a room with no registered participant,
/// e.g. `g123_admin` -> `g123`.
pub fn guest_label(room: &str) -> String {
    room.strip_suffix(ADMIN_SUFFIX).unwrap_or(room).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_connection_ignores_requested_room() {
        let identity = Identity::Student {
            username: "Amaka".into(),
        };
        assert_eq!(for_connection(&identity, "whatever_room"), "student_amaka_admin");
        assert_eq!(for_connection(&identity, "another"), "student_amaka_admin");
    }

    #[test]
    fn guest_and_admin_connections_keep_requested_room() {
        let guest = Identity::Anonymous { guest_id: None };
        assert_eq!(for_connection(&guest, "G123_Admin"), "g123_admin");

        let admin = Identity::Admin {
            username: "admin".into(),
        };
        assert_eq!(for_connection(&admin, "Student_Amaka_Admin"), "student_amaka_admin");
    }

    #[test]
    fn derived_names_are_lowercase() {
        assert_eq!(for_guest("G123"), "g123_admin");
        assert_eq!(for_student("AMAKA"), "student_amaka_admin");
    }

    #[test]
    fn group_prefixes_room() {
        assert_eq!(group("g123_admin"), "chat_g123_admin");
    }

    #[test]
    fn guest_label_strips_suffix() {
        assert_eq!(guest_label("g123_admin"), "g123");
        assert_eq!(guest_label("no_suffix_here"), "no_suffix_here");
    }
}
