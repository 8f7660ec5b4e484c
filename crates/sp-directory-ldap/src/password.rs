//! Active Directory password attribute encoding.
//!
//! AD only accepts passwords through `unicodePwd`, written as the password
//! surrounded by double quotes and encoded as UTF-16LE. The write must go
//! over an encrypted connection.
//!
//! - A user-driven change deletes the old value and adds the new one in a
//!   single modify, so the directory can check the old password and
//!   history.
//! - An administrative reset replaces the value outright.

use std::collections::HashSet;

use ldap3::Mod;

/// The password attribute.
pub const UNICODE_PWD: &str = "unicodePwd";

/// The attribute recording the last password change.
pub const PWD_LAST_SET: &str = "pwdLastSet";

/// Encodes a password for `unicodePwd`.
#[must_use]
pub fn encode_unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Modifications for a change that proves the current password.
#[must_use]
pub fn change_mods(current_password: &str, new_password: &str) -> Vec<Mod<Vec<u8>>> {
    vec![
        Mod::Delete(
            UNICODE_PWD.as_bytes().to_vec(),
            HashSet::from([encode_unicode_pwd(current_password)]),
        ),
        Mod::Add(
            UNICODE_PWD.as_bytes().to_vec(),
            HashSet::from([encode_unicode_pwd(new_password)]),
        ),
    ]
}

/// Modifications for an administrative reset.
#[must_use]
pub fn reset_mods(new_password: &str) -> Vec<Mod<Vec<u8>>> {
    vec![Mod::Replace(
        UNICODE_PWD.as_bytes().to_vec(),
        HashSet::from([encode_unicode_pwd(new_password)]),
    )]
}

/// Modifications that stamp `pwdLastSet` with the current time.
///
/// `-1` tells the domain controller to use "now".
#[must_use]
pub fn touch_pwd_last_set_mods() -> Vec<Mod<Vec<u8>>> {
    vec![Mod::Replace(
        PWD_LAST_SET.as_bytes().to_vec(),
        HashSet::from([b"-1".to_vec()]),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_quoted_utf16le() {
        assert_eq!(
            encode_unicode_pwd("Ab1"),
            vec![b'"', 0, b'A', 0, b'b', 0, b'1', 0, b'"', 0]
        );
    }

    #[test]
    fn encodes_non_ascii() {
        // U+00E9 and U+1F512 (surrogate pair)
        let encoded = encode_unicode_pwd("é🔒");
        assert_eq!(
            encoded,
            vec![b'"', 0, 0xE9, 0x00, 0x3D, 0xD8, 0x12, 0xDD, b'"', 0]
        );
    }

    #[test]
    fn change_deletes_then_adds() {
        let mods = change_mods("old", "new");
        assert_eq!(mods.len(), 2);
        assert!(matches!(
            &mods[0],
            Mod::Delete(attr, values) if attr == b"unicodePwd" && values.contains(&encode_unicode_pwd("old"))
        ));
        assert!(matches!(
            &mods[1],
            Mod::Add(attr, values) if attr == b"unicodePwd" && values.contains(&encode_unicode_pwd("new"))
        ));
    }

    #[test]
    fn reset_replaces() {
        let mods = reset_mods("new");
        assert!(matches!(
            &mods[..],
            [Mod::Replace(attr, values)] if attr == b"unicodePwd" && values.len() == 1
        ));
    }

    #[test]
    fn pwd_last_set_is_minus_one() {
        let mods = touch_pwd_last_set_mods();
        assert!(matches!(
            &mods[..],
            [Mod::Replace(attr, values)] if attr == b"pwdLastSet" && values.contains(&b"-1".to_vec())
        ));
    }
}
