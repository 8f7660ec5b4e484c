//! Active Directory security descriptor checks.
//!
//! "User cannot change password" is not stored in `userAccountControl` on
//! Active Directory. It is expressed as deny ACEs for the Change Password
//! extended right in the account's DACL, so the descriptor has to be read
//! with the SD_FLAGS control and inspected here.

use ldap3::controls::RawControl;
use tracing::debug;

/// Attribute holding the binary security descriptor.
pub const SECURITY_DESCRIPTOR_ATTRIBUTE: &str = "nTSecurityDescriptor";

/// LDAP_SERVER_SD_FLAGS_OID.
pub const SD_FLAGS_OID: &str = "1.2.840.113556.1.4.801";

/// Request only the DACL. Without owner and group, a non-admin service
/// account can still read the descriptor.
const DACL_SECURITY_INFORMATION: u8 = 0x04;

/// `User-Change-Password` extended right, `ab721a53-1e2f-11d0-9819-00aa0040529b`.
const CHANGE_PASSWORD_GUID: [u8; 16] = [
    0x53, 0x1a, 0x72, 0xab, // Data1 (little-endian)
    0x2f, 0x1e, // Data2 (little-endian)
    0xd0, 0x11, // Data3 (little-endian)
    0x98, 0x19, 0x00, 0xaa, 0x00, 0x40, 0x52, 0x9b,
];

/// S-1-1-0
const EVERYONE_SID: [u8; 12] = [1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];

/// S-1-5-10
const SELF_SID: [u8; 12] = [1, 1, 0, 0, 0, 0, 0, 5, 10, 0, 0, 0];

const SE_DACL_PRESENT: u16 = 0x0004;
const SE_SELF_RELATIVE: u16 = 0x8000;

const ACCESS_DENIED_ACE_TYPE: u8 = 0x01;
const ACCESS_DENIED_OBJECT_ACE_TYPE: u8 = 0x06;
const INHERIT_ONLY_ACE: u8 = 0x08;

const ACE_OBJECT_TYPE_PRESENT: u32 = 0x1;
const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;

/// ADS_RIGHT_DS_CONTROL_ACCESS
const CONTROL_ACCESS: u32 = 0x100;

/// Builds the SD_FLAGS control asking for the DACL only.
#[must_use]
pub fn sd_flags_control() -> RawControl {
    RawControl {
        ctype: SD_FLAGS_OID.to_string(),
        crit: false,
        // SEQUENCE { INTEGER flags }
        val: Some(vec![0x30, 0x03, 0x02, 0x01, DACL_SECURITY_INFORMATION]),
    }
}

/// Returns true if the DACL denies the Change Password right to Everyone
/// or to SELF.
///
/// A descriptor that cannot be parsed is logged and treated as not denying.
#[must_use]
pub fn change_password_denied(descriptor: &[u8]) -> bool {
    match scan_dacl(descriptor) {
        Some(denied) => denied,
        None => {
            debug!(len = descriptor.len(), "Unparseable security descriptor");
            false
        }
    }
}

/// Walks the DACL. `None` means the descriptor is malformed.
fn scan_dacl(sd: &[u8]) -> Option<bool> {
    if *sd.first()? != 1 {
        return None;
    }
    let control = read_u16(sd, 2)?;
    if control & SE_SELF_RELATIVE == 0 {
        return None;
    }
    let dacl_offset = read_u32(sd, 16)? as usize;
    if control & SE_DACL_PRESENT == 0 || dacl_offset == 0 {
        return Some(false);
    }

    let acl_size = read_u16(sd, dacl_offset + 2)? as usize;
    let ace_count = read_u16(sd, dacl_offset + 4)?;
    let acl = sd.get(dacl_offset..dacl_offset.checked_add(acl_size)?)?;

    let mut pos = 8;
    for _ in 0..ace_count {
        let ace_size = read_u16(acl, pos + 2)? as usize;
        if ace_size < 4 {
            return None;
        }
        let ace = acl.get(pos..pos + ace_size)?;
        if denies_change_password(ace)? {
            return Some(true);
        }
        pos += ace_size;
    }

    Some(false)
}

fn denies_change_password(ace: &[u8]) -> Option<bool> {
    let (ace_type, flags) = (ace[0], ace[1]);
    if flags & INHERIT_ONLY_ACE != 0 {
        return Some(false);
    }

    let (mask, object_type, sid) = match ace_type {
        ACCESS_DENIED_ACE_TYPE => (read_u32(ace, 4)?, None, ace.get(8..)?),
        ACCESS_DENIED_OBJECT_ACE_TYPE => {
            let object_flags = read_u32(ace, 8)?;
            let mut pos = 12;
            let mut object_type = None;
            if object_flags & ACE_OBJECT_TYPE_PRESENT != 0 {
                object_type = Some(ace.get(pos..pos + 16)?);
                pos += 16;
            }
            if object_flags & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0 {
                pos += 16;
            }
            (read_u32(ace, 4)?, object_type, ace.get(pos..)?)
        }
        _ => return Some(false),
    };

    if mask & CONTROL_ACCESS == 0 {
        return Some(false);
    }
    // An object ACE without an object type covers every extended right.
    if object_type.is_some_and(|guid| guid != CHANGE_PASSWORD_GUID) {
        return Some(false);
    }

    let sid = sid_bytes(sid)?;
    Some(sid == EVERYONE_SID || sid == SELF_SID)
}

/// Trims trailing ACE padding from a SID.
fn sid_bytes(bytes: &[u8]) -> Option<&[u8]> {
    let sub_authorities = *bytes.get(1)? as usize;
    bytes.get(..8 + 4 * sub_authorities)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
