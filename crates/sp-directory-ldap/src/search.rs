//! LDAP search operations.
//!
//! Provides the lookups the password change needs: the user entry, the
//! domain password policy, and group membership.

use std::collections::HashMap;

use ldap3::controls::RawControl;
use ldap3::{Scope, SearchEntry};
use sp_provider::DirectoryUser;

use crate::config::LdapConfig;
use crate::connection::LdapConnection;
use crate::error::{LdapError, LdapResult};
use crate::security::{self, SECURITY_DESCRIPTOR_ATTRIBUTE};

/// Attributes read from a user entry.
const USER_ATTRIBUTES: [&str; 6] = [
    "userPrincipalName",
    "sAMAccountName",
    "pwdLastSet",
    "userAccountControl",
    "memberOf",
    SECURITY_DESCRIPTOR_ATTRIBUTE,
];

/// Represents an LDAP entry with parsed attributes.
#[derive(Debug, Clone)]
pub struct LdapEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,

    /// Binary attributes.
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl LdapEntry {
    /// Creates a new LDAP entry from search result.
    #[must_use]
    pub fn from_search_entry(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
            binary_attributes: entry.bin_attrs,
        }
    }

    /// Gets a single-valued attribute.
    ///
    /// Attribute names compare case-insensitively, as in LDAP.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Gets a binary attribute.
    ///
    /// Values that happen to be valid UTF-8 land in the text attributes, so
    /// those are consulted as well.
    #[must_use]
    pub fn get_binary_attr(&self, name: &str) -> Option<&[u8]> {
        self.binary_attributes
            .get(name)
            .or_else(|| {
                self.binary_attributes
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .and_then(|v| v.first())
            .map(Vec::as_slice)
            .or_else(|| self.get_attr(name).map(str::as_bytes))
    }

    /// Checks if the entry has an attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attrs(name).is_some()
    }

    /// Maps a user entry to a [`DirectoryUser`].
    #[must_use]
    pub fn to_directory_user(&self, identity_attribute: &str) -> DirectoryUser {
        DirectoryUser {
            dn: self.dn.clone(),
            account_name: self
                .get_attr(identity_attribute)
                .unwrap_or_default()
                .to_string(),
            user_principal_name: self.get_attr("userPrincipalName").map(str::to_string),
            password_last_set: self
                .get_attr("pwdLastSet")
                .and_then(|v| v.trim().parse().ok()),
            user_account_control: self
                .get_attr("userAccountControl")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map_or(0, |v| v as u32),
            change_password_denied: self
                .get_binary_attr(SECURITY_DESCRIPTOR_ATTRIBUTE)
                .is_some_and(security::change_password_denied),
        }
    }

    /// Group names from the entry's `memberOf` values.
    #[must_use]
    pub fn member_of_names(&self) -> Vec<String> {
        self.get_attrs("memberOf")
            .map(|dns| dns.iter().filter_map(|dn| common_name(dn)).collect())
            .unwrap_or_default()
    }
}

/// Extracts the value of a leading `CN=` RDN from a DN.
///
/// Escaped characters (`\,`) are unescaped. Returns `None` when the first
/// RDN is not a common name.
#[must_use]
pub fn common_name(dn: &str) -> Option<String> {
    let (attr, rest) = dn.split_once('=')?;
    if !attr.trim().eq_ignore_ascii_case("cn") {
        return None;
    }

    let mut value = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(chars.next()),
            ',' | '+' => break,
            _ => value.push(c),
        }
    }

    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// LDAP search helper.
pub struct LdapSearcher<'a> {
    conn: &'a mut LdapConnection,
    config: &'a LdapConfig,
}

impl<'a> LdapSearcher<'a> {
    /// Creates a new searcher.
    pub fn new(conn: &'a mut LdapConnection, config: &'a LdapConfig) -> Self {
        Self { conn, config }
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
    ) -> LdapResult<Vec<LdapEntry>> {
        self.search_with_controls(base, scope, filter, attrs, Vec::new())
            .await
    }

    async fn search_with_controls(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
        controls: Vec<RawControl>,
    ) -> LdapResult<Vec<LdapEntry>> {
        let ldap = self.conn.ldap_mut();
        if !controls.is_empty() {
            ldap.with_controls(controls);
        }
        let (rs, _result) = ldap
            .with_timeout(self.config.operation_timeout)
            .search(base, scope, filter, attrs)
            .await?
            .success()
            .map_err(|e| LdapError::Search(e.to_string()))?;

        Ok(rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from_search_entry)
            .collect())
    }

    /// Finds a user by the configured identity attribute.
    ///
    /// The DACL is requested alongside the attributes so the entry can tell
    /// whether the account is denied the Change Password right.
    pub async fn find_user(&mut self, username: &str) -> LdapResult<Option<LdapEntry>> {
        let config = self.config;
        let filter = config.user_by_username_filter(username);
        let mut attrs = USER_ATTRIBUTES.to_vec();
        let identity = config.identity.as_str();
        if !attrs.iter().any(|a| a.eq_ignore_ascii_case(identity)) {
            attrs.push(identity);
        }

        let entries = self
            .search_with_controls(
                &config.users_dn,
                Scope::Subtree,
                &filter,
                attrs,
                vec![security::sd_flags_control()],
            )
            .await?;
        Ok(entries.into_iter().next())
    }

    /// Reads the domain naming context from the RootDSE.
    pub async fn default_naming_context(&mut self) -> LdapResult<String> {
        let entries = self
            .search("", Scope::Base, "(objectClass=*)", vec!["defaultNamingContext"])
            .await?;

        entries
            .first()
            .and_then(|e| e.get_attr("defaultNamingContext"))
            .map(str::to_string)
            .ok_or_else(|| LdapError::Search("RootDSE has no defaultNamingContext".to_string()))
    }

    /// Reads `minPwdLength` from the domain object.
    pub async fn min_password_length(&mut self) -> LdapResult<usize> {
        let domain = self.default_naming_context().await?;
        let entries = self
            .search(&domain, Scope::Base, "(objectClass=*)", vec!["minPwdLength"])
            .await?;

        entries
            .first()
            .and_then(|e| e.get_attr("minPwdLength"))
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| LdapError::Search(format!("{domain} has no readable minPwdLength")))
    }

    /// Reads the direct groups of a user from `memberOf`.
    pub async fn member_of(&mut self, user_dn: &str) -> LdapResult<Vec<String>> {
        let entries = self
            .search(user_dn, Scope::Base, "(objectClass=*)", vec!["memberOf"])
            .await?;

        entries
            .first()
            .map(LdapEntry::member_of_names)
            .ok_or_else(|| LdapError::Search(format!("{user_dn} not found")))
    }

    /// Finds every group the user belongs to, including nested groups.
    pub async fn in_chain_groups(&mut self, user_dn: &str) -> LdapResult<Vec<String>> {
        let base = self.default_naming_context().await?;
        let filter = LdapConfig::in_chain_groups_filter(user_dn);
        let entries = self.search(&base, Scope::Subtree, &filter, vec!["cn"]).await?;

        Ok(entries
            .into_iter()
            .filter_map(|e| {
                e.get_attr("cn")
                    .map(str::to_string)
                    .or_else(|| common_name(&e.dn))
            })
            .collect())
    }
}
