//! Policy and client configuration.
//!
//! These types mirror the JSON settings file (`appSettings` and
//! `clientSettings` sections, camelCase keys). Every field has a default so
//! partial files are accepted.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ApiErrorCode, ConfigError};

/// Default minimum password length when the domain policy cannot be read.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Default Pwned Passwords API base URL.
pub const DEFAULT_PWNED_API_URL: &str = "https://api.pwnedpasswords.com";

/// Default reCAPTCHA verification endpoint.
pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

// ============================================================================
// Identity Type
// ============================================================================

/// Directory attribute used to resolve the submitted username.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityType {
    /// userPrincipalName (`user@domain`).
    #[default]
    UserPrincipalName,
    /// sAMAccountName (pre-Windows 2000 logon name).
    SamAccountName,
    /// cn attribute (Common Name).
    Cn,
    /// mail attribute.
    Mail,
    /// Custom attribute name.
    Custom(String),
}

impl IdentityType {
    /// Returns the LDAP attribute name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserPrincipalName => "userPrincipalName",
            Self::SamAccountName => "sAMAccountName",
            Self::Cn => "cn",
            Self::Mail => "mail",
            Self::Custom(name) => name,
        }
    }

    /// Returns true when usernames may need a default domain appended.
    #[must_use]
    pub const fn is_upn(&self) -> bool {
        matches!(self, Self::UserPrincipalName)
    }
}

impl FromStr for IdentityType {
    type Err = ConfigError;

    /// Parses common spellings. Blank input falls back to the UPN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "" | "upn" | "userprincipalname" => Self::UserPrincipalName,
            "sam" | "samaccountname" => Self::SamAccountName,
            "cn" | "name" => Self::Cn,
            "mail" | "email" => Self::Mail,
            _ if trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                Self::Custom(trimmed.to_string())
            }
            _ => {
                return Err(ConfigError::invalid(
                    "idTypeForUser",
                    format!("'{trimmed}' is not a valid attribute name"),
                ))
            }
        })
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IdentityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for IdentityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Password Change Options
// ============================================================================

/// Server-side password change policy and directory connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordChangeOptions {
    /// Reset the password with the service account when the
    /// user-driven change is rejected.
    pub allow_set_password_fallback: bool,

    /// Users in any of these groups may not change their password.
    pub restricted_ad_groups: Vec<String>,

    /// When non-empty, only members of these groups may change their password.
    pub allowed_ad_groups: Vec<String>,

    /// Directory hostnames, tried in order.
    pub ldap_hostnames: Vec<String>,

    /// LDAPS port.
    pub ldap_port: u16,

    /// Service account bind DN or UPN.
    pub ldap_username: String,

    /// Service account password.
    #[serde(skip_serializing)]
    pub ldap_password: String,

    /// Base DN for user searches.
    pub ldap_search_base: String,

    /// Whether to validate the directory's TLS certificate.
    pub ldap_validate_certificates: bool,

    /// Domain appended to bare usernames when resolving by UPN.
    pub default_domain: Option<String>,

    /// Attribute used to resolve usernames.
    pub id_type_for_user: IdentityType,

    /// Set `pwdLastSet` before changing a password that was never set.
    pub update_last_password: bool,

    /// Base URL of the Pwned Passwords range API.
    pub pwned_passwords_url: String,
}

impl Default for PasswordChangeOptions {
    fn default() -> Self {
        Self {
            allow_set_password_fallback: true,
            restricted_ad_groups: vec![
                "Administrators".to_string(),
                "Domain Admins".to_string(),
                "Enterprise Admins".to_string(),
            ],
            allowed_ad_groups: Vec::new(),
            ldap_hostnames: Vec::new(),
            ldap_port: 636,
            ldap_username: String::new(),
            ldap_password: String::new(),
            ldap_search_base: String::new(),
            ldap_validate_certificates: true,
            default_domain: None,
            id_type_for_user: IdentityType::default(),
            update_last_password: false,
            pwned_passwords_url: DEFAULT_PWNED_API_URL.to_string(),
        }
    }
}

impl fmt::Debug for PasswordChangeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChangeOptions")
            .field("allow_set_password_fallback", &self.allow_set_password_fallback)
            .field("restricted_ad_groups", &self.restricted_ad_groups)
            .field("allowed_ad_groups", &self.allowed_ad_groups)
            .field("ldap_hostnames", &self.ldap_hostnames)
            .field("ldap_port", &self.ldap_port)
            .field("ldap_username", &self.ldap_username)
            .field("ldap_password", &"***")
            .field("ldap_search_base", &self.ldap_search_base)
            .field("ldap_validate_certificates", &self.ldap_validate_certificates)
            .field("default_domain", &self.default_domain)
            .field("id_type_for_user", &self.id_type_for_user)
            .field("update_last_password", &self.update_last_password)
            .field("pwned_passwords_url", &self.pwned_passwords_url)
            .finish()
    }
}

impl PasswordChangeOptions {
    /// Appends the default domain to a bare username when resolving by UPN.
    ///
    /// Usernames that already carry an `@domain` part, or any username when
    /// the identity type is not the UPN, are returned unchanged.
    #[must_use]
    pub fn fix_username_with_domain(&self, username: &str) -> String {
        if !self.id_type_for_user.is_upn() {
            return username.to_string();
        }

        let has_domain = username.split('@').filter(|p| !p.is_empty()).count() > 1;
        match self.default_domain.as_deref().map(str::trim) {
            Some(domain) if !has_domain && !domain.is_empty() => format!("{username}@{domain}"),
            _ => username.to_string(),
        }
    }
}

// ============================================================================
// Client Settings
// ============================================================================

/// reCAPTCHA settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecaptchaSettings {
    /// Public site key rendered by the client.
    pub site_key: String,

    /// Secret key used for server-side verification. Empty disables the check.
    #[serde(skip_serializing)]
    pub private_key: String,

    /// Widget language.
    pub language_code: String,

    /// Verification endpoint.
    #[serde(skip_serializing)]
    pub verify_url: String,
}

impl Default for RecaptchaSettings {
    fn default() -> Self {
        Self {
            site_key: String::new(),
            private_key: String::new(),
            language_code: "en".to_string(),
            verify_url: DEFAULT_RECAPTCHA_VERIFY_URL.to_string(),
        }
    }
}

/// Patterns the client validates the username field against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRegex {
    /// Pattern used when [`ClientSettings::use_email`] is set.
    pub email_regex: String,
    /// Pattern used for plain usernames.
    pub username_regex: String,
}

impl Default for ValidationRegex {
    fn default() -> Self {
        Self {
            email_regex: r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$"
                .to_string(),
            username_regex: "^[a-zA-Z0-9._-]{3,20}$".to_string(),
        }
    }
}

/// Labels and help text of the change password form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ChangePasswordForm {
    pub help_text: String,
    pub username_label: String,
    pub username_helpblock: String,
    pub username_default_domain_helper_block: String,
    pub current_password_label: String,
    pub current_password_helpblock: String,
    pub new_password_label: String,
    pub new_password_helpblock: String,
    pub new_password_verify_label: String,
    pub new_password_verify_helpblock: String,
    pub change_password_button_label: String,
}

impl Default for ChangePasswordForm {
    fn default() -> Self {
        Self {
            help_text: "If you are having trouble with this tool, please contact IT Support."
                .to_string(),
            username_label: "Username".to_string(),
            username_helpblock: "Your organization's email address".to_string(),
            username_default_domain_helper_block: "Your organization's username".to_string(),
            current_password_label: "Current Password".to_string(),
            current_password_helpblock: "Enter your current password".to_string(),
            new_password_label: "New Password".to_string(),
            new_password_helpblock: "Enter a strong password".to_string(),
            new_password_verify_label: "Re-enter New Password".to_string(),
            new_password_verify_helpblock: "Enter your new password again".to_string(),
            change_password_button_label: "Change Password".to_string(),
        }
    }
}

/// Client-side validation messages of the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ErrorsPasswordForm {
    pub field_required: String,
    pub username_pattern: String,
    pub username_email_pattern: String,
    pub password_match: String,
}

impl Default for ErrorsPasswordForm {
    fn default() -> Self {
        Self {
            field_required: "This field is required.".to_string(),
            username_pattern: "Please enter a valid username.".to_string(),
            username_email_pattern: "Please enter a valid email address.".to_string(),
            password_match: "Passwords do not match.".to_string(),
        }
    }
}

/// Messages the client shows for each outcome of a change.
///
/// The error messages are keyed by [`ApiErrorCode`]; see [`Alerts::for_code`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct Alerts {
    pub success_alert_title: String,
    pub success_alert_body: String,
    pub error_password_change_not_allowed: String,
    pub error_invalid_credentials: String,
    pub error_invalid_domain: String,
    pub error_invalid_user: String,
    pub error_captcha: String,
    pub error_field_required: String,
    pub error_field_mismatch: String,
    pub error_complex_password: String,
    pub error_connection_ldap: String,
    pub error_score_password: String,
    pub error_distance_password: String,
    pub error_pwned_password: String,
}

impl Alerts {
    /// Message shown for an error code.
    ///
    /// `Generic` has no alert; the client shows the server's message.
    #[must_use]
    pub fn for_code(&self, code: ApiErrorCode) -> Option<&str> {
        let message = match code {
            ApiErrorCode::Generic => return None,
            ApiErrorCode::FieldRequired => &self.error_field_required,
            ApiErrorCode::FieldMismatch => &self.error_field_mismatch,
            ApiErrorCode::UserNotFound => &self.error_invalid_user,
            ApiErrorCode::InvalidCredentials => &self.error_invalid_credentials,
            ApiErrorCode::InvalidCaptcha => &self.error_captcha,
            ApiErrorCode::ChangeNotPermitted => &self.error_password_change_not_allowed,
            ApiErrorCode::ComplexPassword => &self.error_complex_password,
            ApiErrorCode::MinimumScore => &self.error_score_password,
            ApiErrorCode::MinimumDistance => &self.error_distance_password,
            ApiErrorCode::PwnedPassword => &self.error_pwned_password,
        };
        Some(message)
    }
}

impl Default for Alerts {
    fn default() -> Self {
        let text = |code: ApiErrorCode| code.default_message().to_string();
        Self {
            success_alert_title: "You have changed your password successfully.".to_string(),
            success_alert_body: "It may take a few minutes for the new password to reach every domain controller.".to_string(),
            error_password_change_not_allowed: text(ApiErrorCode::ChangeNotPermitted),
            error_invalid_credentials: text(ApiErrorCode::InvalidCredentials),
            error_invalid_domain: "You have supplied an invalid domain to log on to.".to_string(),
            error_invalid_user: text(ApiErrorCode::UserNotFound),
            error_captcha: text(ApiErrorCode::InvalidCaptcha),
            error_field_required: text(ApiErrorCode::FieldRequired),
            error_field_mismatch: text(ApiErrorCode::FieldMismatch),
            error_complex_password: text(ApiErrorCode::ComplexPassword),
            error_connection_ldap: "Unhandled error connecting to the directory.".to_string(),
            error_score_password: text(ApiErrorCode::MinimumScore),
            error_distance_password: text(ApiErrorCode::MinimumDistance),
            error_pwned_password: text(ApiErrorCode::PwnedPassword),
        }
    }
}

/// Settings exposed to the web client and enforced by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Page title.
    pub application_title: String,

    /// Heading of the change password form.
    pub change_password_title: String,

    /// Whether usernames are entered as email addresses.
    pub use_email: bool,

    /// Minimum edit distance between current and new password. 0 disables.
    pub minimum_distance: usize,

    /// Minimum strength score (0-4). 0 disables.
    pub minimum_score: u8,

    /// Random bytes used by the password generator.
    pub password_entropy: usize,

    /// Whether the client offers generated passwords.
    pub use_password_generation: bool,

    /// Whether the client shows a strength meter.
    pub show_password_meter: bool,

    /// reCAPTCHA settings. `None` means every captcha is rejected.
    pub recaptcha: Option<RecaptchaSettings>,

    /// Username validation patterns.
    pub validation_regex: ValidationRegex,

    /// Form labels and help text.
    pub change_password_form: ChangePasswordForm,

    /// Form validation messages.
    pub errors_password_form: ErrorsPasswordForm,

    /// Result messages.
    pub alerts: Alerts,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            application_title: "Change Account Password".to_string(),
            change_password_title: "Change Account Password".to_string(),
            use_email: false,
            minimum_distance: 0,
            minimum_score: 0,
            password_entropy: 16,
            use_password_generation: false,
            show_password_meter: true,
            recaptcha: Some(RecaptchaSettings::default()),
            validation_regex: ValidationRegex::default(),
            change_password_form: ChangePasswordForm::default(),
            errors_password_form: ErrorsPasswordForm::default(),
            alerts: Alerts::default(),
        }
    }
}

// ============================================================================
// Settings File
// ============================================================================

/// Contents of the JSON settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsFile {
    /// Server-side options.
    pub app_settings: PasswordChangeOptions,
    /// Client settings.
    pub client_settings: ClientSettings,
}

impl SettingsFile {
    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parses settings from a JSON string.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with_domain(domain: Option<&str>) -> PasswordChangeOptions {
        PasswordChangeOptions {
            default_domain: domain.map(String::from),
            ..PasswordChangeOptions::default()
        }
    }

    #[test]
    fn appends_default_domain_to_bare_username() {
        let options = options_with_domain(Some("example.com"));
        assert_eq!(options.fix_username_with_domain("jdoe"), "jdoe@example.com");
    }

    #[test]
    fn keeps_username_with_domain() {
        let options = options_with_domain(Some("example.com"));
        assert_eq!(options.fix_username_with_domain("jdoe@corp.local"), "jdoe@corp.local");
    }

    #[test]
    fn trailing_at_sign_counts_as_bare() {
        let options = options_with_domain(Some("example.com"));
        assert_eq!(options.fix_username_with_domain("jdoe@"), "jdoe@@example.com");
    }

    #[test]
    fn no_default_domain_leaves_username() {
        assert_eq!(options_with_domain(None).fix_username_with_domain("jdoe"), "jdoe");
        assert_eq!(options_with_domain(Some("  ")).fix_username_with_domain("jdoe"), "jdoe");
    }

    #[test]
    fn non_upn_identity_is_not_rewritten() {
        let options = PasswordChangeOptions {
            id_type_for_user: IdentityType::SamAccountName,
            ..options_with_domain(Some("example.com"))
        };
        assert_eq!(options.fix_username_with_domain("jdoe"), "jdoe");
    }

    #[test]
    fn identity_type_parsing_is_lenient() {
        assert_eq!("UPN".parse::<IdentityType>().unwrap(), IdentityType::UserPrincipalName);
        assert_eq!(" samAccountName ".parse::<IdentityType>().unwrap(), IdentityType::SamAccountName);
        assert_eq!("".parse::<IdentityType>().unwrap(), IdentityType::UserPrincipalName);
        assert_eq!(
            "employeeID".parse::<IdentityType>().unwrap(),
            IdentityType::Custom("employeeID".to_string())
        );
        assert!("bad)(attr".parse::<IdentityType>().is_err());
    }

    #[test]
    fn partial_settings_file_uses_defaults() {
        let settings = SettingsFile::parse(
            r#"{
                "appSettings": { "ldapHostnames": ["dc1.example.com"], "idTypeForUser": "sam" },
                "clientSettings": {
                    "minimumScore": 3,
                    "useEmail": true,
                    "changePasswordTitle": "Cambiar contraseña",
                    "validationRegex": { "usernameRegex": "^[a-z]+$" },
                    "changePasswordForm": { "usernameLabel": "Usuario" },
                    "errorsPasswordForm": { "passwordMatch": "No coinciden" },
                    "alerts": { "errorPwnedPassword": "Contraseña filtrada" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.app_settings.ldap_hostnames, vec!["dc1.example.com"]);
        assert_eq!(settings.app_settings.ldap_port, 636);
        assert_eq!(settings.app_settings.id_type_for_user, IdentityType::SamAccountName);
        assert_eq!(settings.client_settings.minimum_score, 3);
        assert_eq!(settings.client_settings.password_entropy, 16);

        let client = &settings.client_settings;
        assert!(client.use_email);
        assert_eq!(client.change_password_title, "Cambiar contraseña");
        assert_eq!(client.validation_regex.username_regex, "^[a-z]+$");
        assert_eq!(client.validation_regex.email_regex, ValidationRegex::default().email_regex);
        assert_eq!(client.change_password_form.username_label, "Usuario");
        assert_eq!(client.change_password_form.current_password_label, "Current Password");
        assert_eq!(client.errors_password_form.password_match, "No coinciden");
        assert_eq!(client.errors_password_form.field_required, "This field is required.");
        assert_eq!(client.alerts.error_pwned_password, "Contraseña filtrada");
        assert_eq!(
            client.alerts.for_code(ApiErrorCode::PwnedPassword),
            Some("Contraseña filtrada")
        );
    }

    #[test]
    fn alerts_cover_every_reported_code() {
        let alerts = Alerts::default();
        assert_eq!(alerts.for_code(ApiErrorCode::Generic), None);
        for code in ApiErrorCode::ALL.into_iter().skip(1) {
            let message = alerts.for_code(code).unwrap();
            assert_eq!(message, code.default_message(), "{code:?}");
        }
    }

    #[test]
    fn client_settings_serialize_in_camel_case() {
        let json = serde_json::to_value(ClientSettings::default()).unwrap();
        assert_eq!(json["useEmail"], false);
        assert_eq!(json["changePasswordTitle"], "Change Account Password");
        assert_eq!(json["validationRegex"]["usernameRegex"], "^[a-zA-Z0-9._-]{3,20}$");
        assert_eq!(json["changePasswordForm"]["changePasswordButtonLabel"], "Change Password");
        assert_eq!(json["errorsPasswordForm"]["usernameEmailPattern"], "Please enter a valid email address.");
        assert_eq!(json["alerts"]["errorFieldMismatch"], "The passwords do not match.");
        assert!(json["alerts"]["successAlertTitle"].is_string());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let options = PasswordChangeOptions {
            ldap_password: "hunter2".to_string(),
            ..PasswordChangeOptions::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!format!("{options:?}").contains("hunter2"));

        let client = ClientSettings {
            recaptcha: Some(RecaptchaSettings {
                private_key: "secret-key".to_string(),
                ..RecaptchaSettings::default()
            }),
            ..ClientSettings::default()
        };
        assert!(!serde_json::to_string(&client).unwrap().contains("secret-key"));
    }
}
