//! Who is calling, and where the call goes

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Access/verify code pair used for the credential handshake
///
/// Both codes are secret material. `Debug` output is redacted and the type does
/// not implement `Serialize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CredentialRepr")]
pub struct Credential {
    access_code: SecretString,
    verify_code: SecretString,
}

impl Credential {
    pub fn new(access_code: impl Into<String>, verify_code: impl Into<String>) -> Self {
        Self {
            access_code: SecretString::new(access_code.into().into_boxed_str()),
            verify_code: SecretString::new(verify_code.into().into_boxed_str()),
        }
    }

    pub fn access_code(&self) -> &SecretString {
        &self.access_code
    }

    pub fn verify_code(&self) -> &SecretString {
        &self.verify_code
    }

    /// Both codes are present and non-blank
    pub fn is_complete(&self) -> bool {
        !self.access_code.expose_secret().trim().is_empty()
            && !self.verify_code.expose_secret().trim().is_empty()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRepr {
    #[serde(default)]
    access_code: String,
    #[serde(default)]
    verify_code: String,
}

impl From<CredentialRepr> for Credential {
    fn from(repr: CredentialRepr) -> Self {
        Credential::new(repr.access_code, repr.verify_code)
    }
}

/// Network location and logical identity of one target
///
/// `target_id` is the logical name results are correlated by. One host may serve
/// several logical targets, so it is distinct from `host`/`port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub target_id: String,
    pub host: String,
    pub port: u16,
    pub division_id: String,
}

impl TargetDescriptor {
    pub fn new(
        target_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        division_id: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            host: host.into(),
            port,
            division_id: division_id.into(),
        }
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("ACCESS1234", "VERIFY5678");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("ACCESS1234"));
        assert!(!debug.contains("VERIFY5678"));
    }

    #[test]
    fn test_credential_completeness() {
        assert!(Credential::new("ac", "vc").is_complete());
        assert!(!Credential::new("", "vc").is_complete());
        assert!(!Credential::new("ac", "   ").is_complete());
    }

    #[test]
    fn test_credential_from_json() {
        let credential: Credential =
            serde_json::from_str(r#"{"accessCode":"ac","verifyCode":"vc"}"#).unwrap();
        assert_eq!(credential.access_code().expose_secret(), "ac");
        assert_eq!(credential.verify_code().expose_secret(), "vc");
    }

    #[test]
    fn test_target_address() {
        let target = TargetDescriptor::new("500", "vista.example.org", 18500, "605");
        assert_eq!(target.address(), "vista.example.org:18500");
    }
}
