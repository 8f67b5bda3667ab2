//! Client-certificate security primitives: policy, generation and fingerprints.

pub mod fingerprint;
pub mod generator;
pub mod material;

use gd_core::BrowserError;
use gd_core::BrowserResult;

pub use fingerprint::Fingerprint;
pub use generator::CertificateGenerator;
pub use generator::GeneratedCertificate;
pub use generator::GenerationError;
pub use generator::RcgenCertificateGenerator;
pub use material::CertificateMaterial;

/// Bounds applied to every client certificate the browser creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePolicy {
    pub default_validity_days: u32,
    pub transient_validity_days: u32,
    pub max_validity_days: u32,
    pub max_name_len: usize,
}

impl Default for CertificatePolicy {
    fn default() -> Self {
        Self {
            default_validity_days: 365,
            transient_validity_days: 1,
            max_validity_days: 3650,
            max_name_len: 64,
        }
    }
}

impl CertificatePolicy {
    pub fn validate(&self) -> BrowserResult<()> {
        if self.default_validity_days == 0 || self.transient_validity_days == 0 {
            return Err(BrowserError::new(
                "security.invalid_policy",
                "certificate validity must be at least one day",
            ));
        }

        if self.default_validity_days > self.max_validity_days
            || self.transient_validity_days > self.max_validity_days
        {
            return Err(BrowserError::new(
                "security.invalid_policy",
                format!(
                    "default validities must not exceed the {} day maximum",
                    self.max_validity_days
                ),
            ));
        }

        if self.max_name_len == 0 {
            return Err(BrowserError::new(
                "security.invalid_policy",
                "certificate names need a positive length limit",
            ));
        }

        Ok(())
    }

    /// Checks a requested validity period against the policy bounds.
    pub fn check_validity(&self, days: u32) -> BrowserResult<u32> {
        if days == 0 || days > self.max_validity_days {
            return Err(BrowserError::new(
                "security.validity_out_of_range",
                format!(
                    "validity must be between 1 and {} days, got {days}",
                    self.max_validity_days
                ),
            ));
        }

        Ok(days)
    }

    /// Returns the trimmed display name if it is acceptable for a permanent certificate.
    pub fn check_name<'a>(&self, name: &'a str) -> BrowserResult<&'a str> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BrowserError::new(
                "security.name_empty",
                "certificate name must not be empty",
            ));
        }

        if trimmed.chars().count() > self.max_name_len {
            return Err(BrowserError::new(
                "security.name_too_long",
                format!(
                    "certificate name exceeds {} characters",
                    self.max_name_len
                ),
            ));
        }

        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::CertificatePolicy;

    #[test]
    fn default_policy_is_valid() {
        assert!(CertificatePolicy::default().validate().is_ok());
    }

    #[test]
    fn rejects_default_above_maximum() {
        let policy = CertificatePolicy {
            default_validity_days: 4000,
            ..CertificatePolicy::default()
        };
        let result = policy.validate();
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "security.invalid_policy");
        }
    }

    #[test]
    fn validity_bounds_are_inclusive() {
        let policy = CertificatePolicy::default();
        assert_eq!(policy.check_validity(1), Ok(1));
        assert_eq!(policy.check_validity(3650), Ok(3650));
        assert!(policy.check_validity(0).is_err());
        assert!(policy.check_validity(3651).is_err());
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        let policy = CertificatePolicy {
            max_name_len: 4,
            ..CertificatePolicy::default()
        };
        assert_eq!(policy.check_name("  work "), Ok("work"));
        assert!(policy.check_name("   ").is_err());
        assert!(policy.check_name("personal").is_err());
    }
}
