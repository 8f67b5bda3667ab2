//! Self-signed client certificate generation.

use crate::fingerprint::Fingerprint;
use crate::material::CertificateMaterial;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::ExtendedKeyUsagePurpose;
use rcgen::KeyPair;
use rcgen::PKCS_ECDSA_P256_SHA256;
use time::Duration;
use time::OffsetDateTime;
use tracing::debug;

/// Failure to produce key material; no certificate exists afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("certificate subject name is empty")]
    EmptySubject,
    #[error("certificate validity must be at least one day")]
    ZeroValidity,
    #[error("validity of {0} days overflows the certificate date range")]
    ValidityOverflow(u32),
    #[error("key generation failed: {0}")]
    Crypto(String),
}

/// Encoded material plus its fingerprint, ready for the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCertificate {
    pub data: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl GeneratedCertificate {
    pub fn from_material(material: &CertificateMaterial) -> Self {
        Self {
            data: material.to_bundle(),
            fingerprint: material.fingerprint(),
        }
    }
}

/// Key/certificate generation primitive consumed by the certificate service.
pub trait CertificateGenerator: Send + Sync {
    fn generate(
        &self,
        validity_days: u32,
        subject_name: &str,
    ) -> Result<GeneratedCertificate, GenerationError>;
}

/// ECDSA P-256 self-signed certificates built with rcgen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcgenCertificateGenerator;

impl RcgenCertificateGenerator {
    pub fn generate_material(
        &self,
        validity_days: u32,
        subject_name: &str,
    ) -> Result<CertificateMaterial, GenerationError> {
        let subject = subject_name.trim();
        if subject.is_empty() {
            return Err(GenerationError::EmptySubject);
        }
        if validity_days == 0 {
            return Err(GenerationError::ZeroValidity);
        }

        let mut params = CertificateParams::new(Vec::<String>::new()).map_err(crypto_error)?;
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, subject);
        params.distinguished_name = distinguished_name;
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now
            .checked_add(Duration::days(i64::from(validity_days)))
            .ok_or(GenerationError::ValidityOverflow(validity_days))?;

        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(crypto_error)?;
        let certificate = params.self_signed(&key_pair).map_err(crypto_error)?;

        Ok(CertificateMaterial {
            certificate_der: certificate.der().to_vec(),
            private_key_der: key_pair.serialize_der(),
        })
    }
}

impl CertificateGenerator for RcgenCertificateGenerator {
    fn generate(
        &self,
        validity_days: u32,
        subject_name: &str,
    ) -> Result<GeneratedCertificate, GenerationError> {
        let material = self.generate_material(validity_days, subject_name)?;
        let generated = GeneratedCertificate::from_material(&material);
        debug!(
            validity_days,
            fingerprint = %generated.fingerprint,
            "generated client certificate"
        );
        Ok(generated)
    }
}

fn crypto_error(error: rcgen::Error) -> GenerationError {
    GenerationError::Crypto(error.to_string())
}
