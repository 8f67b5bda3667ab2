use chrono::DateTime;
use chrono::Utc;
use gd_browser::Browser;
use gd_browser::BrowserConfig;
use gd_browser::CertificateCommand;
use gd_browser::CertificateCommandError;
use gd_browser::CertificateService;
use gd_browser::HostCertificateState;
use gd_net::BrowserUrl;
use gd_net::ClientIdentitySource;
use gd_net::HostClientCertResolver;
use gd_net::identity_for_url;
use gd_security::CertificateGenerator;
use gd_security::CertificatePolicy;
use gd_security::Fingerprint;
use gd_security::GeneratedCertificate;
use gd_security::GenerationError;
use gd_security::RcgenCertificateGenerator;
use gd_storage::Certificate;
use gd_storage::CertificateId;
use gd_storage::CertificateKind;
use gd_storage::CertificateStore;
use gd_storage::InMemoryCertificateStore;
use gd_storage::NewCertificate;
use gd_storage::StorageConfig;
use gd_storage::StoreError;
use proptest::prelude::*;
use rustls::client::ResolvesClientCert;
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Cheap stand-in for key generation; the data is not a real bundle.
struct StubGenerator;

impl CertificateGenerator for StubGenerator {
    fn generate(
        &self,
        validity_days: u32,
        subject_name: &str,
    ) -> Result<GeneratedCertificate, GenerationError> {
        let data = format!("{subject_name}/{validity_days}").into_bytes();
        Ok(GeneratedCertificate {
            fingerprint: Fingerprint::of_der(&data),
            data,
        })
    }
}

struct FailingGenerator;

impl CertificateGenerator for FailingGenerator {
    fn generate(&self, _: u32, _: &str) -> Result<GeneratedCertificate, GenerationError> {
        Err(GenerationError::Crypto("entropy source unavailable".to_owned()))
    }
}

/// Reads pass through; every write is rejected like a full disk would.
struct ReadOnlyStore(InMemoryCertificateStore);

impl CertificateStore for ReadOnlyStore {
    fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        self.0.certificates_for(host)
    }

    fn all_certificates(&self) -> Vec<Certificate> {
        self.0.all_certificates()
    }

    fn get(&self, id: &CertificateId) -> Option<Certificate> {
        self.0.get(id)
    }

    fn active_for(&self, host: &str) -> Option<Certificate> {
        self.0.active_for(host)
    }

    fn add_and_activate(&self, _: NewCertificate) -> Result<Certificate, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }

    fn activate(&self, _: &CertificateId) -> Result<Certificate, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }

    fn deactivate_all_for(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }

    fn delete(&self, _: &CertificateId) -> Result<Certificate, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }

    fn mark_used(&self, _: &CertificateId, _: DateTime<Utc>) -> Result<Certificate, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }

    fn select_active(&self, _: &str, _: DateTime<Utc>) -> Result<Option<Certificate>, StoreError> {
        Err(StoreError::WriteFailed("read-only".to_owned()))
    }
}

/// Answers `active_for` from a snapshot taken before another writer changed the
/// host, the view a second browser window or the CLI leaves behind.
struct StaleLookupStore {
    inner: InMemoryCertificateStore,
    snapshot: Certificate,
}

impl CertificateStore for StaleLookupStore {
    fn certificates_for(&self, host: &str) -> Vec<Certificate> {
        self.inner.certificates_for(host)
    }

    fn all_certificates(&self) -> Vec<Certificate> {
        self.inner.all_certificates()
    }

    fn get(&self, id: &CertificateId) -> Option<Certificate> {
        self.inner.get(id)
    }

    fn active_for(&self, _: &str) -> Option<Certificate> {
        Some(self.snapshot.clone())
    }

    fn add_and_activate(&self, new: NewCertificate) -> Result<Certificate, StoreError> {
        self.inner.add_and_activate(new)
    }

    fn activate(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.inner.activate(id)
    }

    fn deactivate_all_for(&self, host: &str) -> Result<(), StoreError> {
        self.inner.deactivate_all_for(host)
    }

    fn delete(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.inner.delete(id)
    }

    fn mark_used(&self, id: &CertificateId, at: DateTime<Utc>) -> Result<Certificate, StoreError> {
        self.inner.mark_used(id, at)
    }

    fn select_active(&self, host: &str, at: DateTime<Utc>) -> Result<Option<Certificate>, StoreError> {
        self.inner.select_active(host, at)
    }
}

fn service_with(generator: Arc<dyn CertificateGenerator>) -> CertificateService {
    CertificateService::new(
        Arc::new(InMemoryCertificateStore::new()),
        generator,
        CertificatePolicy::default(),
    )
}

fn service() -> CertificateService {
    service_with(Arc::new(StubGenerator))
}

fn create(service: &CertificateService, host: &str, name: &str) -> Certificate {
    match service.create_certificate(host, name, 30) {
        Ok(certificate) => certificate,
        Err(error) => panic!("{error}"),
    }
}

fn active_id(service: &CertificateService, host: &str) -> Option<CertificateId> {
    service.host_state(host).active().map(|certificate| certificate.id)
}

fn temp_storage_root() -> std::path::PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("gemdust-service-{stamp}"))
}

#[test]
fn creating_a_certificate_replaces_the_active_one() {
    let service = service();
    assert_eq!(
        service.host_state("station.example"),
        HostCertificateState::NoActiveCertificate
    );

    let first = create(&service, "station.example", "Work");
    assert_eq!(active_id(&service, "station.example"), Some(first.id));

    let second = create(&service, "station.example", "Home");
    assert_eq!(active_id(&service, "station.example"), Some(second.id));
    let first = service.certificate(&first.id);
    assert_eq!(first.map(|certificate| certificate.is_active), Some(false));
}

#[test]
fn deleting_the_active_certificate_promotes_nothing() {
    let service = service();
    let older = create(&service, "station.example", "Older");
    let newer = create(&service, "station.example", "Newer");

    let removed = service.delete(&newer.id);
    assert_eq!(removed.map(|certificate| certificate.id), Ok(newer.id));
    assert_eq!(
        service.host_state("station.example"),
        HostCertificateState::NoActiveCertificate
    );
    assert!(service.certificate(&older.id).is_some());
}

#[test]
fn deleting_another_certificate_keeps_the_active_one() {
    let service = service();
    let older = create(&service, "station.example", "Older");
    let newer = create(&service, "station.example", "Newer");

    assert!(service.delete(&older.id).is_ok());
    assert_eq!(active_id(&service, "station.example"), Some(newer.id));
}

#[test]
fn deactivation_and_activation_are_idempotent() {
    let service = service();
    let certificate = create(&service, "station.example", "Only");

    assert_eq!(service.deactivate("station.example"), Ok("station.example".to_owned()));
    let before = service.all_certificates();
    assert_eq!(service.deactivate("station.example"), Ok("station.example".to_owned()));
    assert_eq!(service.all_certificates(), before);

    assert!(service.activate(&certificate.id).is_ok());
    assert!(service.activate(&certificate.id).is_ok());
    assert_eq!(active_id(&service, "station.example"), Some(certificate.id));
    assert_eq!(service.certificates_for("station.example").len(), 1);
}

#[test]
fn deactivating_a_host_without_certificates_succeeds() {
    let service = service();
    assert_eq!(service.deactivate("nobody.example"), Ok("nobody.example".to_owned()));
    assert!(service.certificates_for("nobody.example").is_empty());
}

#[test]
fn activation_is_scoped_to_one_host() {
    let service = service();
    let here = create(&service, "here.example", "Here");
    let there = create(&service, "there.example", "There");
    let _ = create(&service, "here.example", "Here again");

    assert!(service.activate(&here.id).is_ok());
    assert!(service.deactivate("here.example").is_ok());
    assert_eq!(active_id(&service, "there.example"), Some(there.id));
}

#[test]
fn hosts_are_normalized_before_scoping() {
    let service = service();
    let certificate = create(&service, "Station.Example.", "Mixed case");
    assert_eq!(certificate.host, "station.example");
    assert_eq!(active_id(&service, "station.example"), Some(certificate.id));
    assert_eq!(
        service.deactivate(" STATION.example. "),
        Ok("station.example".to_owned())
    );
    assert_eq!(active_id(&service, "station.example"), None);
}

#[test]
fn unicode_hosts_share_scope_with_their_punycode_form() {
    let service = service_with(Arc::new(RcgenCertificateGenerator));
    let certificate = create(&service, "Bücher.example", "Reader");
    assert_eq!(certificate.host, "xn--bcher-kva.example");
    assert_eq!(active_id(&service, "xn--bcher-kva.example"), Some(certificate.id));

    let url = match BrowserUrl::parse("gemini://bücher.example/katalog") {
        Ok(url) => url,
        Err(error) => panic!("{error}"),
    };
    let identity = match identity_for_url(&service, &url) {
        Ok(Some(identity)) => identity,
        other => panic!("unexpected identity lookup result: {other:?}"),
    };
    assert_eq!(identity.host, "xn--bcher-kva.example");
    assert_eq!(
        Fingerprint::of_der(&identity.certificate_der),
        certificate.fingerprint
    );
}

#[test]
fn command_on_deleted_certificate_is_not_found() {
    let service = service();
    let certificate = create(&service, "station.example", "Gone");
    assert!(service.delete(&certificate.id).is_ok());

    let error = service.activate(&certificate.id);
    assert_eq!(
        error,
        Err(CertificateCommandError::NotFound {
            command: CertificateCommand::Activate,
            id: certificate.id,
        })
    );
    let error = service.delete(&certificate.id);
    assert!(matches!(
        error,
        Err(CertificateCommandError::NotFound {
            command: CertificateCommand::Delete,
            ..
        })
    ));
}

#[test]
fn generation_failure_stores_nothing() {
    let service = service_with(Arc::new(FailingGenerator));
    let result = service.create_transient_certificate("station.example");

    match result {
        Err(error) => {
            assert!(error.is_blocking());
            assert!(matches!(error, CertificateCommandError::Generation(_)));
        }
        Ok(certificate) => panic!("unexpected certificate {certificate:?}"),
    }
    assert!(service.all_certificates().is_empty());
}

#[test]
fn store_write_failure_leaves_state_unchanged() {
    let inner = InMemoryCertificateStore::new();
    let seeded = inner.add_and_activate(NewCertificate {
        host: "station.example".to_owned(),
        name: "Seeded".to_owned(),
        kind: CertificateKind::Permanent,
        data: b"seeded".to_vec(),
        fingerprint: Fingerprint::of_der(b"seeded"),
    });
    let seeded = match seeded {
        Ok(certificate) => certificate,
        Err(error) => panic!("{error}"),
    };

    let service = CertificateService::new(
        Arc::new(ReadOnlyStore(inner)),
        Arc::new(StubGenerator),
        CertificatePolicy::default(),
    );

    let error = service.create_certificate("station.example", "Blocked", 30);
    match error {
        Err(error) => {
            assert!(!error.is_blocking());
            assert_eq!(
                error.user_message(),
                "Could not create the certificate. Nothing was changed."
            );
        }
        Ok(certificate) => panic!("unexpected certificate {certificate:?}"),
    }
    assert!(service.deactivate("station.example").is_err());
    assert_eq!(
        service.host_state("station.example"),
        HostCertificateState::ActiveCertificate(seeded.clone())
    );

    // Handshake selection still presents the certificate when recording use fails.
    assert_eq!(service.select_for_handshake("station.example"), Some(seeded));
}

#[test]
fn invalid_requests_are_rejected_before_generation() {
    let service = service_with(Arc::new(FailingGenerator));

    for (host, name, days) in [
        ("", "Name", 30),
        ("station.example", "   ", 30),
        ("station.example", "Name", 0),
        ("station.example", "Name", 3651),
    ] {
        let result = service.create_certificate(host, name, days);
        assert!(
            matches!(result, Err(CertificateCommandError::InvalidRequest(_))),
            "{host:?} {name:?} {days}: {result:?}"
        );
    }

    let long_name = "n".repeat(65);
    assert!(matches!(
        service.create_certificate("station.example", &long_name, 30),
        Err(CertificateCommandError::InvalidRequest(_))
    ));
    assert!(matches!(
        service.deactivate(" "),
        Err(CertificateCommandError::InvalidRequest(_))
    ));
}

#[test]
fn names_are_trimmed_before_storing() {
    let service = service();
    let certificate = create(&service, "station.example", "  Padded  ");
    assert_eq!(certificate.name, "Padded");
}

#[test]
fn transient_certificates_are_named_by_uuid() {
    let service = service();
    let certificate = match service.create_transient_certificate("station.example") {
        Ok(certificate) => certificate,
        Err(error) => panic!("{error}"),
    };

    assert_eq!(certificate.kind, CertificateKind::Transient);
    assert!(certificate.is_active);
    assert!(Uuid::parse_str(&certificate.name).is_ok());
    // Transient validity is a single day.
    assert_eq!(certificate.data, format!("{}/1", certificate.name).into_bytes());
}

#[test]
fn handshake_selection_records_last_use() {
    let service = service();
    assert_eq!(service.select_for_handshake("station.example"), None);

    let certificate = create(&service, "station.example", "Used");
    assert_eq!(certificate.last_used_at, None);

    let selected = service.select_for_handshake("station.example");
    let selected = match selected {
        Some(selected) => selected,
        None => panic!("no certificate selected"),
    };
    assert_eq!(selected.id, certificate.id);
    assert!(selected.last_used_at.is_some());
    assert_eq!(
        service.certificate(&certificate.id).and_then(|c| c.last_used_at),
        selected.last_used_at
    );
}

#[test]
fn handshake_never_presents_a_certificate_deactivated_elsewhere() {
    let inner = InMemoryCertificateStore::new();
    let snapshot = match inner.add_and_activate(NewCertificate {
        host: "station.example".to_owned(),
        name: "Shared".to_owned(),
        kind: CertificateKind::Permanent,
        data: b"shared".to_vec(),
        fingerprint: Fingerprint::of_der(b"shared"),
    }) {
        Ok(certificate) => certificate,
        Err(error) => panic!("{error}"),
    };
    assert!(inner.deactivate_all_for("station.example").is_ok());

    let service = CertificateService::new(
        Arc::new(StaleLookupStore { inner, snapshot }),
        Arc::new(StubGenerator),
        CertificatePolicy::default(),
    );

    assert_eq!(service.select_for_handshake("station.example"), None);
    assert_eq!(service.identity_for("station.example"), Ok(None));
    let stored: Vec<_> = service
        .all_certificates()
        .into_iter()
        .map(|certificate| (certificate.is_active, certificate.last_used_at))
        .collect();
    assert_eq!(stored, vec![(false, None)]);
}

#[test]
fn resolver_for_host_presents_the_active_certificate() {
    let service = service_with(Arc::new(RcgenCertificateGenerator));
    let certificate = create(&service, "capsule.example", "Reader");

    let resolver = match HostClientCertResolver::for_host(&service, "capsule.example") {
        Ok(resolver) => resolver,
        Err(error) => panic!("{error}"),
    };
    assert!(resolver.has_certs());
    let presented = resolver
        .resolve(&[], &[])
        .map(|key| Fingerprint::of_der(key.cert[0].as_ref()));
    assert_eq!(presented, Some(certificate.fingerprint));

    let anonymous = HostClientCertResolver::for_host(&service, "elsewhere.example");
    assert!(anonymous.is_ok_and(|resolver| !resolver.has_certs()));
}

#[test]
fn identity_source_presents_generated_material() {
    let service = service_with(Arc::new(RcgenCertificateGenerator));
    let certificate = match service.create_certificate("capsule.example", "Reader", 7) {
        Ok(certificate) => certificate,
        Err(error) => panic!("{error}"),
    };

    let identity = match service.identity_for("capsule.example") {
        Ok(Some(identity)) => identity,
        other => panic!("unexpected identity lookup result: {other:?}"),
    };
    assert_eq!(identity.name, "Reader");
    assert!(!identity.transient);
    assert_eq!(
        Fingerprint::of_der(&identity.certificate_der),
        certificate.fingerprint
    );
    assert!(!identity.private_key_der.is_empty());

    assert_eq!(service.identity_for("elsewhere.example"), Ok(None));
}

#[test]
fn concurrent_commands_keep_a_single_active_certificate() {
    let service = service();
    let seeded: Vec<CertificateId> = (0..6)
        .map(|serial| create(&service, "busy.example", &format!("seed {serial}")).id)
        .collect();

    let handles: Vec<_> = seeded
        .into_iter()
        .map(|id| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let _ = service.activate(&id);
                    let _ = service.create_transient_certificate("busy.example");
                    let _ = service.select_for_handshake("busy.example");
                }
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().is_ok());
    }

    let active = service
        .certificates_for("busy.example")
        .into_iter()
        .filter(|certificate| certificate.is_active)
        .count();
    assert_eq!(active, 1);
    assert_eq!(service.certificates_for("busy.example").len(), 6 + 6 * 10);
}

#[test]
fn persistent_profile_survives_restart() {
    let root = temp_storage_root();
    let config = BrowserConfig {
        storage: StorageConfig::default(),
        storage_root: Some(root.clone()),
        policy: CertificatePolicy::default(),
    };

    let created = {
        let browser = match Browser::with_generator(config.clone(), Arc::new(StubGenerator)) {
            Ok(browser) => browser,
            Err(error) => panic!("{error}"),
        };
        create(&browser.certificates, "station.example", "Durable")
    };

    let reopened = match Browser::with_generator(config, Arc::new(StubGenerator)) {
        Ok(browser) => browser,
        Err(error) => panic!("{error}"),
    };
    assert_eq!(
        reopened.certificates.host_state("station.example"),
        HostCertificateState::ActiveCertificate(created)
    );
    match reopened.boot() {
        Ok(summary) => {
            assert!(summary.persistent);
            assert_eq!(summary.certificates, 1);
            assert_eq!(summary.storage_root.as_deref(), Some(root.as_path()));
        }
        Err(error) => panic!("{error}"),
    }

    let _ = std::fs::remove_dir_all(root);
}

#[derive(Debug, Clone)]
enum Command {
    Create { host: usize },
    Transient { host: usize },
    Activate { pick: usize },
    Deactivate { host: usize },
    Delete { pick: usize },
}

const HOSTS: [&str; 2] = ["left.example", "right.example"];

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (0..HOSTS.len()).prop_map(|host| Command::Create { host }),
        (0..HOSTS.len()).prop_map(|host| Command::Transient { host }),
        any::<usize>().prop_map(|pick| Command::Activate { pick }),
        (0..HOSTS.len()).prop_map(|host| Command::Deactivate { host }),
        any::<usize>().prop_map(|pick| Command::Delete { pick }),
    ]
}

proptest! {
    #[test]
    fn host_state_matches_the_stored_active_flag(
        commands in prop::collection::vec(command_strategy(), 1..48),
    ) {
        let service = service();
        let mut ids: Vec<CertificateId> = Vec::new();

        for command in commands {
            match command {
                Command::Create { host } => {
                    let created = service
                        .create_certificate(HOSTS[host], "Named", 10)
                        .map_err(|error| TestCaseError::fail(error.to_string()))?;
                    prop_assert_eq!(active_id(&service, HOSTS[host]), Some(created.id));
                    ids.push(created.id);
                }
                Command::Transient { host } => {
                    let created = service
                        .create_transient_certificate(HOSTS[host])
                        .map_err(|error| TestCaseError::fail(error.to_string()))?;
                    ids.push(created.id);
                }
                Command::Activate { pick } if !ids.is_empty() => {
                    let id = ids[pick % ids.len()];
                    if let Ok(activated) = service.activate(&id) {
                        prop_assert_eq!(active_id(&service, &activated.host), Some(id));
                    }
                }
                Command::Deactivate { host } => {
                    prop_assert!(service.deactivate(HOSTS[host]).is_ok());
                    prop_assert_eq!(active_id(&service, HOSTS[host]), None);
                }
                Command::Delete { pick } if !ids.is_empty() => {
                    let id = ids[pick % ids.len()];
                    if let Ok(removed) = service.delete(&id) {
                        if removed.is_active {
                            prop_assert_eq!(active_id(&service, &removed.host), None);
                        }
                    }
                }
                Command::Activate { .. } | Command::Delete { .. } => {}
            }

            for host in HOSTS {
                let flagged: Vec<CertificateId> = service
                    .certificates_for(host)
                    .into_iter()
                    .filter(|certificate| certificate.is_active)
                    .map(|certificate| certificate.id)
                    .collect();
                prop_assert!(flagged.len() <= 1);
                prop_assert_eq!(flagged.first().copied(), active_id(&service, host));
            }
        }
    }
}
