//! Subcommand handlers. Output goes to the supplied writer; failures carry
//! the text printed to stderr.

use crate::opts::SubCommand;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use gd_browser::Browser;
use gd_browser::CertificateCommandError;
use gd_browser::CertificateService;
use gd_core::BrowserError;
use gd_net::BrowserUrl;
use gd_net::HostClientCertResolver;
use gd_net::identity_for_url;
use gd_security::Fingerprint;
use gd_storage::Certificate;
use gd_storage::CertificateId;
use std::io;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Command(#[from] CertificateCommandError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("no certificate with id {0}")]
    UnknownCertificate(CertificateId),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Command(error) => error.user_message(),
            Self::Browser(error) => error.message.clone(),
            other => other.to_string(),
        }
    }
}

pub fn run(browser: &Browser, subcmd: SubCommand, out: &mut dyn Write) -> Result<(), CliError> {
    let service = &browser.certificates;
    match subcmd {
        SubCommand::List(list) => match list.host {
            Some(host) => write_listing(out, &service.certificates_for(&host)),
            None => write_listing(out, &service.all_certificates()),
        },
        SubCommand::Create(create) => {
            let days = create
                .days
                .unwrap_or(service.policy().default_validity_days);
            let certificate = service.create_certificate(&create.host, &create.name, days)?;
            writeln!(out, "created and activated {}", summary_line(&certificate))?;
            Ok(())
        }
        SubCommand::Transient(transient) => {
            let certificate = service.create_transient_certificate(&transient.host)?;
            writeln!(out, "created and activated {}", summary_line(&certificate))?;
            Ok(())
        }
        SubCommand::Activate(activate) => {
            let certificate = service.activate(&activate.id)?;
            writeln!(out, "activated {}", summary_line(&certificate))?;
            Ok(())
        }
        SubCommand::Deactivate(deactivate) => {
            let host = service.deactivate(&deactivate.host)?;
            writeln!(out, "no certificate is active for {host}")?;
            Ok(())
        }
        SubCommand::Delete(delete) => {
            let removed = service.delete(&delete.id)?;
            writeln!(out, "deleted {}", summary_line(&removed))?;
            Ok(())
        }
        SubCommand::Show(show) => {
            let certificate = service
                .certificate(&show.id)
                .ok_or(CliError::UnknownCertificate(show.id))?;
            write_details(out, &certificate)
        }
        SubCommand::Resolve(resolve) => write_resolution(out, service, &resolve.url),
    }
}

/// One header per host; within a host, certificates keep store order.
fn write_listing(out: &mut dyn Write, certificates: &[Certificate]) -> Result<(), CliError> {
    if certificates.is_empty() {
        writeln!(out, "no client certificates")?;
        return Ok(());
    }

    let mut sorted: Vec<&Certificate> = certificates.iter().collect();
    sorted.sort_by(|left, right| left.host.cmp(&right.host));

    let mut current_host: Option<&str> = None;
    for certificate in sorted {
        if current_host != Some(certificate.host.as_str()) {
            writeln!(out, "{}", certificate.host)?;
            current_host = Some(certificate.host.as_str());
        }
        writeln!(out, "{}", listing_line(certificate))?;
    }
    Ok(())
}

fn listing_line(certificate: &Certificate) -> String {
    format!(
        "{} {}  {} [{}]  last used {}  {}",
        if certificate.is_active { '*' } else { ' ' },
        certificate.id,
        certificate.name,
        certificate.kind.as_str(),
        last_used(certificate.last_used_at),
        certificate.fingerprint.one_line(),
    )
}

fn summary_line(certificate: &Certificate) -> String {
    format!(
        "{} `{}` for {}",
        certificate.id, certificate.name, certificate.host
    )
}

fn write_details(out: &mut dyn Write, certificate: &Certificate) -> Result<(), CliError> {
    writeln!(out, "id:        {}", certificate.id)?;
    writeln!(out, "host:      {}", certificate.host)?;
    writeln!(out, "name:      {}", certificate.name)?;
    writeln!(out, "kind:      {}", certificate.kind.as_str())?;
    writeln!(
        out,
        "active:    {}",
        if certificate.is_active { "yes" } else { "no" }
    )?;
    writeln!(out, "created:   {}", timestamp(certificate.created_at))?;
    writeln!(out, "last used: {}", last_used(certificate.last_used_at))?;
    writeln!(out, "fingerprint (SHA-256):")?;
    writeln!(out, "{}", certificate.fingerprint.pretty())?;
    Ok(())
}

fn write_resolution(
    out: &mut dyn Write,
    service: &CertificateService,
    input: &str,
) -> Result<(), CliError> {
    let url = BrowserUrl::parse(input)?;
    if !url.scheme().supports_client_certificates() {
        writeln!(
            out,
            "{} never presents client certificates",
            url.scheme().as_str()
        )?;
        return Ok(());
    }

    let identity = identity_for_url(service, &url)?;
    // Fails when the stored key cannot sign a handshake.
    HostClientCertResolver::from_identity(url.host(), identity.as_ref())?;
    match identity {
        Some(identity) => {
            writeln!(
                out,
                "{} presents `{}`{}",
                url.authority(),
                identity.name,
                if identity.transient { " (transient)" } else { "" }
            )?;
            writeln!(
                out,
                "{}",
                Fingerprint::of_der(&identity.certificate_der).one_line()
            )?;
        }
        None => writeln!(out, "{} connects without a client certificate", url.authority())?,
    }
    Ok(())
}

fn last_used(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".to_owned(), timestamp)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
