//! TLS wrapping for memcached connections.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use super::Io;
use crate::config::TlsConfig;

/// Client side TLS settings shared by every connection.
#[derive(Clone)]
pub struct Tls {
    connector: TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl Tls {
    /// Builds the connector from PEM files. Without a CA file the bundled
    /// webpki roots are trusted.
    pub fn from_config(cfg: &TlsConfig) -> Result<Self> {
        let roots = match &cfg.ca_file {
            Some(path) => {
                let mut roots = RootCertStore::empty();
                let (added, _) = roots.add_parsable_certificates(load_certs(path)?);
                if added == 0 {
                    bail!("no usable CA certificates in {}", path.display());
                }
                roots
            }
            None => RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        };

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .context("selecting TLS protocol versions")?
            .with_root_certificates(roots);

        let config = match (&cfg.cert_file, &cfg.key_file) {
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(load_certs(cert)?, load_private_key(key)?)
                .context("loading TLS client certificate")?,
            (None, None) => builder.with_no_client_auth(),
            _ => bail!("tls cert_file and key_file must be set together"),
        };

        let server_name = cfg
            .server_name
            .as_deref()
            .map(|name| ServerName::try_from(name.to_string()))
            .transpose()
            .context("invalid tls server_name")?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }

    /// Runs the client handshake over an open stream.
    pub(super) async fn wrap(
        &self,
        address: &str,
        stream: Box<dyn Io>,
    ) -> io::Result<Box<dyn Io>> {
        let name = match &self.server_name {
            Some(name) => name.clone(),
            None => server_name_for(address)?,
        };

        let stream = self.connector.connect(name, stream).await?;
        Ok(Box::new(stream))
    }
}

/// Server name to verify when none is configured: the host part of a TCP
/// address.
fn server_name_for(address: &str) -> io::Result<ServerName<'static>> {
    if address.starts_with('/') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "tls server_name is required for unix sockets",
        ));
    }

    let host = host_of(address);
    ServerName::try_from(host.to_string()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid server name {host:?}: {e}"),
        )
    })
}

fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("reading certificates from {}", path.display()))?;

    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("reading private key from {}", path.display()))?
        .ok_or_else(|| anyhow!("no private key found in {}", path.display()))
}
