use std::{
    fs::File,
    io::BufReader,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use axum_server::{Handle, tls_rustls::RustlsConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use conform_common::error::{ConformError, Result};

use crate::registry::{Collector, MetricsRegistry};

/// Path the scraper fetches.
pub const METRICS_PATH: &str = "/metrics";
/// Port the scrape listener binds.
pub const METRICS_PORT: u16 = 8585;
/// Serving keypair mounted into the pod by the certificate provisioner.
pub const DEFAULT_TLS_CERT_PATH: &str = "/var/run/secrets/serving-cert/tls.crt";
pub const DEFAULT_TLS_KEY_PATH: &str = "/var/run/secrets/serving-cert/tls.key";

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Listen address and serving keypair location for the scrape endpoint.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub listen: SocketAddr,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl ServeConfig {
    pub fn new(
        listen: SocketAddr,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            listen,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, METRICS_PORT)),
            cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
        }
    }
}

/// Seam between the reporter and the collector registry plus its HTTPS
/// listener. Production uses [`RegistryBackend`]; tests substitute an
/// isolated registry instead of touching shared state.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Register one instrument. Registering the same instrument name
    /// twice fails and is never retried.
    fn register(&self, collector: Arc<dyn Collector>) -> Result<()>;

    /// Render all registered instruments for a scrape response.
    fn render(&self) -> String;

    /// Serve the scrape endpoint over HTTPS, blocking until the listener
    /// terminates or the token is cancelled. Not restarted from here;
    /// restart policy belongs to the surrounding lifecycle framework.
    async fn serve(
        &self,
        config: &ServeConfig,
        router: Router,
        shutdown: CancellationToken,
    ) -> Result<()>;
}

/// Default backend: a constructor-injected [`MetricsRegistry`] and an
/// axum-server HTTPS listener with rustls.
pub struct RegistryBackend {
    registry: Arc<MetricsRegistry>,
}

impl RegistryBackend {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MetricsBackend for RegistryBackend {
    fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        self.registry.register(collector)
    }

    fn render(&self) -> String {
        self.registry.render_prometheus()
    }

    async fn serve(
        &self,
        config: &ServeConfig,
        router: Router,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let tls = build_rustls_config(&config.cert_path, &config.key_path)?;

        let handle = Handle::new();
        let server = axum_server::bind_rustls(config.listen, tls)
            .handle(handle.clone())
            .serve(router.into_make_service());
        tokio::pin!(server);

        info!(addr = %config.listen, "metrics listener starting");
        tokio::select! {
            result = &mut server => {
                result.map_err(|err| ConformError::ListenerFailure(err.to_string()))
            }
            _ = shutdown.cancelled() => {
                debug!("metrics listener shutting down");
                handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
                server
                    .await
                    .map_err(|err| ConformError::ListenerFailure(err.to_string()))
            }
        }
    }
}

/// TLS 1.2 or newer, application protocol pinned to HTTP/1.1.
fn build_rustls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig> {
    let certs = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut config = rustls::ServerConfig::builder_with_protocol_versions(&[
        &rustls::version::TLS13,
        &rustls::version::TLS12,
    ])
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|err| ConformError::ListenerFailure(format!("invalid serving keypair: {err}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|err| {
        ConformError::ListenerFailure(format!("read certificate {}: {err}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| {
            ConformError::ListenerFailure(format!("parse certificate {}: {err}", path.display()))
        })?;

    if certs.is_empty() {
        return Err(ConformError::ListenerFailure(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|err| {
        ConformError::ListenerFailure(format!("read private key {}: {err}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|err| {
            ConformError::ListenerFailure(format!("parse private key {}: {err}", path.display()))
        })?
        .ok_or_else(|| {
            ConformError::ListenerFailure(format!("no private key found in {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::MetricsRegistry, sys::scrape_router};

    #[tokio::test]
    async fn serve_stops_on_cancellation() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("keypair");

        let dir = std::env::temp_dir().join(format!("conform-serve-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let cert_path = dir.join("tls.crt");
        let key_path = dir.join("tls.key");
        std::fs::write(&cert_path, cert.pem()).expect("write cert");
        std::fs::write(&key_path, key_pair.serialize_pem()).expect("write key");

        let registry = Arc::new(MetricsRegistry::new());
        let backend = Arc::new(RegistryBackend::new(registry));
        let router = scrape_router(Arc::clone(&backend) as Arc<dyn MetricsBackend>);
        let config = ServeConfig::new("127.0.0.1:0".parse().expect("addr"), &cert_path, &key_path);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        backend
            .serve(&config, router, shutdown)
            .await
            .expect("clean shutdown");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tls_config_fails_on_missing_files() {
        let err = build_rustls_config(
            Path::new("/nonexistent/tls.crt"),
            Path::new("/nonexistent/tls.key"),
        )
        .unwrap_err();
        assert!(matches!(err, ConformError::ListenerFailure(_)));
    }

    #[test]
    fn default_config_uses_fixed_locations() {
        let config = ServeConfig::default();
        assert_eq!(config.listen.port(), METRICS_PORT);
        assert_eq!(config.cert_path, PathBuf::from(DEFAULT_TLS_CERT_PATH));
        assert_eq!(config.key_path, PathBuf::from(DEFAULT_TLS_KEY_PATH));
    }
}
