//! Runtime configuration, read from flags or the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Plaintext port, kept for debugging
pub const DEFAULT_HTTP_PORT: u16 = 8080;
/// TLS port the API server calls
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
/// OPA data API path of the deployment admission policy
pub const DEFAULT_POLICY_URL: &str =
    "http://localhost:8181/v1/data/admissioncontrol/deployment/policy";
pub const DEFAULT_CERT_FILE: &str = ".certs/tls.crt";
pub const DEFAULT_KEY_FILE: &str = ".certs/tls.key";
/// Grace period for in-flight reviews to complete during shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Admission webhook delegating decisions to Open Policy Agent
#[derive(Parser, Debug, Clone)]
#[command(name = "opa-admission-controller", version, about)]
pub struct Config {
    /// Port of the plaintext listener (debugging only)
    #[arg(long, env = "HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port of the TLS listener
    #[arg(long, env = "HTTPS_PORT", default_value_t = DEFAULT_HTTPS_PORT)]
    pub https_port: u16,

    /// Policy engine endpoint receiving `{"input": <AdmissionReview>}`
    #[arg(long, env = "POLICY_URL", default_value = DEFAULT_POLICY_URL)]
    pub policy_url: String,

    /// Deadline for one policy engine call; unset means wait indefinitely
    #[arg(long, env = "POLICY_TIMEOUT_SECS")]
    pub policy_timeout_secs: Option<u64>,

    /// TLS certificate (PEM); the TLS listener only starts if this file exists
    #[arg(long, env = "TLS_CERT_FILE", default_value = DEFAULT_CERT_FILE)]
    pub cert_file: PathBuf,

    /// TLS private key (PEM)
    #[arg(long, env = "TLS_KEY_FILE", default_value = DEFAULT_KEY_FILE)]
    pub key_file: PathBuf,

    /// Seconds to let in-flight reviews drain on shutdown
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            policy_url: DEFAULT_POLICY_URL.to_string(),
            policy_timeout_secs: None,
            cert_file: PathBuf::from(DEFAULT_CERT_FILE),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl Config {
    pub fn policy_timeout(&self) -> Option<Duration> {
        self.policy_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
