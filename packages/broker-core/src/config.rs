// ABOUTME: Broker-wide configuration loaded once from the environment at startup
// ABOUTME: follows the teacher's env::var(...).ok().and_then(...).unwrap_or(default) idiom

use std::time::Duration;

/// Resolved configuration for the whole broker. Loaded once by
/// `broker-server`'s `main` and handed by reference/clone to every
/// component that needs it.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Host-side directory for published files.
    pub results_root: String,
    /// Container image tag cloned for each new sandbox.
    pub base_image: String,
    /// Sandbox idle time before the Reaper tears it down.
    pub inactivity_threshold: Duration,
    /// Published file lifetime before the Reaper prunes it.
    pub file_ttl: Duration,
    /// Reaper tick period.
    pub reaper_interval: Duration,
    /// Wall-clock deadline for a single Container Driver exec.
    pub exec_timeout: Duration,
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Path to the Registry/Identity durable SQLite database.
    pub persist_path: String,
    /// HMAC key used to sign session tokens. Auto-generated at startup if unset.
    pub session_signing_key: String,
    /// Allowed CORS origin for the HTTP API.
    pub cors_origin: String,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            results_root: env_string("BROKER_RESULTS_ROOT", "./results"),
            base_image: env_string("BROKER_BASE_IMAGE", "python:3.11-slim"),
            inactivity_threshold: Duration::from_secs(env_u64(
                "BROKER_INACTIVITY_THRESHOLD_SECS",
                3600,
            )),
            file_ttl: Duration::from_secs(env_u64("BROKER_FILE_TTL_SECS", 3600)),
            reaper_interval: Duration::from_secs(env_u64("BROKER_REAPER_INTERVAL_SECS", 300)),
            exec_timeout: Duration::from_secs(env_u64("BROKER_EXEC_TIMEOUT_SECS", 30)),
            listen_addr: env_string("BROKER_LISTEN_ADDR", "0.0.0.0:8000"),
            persist_path: env_string("BROKER_PERSIST_PATH", "./broker.db"),
            session_signing_key: std::env::var("BROKER_SESSION_SIGNING_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(generate_signing_key),
            cors_origin: env_string("BROKER_CORS_ORIGIN", "*"),
        }
    }

    /// A copy of this config safe to print in logs: the signing key is
    /// redacted.
    pub fn redacted(&self) -> BrokerConfig {
        let mut copy = self.clone();
        copy.session_signing_key = "<redacted>".to_string();
        copy
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn generate_signing_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "BROKER_RESULTS_ROOT",
            "BROKER_INACTIVITY_THRESHOLD_SECS",
            "BROKER_FILE_TTL_SECS",
            "BROKER_REAPER_INTERVAL_SECS",
            "BROKER_EXEC_TIMEOUT_SECS",
            "BROKER_LISTEN_ADDR",
        ] {
            std::env::remove_var(key);
        }
        let config = BrokerConfig::from_env();
        assert_eq!(config.results_root, "./results");
        assert_eq!(config.inactivity_threshold, Duration::from_secs(3600));
        assert_eq!(config.file_ttl, Duration::from_secs(3600));
        assert_eq!(config.reaper_interval, Duration::from_secs(300));
        assert_eq!(config.exec_timeout, Duration::from_secs(30));
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
    }

    #[test]
    fn zero_duration_env_vars_fall_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("BROKER_EXEC_TIMEOUT_SECS", "0");
        let config = BrokerConfig::from_env();
        assert_eq!(config.exec_timeout, Duration::from_secs(30));
        std::env::remove_var("BROKER_EXEC_TIMEOUT_SECS");
    }

    #[test]
    fn redacted_hides_signing_key() {
        let mut config = BrokerConfig::from_env();
        config.session_signing_key = "super-secret".to_string();
        let redacted = config.redacted();
        assert_eq!(redacted.session_signing_key, "<redacted>");
    }

    #[test]
    fn signing_key_is_generated_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("BROKER_SESSION_SIGNING_KEY");
        let config = BrokerConfig::from_env();
        assert_eq!(config.session_signing_key.len(), 64);
    }
}
