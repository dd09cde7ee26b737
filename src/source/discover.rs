//! Auto-discovery of a local inference server.

use tracing::{debug, info};

use super::ModelSource;

/// Host probed when no base URL is configured.
pub const DEFAULT_DISCOVERY_HOST: &str = "127.0.0.1";

/// Candidate ports, in probe order: LM Studio, llama.cpp server, Ollama.
pub const DEFAULT_PORTS: &[u16] = &[1234, 8080, 11434];

/// Probe `ports` on `host` one at a time and return the base URL of the
/// first server that answers a health check.
///
/// Probing is strictly sequential so that port selection is deterministic
/// and the target sees at most one request at a time.
pub async fn discover(source: &dyn ModelSource, host: &str, ports: &[u16]) -> Option<String> {
    for port in ports {
        let base_url = format!("http://{host}:{port}");
        if source.health_check(&base_url).await {
            info!(%base_url, "discovered inference server");
            return Some(base_url);
        }
        debug!(%base_url, "no server on candidate port");
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{HuginnError, Result};

    struct PortProbe {
        reachable: Vec<u16>,
        probed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelSource for PortProbe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn fetch_model_ids(&self, base_url: &str) -> Result<Vec<String>> {
            self.probed.lock().unwrap().push(base_url.to_string());
            let up = self
                .reachable
                .iter()
                .any(|p| base_url.ends_with(&format!(":{p}")));
            if up {
                Ok(vec![])
            } else {
                Err(HuginnError::Connect {
                    url: base_url.to_string(),
                    reason: "connection refused".into(),
                })
            }
        }
    }

    #[tokio::test]
    async fn first_reachable_port_wins_in_order() {
        let probe = PortProbe {
            reachable: vec![8080, 11434],
            probed: Mutex::new(vec![]),
        };

        let found = discover(&probe, "127.0.0.1", DEFAULT_PORTS).await;

        assert_eq!(found.as_deref(), Some("http://127.0.0.1:8080"));
        // 11434 is never probed once 8080 answers
        assert_eq!(
            *probe.probed.lock().unwrap(),
            vec!["http://127.0.0.1:1234", "http://127.0.0.1:8080"]
        );
    }

    #[tokio::test]
    async fn none_when_nothing_answers() {
        let probe = PortProbe {
            reachable: vec![],
            probed: Mutex::new(vec![]),
        };
        assert!(discover(&probe, "localhost", &[1, 2]).await.is_none());
        assert_eq!(probe.probed.lock().unwrap().len(), 2);
    }
}
