//! Best-effort reachability check for a URL.

use crate::config::ProbeConfig;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Single-GET HTTP client.
#[derive(Debug, Clone)]
pub struct LinkProbe {
    client: reqwest::Client,
}

impl LinkProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client })
    }

    /// Issue one GET and return the status code. Redirects are followed.
    pub async fn status(&self, url: &str) -> Result<u16> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(Error::Transport)?;
        Ok(response.status().as_u16())
    }

    /// `true` when any response came back, whatever its status; `false` only
    /// when the round trip failed at the network layer.
    ///
    /// A 404 therefore counts as reachable. The check answers "is anything
    /// listening at this URL", not "does the link work".
    pub async fn probe_url_reachable(&self, url: &str) -> bool {
        match self.status(url).await {
            Ok(status) => {
                info!("probe {}: HTTP {}", url, status);
                true
            }
            Err(e) => {
                warn!("probe {} unreachable ({}): {}", url, e.kind(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_default_config() {
        assert!(LinkProbe::new(&ProbeConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_url_is_unreachable() {
        let probe = LinkProbe::new(&ProbeConfig::default()).unwrap();
        assert!(!probe.probe_url_reachable("not a url").await);
        assert!(matches!(
            probe.status("not a url").await,
            Err(Error::Transport(_))
        ));
    }
}
