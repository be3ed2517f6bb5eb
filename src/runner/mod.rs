use crate::config::{BrowserConfig, Config};
use crate::driver::EokaDriver;
use crate::flows::{self, RunReport};
use crate::probe::LinkProbe;
use crate::stabilizer::Stabilizer;
use crate::Result;
use eoka::Browser;
use tracing::{debug, info, warn};

/// Owns the browser session and runs the flows against it.
pub struct Runner {
    browser: Browser,
    stabilizer: Stabilizer<EokaDriver>,
    probe: LinkProbe,
}

impl Runner {
    /// Launch the browser and bind a stabilizer to a fresh page.
    pub async fn new(config: &Config) -> Result<Self> {
        let stealth = stealth_config(&config.browser);

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.browser.headless, config.browser.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;
        let probe = LinkProbe::new(&config.probe)?;

        Ok(Self {
            browser,
            stabilizer: Stabilizer::new(EokaDriver::new(page), config),
            probe,
        })
    }

    /// Get a reference to the stabilizer.
    pub fn stabilizer(&self) -> &Stabilizer<EokaDriver> {
        &self.stabilizer
    }

    /// Run every flow in order. Never fails as a whole; failures are in the report.
    pub async fn run(&self, config: &Config) -> RunReport {
        info!("Running: {}", config.name);
        let report = flows::run_all(&self.stabilizer, config, &self.probe).await;
        if !report.success() {
            self.handle_failure(config).await;
        }
        report
    }

    async fn handle_failure(&self, config: &Config) {
        let Some(path) = config
            .on_failure
            .as_ref()
            .and_then(|f| f.screenshot.as_ref())
        else {
            return;
        };
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let path = path.replace("{timestamp}", &timestamp);
        info!("Saving failure screenshot to: {}", path);
        match self.stabilizer.driver().page().screenshot().await {
            Ok(data) => {
                if let Err(e) = std::fs::write(&path, data) {
                    warn!("Failed to save screenshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to capture screenshot: {}", e),
        }
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

fn stealth_config(config: &BrowserConfig) -> eoka::StealthConfig {
    eoka::StealthConfig {
        headless: config.headless,
        proxy: config.proxy.clone(),
        user_agent: config.user_agent.clone(),
        viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
        viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
        ..Default::default()
    }
}
