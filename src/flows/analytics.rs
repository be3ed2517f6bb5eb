use super::{missing, FlowProgress, FlowRecord, FlowState};
use crate::config::Config;
use crate::driver::Driver;
use crate::locator::Locator;
use crate::probe::LinkProbe;
use crate::stabilizer::Stabilizer;
use crate::Result;
use tracing::info;

/// Open the system-logs page, read the analytics link out of its iframe,
/// probe it, and return to the board.
pub(super) async fn run<D: Driver>(
    stabilizer: &Stabilizer<D>,
    config: &Config,
    probe: &LinkProbe,
    progress: &mut FlowProgress,
) -> Result<FlowRecord> {
    let target = &config.flows.analytics;

    progress.advance(FlowState::Navigating);
    stabilizer.navigate(&config.page_url(&target.page)).await?;

    progress.advance(FlowState::LocatingTarget);
    stabilizer
        .main()
        .wait_present(&Locator::css(&target.ready_selector))
        .await?;

    let link_url = {
        let frame = stabilizer
            .enter_frame(Locator::css(&target.iframe_selector))
            .await?;
        frame
            .read_attribute(&Locator::partial_link_text(&target.link_text), "href")
            .await?
            .filter(|href| !href.is_empty())
            .ok_or_else(|| missing(&format!("href of '{}'", target.link_text)))?
    };
    info!("analytics link: {}", link_url);

    progress.advance(FlowState::Acting);
    let reachable = probe.probe_url_reachable(&link_url).await;

    progress.advance(FlowState::Navigating);
    stabilizer.navigate(&config.base_url).await?;

    Ok(FlowRecord::AnalyticsLink {
        link_url,
        is_broken: !reachable,
    })
}
