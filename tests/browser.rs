//! Integration tests for the eoka-backed driver.
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test browser -- --ignored

use bugtracker_flows::{Config, EokaDriver, Error, Locator, Stabilizer};
use eoka::Browser;

/// Check if Chrome is available
fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

async fn open(html: &str) -> (Browser, Stabilizer<EokaDriver>) {
    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("about:blank")
        .await
        .expect("Failed to create page");
    let stab = Stabilizer::new(EokaDriver::new(page), &Config::default());
    stab.navigate(&format!("data:text/html,{}", html))
        .await
        .expect("Failed to navigate");
    (browser, stab)
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_read_link_inside_iframe() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let (browser, stab) = open(
        r##"<h3>System Logs</h3>
        <iframe class="analytics" srcdoc="<a href='https://example.com/api/analytics'>View Full Analytics</a>"></iframe>"##,
    )
    .await;

    let link = Locator::partial_link_text("View Full Analytics");
    let href = {
        let frame = stab
            .enter_frame(Locator::css("iframe.analytics"))
            .await
            .expect("iframe not found");
        frame
            .read_attribute(&link, "href")
            .await
            .expect("Failed to read href")
    };
    assert_eq!(href.as_deref(), Some("https://example.com/api/analytics"));

    // Not visible from the main document.
    let err = stab.main().wait_present(&link).await.unwrap_err();
    assert!(matches!(err, Error::ElementWaitTimeout { .. }));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_safe_click_after_delayed_reveal() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let (browser, stab) = open(
        r##"<button id="save" style="display: none" onclick="document.getElementById('out').innerText = 'saved'">Save Changes</button>
        <p id="out"></p>
        <script>setTimeout(() => { document.getElementById('save').style.display = 'block'; }, 500);</script>"##,
    )
    .await;

    stab.safe_click(&Locator::xpath("//button[normalize-space()='Save Changes']"))
        .await
        .expect("Failed to click");
    let text = stab
        .main()
        .read_text(&Locator::id("out"))
        .await
        .expect("Failed to read text");
    assert_eq!(text, "saved");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_overlay_intercepts_then_gets_dismissed() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let (browser, stab) = open(
        r##"<button id="go" onclick="document.getElementById('out').innerText = 'clicked'">Go</button>
        <p id="out"></p>
        <div role="dialog" style="position: fixed; inset: 0; background: white">
            <div class="ant-modal-title">An annnoying Modal to hinder you</div>
            <button onclick="this.parentNode.remove()">Close</button>
        </div>"##,
    )
    .await;

    let go = Locator::id("go");
    let err = stab.safe_click(&go).await.unwrap_err();
    assert!(matches!(err, Error::NotInteractable(_)), "{}", err);

    let retried = stab.click_with_overlay_retry(&go, 2).await;
    assert!(retried.is_ok(), "{:?}", retried.outcome);
    assert_eq!(retried.recoveries, 1);
    let text = stab.main().read_text(&Locator::id("out")).await.unwrap();
    assert_eq!(text, "clicked");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_fill_replaces_existing_value() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let (browser, stab) = open(r##"<input id="deadline" value="2024-01-01">"##).await;

    let field = Locator::id("deadline");
    stab.main()
        .fill(&field, "2030-10-10")
        .await
        .expect("Failed to fill");
    let value = stab
        .main()
        .read_attribute(&field, "value")
        .await
        .expect("Failed to read value");
    assert_eq!(value.as_deref(), Some("2030-10-10"));

    browser.close().await.expect("Failed to close browser");
}
