//! The three scripted board flows and the fixed-order runner.
//!
//! Flows run strictly in [`FlowKind::ALL`] order against one session. Later
//! flows assume the board state the earlier ones leave behind, so the first
//! failure ends the run and every remaining flow is reported as skipped.

mod analytics;
mod drag;
mod edit;

use crate::config::Config;
use crate::driver::Driver;
use crate::locator::{xpath_literal, Locator};
use crate::probe::LinkProbe;
use crate::stabilizer::{Retried, Stabilizer};
use crate::Error;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a flow is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    NotStarted,
    Navigating,
    LocatingTarget,
    Acting,
    AwaitingConfirmation,
    /// An overlay dismissal ran between two attempts.
    Recovering,
    Done,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done | FlowState::Failed)
    }
}

/// State machine of one flow, with the path it took.
#[derive(Debug, Clone)]
pub struct FlowProgress {
    flow: FlowKind,
    state: FlowState,
    history: Vec<FlowState>,
    recoveries: u32,
    exhausted_attempts: Option<u32>,
}

impl FlowProgress {
    pub fn new(flow: FlowKind) -> Self {
        Self {
            flow,
            state: FlowState::NotStarted,
            history: vec![FlowState::NotStarted],
            recoveries: 0,
            exhausted_attempts: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Attempts used up by the retry that failed, if one did.
    pub fn exhausted_attempts(&self) -> Option<u32> {
        self.exhausted_attempts
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    /// Move to `next`. Terminal states are final; later transitions are ignored.
    pub fn advance(&mut self, next: FlowState) {
        if self.state.is_terminal() {
            warn!(
                "{}: ignoring transition {:?} -> {:?}",
                self.flow, self.state, next
            );
            return;
        }
        debug!("{}: {:?} -> {:?}", self.flow, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Record `count` recovery steps taken from the current state. Each one is
    /// a detour through `Recovering` and back.
    pub fn note_recoveries(&mut self, count: u32) {
        if count == 0 || self.state.is_terminal() {
            return;
        }
        let resume = self.state;
        for _ in 0..count {
            self.history.push(FlowState::Recovering);
            self.history.push(resume);
        }
        self.recoveries += count;
        info!("{}: recovered {} time(s) while {:?}", self.flow, count, resume);
    }

    /// Record what a retried step cost, whether or not it succeeded, and hand
    /// back its result.
    pub fn settle<T>(&mut self, retried: Retried<T>) -> crate::Result<T> {
        self.note_recoveries(retried.recoveries);
        if retried.outcome.is_err() {
            self.exhausted_attempts = Some(retried.attempts);
        }
        retried.outcome
    }

    pub fn finish(&mut self) {
        self.advance(FlowState::Done);
    }

    pub fn fail(&mut self) {
        self.advance(FlowState::Failed);
    }
}

/// The scripted flows, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Analytics,
    DragToDone,
    EditTicket,
}

impl FlowKind {
    pub const ALL: [FlowKind; 3] = [FlowKind::Analytics, FlowKind::DragToDone, FlowKind::EditTicket];

    /// Heading the result is printed under.
    pub fn label(&self) -> &'static str {
        match self {
            FlowKind::Analytics => "Analytics Link Result",
            FlowKind::DragToDone => "Drag and Drop Result",
            FlowKind::EditTicket => "Edit Ticket Result",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::Analytics => "analytics",
            FlowKind::DragToDone => "drag_to_done",
            FlowKind::EditTicket => "edit_ticket",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful flow produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlowRecord {
    AnalyticsLink { link_url: String, is_broken: bool },
    Alert { alert_message: String },
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Result of one flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    pub flow: FlowKind,
    /// `Done` or `Failed`.
    pub state: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FlowRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Attempts used up when the failure came out of a retried step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhausted_attempts: Option<u32>,
    pub recoveries: u32,
    pub duration_ms: u64,
    pub history: Vec<FlowState>,
}

impl FlowOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == FlowState::Done
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FlowOutcome>,
    /// Flows not attempted because an earlier step failed.
    pub skipped: Vec<FlowKind>,
    /// Failure before any flow started (initial navigation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Every flow ran and finished.
    pub fn success(&self) -> bool {
        self.error.is_none()
            && self.skipped.is_empty()
            && self.outcomes.len() == FlowKind::ALL.len()
            && self.outcomes.iter().all(FlowOutcome::succeeded)
    }

    pub fn outcome(&self, flow: FlowKind) -> Option<&FlowOutcome> {
        self.outcomes.iter().find(|o| o.flow == flow)
    }

    /// First failure message, for summaries.
    pub fn first_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.outcomes.iter().find_map(|o| o.error.as_deref()))
    }
}

/// Load the board, then run every flow in order, stopping at the first failure.
pub async fn run_all<D: Driver>(
    stabilizer: &Stabilizer<D>,
    config: &Config,
    probe: &LinkProbe,
) -> RunReport {
    let start = Instant::now();
    let mut report = RunReport::default();

    if let Err(e) = stabilizer.navigate(&config.base_url).await {
        error!("initial navigation to {} failed: {}", config.base_url, e);
        report.error = Some(e.to_string());
        report.skipped = FlowKind::ALL.to_vec();
        report.duration_ms = start.elapsed().as_millis() as u64;
        return report;
    }

    for (i, flow) in FlowKind::ALL.iter().copied().enumerate() {
        let outcome = run_flow(stabilizer, config, probe, flow).await;
        let failed = !outcome.succeeded();
        report.outcomes.push(outcome);
        if failed {
            report.skipped = FlowKind::ALL[i + 1..].to_vec();
            if !report.skipped.is_empty() {
                warn!("skipping {:?} after {} failed", report.skipped, flow);
            }
            break;
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    report
}

/// Run a single flow against the page as it currently is.
pub async fn run_flow<D: Driver>(
    stabilizer: &Stabilizer<D>,
    config: &Config,
    probe: &LinkProbe,
    flow: FlowKind,
) -> FlowOutcome {
    info!("flow {} starting", flow);
    let start = Instant::now();
    let mut progress = FlowProgress::new(flow);

    let result = match flow {
        FlowKind::Analytics => {
            analytics::run(stabilizer, config, probe, &mut progress).await
        }
        FlowKind::DragToDone => drag::run(stabilizer, &config.flows.drag, &mut progress).await,
        FlowKind::EditTicket => edit::run(stabilizer, &config.flows.edit, &mut progress).await,
    };

    let (record, error, error_kind) = match result {
        Ok(record) => {
            progress.finish();
            info!("flow {} done: {}", flow, record);
            (Some(record), None, None)
        }
        Err(e) => {
            let at = progress.state();
            progress.fail();
            let message = match progress.exhausted_attempts() {
                Some(n) => format!("{} (gave up after {} attempts)", e, n),
                None => e.to_string(),
            };
            error!("flow {} failed while {:?}: {}", flow, at, message);
            (None, Some(message), Some(e.kind()))
        }
    };

    FlowOutcome {
        flow,
        state: progress.state(),
        record,
        error,
        error_kind,
        exhausted_attempts: progress.exhausted_attempts(),
        recoveries: progress.recoveries(),
        duration_ms: start.elapsed().as_millis() as u64,
        history: progress.history().to_vec(),
    }
}

fn missing(what: &str) -> Error {
    Error::ActionFailed(format!("{} not found", what))
}

// Board locators.

pub fn column_heading(column: &str) -> Locator {
    Locator::xpath(format!("//h4[text()={}]", xpath_literal(column)))
}

pub fn ticket_card(ticket: &str) -> Locator {
    Locator::xpath(format!(
        "//div[@data-testid={}]",
        xpath_literal(&format!("ticket-{}", ticket))
    ))
}

pub fn drop_zone(column: &str) -> Locator {
    Locator::xpath(format!(
        "//div[@data-testid={}]",
        xpath_literal(&format!("drop-zone-{}", column))
    ))
}

pub fn edit_button(ticket: &str) -> Locator {
    Locator::xpath(format!(
        "//div[@data-testid={}]//span[@aria-label='edit']",
        xpath_literal(&format!("ticket-{}", ticket))
    ))
}

/// The control next to a labelled form item.
pub fn form_field(label: &str) -> Locator {
    Locator::xpath(format!(
        "//div[./label[@title={}]]/following-sibling::div",
        xpath_literal(label)
    ))
}

/// An open dropdown's option.
pub fn select_option(title: &str) -> Locator {
    Locator::xpath(format!(
        "//div[contains(@class,'ant-select-item') and @title={}]",
        xpath_literal(title)
    ))
}

pub fn button_text(text: &str) -> Locator {
    Locator::xpath(format!(
        "//span[normalize-space()={}]",
        xpath_literal(text)
    ))
}
