use super::{
    button_text, edit_button, form_field, select_option, ticket_card, FlowProgress, FlowRecord,
    FlowState,
};
use crate::config::EditFlowConfig;
use crate::driver::Driver;
use crate::locator::Locator;
use crate::stabilizer::Stabilizer;
use crate::Result;

const DEADLINE_FIELD_ID: &str = "deadline";
const SAVE_LABEL: &str = "Save Changes";

/// Open a ticket's editor, change status, assignee and deadline, save, and
/// capture the confirmation toast.
pub(super) async fn run<D: Driver>(
    stabilizer: &Stabilizer<D>,
    target: &EditFlowConfig,
    progress: &mut FlowProgress,
) -> Result<FlowRecord> {
    let board = stabilizer.main();
    let card = ticket_card(&target.ticket);
    let attempts = stabilizer.click_attempts();

    progress.advance(FlowState::LocatingTarget);
    board.wait_visible(&card).await?;

    progress.advance(FlowState::Acting);
    stabilizer.dismiss_interfering_overlay().await?;
    // The edit control only renders while the card is hovered.
    board.hover(&card).await?;
    board.safe_click(&edit_button(&target.ticket)).await?;

    for (label, value) in [("Status", &target.status), ("Assignee", &target.assignee)] {
        let picked = board
            .click_sequence_with_overlay_retry(&[form_field(label), select_option(value)], attempts)
            .await;
        progress.settle(picked)?;
    }

    board
        .fill(&Locator::id(DEADLINE_FIELD_ID), &target.deadline)
        .await?;
    let before = stabilizer.notifications().await?;
    board.safe_click(&button_text(SAVE_LABEL)).await?;

    progress.advance(FlowState::AwaitingConfirmation);
    let alert_message = stabilizer.wait_for_notification(&before).await?;
    Ok(FlowRecord::Alert { alert_message })
}
