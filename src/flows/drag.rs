use super::{column_heading, drop_zone, ticket_card, FlowProgress, FlowRecord, FlowState};
use crate::config::DragFlowConfig;
use crate::driver::Driver;
use crate::stabilizer::Stabilizer;
use crate::Result;

/// Drag a ticket card onto another column's drop zone and capture the toast.
pub(super) async fn run<D: Driver>(
    stabilizer: &Stabilizer<D>,
    target: &DragFlowConfig,
    progress: &mut FlowProgress,
) -> Result<FlowRecord> {
    let board = stabilizer.main();
    let card = ticket_card(&target.ticket);
    let zone = drop_zone(&target.target_column);

    progress.advance(FlowState::LocatingTarget);
    board.wait_present(&column_heading(&target.source_column)).await?;
    board.wait_visible(&card).await?;
    board.wait_visible(&zone).await?;

    progress.advance(FlowState::Acting);
    stabilizer.dismiss_interfering_overlay().await?;
    let before = stabilizer.notifications().await?;
    board.drag(&card, &zone).await?;

    progress.advance(FlowState::AwaitingConfirmation);
    let alert_message = stabilizer.wait_for_notification(&before).await?;
    Ok(FlowRecord::Alert { alert_message })
}
