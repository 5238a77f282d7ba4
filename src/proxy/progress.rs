//! Live progress bar for a running check

use crate::proxy::aggregator::{Aggregator, ProgressSnapshot};
use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How often the progress line is redrawn
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Width of the bar in characters
const BAR_WIDTH: usize = 50;

/// Render one progress line, e.g.
/// `Progress: [=====>    ] 40.0% (2/5) Available: 1`
pub fn render_progress(snapshot: ProgressSnapshot, total: usize) -> String {
    let percent = if total == 0 {
        0.0
    } else {
        (snapshot.processed as f64 / total as f64 * 100.0).min(100.0)
    };
    let filled = ((percent / 100.0) * BAR_WIDTH as f64) as usize;
    let bar = format!("{}>", "=".repeat(filled.min(BAR_WIDTH - 1)));

    format!(
        "Progress: [{:<width$}] {:.1}% ({}/{}) Available: {}",
        bar,
        percent,
        snapshot.processed,
        total,
        snapshot.available,
        width = BAR_WIDTH
    )
}

fn draw(line: &str) {
    let mut stderr = io::stderr();
    if let Err(e) = execute!(
        stderr,
        MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        Print(line)
    ) {
        tracing::debug!(error = %e, "failed to draw progress line");
    }
}

/// Spawn the progress task. It redraws until `shutdown` is cancelled, then
/// draws a final line and ends it with a newline.
pub fn spawn_progress_reporter(
    aggregator: Arc<Aggregator>,
    total: usize,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => draw(&render_progress(aggregator.snapshot(), total)),
            }
        }

        draw(&format!("{}\n", render_progress(aggregator.snapshot(), total)));
    })
}
