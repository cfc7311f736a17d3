use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::kernel::FoldStats;

/// Bar over node folds. The message tracks rescale and frozen-cell totals so
/// a run drifting toward underflow is visible while it happens.
pub struct FoldProgress {
    bar: Option<ProgressBar>,
    totals: FoldStats,
}

pub fn fold_message(totals: &FoldStats) -> String {
    if totals.frozen_cells > 0 {
        format!(
            "{} rescales, {} frozen cell steps",
            totals.rescales, totals.frozen_cells
        )
    } else {
        format!("{} rescales", totals.rescales)
    }
}

impl FoldProgress {
    pub fn new(nodes: usize, backend: &str, enabled: bool) -> Self {
        let bar = (enabled && nodes > 0).then(|| {
            let style = ProgressStyle::with_template(
                "{prefix:.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} nodes {msg} ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
            let pb = ProgressBar::with_draw_target(
                Some(nodes as u64),
                ProgressDrawTarget::stderr_with_hz(10),
            );
            pb.set_style(style);
            pb.set_prefix(backend.to_string());
            pb
        });
        Self {
            bar,
            totals: FoldStats::default(),
        }
    }

    pub fn totals(&self) -> FoldStats {
        self.totals
    }

    pub fn advance(&mut self, stats: FoldStats) {
        let changed = stats.rescales > 0 || stats.frozen_cells > 0;
        self.totals = self.totals.merge(stats);
        if let Some(pb) = &self.bar {
            if changed {
                pb.set_message(fold_message(&self.totals));
            }
            pb.inc(1);
        }
    }

    pub fn finish(self) {
        if let Some(pb) = self.bar {
            pb.finish_with_message(fold_message(&self.totals));
        }
    }
}

/// Spinner for the unscaled reference pass, which has no per-node hook.
pub fn reference_spinner() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(10));
    pb.set_style(
        ProgressStyle::with_template("reference {spinner} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("propagating without rescaling");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
