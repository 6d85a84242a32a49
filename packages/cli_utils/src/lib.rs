#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the health map binaries.
//!
//! [`IndicatifProgress`] renders [`ProgressCallback`] updates as `indicatif`
//! bars; [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge` so log lines print above the bars.

use std::sync::Arc;
use std::time::Duration;

use health_map_ingest_models::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const ROWS_TEMPLATE: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} rows ({per_sec}) [{eta}]";
const STEPS_TEMPLATE: &str = "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// A [`ProgressCallback`] drawn as an `indicatif` bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when `set_total()` is called.
    sized: ProgressStyle,
}

impl IndicatifProgress {
    fn attach(
        multi: &MultiProgress,
        bar: ProgressBar,
        message: &str,
        sized: ProgressStyle,
    ) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(bar);
        bar.set_message(message.to_string());
        Arc::new(Self { bar, sized })
    }

    /// Bar for resolving the rows of an upload. Spins until the row count
    /// is known.
    #[must_use]
    pub fn rows_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self::attach(multi, bar, message, bar_style(ROWS_TEMPLATE))
    }

    /// Bar with a known number of steps.
    #[must_use]
    pub fn steps_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        let style = bar_style(STEPS_TEMPLATE);
        let bar = ProgressBar::new(total).with_style(style.clone());
        Self::attach(multi, bar, message, style)
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.sized.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

/// Installs the global logger and returns the [`MultiProgress`] every bar
/// must be added to.
///
/// `default_filter` applies when `RUST_LOG` is unset; `RUST_LOG` directives
/// are layered on top of it.
#[must_use]
pub fn init_logger(default_filter: &str) -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(default_filter)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Fails only if a logger is already installed.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
