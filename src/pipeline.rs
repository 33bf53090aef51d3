use crate::chart::{ChartMode, ChartRenderer, DayChart};
use crate::clock::TimeContext;
use crate::config::{Config, Paths};
use crate::day_cycle::{Diagnostic, FileFacts, Overrides, RunDecision, decide, diagnostics};
use crate::error::{FetchError, PipelineError};
use crate::fronius::Inverter;
use crate::power::{realtime_watts, string_series};
use crate::store::{self, Appended, Published};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// What one run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub decision: RunDecision,
    /// First transport failure, if any.
    pub status: Option<String>,
    /// A new aggregate row reached disk.
    pub appended: bool,
    pub live_rendered: bool,
    /// Outcome of publishing the archival chart, when the run finalized.
    pub archive: Option<Published>,
    pub summary_appended: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// One invocation: decide from the files on disk, then sample and/or finalize.
pub struct Pipeline<'a, I, R> {
    config: &'a Config,
    ctx: &'a TimeContext,
    inverter: &'a I,
    renderer: &'a R,
}

impl<'a, I: Inverter, R: ChartRenderer> Pipeline<'a, I, R> {
    pub fn new(config: &'a Config, ctx: &'a TimeContext, inverter: &'a I, renderer: &'a R) -> Self {
        Self {
            config,
            ctx,
            inverter,
            renderer,
        }
    }

    pub fn run(&self, overrides: Overrides) -> Result<RunReport, PipelineError> {
        let paths = Paths::for_day(self.config, self.ctx.today);
        let facts = FileFacts::probe(&paths);
        let decision = decide(self.ctx, overrides, facts);
        debug!(?facts, ?decision, "run decided");

        let mut report = RunReport {
            decision,
            status: None,
            appended: false,
            live_rendered: false,
            archive: None,
            summary_appended: false,
            diagnostics: Vec::new(),
        };
        let mut failures = Vec::new();

        if decision.samples() {
            self.sample(&paths, decision.render_live(), &mut failures, &mut report)?;
        }
        if decision.finalizes() {
            self.finalize(&paths, facts, &failures, &mut report)?;
        }

        report.status = failures.first().cloned();
        report.diagnostics = diagnostics(self.ctx, facts, decision, &failures);
        for diagnostic in &report.diagnostics {
            warn!("{} {}", self.ctx.now_iso(), diagnostic);
        }
        Ok(report)
    }

    /// Transport failures are recorded and swallowed; anything else ends the run.
    fn fetch(
        &self,
        request: impl FnOnce() -> Result<Value, FetchError>,
        failures: &mut Vec<String>,
    ) -> Result<Option<Value>, PipelineError> {
        match request() {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_transport() => {
                debug!(error = %e, "inverter unavailable");
                failures.push(e.to_string());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn sample(
        &self,
        paths: &Paths,
        render_live: bool,
        failures: &mut Vec<String>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let day = self.ctx.day();
        let power = self.fetch(|| self.inverter.realtime_power(), failures)?;
        let archive = self.fetch(|| self.inverter.string_archive(&day), failures)?;
        let (Some(power), Some(archive)) = (power, archive) else {
            return Ok(());
        };

        let watts = realtime_watts(&power)?;
        let series = string_series(
            &archive,
            self.ctx.today,
            self.ctx.tz(),
            self.config.archive_warmup_samples,
        )?;

        match store::append_sample(&paths.aggregate_csv, &self.ctx.now, &watts)? {
            Appended::Written => report.appended = true,
            Appended::DuplicateMinute => info!("sample for this minute already recorded"),
        }
        store::overwrite_string_series(&paths.string_csv, &series)?;
        debug!(%watts, string_samples = series.len(), "sample stored");

        if render_live {
            let chart = self.day_chart(paths, ChartMode::Live { watts }, failures)?;
            store::publish(&paths.live_image, |tmp| self.render(&chart, tmp))?;
            report.live_rendered = true;
        }
        Ok(())
    }

    fn finalize(
        &self,
        paths: &Paths,
        facts: FileFacts,
        failures: &[String],
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let chart = self.day_chart(paths, ChartMode::DailySummary, failures)?;
        store::publish(&paths.live_image, |tmp| self.render(&chart, tmp))?;
        report.live_rendered = true;

        let published = store::publish_once(&paths.archive_image, |tmp| self.render(&chart, tmp))?;
        report.archive = Some(published);
        if published == Published::AlreadyExists {
            info!(path = %paths.archive_image.display(), "archival chart kept, day already closed");
            return Ok(());
        }

        // The archive may not outlive a failed close.
        if let Err(e) = self.close_day(paths, facts, &chart) {
            warn!(
                path = %paths.archive_image.display(),
                error = %e,
                "closing the day failed, withdrawing archival chart"
            );
            store::withdraw(&paths.archive_image)?;
            return Err(e);
        }
        report.summary_appended = true;
        info!(
            kwh = %chart.summary.kwh,
            peak_watts = %chart.summary.peak_watts,
            "day finalized"
        );
        Ok(())
    }

    /// History entry first: re-adding it is a no-op, so a retry after a failed summary
    /// append leaves a single entry.
    fn close_day(
        &self,
        paths: &Paths,
        facts: FileFacts,
        chart: &DayChart,
    ) -> Result<(), PipelineError> {
        if !facts.index_document {
            info!(path = %paths.index_document.display(), "starting history page");
        }
        store::update_index(
            &paths.index_document,
            &store::index_entry(&paths.archive_image_url, &self.ctx.day()),
        )?;
        store::append_summary(&paths.summary_csv, &self.ctx.now, &chart.summary)?;
        Ok(())
    }

    fn day_chart(
        &self,
        paths: &Paths,
        mode: ChartMode,
        failures: &[String],
    ) -> Result<DayChart, PipelineError> {
        let aggregate = store::read_samples(&paths.aggregate_csv, self.ctx.tz())?;
        let strings = store::read_string_series(&paths.string_csv, self.ctx.tz())?;
        Ok(DayChart::new(
            self.config,
            self.ctx,
            aggregate,
            strings,
            mode,
            self.config.test_mode,
            failures.first().cloned(),
        ))
    }

    fn render(&self, chart: &DayChart, path: &Path) -> Result<(), PipelineError> {
        Ok(self.renderer.render(chart, path)?)
    }
}
