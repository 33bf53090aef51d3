use crate::clock::TimeContext;
use crate::config::Paths;
use std::fmt;

/// Flags that override the sun-based schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub force_day: bool,
    pub force_eod: bool,
}

/// What the filesystem says about today, read once before anything is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileFacts {
    pub aggregate_csv: bool,
    pub archive_image: bool,
    pub string_csv: bool,
    pub index_document: bool,
}

impl FileFacts {
    pub fn probe(paths: &Paths) -> Self {
        Self {
            aggregate_csv: paths.aggregate_csv.exists(),
            archive_image: paths.archive_image.exists(),
            string_csv: paths.string_csv.exists(),
            index_document: paths.index_document.exists(),
        }
    }

    /// First sample of the day: nothing has been recorded for today yet.
    pub fn is_first_run(&self) -> bool {
        !self.aggregate_csv
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    /// Nothing to acquire, persist or draw.
    Skip,
    /// Record a sample. The live chart is only redrawn when today already had samples.
    Sample { render_live: bool },
    /// Draw the day's archival chart and close the day.
    Finalize,
    /// Both overrides given: sample first, then finalize with what was just recorded.
    SampleThenFinalize { render_live: bool },
}

impl RunDecision {
    pub fn samples(&self) -> bool {
        matches!(
            self,
            RunDecision::Sample { .. } | RunDecision::SampleThenFinalize { .. }
        )
    }

    pub fn finalizes(&self) -> bool {
        matches!(
            self,
            RunDecision::Finalize | RunDecision::SampleThenFinalize { .. }
        )
    }

    pub fn render_live(&self) -> bool {
        match self {
            RunDecision::Sample { render_live } | RunDecision::SampleThenFinalize { render_live } => {
                *render_live
            }
            RunDecision::Skip | RunDecision::Finalize => false,
        }
    }
}

/// Chooses this run's path from the clock, the overrides and the files already on disk.
///
/// The sampling and finalize rules are evaluated independently; forcing both selects
/// [`RunDecision::SampleThenFinalize`].
pub fn decide(ctx: &TimeContext, overrides: Overrides, facts: FileFacts) -> RunDecision {
    let daytime = (ctx.is_daylight() && !overrides.force_eod) || overrides.force_day;
    let finalize = (ctx.is_after_sunset()
        && !facts.archive_image
        && facts.aggregate_csv
        && facts.string_csv
        && !overrides.force_day)
        || overrides.force_eod;
    let render_live = !facts.is_first_run();

    match (daytime, finalize) {
        (false, false) => RunDecision::Skip,
        (true, false) => RunDecision::Sample { render_live },
        (false, true) => RunDecision::Finalize,
        (true, true) => RunDecision::SampleThenFinalize { render_live },
    }
}

/// One line of the run's log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    ArchiveImageExists,
    StringCsvMissing,
    AggregateCsvMissing,
    /// A carried transport failure, verbatim.
    Transport(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ArchiveImageExists => write!(f, "Daily chart image already exists"),
            Diagnostic::StringCsvMissing => write!(f, "Daily string CSV file is missing"),
            Diagnostic::AggregateCsvMissing => write!(f, "Daily inverter CSV file is missing"),
            Diagnostic::Transport(status) => write!(f, "{status}"),
        }
    }
}

/// What the run should report, judged against the facts seen before it wrote anything.
///
/// A finished day that was not finalized again by this run is quiet. Otherwise the most
/// significant file inconsistency is reported, followed by every transport failure.
pub fn diagnostics(
    ctx: &TimeContext,
    facts: FileFacts,
    decision: RunDecision,
    transport_failures: &[String],
) -> Vec<Diagnostic> {
    if facts.archive_image && facts.aggregate_csv && facts.string_csv && !decision.finalizes() {
        return Vec::new();
    }

    let mut out = Vec::new();
    if facts.archive_image {
        out.push(Diagnostic::ArchiveImageExists);
    } else if facts.aggregate_csv && !facts.string_csv {
        out.push(Diagnostic::StringCsvMissing);
    } else if !facts.aggregate_csv && ctx.is_after_sunset() && !decision.samples() {
        out.push(Diagnostic::AggregateCsvMissing);
    }
    out.extend(
        transport_failures
            .iter()
            .map(|status| Diagnostic::Transport(status.clone())),
    );
    out
}
