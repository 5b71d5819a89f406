//! Debug output on stderr
//!
//! Events are rendered one per line as `launcher:<LEVEL>:<message>`, the same
//! prefix used for failure lines, so test harnesses can pick them apart with
//! a plain prefix match.

use crate::context::LOG_FILTER_VAR;
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Prefix shared by debug lines and the failure line.
pub const LINE_PREFIX: &str = "launcher:";

/// Event formatter producing `launcher:DEBUG:start='./foo'` style lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LauncherFormat;

impl<S, N> FormatEvent<S, N> for LauncherFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{}{}:", LINE_PREFIX, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the stderr subscriber when debug output was requested.
///
/// Filter directives come from `HDIST_LAUNCHER_LOG`, defaulting to `debug`.
pub fn init(enabled: bool) {
    if !enabled {
        return;
    }

    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("debug"));

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .event_format(LauncherFormat)
        .try_init();
}
