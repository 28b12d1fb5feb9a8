//! A `tracing_subscriber::fmt::FormatEvent` that redacts field values before
//! they reach the writer, instead of relying on every call site remembering
//! not to log secret material.

use std::fmt;

use error_common::sanitization::{is_redacted_field, REDACTED_PLACEHOLDER};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::redactor::PiiRedactor;

/// Wraps the default field formatting: any field whose name matches
/// `error_common::sanitization::is_redacted_field` is replaced wholesale,
/// everything else is run through [`PiiRedactor`] for incidental PII.
pub struct RedactedFormatter {
    redactor: PiiRedactor,
}

impl RedactedFormatter {
    pub fn new(redactor: PiiRedactor) -> Self {
        Self { redactor }
    }
}

impl Default for RedactedFormatter {
    fn default() -> Self {
        Self::new(PiiRedactor::default())
    }
}

impl<S, N> FormatEvent<S, N> for RedactedFormatter
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
        let meta = event.metadata();
        write!(writer, "{} {} {}: ", timestamp_now(), meta.level(), meta.target())?;

        let mut visitor = RedactingVisit {
            redactor: &self.redactor,
            writer: &mut writer,
            wrote_any: false,
        };
        event.record(&mut visitor);

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, " span={}", span.name())?;
            }
        }

        writeln!(writer)
    }
}

/// `tracing::field::Visit` that redacts as it writes, rather than building
/// a full buffer of unredacted text first.
struct RedactingVisit<'a, 'w> {
    redactor: &'a PiiRedactor,
    writer: &'a mut Writer<'w>,
    wrote_any: bool,
}

impl RedactingVisit<'_, '_> {
    fn write_field(&mut self, field: &Field, rendered: &str) {
        let sep = if self.wrote_any { " " } else { "" };
        let _ = write!(self.writer, "{sep}{}={}", field.name(), rendered);
        self.wrote_any = true;
    }
}

impl Visit for RedactingVisit<'_, '_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if is_redacted_field(field.name()) {
            self.write_field(field, REDACTED_PLACEHOLDER);
        } else {
            let redacted = self.redactor.redact(value);
            self.write_field(field, &format!("{:?}", redacted));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if is_redacted_field(field.name()) {
            self.write_field(field, REDACTED_PLACEHOLDER);
            return;
        }
        let rendered = format!("{:?}", value);
        let redacted = self.redactor.redact(&rendered);
        self.write_field(field, &redacted);
    }
}

fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::format::FmtSpan;

    #[test]
    fn redacts_field_named_like_a_secret() {
        // Smoke test: building the layer shouldn't panic, field-name
        // filtering itself is covered in `sanitization`.
        let _layer = tracing_subscriber::fmt::layer()
            .event_format(RedactedFormatter::default())
            .with_span_events(FmtSpan::NONE);
    }
}
