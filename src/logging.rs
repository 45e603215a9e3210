use std::collections::BTreeMap;
use std::fmt;

use tracing::Span;

/// Structured fields attached to every log line of one request or job.
///
/// The value is passed explicitly down the call chain; each layer adds the
/// fields it knows about with [`LogContext::with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    fields: BTreeMap<&'static str, String>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    pub fn span(&self, name: &'static str) -> Span {
        tracing::info_span!("staging", op = name, ctx = %self)
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.fields {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_values_override_and_render_sorted() {
        let ctx = LogContext::new()
            .with("jobId", "job_1")
            .with("mode", "text-to-image")
            .with("jobId", "job_2");
        assert_eq!(ctx.to_string(), "jobId=job_2 mode=text-to-image");
    }
}
