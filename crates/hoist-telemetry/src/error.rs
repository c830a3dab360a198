//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// Building a Prometheus collector failed.
    MetricsCollector {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Registering a Prometheus collector failed.
    MetricsRegister {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding Prometheus metrics failed.
    MetricsEncode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Rendered metrics output was not valid UTF-8.
    MetricsUtf8 {
        /// Underlying UTF-8 conversion error.
        source: std::string::FromUtf8Error,
    },
    /// Writing rendered counters to disk failed.
    MetricsWrite {
        /// File path that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::MetricsCollector { .. } => {
                formatter.write_str("failed to build metrics collector")
            }
            Self::MetricsRegister { .. } => {
                formatter.write_str("failed to register metrics collector")
            }
            Self::MetricsEncode { .. } => formatter.write_str("failed to encode metrics"),
            Self::MetricsUtf8 { .. } => formatter.write_str("metrics output was not valid utf-8"),
            Self::MetricsWrite { .. } => formatter.write_str("failed to write metrics file"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::MetricsCollector { source, .. }
            | Self::MetricsRegister { source, .. }
            | Self::MetricsEncode { source } => Some(source),
            Self::MetricsUtf8 { source } => Some(source),
            Self::MetricsWrite { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Registry};

    type TestResult = std::result::Result<(), Box<dyn Error>>;

    #[test]
    fn invalid_counter_name_is_a_collector_error() {
        let err = IntCounter::new("hoist copy", "bad name")
            .err()
            .map(|source| TelemetryError::MetricsCollector {
                name: "hoist copy",
                source,
            });
        assert!(err.as_ref().is_some_and(|err| err.source().is_some()));
        assert_eq!(
            err.map(|err| err.to_string()).as_deref(),
            Some("failed to build metrics collector")
        );
    }

    #[test]
    fn duplicate_registration_is_a_register_error() -> TestResult {
        let registry = Registry::new();
        let counter = IntCounter::new("hoist_copy_succeeded_total", "copied")?;
        registry.register(Box::new(counter.clone()))?;
        let err = registry
            .register(Box::new(counter))
            .err()
            .map(|source| TelemetryError::MetricsRegister {
                name: "hoist_copy_succeeded_total",
                source,
            })
            .ok_or("second registration succeeded")?;
        assert_eq!(err.to_string(), "failed to register metrics collector");
        assert!(matches!(
            err.source().and_then(|source| source.downcast_ref::<PrometheusError>()),
            Some(PrometheusError::AlreadyReg)
        ));
        Ok(())
    }

    #[test]
    fn write_failure_keeps_path_and_io_source() {
        let err = TelemetryError::MetricsWrite {
            path: PathBuf::from("/nonexistent/counters.prom"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "failed to write metrics file");
        assert!(
            err.source()
                .and_then(|source| source.downcast_ref::<std::io::Error>())
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
        );
    }
}
