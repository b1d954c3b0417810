use crate::domain_port::{AlertSink, Navigator, Route};
use tracing::{info, warn};

/// Demo-binary glue: the "router" just logs where the app would go.
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn replace(&self, route: Route) {
        info!(%route, "navigation requested");
    }
}

/// Demo-binary glue: the "toast" is a log line.
pub struct TracingAlert;

impl AlertSink for TracingAlert {
    fn error(&self, message: &str) {
        warn!("{message}");
    }
}
