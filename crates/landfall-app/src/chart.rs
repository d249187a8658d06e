//! Helm chart selection

use serde_json::Value;

/// Chart installed when none is configured
pub const APACHE_CHART: &str = "apache";

/// Pinned chart version
pub const APACHE_CHART_VERSION: &str = "11.2.4";

/// Repository the chart is fetched from
pub const BITNAMI_REPOSITORY: &str = "https://charts.bitnami.com/bitnami";

/// A chart from a Helm repository
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    /// Chart name
    pub chart: String,
    /// Chart version
    pub version: String,
    /// Repository URL
    pub repository: String,
    /// Values passed to the release
    pub values: Option<Value>,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            chart: APACHE_CHART.to_string(),
            version: APACHE_CHART_VERSION.to_string(),
            repository: BITNAMI_REPOSITORY.to_string(),
            values: None,
        }
    }
}

impl ChartSpec {
    /// Release name for `service_name`. Contains the chart name, so the
    /// chart's fullname template resolves to the release name.
    pub fn release_name(&self, service_name: &str) -> String {
        format!("{}-{}-chart", service_name, self.chart)
    }
}
