use crate::domain::prediction::Prediction;
use serde::Serialize;
use std::fmt;

pub fn prediction_probability(p: &Prediction) -> f64 {
    [
        Some(p.default_probability),
        p.probability,
        p.logistic_probability,
        p.ensemble_probability,
    ]
    .into_iter()
    .flatten()
    .find(|v| *v != 0.0 && !v.is_nan())
    .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl RiskCategory {
    pub fn from_level(level: Option<&str>) -> Self {
        match level.map(|l| l.trim().to_ascii_uppercase()).as_deref() {
            Some("LOW") => RiskCategory::Low,
            Some("MEDIUM") => RiskCategory::Medium,
            Some("HIGH") => RiskCategory::High,
            Some("CRITICAL") => RiskCategory::Critical,
            _ => RiskCategory::Unknown,
        }
    }

    pub fn of(p: &Prediction) -> Self {
        Self::from_level(Some(p.risk_level.as_str()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
            RiskCategory::Critical => "critical",
            RiskCategory::Unknown => "unknown",
        }
    }

    pub fn badge_class(self) -> &'static str {
        match self {
            RiskCategory::Low => "bg-green-100 text-green-800 border-green-200",
            RiskCategory::Medium => "bg-yellow-100 text-yellow-800 border-yellow-200",
            RiskCategory::High => "bg-orange-100 text-orange-800 border-orange-200",
            RiskCategory::Critical => "bg-red-100 text-red-800 border-red-200",
            RiskCategory::Unknown => "bg-gray-100 text-gray-800 border-gray-200",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn format_period(p: &Prediction) -> String {
    let year = p.reporting_year.trim();
    let quarter = p
        .reporting_quarter
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    match quarter {
        Some(q) if year.is_empty() => q.to_string(),
        Some(q) => format!("{q} {year}"),
        None if year.is_empty() => "Unknown".to_string(),
        None => year.to_string(),
    }
}
