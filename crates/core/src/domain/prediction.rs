use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub company_symbol: String,
    #[serde(default)]
    pub company_name: String,

    #[serde(default)]
    pub reporting_year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_quarter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_debt_to_total_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_debt_to_ebitda: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebit_to_interest_expense: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_on_assets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sga_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_on_capital: Option<f64>,

    // Annual models publish `probability`; quarterly models publish the other three.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logistic_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gbm_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_probability: Option<f64>,
    #[serde(default)]
    pub default_probability: f64,

    #[serde(default)]
    pub risk_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_category: Option<String>,
    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub organization_access: Scope,

    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_email: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    #[serde(default)]
    pub financial_ratios: FinancialRatios,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRatios {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ltdtc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebitint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sga: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdte: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Personal,
    Organization,
    System,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Personal => "personal",
            Scope::Organization => "organization",
            Scope::System => "system",
        }
    }

    pub fn from_access_level(raw: &str) -> Option<Self> {
        match raw {
            "personal" => Some(Scope::Personal),
            "organization" => Some(Scope::Organization),
            "system" => Some(Scope::System),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(Scope::Personal),
            "organization" => Ok(Scope::Organization),
            "system" => Ok(Scope::System),
            other => anyhow::bail!(
                "unknown scope {other:?} (expected personal, organization or system)"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Annual,
    Quarterly,
}

impl DatasetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Annual => "annual",
            DatasetKind::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(DatasetKind::Annual),
            "quarterly" => Ok(DatasetKind::Quarterly),
            other => anyhow::bail!("unknown dataset kind {other:?} (expected annual or quarterly)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Scoped,
    Platform,
}

impl Source {
    pub fn for_scope(scope: Scope) -> Self {
        match scope {
            Scope::System => Source::Platform,
            Scope::Personal | Scope::Organization => Source::Scoped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub source: Source,
    pub kind: DatasetKind,
}

impl DatasetKey {
    pub const SCOPED_ANNUAL: Self = Self::new(Source::Scoped, DatasetKind::Annual);
    pub const SCOPED_QUARTERLY: Self = Self::new(Source::Scoped, DatasetKind::Quarterly);
    pub const PLATFORM_ANNUAL: Self = Self::new(Source::Platform, DatasetKind::Annual);
    pub const PLATFORM_QUARTERLY: Self = Self::new(Source::Platform, DatasetKind::Quarterly);

    pub const ALL: [Self; 4] = [
        Self::SCOPED_ANNUAL,
        Self::SCOPED_QUARTERLY,
        Self::PLATFORM_ANNUAL,
        Self::PLATFORM_QUARTERLY,
    ];

    pub const fn new(source: Source, kind: DatasetKind) -> Self {
        Self { source, kind }
    }

    pub(crate) fn index(self) -> usize {
        match (self.source, self.kind) {
            (Source::Scoped, DatasetKind::Annual) => 0,
            (Source::Scoped, DatasetKind::Quarterly) => 1,
            (Source::Platform, DatasetKind::Annual) => 2,
            (Source::Platform, DatasetKind::Quarterly) => 3,
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Scoped => "scoped",
            Source::Platform => "platform",
        };
        write!(f, "{source}_{}", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    SuperAdmin,
    OrgAdmin,
    OrgMember,
    TenantAdmin,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "super_admin" => Role::SuperAdmin,
            "org_admin" => Role::OrgAdmin,
            "org_member" => Role::OrgMember,
            "tenant_admin" => Role::TenantAdmin,
            _ => Role::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::SuperAdmin => "super_admin",
            Role::OrgAdmin => "org_admin",
            Role::OrgMember => "org_member",
            Role::TenantAdmin => "tenant_admin",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::parse(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}
