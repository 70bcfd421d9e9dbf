use crate::domain::prediction::{DatasetKind, FinancialRatios, Prediction, Scope};
use serde_json::{Map, Value};

const DEFAULT_QUARTER: &str = "Q1";

// Keys that are either copied into typed fields or recomputed here; everything else is passed
// through in `Prediction::extra`.
const MODELED_KEYS: &[&str] = &[
    "id",
    "company_id",
    "company_symbol",
    "company_name",
    "reporting_year",
    "reporting_quarter",
    "long_term_debt_to_total_capital",
    "total_debt_to_ebitda",
    "net_income_margin",
    "ebit_to_interest_expense",
    "return_on_assets",
    "sga_margin",
    "return_on_capital",
    "probability",
    "logistic_probability",
    "gbm_probability",
    "ensemble_probability",
    "default_probability",
    "risk_level",
    "risk_category",
    "confidence",
    "organization_id",
    "organization_name",
    "organization_access",
    "created_by",
    "created_by_email",
    "created_at",
    "updated_at",
    "sector",
    "model_type",
    "model_version",
    "financial_ratios",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeContext {
    pub kind: DatasetKind,
    pub scope: Scope,
    pub current_year: i32,
}

pub fn normalize(raw: Value, ctx: &NormalizeContext) -> Prediction {
    let mut obj = match raw {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };

    let probability = f64_field(&obj, "probability");
    let logistic_probability = f64_field(&obj, "logistic_probability");
    let default_probability = match ctx.kind {
        DatasetKind::Annual => probability,
        DatasetKind::Quarterly => logistic_probability,
    }
    .unwrap_or(0.0);

    let reporting_year =
        string_field(&obj, "reporting_year").unwrap_or_else(|| ctx.current_year.to_string());

    let reporting_quarter = match ctx.kind {
        DatasetKind::Quarterly => Some(
            string_field(&obj, "reporting_quarter")
                .map(|q| q.to_uppercase())
                .unwrap_or_else(|| DEFAULT_QUARTER.to_string()),
        ),
        DatasetKind::Annual => string_field(&obj, "reporting_quarter"),
    };

    let risk_level = string_field(&obj, "risk_level");

    let mut prediction = Prediction {
        id: string_field(&obj, "id").unwrap_or_default(),
        company_id: string_field(&obj, "company_id").unwrap_or_default(),
        company_symbol: string_field(&obj, "company_symbol").unwrap_or_default(),
        company_name: string_field(&obj, "company_name").unwrap_or_default(),
        reporting_year,
        reporting_quarter,
        long_term_debt_to_total_capital: f64_field(&obj, "long_term_debt_to_total_capital"),
        total_debt_to_ebitda: f64_field(&obj, "total_debt_to_ebitda"),
        net_income_margin: f64_field(&obj, "net_income_margin"),
        ebit_to_interest_expense: f64_field(&obj, "ebit_to_interest_expense"),
        return_on_assets: f64_field(&obj, "return_on_assets"),
        sga_margin: f64_field(&obj, "sga_margin"),
        return_on_capital: f64_field(&obj, "return_on_capital"),
        probability,
        logistic_probability,
        gbm_probability: f64_field(&obj, "gbm_probability"),
        ensemble_probability: f64_field(&obj, "ensemble_probability"),
        default_probability,
        risk_category: risk_level.clone(),
        risk_level: risk_level.unwrap_or_default(),
        confidence: f64_field(&obj, "confidence").unwrap_or(0.0),
        organization_id: string_field(&obj, "organization_id"),
        organization_name: string_field(&obj, "organization_name"),
        organization_access: ctx.scope,
        created_by: string_field(&obj, "created_by").unwrap_or_default(),
        created_by_email: string_field(&obj, "created_by_email"),
        created_at: string_field(&obj, "created_at").unwrap_or_default(),
        updated_at: string_field(&obj, "updated_at"),
        sector: string_field(&obj, "sector"),
        model_type: string_field(&obj, "model_type"),
        model_version: string_field(&obj, "model_version"),
        financial_ratios: FinancialRatios::default(),
        extra: Map::new(),
    };
    prediction.financial_ratios = financial_ratios(&prediction, ctx.kind);

    for key in MODELED_KEYS {
        obj.remove(*key);
    }
    prediction.extra = obj;

    prediction
}

pub fn normalize_all<F>(
    records: Vec<Value>,
    kind: DatasetKind,
    current_year: i32,
    mut scope_of: F,
) -> Vec<Prediction>
where
    F: FnMut(&Value) -> Scope,
{
    records
        .into_iter()
        .map(|raw| {
            let ctx = NormalizeContext {
                kind,
                scope: scope_of(&raw),
                current_year,
            };
            normalize(raw, &ctx)
        })
        .collect()
}

fn financial_ratios(p: &Prediction, kind: DatasetKind) -> FinancialRatios {
    match kind {
        DatasetKind::Annual => FinancialRatios {
            ltdtc: p.long_term_debt_to_total_capital,
            roa: p.return_on_assets,
            ebitint: p.ebit_to_interest_expense,
            ..FinancialRatios::default()
        },
        DatasetKind::Quarterly => FinancialRatios {
            ltdtc: p.long_term_debt_to_total_capital,
            sga: p.sga_margin,
            roa: p.return_on_capital,
            tdte: p.total_debt_to_ebitda,
            ..FinancialRatios::default()
        },
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn f64_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}
