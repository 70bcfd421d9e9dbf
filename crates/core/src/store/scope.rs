use crate::domain::prediction::{Role, Scope, Source};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    OnlyPlatform,
    ScopedPlusPlatform,
}

impl FetchStrategy {
    pub fn call_count(self) -> usize {
        match self {
            FetchStrategy::OnlyPlatform => 2,
            FetchStrategy::ScopedPlusPlatform => 4,
        }
    }
}

pub fn resolve_fetch_strategy(role: Option<&Role>) -> FetchStrategy {
    match role {
        Some(Role::SuperAdmin) => FetchStrategy::OnlyPlatform,
        _ => FetchStrategy::ScopedPlusPlatform,
    }
}

pub fn resolve_default_scope(role: Option<&Role>) -> Scope {
    match role {
        Some(Role::SuperAdmin) => Scope::System,
        Some(Role::OrgAdmin | Role::OrgMember | Role::TenantAdmin) => Scope::Organization,
        Some(Role::User | Role::Other(_)) | None => Scope::Personal,
    }
}

pub fn resolve_record_scope(raw: &Value, role: Option<&Role>, source: Source) -> Scope {
    if source == Source::Platform {
        return Scope::System;
    }

    ["access_level", "organization_access"]
        .iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find_map(Scope::from_access_level)
        .unwrap_or_else(|| inferred_record_scope(role))
}

fn inferred_record_scope(role: Option<&Role>) -> Scope {
    match role {
        Some(Role::OrgAdmin | Role::OrgMember) => Scope::Organization,
        _ => Scope::Personal,
    }
}
