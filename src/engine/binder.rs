//! Payload binding and validation against a template plan.
//!
//! Binding turns an alias-keyed JSON object into typed physical-column
//! values: required checks, per-kind coercion and verify-expression matching
//! happen here; declared-unique checks are collected for the query layer to
//! resolve against the database scoped to `(org_id, template_id, sys_id)`.

use serde_json::{Map as JsonMap, Value as JsonValue};

use super::catalog::ColumnKind;
use super::plan::TemplatePlan;
use super::value::ColumnValue;

/// One physical column bound from the payload.
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub col_name: String,
    pub kind: ColumnKind,
    pub value: ColumnValue,
}

/// A unique-within-org check to run before writing.
#[derive(Debug, Clone)]
pub struct UniqueCheck {
    pub col_name: String,
    pub kind: ColumnKind,
    pub col_title: String,
    pub value: ColumnValue,
}

/// The validated, typed result of binding a payload.
#[derive(Debug, Default)]
pub struct BoundRow {
    pub columns: Vec<BoundColumn>,
    pub unique_checks: Vec<UniqueCheck>,
    /// org_id from the payload, when supplied.
    pub org_id: Option<i64>,
}

impl BoundRow {
    pub fn column(&self, col_name: &str) -> Option<&BoundColumn> {
        self.columns.iter().find(|c| c.col_name == col_name)
    }
}

/// How a payload is being bound; controls required checks and src_id
/// derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// New row: required fields enforced, src_id derived from org_id.
    Create,
    /// Full replace: required fields enforced, no src_id derivation.
    Update,
    /// Partial update: only supplied fields validated.
    Patch,
}

impl BindMode {
    fn enforces_required(self) -> bool {
        !matches!(self, BindMode::Patch)
    }
}

/// Field-level validation failures, keyed by payload alias.
#[derive(Debug, Default)]
pub struct BindErrors {
    pub fields: JsonMap<String, JsonValue>,
}

impl BindErrors {
    fn add(&mut self, alias: &str, message: String) {
        self.fields
            .insert(alias.to_string(), JsonValue::String(message));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn bind_intrinsic(
    row: &mut BoundRow,
    errors: &mut BindErrors,
    payload: &JsonMap<String, JsonValue>,
    name: &str,
    kind: ColumnKind,
) {
    let Some(value) = payload.get(name) else {
        return;
    };
    match ColumnValue::parse(kind, value) {
        Ok(parsed) => {
            if name == "org_id" {
                if let ColumnValue::Int(v) = parsed {
                    row.org_id = Some(v);
                }
            }
            row.columns.push(BoundColumn {
                col_name: name.to_string(),
                kind,
                value: parsed,
            });
        }
        Err(message) => errors.add(name, message),
    }
}

/// Bind a payload under the given mode.
///
/// Related (join-backed) fields are read-only and ignored in payloads. On
/// create, a missing `src_id` is derived as `org_id % 100`.
pub fn bind_payload(
    plan: &TemplatePlan,
    payload: &JsonMap<String, JsonValue>,
    mode: BindMode,
) -> Result<BoundRow, BindErrors> {
    let partial = !mode.enforces_required();
    let mut row = BoundRow::default();
    let mut errors = BindErrors::default();

    bind_intrinsic(&mut row, &mut errors, payload, "org_id", ColumnKind::Integer);
    bind_intrinsic(&mut row, &mut errors, payload, "biz_id", ColumnKind::Integer);
    bind_intrinsic(&mut row, &mut errors, payload, "src_id", ColumnKind::Integer);
    if plan.target.has_gps_sn() {
        bind_intrinsic(&mut row, &mut errors, payload, "gps_sn", ColumnKind::Text);
    }

    for field in plan.writable_fields() {
        let Some(value) = payload.get(&field.alias) else {
            if field.required && !partial {
                errors.add(&field.alias, format!("{} is required", field.col_title));
            }
            continue;
        };

        let parsed = match ColumnValue::parse(field.kind, value) {
            Ok(parsed) => parsed,
            Err(message) => {
                errors.add(&field.alias, message);
                continue;
            }
        };

        if parsed.is_null() && field.required && !partial {
            errors.add(&field.alias, format!("{} is required", field.col_title));
            continue;
        }

        if let (Some(verify), Some(display)) = (&field.verify, parsed.display_for_verify()) {
            if !verify.is_match(&display) {
                errors.add(
                    &field.alias,
                    format!("{}: '{}' does not match verify expression", field.col_title, display),
                );
                continue;
            }
        }

        if field.unique_in_org && !parsed.is_null() {
            row.unique_checks.push(UniqueCheck {
                col_name: field.col_name.clone(),
                kind: field.kind,
                col_title: field.col_title.clone(),
                value: parsed.clone(),
            });
        }

        row.columns.push(BoundColumn {
            col_name: field.col_name.clone(),
            kind: field.kind,
            value: parsed,
        });
    }

    if mode == BindMode::Create {
        let has_src = row
            .column("src_id")
            .map(|c| !c.value.is_null())
            .unwrap_or(false);
        if !has_src {
            let derived = row.org_id.unwrap_or(0) % 100;
            row.columns.retain(|c| c.col_name != "src_id");
            row.columns.push(BoundColumn {
                col_name: "src_id".to_string(),
                kind: ColumnKind::Integer,
                value: ColumnValue::Int(derived),
            });
        }
    }

    if errors.is_empty() { Ok(row) } else { Err(errors) }
}
