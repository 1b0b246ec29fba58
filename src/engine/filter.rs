//! Query-parameter filtering compiled from a template plan.
//!
//! For every filterable field the plan exposes the lookups the original API
//! contract promises: comma-separated `IN` on the bare alias, `{alias}_like`
//! contains for text, `{alias}_isnull`, `{alias}_range_min`/`{alias}_range_max`
//! for numbers and `{alias}_after`/`{alias}_before` for dates, plus the
//! intrinsic sys/org/biz/src and id filters and `o=` ordering. Unknown
//! parameters are ignored; unparsable values are a validation error.

use std::collections::BTreeMap;

use sea_orm::sea_query::{Alias, Condition, Expr, Order, SimpleExpr};

use super::REL_ALIAS;
use super::catalog::ColumnKind;
use super::plan::{FieldPlan, TemplatePlan};
use super::value::ColumnValue;

/// Parameters consumed by the endpoints themselves, never treated as filters.
pub const RESERVED_PARAMS: &[&str] = &[
    "template_id",
    "sys_id",
    "page",
    "page_size",
    "use_cache",
    "include_gps",
    "o",
    "ordering",
    "field_names",
    "querys",
    "update_fields",
];

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("bad filter value for '{param}': {message}")]
    BadValue { param: String, message: String },
}

fn field_expr(plan: &TemplatePlan, field: &FieldPlan) -> Expr {
    if field.is_related {
        Expr::col((Alias::new(REL_ALIAS), Alias::new(field.col_name.as_str())))
    } else {
        Expr::col((
            Alias::new(plan.target.table_name()),
            Alias::new(field.col_name.as_str()),
        ))
    }
}

fn own_col(plan: &TemplatePlan, name: &str) -> Expr {
    Expr::col((Alias::new(plan.target.table_name()), Alias::new(name)))
}

fn parse_values(
    kind: ColumnKind,
    param: &str,
    raw: &str,
) -> Result<Vec<sea_orm::Value>, FilterError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            ColumnValue::parse_str(kind, part)
                .map(|v| v.into_value(kind))
                .map_err(|message| FilterError::BadValue {
                    param: param.to_string(),
                    message,
                })
        })
        .collect()
}

fn parse_single(
    kind: ColumnKind,
    param: &str,
    raw: &str,
) -> Result<sea_orm::Value, FilterError> {
    ColumnValue::parse_str(kind, raw)
        .map(|v| v.into_value(kind))
        .map_err(|message| FilterError::BadValue {
            param: param.to_string(),
            message,
        })
}

/// Compile request parameters into a condition over the plan's table(s).
///
/// The returned condition carries only the caller-supplied filters; the
/// template/tenant scoping is applied by the query layer.
pub fn build_condition(
    plan: &TemplatePlan,
    params: &BTreeMap<String, String>,
) -> Result<Condition, FilterError> {
    let mut condition = Condition::all();

    for (key, raw) in params {
        if raw.is_empty() || RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }

        // Intrinsic tenant/partition filters.
        match key.as_str() {
            "org_id" | "biz_id" | "src_id" => {
                let value = parse_single(ColumnKind::Integer, key, raw)?;
                condition = condition.add(own_col(plan, key).eq(value));
                continue;
            }
            "id" | "pk" => {
                let values = parse_values(ColumnKind::Text, key, raw)?;
                if !values.is_empty() {
                    condition = condition.add(own_col(plan, "id").is_in(values));
                }
                continue;
            }
            "obj_id" => {
                let values = parse_values(ColumnKind::Text, key, raw)?;
                if !values.is_empty() {
                    condition = condition.add(own_col(plan, "obj_id").is_in(values));
                }
                continue;
            }
            "create_time_after" => {
                let value = parse_single(ColumnKind::DateTime, key, raw)?;
                condition = condition.add(own_col(plan, "create_time").gte(value));
                continue;
            }
            "create_time_before" => {
                let value = parse_single(ColumnKind::DateTime, key, raw)?;
                condition = condition.add(own_col(plan, "create_time").lte(value));
                continue;
            }
            _ => {}
        }

        let Some((field, lookup)) = resolve_lookup(plan, key) else {
            tracing::debug!(param = %key, "ignoring unknown filter parameter");
            continue;
        };

        let expr = field_expr(plan, field);
        let clause: SimpleExpr = match lookup {
            Lookup::Eq => {
                if field.kind.is_temporal() {
                    expr.eq(parse_single(field.kind, key, raw)?)
                } else {
                    let values = parse_values(field.kind, key, raw)?;
                    if values.is_empty() {
                        continue;
                    }
                    expr.is_in(values)
                }
            }
            Lookup::Like => {
                if !field.kind.is_textual() {
                    continue;
                }
                expr.like(format!("%{}%", raw))
            }
            Lookup::IsNull => match raw.as_str() {
                "true" | "1" => expr.is_null(),
                "false" | "0" => expr.is_not_null(),
                _ => {
                    return Err(FilterError::BadValue {
                        param: key.clone(),
                        message: format!("'{raw}' is not a boolean"),
                    });
                }
            },
            Lookup::RangeMin => {
                if !field.kind.is_numeric() {
                    continue;
                }
                expr.gte(parse_single(field.kind, key, raw)?)
            }
            Lookup::RangeMax => {
                if !field.kind.is_numeric() {
                    continue;
                }
                expr.lte(parse_single(field.kind, key, raw)?)
            }
            Lookup::After => {
                if !field.kind.is_temporal() {
                    continue;
                }
                expr.gte(parse_single(field.kind, key, raw)?)
            }
            Lookup::Before => {
                if !field.kind.is_temporal() {
                    continue;
                }
                expr.lte(parse_single(field.kind, key, raw)?)
            }
        };

        condition = condition.add(clause);
    }

    Ok(condition)
}

/// Compile the `o=` ordering parameter: comma-separated aliases, `-` for
/// descending. Unknown aliases are ignored.
pub fn build_ordering(
    plan: &TemplatePlan,
    params: &BTreeMap<String, String>,
) -> Vec<(SimpleExpr, Order)> {
    let Some(raw) = params.get("o").or_else(|| params.get("ordering")) else {
        return Vec::new();
    };

    let mut ordering = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (alias, order) = match part.strip_prefix('-') {
            Some(rest) => (rest, Order::Desc),
            None => (part, Order::Asc),
        };

        let expr = if alias == "create_time" || alias == "id" {
            own_col(plan, alias)
        } else if let Some(field) = plan.field_by_alias(alias) {
            field_expr(plan, field)
        } else {
            tracing::debug!(alias, "ignoring unknown ordering alias");
            continue;
        };

        ordering.push((expr.into(), order));
    }

    ordering
}

enum Lookup {
    Eq,
    Like,
    IsNull,
    RangeMin,
    RangeMax,
    After,
    Before,
}

fn resolve_lookup<'a>(plan: &'a TemplatePlan, key: &str) -> Option<(&'a FieldPlan, Lookup)> {
    const SUFFIXES: &[(&str, fn() -> Lookup)] = &[
        ("_range_min", || Lookup::RangeMin),
        ("_range_max", || Lookup::RangeMax),
        ("_isnull", || Lookup::IsNull),
        ("_like", || Lookup::Like),
        ("_after", || Lookup::After),
        ("_before", || Lookup::Before),
    ];

    for (suffix, make) in SUFFIXES {
        if let Some(alias) = key.strip_suffix(suffix) {
            if let Some(field) = plan.field_by_alias(alias).filter(|f| f.in_filter) {
                return Some((field, make()));
            }
        }
    }

    plan.field_by_alias(key)
        .filter(|f| f.in_filter)
        .map(|f| (f, Lookup::Eq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::test_fixtures::{field, template};
    use crate::engine::plan::TemplatePlan;
    use sea_orm::sea_query::{PostgresQueryBuilder, Query};

    fn plan() -> TemplatePlan {
        let tmpl = template("FT1", "formdata", 1);
        let mut fields = vec![
            field("FF1", "FT1", "name", "field_01"),
            field("FF2", "FT1", "age", "int_01"),
            field("FF3", "FT1", "joined", "date_01"),
        ];
        fields[2].in_filter = true;
        let mut hidden = field("FF4", "FT1", "secret", "field_02");
        hidden.in_filter = false;
        fields.push(hidden);
        TemplatePlan::build(&tmpl, &fields, &[], None).unwrap()
    }

    fn sql(condition: Condition) -> String {
        let mut query = Query::select();
        query
            .expr(Expr::val(1))
            .from(Alias::new("form_data"))
            .cond_where(condition);
        query.to_string(PostgresQueryBuilder)
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_comma_list_becomes_in() {
        let plan = plan();
        let condition =
            build_condition(&plan, &params(&[("name", "abc,def,ghi")])).unwrap();
        let rendered = sql(condition);
        assert!(rendered.contains("IN ('abc', 'def', 'ghi')"));
        assert!(rendered.contains("field_01"));
    }

    #[test]
    fn test_numeric_range() {
        let plan = plan();
        let condition = build_condition(
            &plan,
            &params(&[("age_range_min", "1"), ("age_range_max", "20")]),
        )
        .unwrap();
        let rendered = sql(condition);
        assert!(rendered.contains(">= 1"));
        assert!(rendered.contains("<= 20"));
    }

    #[test]
    fn test_isnull_lookup() {
        let plan = plan();
        let rendered = sql(build_condition(&plan, &params(&[("name_isnull", "true")])).unwrap());
        assert!(rendered.contains("IS NULL"));

        let rendered =
            sql(build_condition(&plan, &params(&[("name_isnull", "false")])).unwrap());
        assert!(rendered.contains("IS NOT NULL"));
    }

    #[test]
    fn test_like_lookup_text_only() {
        let plan = plan();
        let rendered = sql(build_condition(&plan, &params(&[("name_like", "ab")])).unwrap());
        assert!(rendered.contains("LIKE '%ab%'"));

        // _like over a numeric field is ignored.
        let rendered = sql(build_condition(&plan, &params(&[("age_like", "1")])).unwrap());
        assert!(!rendered.contains("LIKE"));
    }

    #[test]
    fn test_date_after_before() {
        let plan = plan();
        let condition = build_condition(
            &plan,
            &params(&[("joined_after", "2021-01-01"), ("joined_before", "2021-12-31")]),
        )
        .unwrap();
        let rendered = sql(condition);
        assert!(rendered.contains("date_01"));
        assert!(rendered.contains(">="));
        assert!(rendered.contains("<="));
    }

    #[test]
    fn test_non_filterable_and_unknown_params_ignored() {
        let plan = plan();
        let condition = build_condition(
            &plan,
            &params(&[("secret", "x"), ("nonsense", "y"), ("page", "3")]),
        )
        .unwrap();
        let rendered = sql(condition);
        assert!(!rendered.contains("field_02"));
        assert!(!rendered.contains("nonsense"));
    }

    #[test]
    fn test_bad_value_is_an_error() {
        let plan = plan();
        let err = build_condition(&plan, &params(&[("age", "abc")])).unwrap_err();
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_ordering_parses_aliases() {
        let plan = plan();
        let ordering = build_ordering(&plan, &params(&[("o", "name,-age,unknown")]));
        assert_eq!(ordering.len(), 2);
        assert!(matches!(ordering[0].1, Order::Asc));
        assert!(matches!(ordering[1].1, Order::Desc));
    }
}
