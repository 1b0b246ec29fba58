//! Compiled template plans.
//!
//! A [`TemplatePlan`] is the explicit, typed registry a template's field
//! descriptors compile into: every descriptor resolved against the target
//! table's physical-column catalog, with validation, filter and uniqueness
//! metadata attached. Descriptors that do not resolve (unknown column,
//! malformed verify expression, related field without a related template)
//! are skipped with a logged warning rather than failing the template.

use regex::Regex;

use crate::models::{form_aggregate_field, form_field, form_template};

use super::catalog::{ColumnKind, TargetModel};

/// Errors raised while compiling a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("api_name not in [formdata, org, customer, goods, services]! \"{0}\"")]
    UnknownApiName(String),
}

/// One resolved field descriptor.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub field_id: String,
    pub col_title: String,
    /// Final alias: the descriptor's alias if non-empty, else the column name.
    pub alias: String,
    pub col_name: String,
    pub kind: ColumnKind,
    pub required: bool,
    pub in_filter: bool,
    pub unique_in_org: bool,
    /// Related fields resolve on the joined related-template table and are
    /// read-only in payloads.
    pub is_related: bool,
    pub verify: Option<Regex>,
    pub sort_num: i32,
}

/// Join target for related (obj_id-backed) fields.
#[derive(Debug, Clone)]
pub struct RelatedPlan {
    pub template_id: String,
    pub target: TargetModel,
}

/// Aggregate function selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggrKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggrKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "count" => Some(AggrKind::Count),
            "sum" => Some(AggrKind::Sum),
            "avg" => Some(AggrKind::Avg),
            "min" => Some(AggrKind::Min),
            "max" => Some(AggrKind::Max),
            _ => None,
        }
    }
}

/// One configured aggregate output.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub name: String,
    pub col_name: String,
    pub kind: ColumnKind,
    pub aggr: AggrKind,
}

/// The compiled request-handling plan for one template.
#[derive(Debug)]
pub struct TemplatePlan {
    pub template_id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub title: String,
    pub target: TargetModel,
    pub need_login: bool,
    pub fields: Vec<FieldPlan>,
    pub related: Option<RelatedPlan>,
    pub aggregates: Vec<AggregateSpec>,
}

impl TemplatePlan {
    /// Compile a plan from a template, its field descriptors and aggregate
    /// definitions. `related_target` is the resolved target of the related
    /// template pointed to by the obj_id field, if any (one level only).
    pub fn build(
        template: &form_template::Model,
        fields: &[form_field::Model],
        aggregates: &[form_aggregate_field::Model],
        related_target: Option<(String, TargetModel)>,
    ) -> Result<Self, PlanError> {
        let target = TargetModel::from_api_name(&template.api_name)
            .ok_or_else(|| PlanError::UnknownApiName(template.api_name.clone()))?;

        let mut ordered: Vec<&form_field::Model> = fields.iter().collect();
        ordered.sort_by(|a, b| (a.sort_num, &a.id).cmp(&(b.sort_num, &b.id)));

        let has_obj_id_field = ordered
            .iter()
            .any(|f| f.col_name == "obj_id" && f.related_template_id.is_some());
        let related = match (&related_target, has_obj_id_field) {
            (Some((rel_template_id, rel_target)), true) => Some(RelatedPlan {
                template_id: rel_template_id.clone(),
                target: *rel_target,
            }),
            _ => None,
        };

        let mut field_plans = Vec::with_capacity(ordered.len());
        for field in ordered {
            let resolve_target = if field.is_related {
                match &related {
                    Some(rel) => rel.target,
                    None => {
                        tracing::warn!(
                            template_id = %template.id,
                            field_id = %field.id,
                            col_name = %field.col_name,
                            "skipping related field without a related template"
                        );
                        continue;
                    }
                }
            } else {
                target
            };

            let Some(column) = resolve_target.column(&field.col_name) else {
                tracing::warn!(
                    template_id = %template.id,
                    field_id = %field.id,
                    col_name = %field.col_name,
                    table = resolve_target.table_name(),
                    "skipping field mapped to unknown column"
                );
                continue;
            };

            let verify = match field.verify_exp.as_deref().filter(|s| !s.is_empty()) {
                Some(exp) => match Regex::new(exp) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        tracing::warn!(
                            template_id = %template.id,
                            field_id = %field.id,
                            verify_exp = exp,
                            error = %err,
                            "skipping field with malformed verify expression"
                        );
                        continue;
                    }
                },
                None => None,
            };

            let alias = if field.alias.is_empty() {
                field.col_name.clone()
            } else {
                field.alias.clone()
            };

            field_plans.push(FieldPlan {
                field_id: field.id.clone(),
                col_title: field.col_title.clone(),
                alias,
                col_name: field.col_name.clone(),
                kind: column.kind,
                required: field.is_required,
                in_filter: field.in_filter,
                unique_in_org: field.unique_in_org,
                is_related: field.is_related,
                verify,
                sort_num: field.sort_num,
            });
        }

        let mut aggregate_specs = Vec::new();
        for aggregate in aggregates {
            let Some(aggr) = aggregate
                .aggr_type
                .as_deref()
                .and_then(AggrKind::from_str)
            else {
                continue;
            };
            let Some(name) = aggregate.aggr_name.clone().filter(|n| !n.is_empty()) else {
                continue;
            };
            let Some(field) = field_plans
                .iter()
                .find(|f| f.field_id == aggregate.field_id && !f.is_related)
            else {
                tracing::warn!(
                    template_id = %template.id,
                    aggregate_id = %aggregate.id,
                    "skipping aggregate over unresolved field"
                );
                continue;
            };
            aggregate_specs.push(AggregateSpec {
                name,
                col_name: field.col_name.clone(),
                kind: field.kind,
                aggr,
            });
        }

        Ok(Self {
            template_id: template.id.clone(),
            sys_id: template.sys_id,
            org_id: template.org_id,
            biz_id: template.biz_id,
            src_id: template.src_id,
            title: template.title.clone(),
            target,
            need_login: template.need_login,
            fields: field_plans,
            related,
            aggregates: aggregate_specs,
        })
    }

    /// Writable (non-related) fields, in sort order.
    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| !f.is_related)
    }

    /// Related (join-backed, read-only) fields.
    pub fn related_fields(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| f.is_related)
    }

    /// Fields marked as filterable.
    pub fn filter_fields(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| f.in_filter)
    }

    /// Fields declared unique within `(org_id, template_id, sys_id)`.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldPlan> {
        self.fields.iter().filter(|f| f.unique_in_org && !f.is_related)
    }

    pub fn field_by_alias(&self, alias: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// Whether list queries join the related template's table.
    pub fn has_related_join(&self) -> bool {
        self.related.is_some() && self.fields.iter().any(|f| f.is_related)
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use chrono::Utc;

    use crate::models::{form_field, form_template};

    pub fn template(id: &str, api_name: &str, sys_id: i32) -> form_template::Model {
        form_template::Model {
            id: id.to_string(),
            sys_id,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            category: None,
            api_version: "v1".to_string(),
            api_name: api_name.to_string(),
            title: format!("{id} template"),
            form_type: 1,
            sort_num: 1,
            keyword: None,
            remark: None,
            parent_id: None,
            from_template_id: None,
            need_login: false,
            create_time: Utc::now().into(),
        }
    }

    pub fn field(id: &str, template_id: &str, alias: &str, col_name: &str) -> form_field::Model {
        form_field::Model {
            id: id.to_string(),
            sys_id: 1,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            template_id: template_id.to_string(),
            col_title: alias.to_string(),
            alias: alias.to_string(),
            col_name: col_name.to_string(),
            in_filter: true,
            is_required: false,
            widget: None,
            widget_attr: None,
            verify_exp: None,
            related_template_id: None,
            local_data_source: None,
            sort_num: 1,
            is_related: false,
            desc: None,
            unique_in_org: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::{field, template};
    use super::*;
    use crate::engine::catalog::TargetModel;

    #[test]
    fn test_build_resolves_columns_and_aliases() {
        let tmpl = template("FT1", "formdata", 1);
        let fields = vec![
            field("FF1", "FT1", "name", "field_01"),
            field("FF2", "FT1", "age", "int_01"),
        ];

        let plan = TemplatePlan::build(&tmpl, &fields, &[], None).unwrap();

        assert_eq!(plan.target, TargetModel::FormData);
        assert_eq!(plan.fields.len(), 2);

        let name = plan.field_by_alias("name").unwrap();
        assert_eq!(name.col_name, "field_01");
        assert_eq!(name.kind, ColumnKind::Text);

        let age = plan.field_by_alias("age").unwrap();
        assert_eq!(age.kind, ColumnKind::Integer);
    }

    #[test]
    fn test_unknown_column_is_skipped() {
        let tmpl = template("FT1", "formdata", 1);
        let fields = vec![
            field("FF1", "FT1", "name", "field_01"),
            field("FF2", "FT1", "ghost", "no_such_column"),
        ];

        let plan = TemplatePlan::build(&tmpl, &fields, &[], None).unwrap();
        assert_eq!(plan.fields.len(), 1);
        assert!(plan.field_by_alias("ghost").is_none());
    }

    #[test]
    fn test_malformed_verify_expression_skips_field() {
        let tmpl = template("FT1", "formdata", 1);
        let mut bad = field("FF1", "FT1", "code", "field_01");
        bad.verify_exp = Some("([unclosed".to_string());

        let plan = TemplatePlan::build(&tmpl, &[bad], &[], None).unwrap();
        assert!(plan.fields.is_empty());
    }

    #[test]
    fn test_empty_alias_falls_back_to_col_name() {
        let tmpl = template("FT1", "formdata", 1);
        let mut f = field("FF1", "FT1", "", "field_02");
        f.alias = String::new();

        let plan = TemplatePlan::build(&tmpl, &[f], &[], None).unwrap();
        assert!(plan.field_by_alias("field_02").is_some());
    }

    #[test]
    fn test_related_fields_without_related_template_are_skipped() {
        let tmpl = template("FT1", "formdata", 1);
        let mut rel = field("FF1", "FT1", "org_name", "name");
        rel.is_related = true;

        let plan = TemplatePlan::build(&tmpl, &[rel], &[], None).unwrap();
        assert!(plan.fields.is_empty());
        assert!(!plan.has_related_join());
    }

    #[test]
    fn test_related_join_resolves_one_level() {
        let tmpl = template("FT1", "formdata", 1);
        let mut obj = field("FF1", "FT1", "obj_id", "obj_id");
        obj.alias = String::new();
        obj.related_template_id = Some("FT2".to_string());
        let mut rel = field("FF2", "FT1", "org_name", "name");
        rel.is_related = true;

        let plan = TemplatePlan::build(
            &tmpl,
            &[obj, rel],
            &[],
            Some(("FT2".to_string(), TargetModel::Org)),
        )
        .unwrap();

        assert!(plan.has_related_join());
        let org_name = plan.field_by_alias("org_name").unwrap();
        assert!(org_name.is_related);
        assert_eq!(org_name.col_name, "name");
    }

    #[test]
    fn test_unknown_api_name_is_an_error() {
        let tmpl = template("FT1", "widgets", 1);
        let err = TemplatePlan::build(&tmpl, &[], &[], None).unwrap_err();
        assert!(err.to_string().contains("widgets"));
    }
}
