//! # Template Repository
//!
//! CRUD for templates, field descriptors and aggregate definitions, plus
//! compilation of template plans. Every mutation evicts the plan cache entry
//! for the affected template; field writes re-stamp tenant identifiers from
//! the owning template.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::engine::{PlanCache, TargetModel, TemplatePlan};
use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::form_aggregate_field::{
    ActiveModel as AggregateActiveModel, Entity as AggregateField, Model as AggregateModel,
};
use crate::models::form_field::{
    ActiveModel as FieldActiveModel, Entity as FormField, Model as FieldModel,
};
use crate::models::form_template::{
    ActiveModel as TemplateActiveModel, Entity as FormTemplate, Model as TemplateModel,
};
use crate::models::{form_aggregate_field, form_field, form_template};

/// Request data for creating a template.
#[derive(Debug, Clone)]
pub struct CreateTemplateRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub api_name: String,
    pub title: String,
    pub form_type: i32,
    pub sort_num: i32,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub remark: Option<String>,
    pub parent_id: Option<String>,
    pub need_login: bool,
}

/// Request data for creating a field descriptor.
#[derive(Debug, Clone)]
pub struct CreateFieldRequest {
    pub template_id: String,
    pub col_title: String,
    pub alias: String,
    pub col_name: String,
    pub in_filter: bool,
    pub is_required: bool,
    pub widget: Option<String>,
    pub widget_attr: Option<String>,
    pub verify_exp: Option<String>,
    pub related_template_id: Option<String>,
    pub local_data_source: Option<String>,
    pub sort_num: i32,
    pub is_related: bool,
    pub desc: Option<String>,
    pub unique_in_org: bool,
}

/// Repository for template, field and aggregate-definition operations.
pub struct TemplateRepository<'a> {
    db: &'a DatabaseConnection,
    plans: &'a PlanCache,
    idgen: &'a IdGenerator,
}

impl<'a> TemplateRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, plans: &'a PlanCache, idgen: &'a IdGenerator) -> Self {
        Self { db, plans, idgen }
    }

    /// Fetch a template by id.
    pub async fn get_template(&self, id: &str) -> Result<Option<TemplateModel>, RepositoryError> {
        Ok(FormTemplate::find_by_id(id).one(self.db).await?)
    }

    /// Fetch a template by id or fail with a not-found error.
    pub async fn get_template_required(&self, id: &str) -> Result<TemplateModel, RepositoryError> {
        self.get_template(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Template not found: {id}")))
    }

    /// List templates with tenant filters, newest first.
    pub async fn list_templates(
        &self,
        sys_id: Option<i32>,
        org_id: Option<i32>,
        biz_id: Option<i32>,
        search: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<TemplateModel>), RepositoryError> {
        let mut query = FormTemplate::find().order_by_desc(form_template::Column::CreateTime);
        if let Some(sys_id) = sys_id {
            query = query.filter(form_template::Column::SysId.eq(sys_id));
        }
        if let Some(org_id) = org_id {
            query = query.filter(form_template::Column::OrgId.eq(org_id));
        }
        if let Some(biz_id) = biz_id {
            query = query.filter(form_template::Column::BizId.eq(biz_id));
        }
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query = query.filter(
                form_template::Column::Title
                    .contains(search)
                    .or(form_template::Column::Keyword.contains(search))
                    .or(form_template::Column::Id.eq(search)),
            );
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }

    /// Create a template. The api_name must select a known physical table.
    pub async fn create_template(
        &self,
        request: CreateTemplateRequest,
    ) -> Result<TemplateModel, RepositoryError> {
        if TargetModel::from_api_name(&request.api_name).is_none() {
            return Err(RepositoryError::validation_error(format!(
                "api_name not in [formdata, org, customer, goods, services]! \"{}\"",
                request.api_name
            )));
        }
        if request.title.trim().is_empty() {
            return Err(RepositoryError::validation_error("title cannot be empty"));
        }

        let template = TemplateActiveModel {
            id: Set(self.idgen.next_id("FT")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            biz_id: Set(request.biz_id),
            src_id: Set(request.src_id),
            category: Set(request.category),
            api_version: Set("v1".to_string()),
            api_name: Set(request.api_name),
            title: Set(request.title),
            form_type: Set(request.form_type),
            sort_num: Set(request.sort_num),
            keyword: Set(request.keyword),
            remark: Set(request.remark),
            parent_id: Set(request.parent_id),
            from_template_id: Set(None),
            need_login: Set(request.need_login),
            create_time: Set(chrono::Utc::now().into()),
        };

        Ok(template.insert(self.db).await?)
    }

    /// Apply a JSON patch of updatable template columns, then evict the plan.
    pub async fn update_template(
        &self,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<TemplateModel, RepositoryError> {
        let template = self.get_template_required(id).await?;
        let mut active = template.into_active_model();

        if let Some(v) = patch.get("title").and_then(|v| v.as_str()) {
            if v.trim().is_empty() {
                return Err(RepositoryError::validation_error("title cannot be empty"));
            }
            active.title = Set(v.to_string());
        }
        if let Some(v) = patch.get("api_name").and_then(|v| v.as_str()) {
            if TargetModel::from_api_name(v).is_none() {
                return Err(RepositoryError::validation_error(format!(
                    "api_name not in [formdata, org, customer, goods, services]! \"{v}\""
                )));
            }
            active.api_name = Set(v.to_string());
        }
        if let Some(v) = patch.get("form_type").and_then(|v| v.as_i64()) {
            active.form_type = Set(v as i32);
        }
        if let Some(v) = patch.get("sort_num").and_then(|v| v.as_i64()) {
            active.sort_num = Set(v as i32);
        }
        if patch.contains_key("category") {
            active.category = Set(patch
                .get("category")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("keyword") {
            active.keyword = Set(patch
                .get("keyword")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("remark") {
            active.remark = Set(patch
                .get("remark")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("parent_id") {
            active.parent_id = Set(patch
                .get("parent_id")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if let Some(v) = patch.get("need_login").and_then(|v| v.as_bool()) {
            active.need_login = Set(v);
        }

        let updated = active.update(self.db).await?;
        self.plans.invalidate(id);
        Ok(updated)
    }

    /// Delete a template and its descriptors. Data rows are left in place
    /// (stale rows keep pointing at spare columns with no descriptor).
    pub async fn delete_template(&self, id: &str) -> Result<(), RepositoryError> {
        let template = self.get_template_required(id).await?;
        FormTemplate::delete_by_id(template.id.as_str()).exec(self.db).await?;
        self.plans.invalidate(id);
        Ok(())
    }

    /// Ordered field descriptors of a template.
    pub async fn list_fields(&self, template_id: &str) -> Result<Vec<FieldModel>, RepositoryError> {
        Ok(FormField::find()
            .filter(form_field::Column::TemplateId.eq(template_id))
            .order_by_asc(form_field::Column::SortNum)
            .order_by_asc(form_field::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn get_field(&self, id: &str) -> Result<Option<FieldModel>, RepositoryError> {
        Ok(FormField::find_by_id(id).one(self.db).await?)
    }

    /// Create a field descriptor, re-stamping tenant ids from the template.
    pub async fn create_field(
        &self,
        request: CreateFieldRequest,
    ) -> Result<FieldModel, RepositoryError> {
        let template = self.get_template_required(&request.template_id).await?;

        let field = FieldActiveModel {
            id: Set(self.idgen.next_id("FF")),
            sys_id: Set(template.sys_id),
            org_id: Set(template.org_id),
            biz_id: Set(template.biz_id),
            src_id: Set(template.src_id),
            template_id: Set(template.id.clone()),
            col_title: Set(request.col_title),
            alias: Set(request.alias),
            col_name: Set(request.col_name),
            in_filter: Set(request.in_filter),
            is_required: Set(request.is_required),
            widget: Set(request.widget),
            widget_attr: Set(request.widget_attr),
            verify_exp: Set(request.verify_exp),
            related_template_id: Set(request.related_template_id),
            local_data_source: Set(request.local_data_source),
            sort_num: Set(request.sort_num),
            is_related: Set(request.is_related),
            desc: Set(request.desc),
            unique_in_org: Set(request.unique_in_org),
        };

        let created = field.insert(self.db).await?;
        self.plans.invalidate(&template.id);
        Ok(created)
    }

    /// Apply a JSON patch to a field descriptor, re-stamping tenant ids from
    /// the owning template and evicting its plan.
    pub async fn update_field(
        &self,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<FieldModel, RepositoryError> {
        let field = self
            .get_field(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Field not found: {id}")))?;
        let template_id = field.template_id.clone();
        let template = self.get_template_required(&template_id).await?;
        let mut active = field.into_active_model();

        if let Some(v) = patch.get("col_title").and_then(|v| v.as_str()) {
            active.col_title = Set(v.to_string());
        }
        if let Some(v) = patch.get("alias").and_then(|v| v.as_str()) {
            active.alias = Set(v.to_string());
        }
        if let Some(v) = patch.get("col_name").and_then(|v| v.as_str()) {
            active.col_name = Set(v.to_string());
        }
        if let Some(v) = patch.get("in_filter").and_then(|v| v.as_bool()) {
            active.in_filter = Set(v);
        }
        if let Some(v) = patch.get("is_required").and_then(|v| v.as_bool()) {
            active.is_required = Set(v);
        }
        if patch.contains_key("widget") {
            active.widget = Set(patch.get("widget").and_then(|v| v.as_str()).map(str::to_string));
        }
        if patch.contains_key("widget_attr") {
            active.widget_attr = Set(patch
                .get("widget_attr")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("verify_exp") {
            active.verify_exp = Set(patch
                .get("verify_exp")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("related_template_id") {
            active.related_template_id = Set(patch
                .get("related_template_id")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if patch.contains_key("local_data_source") {
            active.local_data_source = Set(patch
                .get("local_data_source")
                .and_then(|v| v.as_str())
                .map(str::to_string));
        }
        if let Some(v) = patch.get("sort_num").and_then(|v| v.as_i64()) {
            active.sort_num = Set(v as i32);
        }
        if let Some(v) = patch.get("is_related").and_then(|v| v.as_bool()) {
            active.is_related = Set(v);
        }
        if patch.contains_key("desc") {
            active.desc = Set(patch.get("desc").and_then(|v| v.as_str()).map(str::to_string));
        }
        if let Some(v) = patch.get("unique_in_org").and_then(|v| v.as_bool()) {
            active.unique_in_org = Set(v);
        }

        // Tenant ids always follow the owning template.
        active.sys_id = Set(template.sys_id);
        active.biz_id = Set(template.biz_id);
        active.src_id = Set(template.src_id);

        let updated = active.update(self.db).await?;
        self.plans.invalidate(&template_id);
        Ok(updated)
    }

    pub async fn delete_field(&self, id: &str) -> Result<(), RepositoryError> {
        let field = self
            .get_field(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Field not found: {id}")))?;
        let template_id = field.template_id.clone();
        FormField::delete_by_id(field.id.as_str()).exec(self.db).await?;
        self.plans.invalidate(&template_id);
        Ok(())
    }

    /// Aggregate definitions of a template.
    pub async fn list_aggregate_fields(
        &self,
        template_id: &str,
    ) -> Result<Vec<AggregateModel>, RepositoryError> {
        Ok(AggregateField::find()
            .filter(form_aggregate_field::Column::TemplateId.eq(template_id))
            .order_by_asc(form_aggregate_field::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn create_aggregate_field(
        &self,
        template_id: &str,
        field_id: &str,
        aggr_type: &str,
        aggr_name: &str,
        description: Option<String>,
    ) -> Result<AggregateModel, RepositoryError> {
        let template = self.get_template_required(template_id).await?;
        if crate::engine::plan::AggrKind::from_str(aggr_type).is_none() {
            return Err(RepositoryError::validation_error(format!(
                "aggr_type not in [count, sum, avg, min, max]! \"{aggr_type}\""
            )));
        }

        let aggregate = AggregateActiveModel {
            id: Set(self.idgen.next_id("FA")),
            sys_id: Set(template.sys_id),
            org_id: Set(template.org_id),
            biz_id: Set(template.biz_id),
            src_id: Set(template.src_id),
            template_id: Set(template.id.clone()),
            field_id: Set(field_id.to_string()),
            aggr_type: Set(Some(aggr_type.to_string())),
            aggr_name: Set(Some(aggr_name.to_string())),
            description: Set(description),
        };

        let created = aggregate.insert(self.db).await?;
        self.plans.invalidate(template_id);
        Ok(created)
    }

    pub async fn delete_aggregate_field(&self, id: &str) -> Result<(), RepositoryError> {
        let aggregate = AggregateField::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Aggregate field not found: {id}")))?;
        let template_id = aggregate.template_id.clone();
        AggregateField::delete_by_id(aggregate.id.as_str()).exec(self.db).await?;
        self.plans.invalidate(&template_id);
        Ok(())
    }

    /// Fetch the compiled plan for a template, building and memoizing it on
    /// a cache miss. The related template (via the obj_id field) is resolved
    /// one level deep.
    pub async fn get_plan(&self, template_id: &str) -> Result<Arc<TemplatePlan>, RepositoryError> {
        if let Some(plan) = self.plans.get(template_id) {
            return Ok(plan);
        }

        let template = self.get_template_required(template_id).await?;
        let fields = self.list_fields(template_id).await?;
        let aggregates = self.list_aggregate_fields(template_id).await?;

        let related_target = match fields
            .iter()
            .find(|f| f.col_name == "obj_id" && f.related_template_id.is_some())
            .and_then(|f| f.related_template_id.clone())
        {
            Some(rel_id) => match self.get_template(&rel_id).await? {
                Some(rel) => TargetModel::from_api_name(&rel.api_name).map(|t| (rel.id, t)),
                None => {
                    tracing::warn!(
                        template_id,
                        related_template_id = %rel_id,
                        "related template missing; related fields will be skipped"
                    );
                    None
                }
            },
            None => None,
        };

        let plan = TemplatePlan::build(&template, &fields, &aggregates, related_target)
            .map_err(|e| RepositoryError::validation_error(e.to_string()))?;
        let plan = Arc::new(plan);
        self.plans.insert(plan.clone());
        Ok(plan)
    }

    /// Copy a template and its field descriptors into a target sys_id under
    /// a new title; records provenance via from_template_id.
    pub async fn copy_template(
        &self,
        source_id: &str,
        target_sys_id: i32,
        new_title: &str,
    ) -> Result<TemplateModel, RepositoryError> {
        if new_title.trim().is_empty() {
            return Err(RepositoryError::validation_error("title cannot be empty"));
        }

        let source = self.get_template_required(source_id).await?;
        let fields = self.list_fields(source_id).await?;

        let copy = TemplateActiveModel {
            id: Set(self.idgen.next_id("FT")),
            sys_id: Set(target_sys_id),
            org_id: Set(source.org_id),
            biz_id: Set(source.biz_id),
            src_id: Set(source.src_id),
            category: Set(source.category.clone()),
            api_version: Set(source.api_version.clone()),
            api_name: Set(source.api_name.clone()),
            title: Set(new_title.to_string()),
            form_type: Set(source.form_type),
            sort_num: Set(source.sort_num),
            keyword: Set(source.keyword.clone()),
            remark: Set(source.remark.clone()),
            parent_id: Set(None),
            from_template_id: Set(Some(source.id.clone())),
            need_login: Set(source.need_login),
            create_time: Set(chrono::Utc::now().into()),
        };
        let copy = copy.insert(self.db).await?;

        for field in fields {
            let cloned = FieldActiveModel {
                id: Set(self.idgen.next_id("FF")),
                sys_id: Set(target_sys_id),
                org_id: Set(field.org_id),
                biz_id: Set(field.biz_id),
                src_id: Set(field.src_id),
                template_id: Set(copy.id.clone()),
                col_title: Set(field.col_title),
                alias: Set(field.alias),
                col_name: Set(field.col_name),
                in_filter: Set(field.in_filter),
                is_required: Set(field.is_required),
                widget: Set(field.widget),
                widget_attr: Set(field.widget_attr),
                verify_exp: Set(field.verify_exp),
                related_template_id: Set(field.related_template_id),
                local_data_source: Set(field.local_data_source),
                sort_num: Set(field.sort_num),
                is_related: Set(field.is_related),
                desc: Set(field.desc),
                unique_in_org: Set(field.unique_in_org),
            };
            cloned.insert(self.db).await?;
        }

        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use sea_orm::Database;

    async fn setup() -> (DatabaseConnection, PlanCache, IdGenerator) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        (db, PlanCache::new(16), IdGenerator::new())
    }

    fn template_request(api_name: &str, sys_id: i32) -> CreateTemplateRequest {
        CreateTemplateRequest {
            sys_id,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            api_name: api_name.to_string(),
            title: "Test template".to_string(),
            form_type: 1,
            sort_num: 1,
            category: None,
            keyword: None,
            remark: None,
            parent_id: None,
            need_login: false,
        }
    }

    fn field_request(template_id: &str, alias: &str, col_name: &str) -> CreateFieldRequest {
        CreateFieldRequest {
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

    #[tokio::test]
    async fn test_create_template_rejects_unknown_api_name() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let result = repo.create_template(template_request("widgets", 1)).await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_field_create_restamps_tenant_ids() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let template = repo
            .create_template(template_request("formdata", 9))
            .await
            .unwrap();
        let field = repo
            .create_field(field_request(&template.id, "name", "field_01"))
            .await
            .unwrap();

        assert_eq!(field.sys_id, 9);
        assert!(field.id.starts_with("FF"));
    }

    #[tokio::test]
    async fn test_plan_cache_eviction_on_field_mutation() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let template = repo
            .create_template(template_request("formdata", 1))
            .await
            .unwrap();
        repo.create_field(field_request(&template.id, "name", "field_01"))
            .await
            .unwrap();

        let plan = repo.get_plan(&template.id).await.unwrap();
        assert_eq!(plan.fields.len(), 1);
        let rebuilds = plans.rebuild_count();

        // Cached access does not rebuild.
        let _ = repo.get_plan(&template.id).await.unwrap();
        assert_eq!(plans.rebuild_count(), rebuilds);

        // A new field evicts; next access rebuilds with the new field.
        repo.create_field(field_request(&template.id, "age", "int_01"))
            .await
            .unwrap();
        let plan = repo.get_plan(&template.id).await.unwrap();
        assert_eq!(plan.fields.len(), 2);
        assert_eq!(plans.rebuild_count(), rebuilds + 1);
    }

    #[tokio::test]
    async fn test_missing_template_is_not_found() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let result = repo.get_plan("FT-missing").await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_template_into_target_sys() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let source = repo
            .create_template(template_request("formdata", 1))
            .await
            .unwrap();
        repo.create_field(field_request(&source.id, "name", "field_01"))
            .await
            .unwrap();

        let copy = repo.copy_template(&source.id, 5, "Copied").await.unwrap();
        assert_eq!(copy.sys_id, 5);
        assert_eq!(copy.from_template_id.as_deref(), Some(source.id.as_str()));
        assert_ne!(copy.id, source.id);

        let fields = repo.list_fields(&copy.id).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].sys_id, 5);
    }

    #[tokio::test]
    async fn test_list_templates_search() {
        let (db, plans, idgen) = setup().await;
        let repo = TemplateRepository::new(&db, &plans, &idgen);

        let mut request = template_request("formdata", 1);
        request.title = "Customer intake".to_string();
        repo.create_template(request).await.unwrap();
        let mut request = template_request("formdata", 1);
        request.title = "Goods ledger".to_string();
        repo.create_template(request).await.unwrap();

        let (count, items) = repo
            .list_templates(Some(1), None, None, Some("intake"), 1, 20)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(items[0].title, "Customer intake");
    }
}
