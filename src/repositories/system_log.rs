//! # System Log Repository
//!
//! The audit trail written by data mutations (single and bulk).

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::system_log::{
    ActiveModel as LogActiveModel, Entity as SystemLog, Model as LogModel,
};
use crate::models::system_log;

/// Repository for audit log rows.
pub struct SystemLogRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
}

impl<'a> SystemLogRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator) -> Self {
        Self { db, idgen }
    }

    pub async fn write(
        &self,
        sys_id: i32,
        org_id: i32,
        log_type: &str,
        template_id: Option<&str>,
        user_name: Option<&str>,
        content: String,
    ) -> Result<LogModel, RepositoryError> {
        let log = LogActiveModel {
            id: Set(self.idgen.next_id("L")),
            sys_id: Set(sys_id),
            org_id: Set(org_id),
            log_level: Set(0),
            log_type: Set(log_type.to_string()),
            template_id: Set(template_id.map(str::to_string)),
            user_name: Set(user_name.map(str::to_string)),
            content: Set(Some(content)),
            create_time: Set(chrono::Utc::now().into()),
        };

        Ok(log.insert(self.db).await?)
    }

    pub async fn list(
        &self,
        sys_id: Option<i32>,
        template_id: Option<&str>,
        log_type: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<LogModel>), RepositoryError> {
        let mut query = SystemLog::find().order_by_desc(system_log::Column::CreateTime);
        if let Some(sys_id) = sys_id {
            query = query.filter(system_log::Column::SysId.eq(sys_id));
        }
        if let Some(template_id) = template_id {
            query = query.filter(system_log::Column::TemplateId.eq(template_id));
        }
        if let Some(log_type) = log_type {
            query = query.filter(system_log::Column::LogType.eq(log_type));
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_write_and_list() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let idgen = IdGenerator::new();
        let repo = SystemLogRepository::new(&db, &idgen);

        repo.write(1, 2, "delete", Some("FT1"), Some("alice"), "DELETE: D1".to_string())
            .await
            .unwrap();
        repo.write(1, 2, "update", Some("FT2"), None, "UPDATE: D2".to_string())
            .await
            .unwrap();

        let (count, items) = repo.list(Some(1), Some("FT1"), None, 1, 20).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(items[0].log_type, "delete");
        assert_eq!(items[0].user_name.as_deref(), Some("alice"));
    }
}
