//! # Notice Repository
//!
//! Notices are created pending; the background worker delivers SMS/email and
//! persists the outcome on the row. Failures are visible to operators and
//! never retried automatically.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::notice::{
    ActiveModel as NoticeActiveModel, Entity as Notice, Model as NoticeModel, SEND_FAILED,
    SEND_PENDING, SEND_SENT,
};
use crate::models::notice;

/// Request data for creating a notice.
#[derive(Debug, Clone)]
pub struct CreateNoticeRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub title: String,
    pub content: Option<String>,
    pub notice_type: String,
    pub target_user_id: Option<String>,
    pub target_phone: Option<String>,
    pub target_email: Option<String>,
}

/// Repository for notice operations.
pub struct NoticeRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
}

impl<'a> NoticeRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator) -> Self {
        Self { db, idgen }
    }

    pub async fn create_notice(
        &self,
        request: CreateNoticeRequest,
    ) -> Result<NoticeModel, RepositoryError> {
        if request.title.trim().is_empty() {
            return Err(RepositoryError::validation_error("title cannot be empty"));
        }

        let notice = NoticeActiveModel {
            id: Set(self.idgen.next_id("N")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            biz_id: Set(request.biz_id),
            src_id: Set(request.src_id),
            title: Set(request.title),
            content: Set(request.content),
            notice_type: Set(request.notice_type),
            target_user_id: Set(request.target_user_id),
            target_phone: Set(request.target_phone),
            target_email: Set(request.target_email),
            is_read: Set(false),
            send_status: Set(SEND_PENDING.to_string()),
            send_error: Set(None),
            create_time: Set(chrono::Utc::now().into()),
        };

        Ok(notice.insert(self.db).await?)
    }

    pub async fn get_notice(&self, id: &str) -> Result<Option<NoticeModel>, RepositoryError> {
        Ok(Notice::find_by_id(id).one(self.db).await?)
    }

    pub async fn list_notices(
        &self,
        sys_id: Option<i32>,
        org_id: Option<i32>,
        target_user_id: Option<&str>,
        is_read: Option<bool>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<NoticeModel>), RepositoryError> {
        let mut query = Notice::find().order_by_desc(notice::Column::CreateTime);
        if let Some(sys_id) = sys_id {
            query = query.filter(notice::Column::SysId.eq(sys_id));
        }
        if let Some(org_id) = org_id {
            query = query.filter(notice::Column::OrgId.eq(org_id));
        }
        if let Some(user_id) = target_user_id {
            query = query.filter(notice::Column::TargetUserId.eq(user_id));
        }
        if let Some(is_read) = is_read {
            query = query.filter(notice::Column::IsRead.eq(is_read));
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }

    pub async fn mark_read(&self, id: &str) -> Result<NoticeModel, RepositoryError> {
        let notice = self
            .get_notice(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Notice not found: {id}")))?;
        let mut active = notice.into_active_model();
        active.is_read = Set(true);
        Ok(active.update(self.db).await?)
    }

    /// Record a successful delivery.
    pub async fn mark_sent(&self, id: &str) -> Result<(), RepositoryError> {
        let notice = self
            .get_notice(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Notice not found: {id}")))?;
        let mut active = notice.into_active_model();
        active.send_status = Set(SEND_SENT.to_string());
        active.send_error = Set(None);
        active.update(self.db).await?;
        Ok(())
    }

    /// Persist a delivery failure on the record for operator visibility.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<(), RepositoryError> {
        let notice = self
            .get_notice(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Notice not found: {id}")))?;
        let mut active = notice.into_active_model();
        active.send_status = Set(SEND_FAILED.to_string());
        active.send_error = Set(Some(error.to_string()));
        active.update(self.db).await?;
        Ok(())
    }

    pub async fn delete_notice(&self, id: &str) -> Result<(), RepositoryError> {
        let notice = self
            .get_notice(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Notice not found: {id}")))?;
        Notice::delete_by_id(notice.id.as_str()).exec(self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use sea_orm::Database;

    async fn setup() -> (DatabaseConnection, IdGenerator) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        (db, IdGenerator::new())
    }

    fn request(title: &str) -> CreateNoticeRequest {
        CreateNoticeRequest {
            sys_id: 1,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            title: title.to_string(),
            content: Some("body".to_string()),
            notice_type: "sms".to_string(),
            target_user_id: None,
            target_phone: Some("13800000000".to_string()),
            target_email: None,
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let (db, idgen) = setup().await;
        let repo = NoticeRepository::new(&db, &idgen);

        let notice = repo.create_notice(request("hello")).await.unwrap();
        assert_eq!(notice.send_status, SEND_PENDING);
        assert!(notice.id.starts_with('N'));
    }

    #[tokio::test]
    async fn test_failure_persists_error_on_record() {
        let (db, idgen) = setup().await;
        let repo = NoticeRepository::new(&db, &idgen);

        let notice = repo.create_notice(request("hello")).await.unwrap();
        repo.mark_failed(&notice.id, "gateway timeout").await.unwrap();

        let failed = repo.get_notice(&notice.id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SEND_FAILED);
        assert_eq!(failed.send_error.as_deref(), Some("gateway timeout"));
    }

    #[tokio::test]
    async fn test_list_filters_by_read_state() {
        let (db, idgen) = setup().await;
        let repo = NoticeRepository::new(&db, &idgen);

        let a = repo.create_notice(request("a")).await.unwrap();
        repo.create_notice(request("b")).await.unwrap();
        repo.mark_read(&a.id).await.unwrap();

        let (unread, _) = repo
            .list_notices(Some(1), None, None, Some(false), 1, 20)
            .await
            .unwrap();
        assert_eq!(unread, 1);
    }
}
