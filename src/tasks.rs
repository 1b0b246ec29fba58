//! # Background Tasks
//!
//! In-process task queue for the async fan-out the request path triggers:
//! ETL push on create/update, related-object cleanup after deletes, and
//! notice delivery. One worker drains a bounded channel; failures are
//! logged (and, for notices, persisted on the record) without retry or
//! backoff beyond what the queue itself provides.

use std::time::Duration;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio::sync::mpsc;

use crate::engine::query::{DataQuery, clear_obj_refs};
use crate::gateways::{GatewayError, MailClient, SmsClient};
use crate::models::form_field;
use crate::repositories::{NoticeRepository, TemplateRepository};
use crate::server::AppState;

/// Background work items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Push one record to the configured ETL webhook.
    EtlPush {
        template_id: String,
        record_id: String,
    },
    /// Null out obj_id references to a deleted record.
    RelatedCleanup {
        template_id: String,
        record_id: String,
    },
    /// Deliver one notice through the SMS/email gateways.
    NoticeDelivery { notice_id: String },
}

/// Producer handle for the background queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
}

impl TaskQueue {
    /// Create a queue with the given depth; the receiver side goes to
    /// [`run_worker`].
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without blocking the request path; a full queue drops the
    /// task with a logged error.
    pub fn enqueue(&self, task: Task) {
        if let Err(err) = self.tx.try_send(task) {
            tracing::error!("task queue full, dropping task: {err}");
        }
    }
}

/// Drain the queue until all producers are gone, sweeping expired cache
/// entries between tasks.
pub async fn run_worker(state: AppState, mut rx: mpsc::Receiver<Task>) {
    let mut sweep = tokio::time::interval(Duration::from_secs(60));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            task = rx.recv() => {
                match task {
                    Some(task) => {
                        metrics::counter!("formbase_tasks_total").increment(1);
                        if let Err(err) = handle_task(&state, task.clone()).await {
                            metrics::counter!("formbase_tasks_failed_total").increment(1);
                            tracing::error!(?task, "background task failed: {err}");
                        }
                    }
                    None => break,
                }
            }
            _ = sweep.tick() => {
                let purged = state.cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "swept expired cache entries");
                }
            }
        }
    }
}

/// Execute one task. Split out of the worker loop so tests can drive it
/// synchronously.
pub async fn handle_task(state: &AppState, task: Task) -> anyhow::Result<()> {
    match task {
        Task::EtlPush {
            template_id,
            record_id,
        } => etl_push(state, &template_id, &record_id).await,
        Task::RelatedCleanup {
            template_id,
            record_id,
        } => related_cleanup(state, &template_id, &record_id).await,
        Task::NoticeDelivery { notice_id } => notice_delivery(state, &notice_id).await,
    }
}

async fn etl_push(state: &AppState, template_id: &str, record_id: &str) -> anyhow::Result<()> {
    let Some(webhook) = state.config.etl_webhook_url.as_deref() else {
        return Ok(());
    };

    let repo = TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    let plan = repo.get_plan(template_id).await?;
    let Some(row) = DataQuery::new(&state.db, &plan).get(record_id).await? else {
        tracing::warn!(template_id, record_id, "record vanished before ETL push");
        return Ok(());
    };

    let response = reqwest::Client::new()
        .post(webhook)
        .json(&serde_json::json!({
            "template_id": template_id,
            "record_id": record_id,
            "data": row,
        }))
        .send()
        .await?;
    if !response.status().is_success() {
        anyhow::bail!("ETL webhook returned status {}", response.status());
    }
    Ok(())
}

async fn related_cleanup(
    state: &AppState,
    template_id: &str,
    record_id: &str,
) -> anyhow::Result<()> {
    // Only templates actually referenced through an obj_id field need the
    // sweep; otherwise nothing can point at the deleted row.
    let referencing = form_field::Entity::find()
        .filter(form_field::Column::RelatedTemplateId.eq(template_id))
        .filter(form_field::Column::ColName.eq("obj_id"))
        .one(&state.db)
        .await?;
    if referencing.is_none() {
        return Ok(());
    }

    let cleared = clear_obj_refs(&state.db, &[record_id.to_string()]).await?;
    tracing::info!(template_id, record_id, cleared, "related references cleared");
    Ok(())
}

async fn notice_delivery(state: &AppState, notice_id: &str) -> anyhow::Result<()> {
    let repo = NoticeRepository::new(&state.db, &state.idgen);
    let Some(notice) = repo.get_notice(notice_id).await? else {
        tracing::warn!(notice_id, "notice vanished before delivery");
        return Ok(());
    };

    let body = notice.content.clone().unwrap_or_default();
    let outcome: Result<(), GatewayError> = match notice.notice_type.as_str() {
        "sms" => match &notice.target_phone {
            Some(phone) => {
                SmsClient::new(state.config.sms.clone())
                    .send(phone, &body)
                    .await
            }
            None => Err(GatewayError::Rejected("notice has no target phone".to_string())),
        },
        "email" => match &notice.target_email {
            Some(email) => {
                MailClient::new(state.config.mail.clone())
                    .send(email, &notice.title, &body)
                    .await
            }
            None => Err(GatewayError::Rejected("notice has no target email".to_string())),
        },
        // In-app notices have nothing to deliver.
        _ => Ok(()),
    };

    match outcome {
        Ok(()) => repo.mark_sent(notice_id).await?,
        Err(err) => {
            // Persist for operator visibility; no automatic retry.
            repo.mark_failed(notice_id, &err.to_string()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notice::{SEND_FAILED, SEND_SENT};
    use crate::repositories::notice::CreateNoticeRequest;
    use crate::server::test_support::test_state;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn notice(state: &AppState, notice_type: &str) -> String {
        let repo = NoticeRepository::new(&state.db, &state.idgen);
        repo.create_notice(CreateNoticeRequest {
            sys_id: 1,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            title: "Login code".to_string(),
            content: Some("123456".to_string()),
            notice_type: notice_type.to_string(),
            target_user_id: None,
            target_phone: Some("13800000000".to_string()),
            target_email: Some("user@example.com".to_string()),
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_mail_delivery_marks_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut state = test_state().await;
        {
            let config = std::sync::Arc::make_mut(&mut state.config);
            config.mail.endpoint = Some(server.uri());
        }

        let id = notice(&state, "email").await;
        handle_task(&state, Task::NoticeDelivery { notice_id: id.clone() })
            .await
            .unwrap();

        let repo = NoticeRepository::new(&state.db, &state.idgen);
        let delivered = repo.get_notice(&id).await.unwrap().unwrap();
        assert_eq!(delivered.send_status, SEND_SENT);
    }

    #[tokio::test]
    async fn test_gateway_failure_persists_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let mut state = test_state().await;
        {
            let config = std::sync::Arc::make_mut(&mut state.config);
            config.mail.endpoint = Some(server.uri());
        }

        let id = notice(&state, "email").await;
        handle_task(&state, Task::NoticeDelivery { notice_id: id.clone() })
            .await
            .unwrap();

        let repo = NoticeRepository::new(&state.db, &state.idgen);
        let failed = repo.get_notice(&id).await.unwrap().unwrap();
        assert_eq!(failed.send_status, SEND_FAILED);
        assert!(failed.send_error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_in_app_notice_delivers_without_gateway() {
        let state = test_state().await;
        let id = notice(&state, "system").await;
        handle_task(&state, Task::NoticeDelivery { notice_id: id.clone() })
            .await
            .unwrap();

        let repo = NoticeRepository::new(&state.db, &state.idgen);
        let delivered = repo.get_notice(&id).await.unwrap().unwrap();
        assert_eq!(delivered.send_status, SEND_SENT);
    }
}
