//! # Account Repository
//!
//! Accounts and their ledger statements. Posting a statement adjusts the
//! owning account's matching balance slot in the same transaction.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::account::{
    ActiveModel as AccountActiveModel, Entity as Account, Model as AccountModel,
};
use crate::models::account_statement::{
    ActiveModel as StatementActiveModel, Entity as AccountStatement, Model as StatementModel,
    RECORD_EXPENSE, RECORD_INCOME, RECORD_LOCK, RECORD_PAYMENT,
};
use crate::models::{account, account_statement};

/// Request data for creating an account.
#[derive(Debug, Clone, Default)]
pub struct CreateAccountRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub user_id: Option<String>,
    pub obj_id: Option<String>,
    pub acc_1_name: Option<String>,
    pub acc_1_type: Option<String>,
    pub acc_2_name: Option<String>,
    pub acc_2_type: Option<String>,
    pub acc_3_name: Option<String>,
    pub acc_3_type: Option<String>,
    pub points_name: Option<String>,
}

/// Request data for posting a statement.
#[derive(Debug, Clone)]
pub struct PostStatementRequest {
    pub account_id: String,
    /// Balance slot: acc_1, acc_2, acc_3 or points
    pub acc_name: String,
    /// income, expense, lock, payment
    pub record_type: String,
    pub amount: Decimal,
    pub order_num: Option<String>,
    pub remark: Option<String>,
}

/// Repository for account and ledger operations.
pub struct AccountRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
}

impl<'a> AccountRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator) -> Self {
        Self { db, idgen }
    }

    pub async fn create_account(
        &self,
        request: CreateAccountRequest,
    ) -> Result<AccountModel, RepositoryError> {
        let account = AccountActiveModel {
            id: Set(self.idgen.next_id("ACC")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            biz_id: Set(request.biz_id),
            src_id: Set(request.src_id),
            user_id: Set(request.user_id),
            obj_id: Set(request.obj_id),
            acc_1_name: Set(request.acc_1_name),
            acc_1_type: Set(request.acc_1_type),
            acc_1_balance: Set(Decimal::ZERO),
            acc_1_lock: Set(Decimal::ZERO),
            acc_2_name: Set(request.acc_2_name),
            acc_2_type: Set(request.acc_2_type),
            acc_2_balance: Set(Decimal::ZERO),
            acc_2_lock: Set(Decimal::ZERO),
            acc_3_name: Set(request.acc_3_name),
            acc_3_type: Set(request.acc_3_type),
            acc_3_balance: Set(Decimal::ZERO),
            acc_3_lock: Set(Decimal::ZERO),
            points_name: Set(request.points_name),
            points_balance: Set(Decimal::ZERO),
            create_time: Set(chrono::Utc::now().into()),
            update_time: Set(None),
        };

        Ok(account.insert(self.db).await?)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<AccountModel>, RepositoryError> {
        Ok(Account::find_by_id(id).one(self.db).await?)
    }

    pub async fn list_accounts(
        &self,
        sys_id: Option<i32>,
        org_id: Option<i32>,
        obj_id: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<AccountModel>), RepositoryError> {
        let mut query = Account::find().order_by_desc(account::Column::CreateTime);
        if let Some(sys_id) = sys_id {
            query = query.filter(account::Column::SysId.eq(sys_id));
        }
        if let Some(org_id) = org_id {
            query = query.filter(account::Column::OrgId.eq(org_id));
        }
        if let Some(obj_id) = obj_id {
            query = query.filter(account::Column::ObjId.eq(obj_id));
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }

    pub async fn delete_account(&self, id: &str) -> Result<(), RepositoryError> {
        let account = self
            .get_account(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Account not found: {id}")))?;
        Account::delete_by_id(account.id.as_str()).exec(self.db).await?;
        Ok(())
    }

    pub async fn list_statements(
        &self,
        account_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<StatementModel>), RepositoryError> {
        let query = AccountStatement::find()
            .filter(account_statement::Column::AccountId.eq(account_id))
            .order_by_desc(account_statement::Column::CreateTime);

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }

    /// Post a ledger statement and adjust the owning account's balance slot
    /// atomically. income credits the slot; expense and payment debit it
    /// (rejected when the balance is insufficient); lock moves the amount
    /// from the balance into the slot's lock column.
    pub async fn post_statement(
        &self,
        request: PostStatementRequest,
    ) -> Result<StatementModel, RepositoryError> {
        if request.amount <= Decimal::ZERO {
            return Err(RepositoryError::validation_error(
                "amount must be greater than zero",
            ));
        }

        let txn = self.db.begin().await?;

        let account = Account::find_by_id(request.account_id.as_str())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Account not found: {}", request.account_id))
            })?;

        let (mut balance, mut lock) = match request.acc_name.as_str() {
            "acc_1" => (account.acc_1_balance, account.acc_1_lock),
            "acc_2" => (account.acc_2_balance, account.acc_2_lock),
            "acc_3" => (account.acc_3_balance, account.acc_3_lock),
            "points" => (account.points_balance, Decimal::ZERO),
            other => {
                return Err(RepositoryError::validation_error(format!(
                    "acc_name not in [acc_1, acc_2, acc_3, points]! \"{other}\""
                )));
            }
        };

        match request.record_type.as_str() {
            RECORD_INCOME => balance += request.amount,
            RECORD_EXPENSE | RECORD_PAYMENT => {
                if balance < request.amount {
                    return Err(RepositoryError::validation_error(format!(
                        "insufficient balance on {}: {} < {}",
                        request.acc_name, balance, request.amount
                    )));
                }
                balance -= request.amount;
            }
            RECORD_LOCK => {
                if request.acc_name == "points" {
                    return Err(RepositoryError::validation_error(
                        "points balance cannot be locked",
                    ));
                }
                if balance < request.amount {
                    return Err(RepositoryError::validation_error(format!(
                        "insufficient balance on {}: {} < {}",
                        request.acc_name, balance, request.amount
                    )));
                }
                balance -= request.amount;
                lock += request.amount;
            }
            other => {
                return Err(RepositoryError::validation_error(format!(
                    "record_type not in [income, expense, lock, payment]! \"{other}\""
                )));
            }
        }

        let statement = StatementActiveModel {
            id: Set(self.idgen.next_id("ACCS")),
            sys_id: Set(account.sys_id),
            org_id: Set(account.org_id),
            biz_id: Set(account.biz_id),
            src_id: Set(account.src_id),
            account_id: Set(account.id.clone()),
            acc_name: Set(Some(request.acc_name.clone())),
            record_type: Set(request.record_type.clone()),
            amount: Set(request.amount),
            order_num: Set(request.order_num),
            remark: Set(request.remark),
            create_time: Set(chrono::Utc::now().into()),
        };
        let statement = statement.insert(&txn).await?;

        let mut active = account.into_active_model();
        match request.acc_name.as_str() {
            "acc_1" => {
                active.acc_1_balance = Set(balance);
                active.acc_1_lock = Set(lock);
            }
            "acc_2" => {
                active.acc_2_balance = Set(balance);
                active.acc_2_lock = Set(lock);
            }
            "acc_3" => {
                active.acc_3_balance = Set(balance);
                active.acc_3_lock = Set(lock);
            }
            _ => active.points_balance = Set(balance),
        }
        active.update_time = Set(Some(chrono::Utc::now().into()));
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(statement)
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

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn account(repo: &AccountRepository<'_>) -> AccountModel {
        repo.create_account(CreateAccountRequest {
            sys_id: 1,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            acc_1_name: Some("cash".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_income_then_expense() {
        let (db, idgen) = setup().await;
        let repo = AccountRepository::new(&db, &idgen);
        let acc = account(&repo).await;

        repo.post_statement(PostStatementRequest {
            account_id: acc.id.clone(),
            acc_name: "acc_1".to_string(),
            record_type: RECORD_INCOME.to_string(),
            amount: dec("100.5"),
            order_num: None,
            remark: None,
        })
        .await
        .unwrap();

        repo.post_statement(PostStatementRequest {
            account_id: acc.id.clone(),
            acc_name: "acc_1".to_string(),
            record_type: RECORD_EXPENSE.to_string(),
            amount: dec("40"),
            order_num: Some("ORD-1".to_string()),
            remark: None,
        })
        .await
        .unwrap();

        let updated = repo.get_account(&acc.id).await.unwrap().unwrap();
        assert_eq!(updated.acc_1_balance, dec("60.5"));

        let (count, _) = repo.list_statements(&acc.id, 1, 20).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_overdraft_rejected() {
        let (db, idgen) = setup().await;
        let repo = AccountRepository::new(&db, &idgen);
        let acc = account(&repo).await;

        let result = repo
            .post_statement(PostStatementRequest {
                account_id: acc.id.clone(),
                acc_name: "acc_1".to_string(),
                record_type: RECORD_EXPENSE.to_string(),
                amount: dec("10"),
                order_num: None,
                remark: None,
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));

        // Balance untouched, no statement row written.
        let unchanged = repo.get_account(&acc.id).await.unwrap().unwrap();
        assert_eq!(unchanged.acc_1_balance, Decimal::ZERO);
        let (count, _) = repo.list_statements(&acc.id, 1, 20).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_lock_moves_balance_into_lock() {
        let (db, idgen) = setup().await;
        let repo = AccountRepository::new(&db, &idgen);
        let acc = account(&repo).await;

        repo.post_statement(PostStatementRequest {
            account_id: acc.id.clone(),
            acc_name: "acc_1".to_string(),
            record_type: RECORD_INCOME.to_string(),
            amount: dec("50"),
            order_num: None,
            remark: None,
        })
        .await
        .unwrap();

        repo.post_statement(PostStatementRequest {
            account_id: acc.id.clone(),
            acc_name: "acc_1".to_string(),
            record_type: RECORD_LOCK.to_string(),
            amount: dec("20"),
            order_num: None,
            remark: None,
        })
        .await
        .unwrap();

        let updated = repo.get_account(&acc.id).await.unwrap().unwrap();
        assert_eq!(updated.acc_1_balance, dec("30"));
        assert_eq!(updated.acc_1_lock, dec("20"));
    }
}
