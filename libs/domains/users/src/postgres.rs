use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, DbErr, FromQueryResult, Statement, Value};
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{User, UserFilter};
use crate::repository::UserRepository;

/// PostgreSQL user store (table created by the `migration` crate)
#[derive(Clone)]
pub struct PostgresUserRepository {
    db: sea_orm::DatabaseConnection,
}

impl PostgresUserRepository {
    pub fn new(db: sea_orm::DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    password_hash: Option<String>,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
    last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            is_active: row.is_active,
            is_staff: row.is_staff,
            is_superuser: row.is_superuser,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Translate a write error: unique violations become `DuplicateEmail`, the
/// capability check becomes `Validation`, anything else is internal.
fn map_write_error(e: DbErr, email: &str) -> UserError {
    let err_str = e.to_string();
    if err_str.contains("duplicate key") || err_str.contains("unique constraint") {
        UserError::DuplicateEmail(email.to_string())
    } else if err_str.contains(migration::SUPERUSER_REQUIRES_STAFF) {
        UserError::Validation("Superusers must also be staff".to_string())
    } else {
        UserError::Internal(format!("Database error: {}", e))
    }
}

fn map_read_error(e: DbErr) -> UserError {
    UserError::Internal(format!("Database error: {}", e))
}

fn page_bound(n: usize) -> UserResult<i64> {
    i64::try_from(n).map_err(|_| UserError::Validation(format!("Page bound out of range: {}", n)))
}

/// Escape LIKE metacharacters so the term matches literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// WHERE clause and bind values for a change-list filter, starting at `$1`.
fn filter_clause(filter: &UserFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(ref search) = filter.search {
        values.push(format!("%{}%", escape_like(&search.to_lowercase())).into());
        let n = values.len();
        conditions.push(format!(
            "(LOWER(email) LIKE ${n} ESCAPE '\\' OR LOWER(name) LIKE ${n} ESCAPE '\\')"
        ));
    }
    for (column, flag) in [
        ("is_active", filter.is_active),
        ("is_staff", filter.is_staff),
        ("is_superuser", filter.is_superuser),
    ] {
        if let Some(flag) = flag {
            values.push(flag.into());
            conditions.push(format!("{} = ${}", column, values.len()));
        }
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        user.check_capabilities()?;

        let sql = r#"
            INSERT INTO users (id, email, name, password_hash, is_active, is_staff,
                               is_superuser, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.id.into(),
                user.email.clone().into(),
                user.name.clone().into(),
                user.password_hash.clone().into(),
                user.is_active.into(),
                user.is_staff.into(),
                user.is_superuser.into(),
                user.last_login_at.into(),
                user.created_at.into(),
                user.updated_at.into(),
            ],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user.email))?
            .ok_or_else(|| UserError::Internal("Insert returned no row".to_string()))?;

        tracing::debug!(user_id = %row.id, email = %row.email, "Inserted user");
        Ok(row.into())
    }

    async fn update(&self, user: User) -> UserResult<User> {
        user.check_capabilities()?;

        let sql = r#"
            UPDATE users
            SET email = $2, name = $3, password_hash = $4, is_active = $5, is_staff = $6,
                is_superuser = $7, last_login_at = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
        "#;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user.id.into(),
                user.email.clone().into(),
                user.name.clone().into(),
                user.password_hash.clone().into(),
                user.is_active.into(),
                user.is_staff.into(),
                user.is_superuser.into(),
                user.last_login_at.into(),
                user.updated_at.into(),
            ],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user.email))?;

        tracing::debug!(user_id = %user.id, "Updated user");
        row.map(|r| r.into()).ok_or(UserError::NotFound(user.id))
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT * FROM users WHERE id = $1",
            [id.into()],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(map_read_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT * FROM users WHERE email = $1",
            [email.into()],
        );

        let row = UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(map_read_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>> {
        let (where_clause, mut values) = filter_clause(&filter);
        values.push(page_bound(filter.limit)?.into());
        values.push(page_bound(filter.offset)?.into());
        let sql = format!(
            "SELECT * FROM users{} ORDER BY created_at DESC, id DESC LIMIT ${} OFFSET ${}",
            where_clause,
            values.len() - 1,
            values.len()
        );

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let rows = UserRow::find_by_statement(stmt)
            .all(&self.db)
            .await
            .map_err(map_read_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn count(&self, filter: UserFilter) -> UserResult<usize> {
        let (where_clause, values) = filter_clause(&filter);
        let sql = format!("SELECT COUNT(*) AS count FROM users{}", where_clause);

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        #[derive(FromQueryResult)]
        struct CountResult {
            count: i64,
        }

        let result = CountResult::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(map_read_error)?;

        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_clause_empty() {
        let (clause, values) = filter_clause(&UserFilter::default());
        assert!(clause.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn test_filter_clause_numbers_placeholders_in_order() {
        let filter = UserFilter {
            search: Some("Doe".into()),
            is_staff: Some(true),
            is_superuser: Some(false),
            ..UserFilter::default()
        };
        let (clause, values) = filter_clause(&filter);
        assert_eq!(
            clause,
            r" WHERE (LOWER(email) LIKE $1 ESCAPE '\' OR LOWER(name) LIKE $1 ESCAPE '\') AND is_staff = $2 AND is_superuser = $3"
        );
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_filter_clause_escapes_like_wildcards() {
        let filter = UserFilter {
            search: Some(r"50%_off\".into()),
            ..UserFilter::default()
        };
        let (_, values) = filter_clause(&filter);
        assert_eq!(values, vec![Value::from(r"%50\%\_off\\%".to_string())]);
    }

    #[test]
    fn test_page_bound_rejects_values_past_i64() {
        assert_eq!(page_bound(25).unwrap(), 25);
        assert!(matches!(
            page_bound(usize::MAX),
            Err(UserError::Validation(_))
        ));
    }

    #[test]
    fn test_map_write_error_variants() {
        let unique = DbErr::Custom(
            "duplicate key value violates unique constraint \"users_email_key\"".into(),
        );
        assert!(matches!(
            map_write_error(unique, "a@example.com"),
            UserError::DuplicateEmail(email) if email == "a@example.com"
        ));

        let check = DbErr::Custom(format!(
            "new row violates check constraint \"{}\"",
            migration::SUPERUSER_REQUIRES_STAFF
        ));
        assert!(matches!(
            map_write_error(check, "a@example.com"),
            UserError::Validation(_)
        ));

        let other = DbErr::Custom("connection reset".into());
        assert!(matches!(
            map_write_error(other, "a@example.com"),
            UserError::Internal(_)
        ));
    }
}
