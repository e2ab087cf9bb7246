//! `PostgreSQL` store built on runtime `sqlx` queries.

use sqlx::types::Json;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tutor::materials::MaterialItem;
use tutor::subscription::Subscription;
use tutor::{Conversation, Message};
use uuid::Uuid;

use super::{
    Account, AccountStore, ChatLogFilter, ChatLogPage, ChatLogStore, MaterialStore, Payment, StoreError,
    SubscriptionStore, Usage, UsageStore, total_pages,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("{column}: unexpected value {raw:?}")))
}

fn to_count(raw: i32) -> u32 {
    u32::try_from(raw).unwrap_or(0)
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account { id: row.get("id"), email: row.get("email"), name: row.get("name"), created_at: row.get("created_at") }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait::async_trait]
impl AccountStore for PgStore {
    async fn upsert_account(&self, email: &str, name: &str) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO users (email, name)
              VALUES ($1, $2)
              ON CONFLICT (email) DO UPDATE SET name = users.name
              RETURNING id, email, name, created_at",
        )
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(account_from_row(&row))
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn insert_session(&self, token: &str, account_id: Uuid, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn account_for_session(&self, token: &str, now: OffsetDateTime) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r"SELECT u.id, u.email, u.name, u.created_at
              FROM sessions s
              JOIN users u ON u.id = s.user_id
              WHERE s.token = $1 AND s.expires_at > $2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_login_code(
        &self,
        email: &str,
        code_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM email_login_codes WHERE email = $1 AND consumed_at IS NULL")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO email_login_codes (email, code_hash, expires_at) VALUES ($1, $2, $3)")
            .bind(email)
            .bind(code_hash)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn check_login_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
    ) -> Result<bool, StoreError> {
        let consumed = sqlx::query(
            r"UPDATE email_login_codes
              SET consumed_at = $3
              WHERE id = (
                  SELECT id
                  FROM email_login_codes
                  WHERE email = $1
                    AND consumed_at IS NULL
                    AND expires_at > $3
                  ORDER BY created_at DESC
                  LIMIT 1
              )
              AND code_hash = $2
              RETURNING id",
        )
        .bind(email)
        .bind(code_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        if consumed.is_some() {
            return Ok(true);
        }

        sqlx::query(
            r"UPDATE email_login_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $2 THEN $3 ELSE consumed_at END
              WHERE id = (
                  SELECT id
                  FROM email_login_codes
                  WHERE email = $1
                    AND consumed_at IS NULL
                    AND expires_at > $3
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(email)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(false)
    }
}

// =============================================================================
// CHAT LOGS
// =============================================================================

fn conversation_from_row(row: &sqlx::postgres::PgRow) -> Result<Conversation, StoreError> {
    let Json(messages): Json<Vec<Message>> = row.try_get("messages")?;
    let level: String = row.get("level");
    let week: String = row.get("week");
    let gender: String = row.get("gender");
    let language: String = row.get("language");
    Ok(Conversation {
        session_id: row.get("session_id"),
        owner_id: row.get("owner_id"),
        owner_email: row.get("owner_email"),
        owner_name: row.get("owner_name"),
        messages,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        level: parse_column("level", &level)?,
        week: parse_column("week", &week)?,
        gender: parse_column("gender", &gender)?,
        language: parse_column("language", &language)?,
    })
}

const CHAT_LOG_COLUMNS: &str = "session_id, owner_id, owner_email, owner_name, level, week, gender, language, \
                                messages, created_at, updated_at";

/// `WHERE` clause shared by the count and page queries. Parameters `$1..$5`
/// are bound in [`bind_filter`] order.
const CHAT_LOG_WHERE: &str = r"WHERE ($1::text IS NULL OR owner_id ILIKE '%' || $1 || '%')
      AND ($2::text IS NULL OR owner_email ILIKE '%' || $2 || '%')
      AND ($3::timestamptz IS NULL OR created_at >= $3)
      AND ($4::timestamptz IS NULL OR created_at <= $4)
      AND ($5::text IS NULL
           OR owner_name ILIKE '%' || $5 || '%'
           OR owner_email ILIKE '%' || $5 || '%'
           OR owner_id ILIKE '%' || $5 || '%'
           OR session_id ILIKE '%' || $5 || '%')";

fn bind_filter<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    filter: &'q ChatLogFilter,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let part = |v: Option<&'q str>| v.map(str::trim).filter(|s| !s.is_empty());
    query
        .bind(part(filter.owner_id.as_deref()))
        .bind(part(filter.owner_email.as_deref()))
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(part(filter.search_term.as_deref()))
}

#[async_trait::async_trait]
impl ChatLogStore for PgStore {
    async fn get(&self, session_id: &str) -> Result<Option<Conversation>, StoreError> {
        let sql = format!("SELECT {CHAT_LOG_COLUMNS} FROM chat_logs WHERE session_id = $1");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn upsert(&self, c: &Conversation) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO chat_logs
                  (session_id, owner_id, owner_email, owner_name, level, week, gender, language,
                   messages, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
              ON CONFLICT (session_id) DO UPDATE SET
                  owner_email = EXCLUDED.owner_email,
                  owner_name = EXCLUDED.owner_name,
                  level = EXCLUDED.level,
                  week = EXCLUDED.week,
                  gender = EXCLUDED.gender,
                  language = EXCLUDED.language,
                  messages = EXCLUDED.messages,
                  updated_at = EXCLUDED.updated_at",
        )
        .bind(&c.session_id)
        .bind(&c.owner_id)
        .bind(&c.owner_email)
        .bind(&c.owner_name)
        .bind(c.level.as_str())
        .bind(c.week.to_string())
        .bind(c.gender.as_str())
        .bind(c.language.as_str())
        .bind(Json(&c.messages))
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &ChatLogFilter) -> Result<ChatLogPage, StoreError> {
        let count_sql = format!("SELECT count(*) AS total FROM chat_logs {CHAT_LOG_WHERE}");
        let total: i64 = bind_filter(sqlx::query(&count_sql), filter)
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let page_sql = format!(
            "SELECT {CHAT_LOG_COLUMNS} FROM chat_logs {CHAT_LOG_WHERE} \
             ORDER BY created_at DESC, session_id ASC LIMIT $6 OFFSET $7"
        );
        let rows = bind_filter(sqlx::query(&page_sql), filter)
            .bind(i64::from(filter.page_size))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let chats = rows
            .iter()
            .map(conversation_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let total = usize::try_from(total).unwrap_or(0);
        Ok(ChatLogPage { chats, total_pages: total_pages(total, filter.page_size) })
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_logs WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_logs")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// MATERIALS
// =============================================================================

#[async_trait::async_trait]
impl MaterialStore for PgStore {
    async fn upsert_many(&self, items: &[MaterialItem]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r"INSERT INTO materials (id, hebrew_input, arabic_response, pronunciation, updated_at)
                  VALUES ($1, $2, $3, $4, now())
                  ON CONFLICT (id) DO UPDATE SET
                      hebrew_input = EXCLUDED.hebrew_input,
                      arabic_response = EXCLUDED.arabic_response,
                      pronunciation = EXCLUDED.pronunciation,
                      updated_at = now()",
            )
            .bind(&item.id)
            .bind(&item.hebrew_input)
            .bind(&item.arabic_response)
            .bind(&item.pronunciation)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(items.len())
    }

    async fn by_prefix(&self, prefix: &str) -> Result<Vec<MaterialItem>, StoreError> {
        let rows = sqlx::query(
            r"SELECT id, hebrew_input, arabic_response, pronunciation
              FROM materials
              WHERE starts_with(id, $1)
              ORDER BY id",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| MaterialItem {
                id: r.get("id"),
                hebrew_input: r.get("hebrew_input"),
                arabic_response: r.get("arabic_response"),
                pronunciation: r.get("pronunciation"),
            })
            .collect())
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

const SUBSCRIPTION_COLUMNS: &str =
    "user_id, user_email, plan, billing_cycle, status, start_date, end_date, auto_renew, transaction_id, updated_at";

fn subscription_from_row(row: &sqlx::postgres::PgRow) -> Result<Subscription, StoreError> {
    let plan: String = row.get("plan");
    let cycle: String = row.get("billing_cycle");
    let status: String = row.get("status");
    Ok(Subscription {
        owner_id: row.get("user_id"),
        owner_email: row.get("user_email"),
        plan: parse_column("plan", &plan)?,
        billing_cycle: parse_column("billing_cycle", &cycle)?,
        status: parse_column("status", &status)?,
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        auto_renew: row.get("auto_renew"),
        transaction_id: row.get("transaction_id"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait::async_trait]
impl SubscriptionStore for PgStore {
    async fn get(&self, owner_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1");
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn put(&self, s: &Subscription) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO subscriptions
                  (user_id, user_email, plan, billing_cycle, status, start_date, end_date,
                   auto_renew, transaction_id, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
              ON CONFLICT (user_id) DO UPDATE SET
                  user_email = EXCLUDED.user_email,
                  plan = EXCLUDED.plan,
                  billing_cycle = EXCLUDED.billing_cycle,
                  status = EXCLUDED.status,
                  start_date = EXCLUDED.start_date,
                  end_date = EXCLUDED.end_date,
                  auto_renew = EXCLUDED.auto_renew,
                  transaction_id = EXCLUDED.transaction_id,
                  updated_at = EXCLUDED.updated_at",
        )
        .bind(s.owner_id)
        .bind(&s.owner_email)
        .bind(s.plan.as_str())
        .bind(s.billing_cycle.as_str())
        .bind(s.status.as_str())
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.auto_renew)
        .bind(s.transaction_id.as_deref())
        .bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due_for_expiry(&self, now: OffsetDateTime) -> Result<Vec<Subscription>, StoreError> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE status IN ('trial', 'active') AND end_date <= $1"
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        rows.iter().map(subscription_from_row).collect()
    }

    async fn record_payment(&self, p: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO payments (transaction_id, user_id, user_email, amount, plan, status, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (transaction_id) DO UPDATE SET status = EXCLUDED.status",
        )
        .bind(&p.transaction_id)
        .bind(p.owner_id)
        .bind(&p.owner_email)
        .bind(p.amount)
        .bind(p.plan.as_str())
        .bind(&p.status)
        .bind(p.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn payment(&self, transaction_id: &str) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(
            r"SELECT transaction_id, user_id, user_email, amount, plan, status, created_at
              FROM payments WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(r) = row else {
            return Ok(None);
        };
        let plan: String = r.get("plan");
        Ok(Some(Payment {
            transaction_id: r.get("transaction_id"),
            owner_id: r.get("user_id"),
            owner_email: r.get("user_email"),
            amount: r.get("amount"),
            plan: parse_column("plan", &plan)?,
            status: r.get("status"),
            created_at: r.get("created_at"),
        }))
    }
}

// =============================================================================
// USAGE
// =============================================================================

#[async_trait::async_trait]
impl UsageStore for PgStore {
    async fn get(&self, owner_id: Uuid, month: &str) -> Result<Usage, StoreError> {
        let row = sqlx::query("SELECT message_count, premium FROM monthly_usage WHERE user_id = $1 AND month = $2")
            .bind(owner_id)
            .bind(month)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(r) => Usage {
                owner_id,
                month: month.to_owned(),
                message_count: to_count(r.get("message_count")),
                premium: r.get("premium"),
            },
            None => Usage::empty(owner_id, month),
        })
    }

    async fn increment(&self, owner_id: Uuid, month: &str) -> Result<u32, StoreError> {
        let row = sqlx::query(
            r"INSERT INTO monthly_usage (user_id, month, message_count)
              VALUES ($1, $2, 1)
              ON CONFLICT (user_id, month) DO UPDATE
                  SET message_count = monthly_usage.message_count + 1
              RETURNING message_count",
        )
        .bind(owner_id)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(row.get("message_count")))
    }

    async fn set_premium(&self, owner_id: Uuid, month: &str, premium: bool) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO monthly_usage (user_id, month, premium)
              VALUES ($1, $2, $3)
              ON CONFLICT (user_id, month) DO UPDATE SET premium = EXCLUDED.premium",
        )
        .bind(owner_id)
        .bind(month)
        .bind(premium)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
