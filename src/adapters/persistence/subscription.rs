use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        CreateSubscriptionInput, ExpireOutcome, SubscriptionRepo,
    },
    domain::entities::subscription::{Subscription, SubscriptionCounts, SubscriptionType},
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        payment_id: row.get("payment_id"),
        subscription_type: row.get::<SubscriptionType, _>("subscription_type"),
        sub_start: row.get("sub_start"),
        sub_end: row.get("sub_end"),
        is_active: row.get("is_active"),
        fallback_subscription_id: row.get("fallback_subscription_id"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, plan_id, payment_id, subscription_type, sub_start, sub_end,
    is_active, fallback_subscription_id, created_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND is_active",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions ORDER BY created_at",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM subscriptions
               WHERE is_active AND subscription_type = $1 AND sub_end <= $2
               ORDER BY sub_end"#,
            SELECT_COLS
        ))
        .bind(SubscriptionType::Monthly)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn count_by_active(&self) -> AppResult<SubscriptionCounts> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) FILTER (WHERE is_active) AS active,
                      COUNT(*) FILTER (WHERE NOT is_active) AS expired
               FROM subscriptions"#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(SubscriptionCounts {
            active: row.get("active"),
            expired: row.get("expired"),
        })
    }

    async fn create_active(
        &self,
        input: &CreateSubscriptionInput,
        supersedes: Option<Uuid>,
    ) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Serializes writers for this user, including the no-active-row case FOR UPDATE can't lock.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(input.user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        let current: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM subscriptions WHERE user_id = $1 AND is_active FOR UPDATE",
        )
        .bind(input.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if current != supersedes {
            return Err(AppError::Conflict(
                "Active subscription changed concurrently".into(),
            ));
        }

        if let Some(old_id) = supersedes {
            sqlx::query("UPDATE subscriptions SET is_active = false WHERE id = $1")
                .bind(old_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        }

        let row = sqlx::query(&format!(
            r#"INSERT INTO subscriptions
                   (id, user_id, plan_id, payment_id, subscription_type, sub_start, sub_end,
                    is_active, fallback_subscription_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(&input.payment_id)
        .bind(input.subscription_type)
        .bind(input.sub_start)
        .bind(input.sub_end)
        .bind(input.fallback_subscription_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn expire(&self, id: Uuid, promote: Option<Uuid>) -> AppResult<ExpireOutcome> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let claimed: Option<Uuid> = sqlx::query_scalar(
            "UPDATE subscriptions SET is_active = false WHERE id = $1 AND is_active RETURNING user_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(user_id) = claimed else {
            return Ok(ExpireOutcome::AlreadyClaimed);
        };

        let mut promoted: Option<Uuid> = None;
        if let Some(fallback_id) = promote {
            promoted = sqlx::query_scalar(
                r#"UPDATE subscriptions SET is_active = true
                   WHERE id = $1 AND user_id = $2 AND subscription_type = $3 AND NOT is_active
                   RETURNING id"#,
            )
            .bind(fallback_id)
            .bind(user_id)
            .bind(SubscriptionType::Lifetime)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;

        Ok(match promoted {
            Some(fallback_id) => ExpireOutcome::ExpiredWithFallback { fallback_id },
            None => ExpireOutcome::Expired,
        })
    }
}
