use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::PlanCatalog,
    domain::entities::plan::{Plan, PlanTier},
};

fn row_to_plan(row: &sqlx::postgres::PgRow) -> AppResult<Plan> {
    let name: String = row.get("name");
    let tier = name
        .parse::<PlanTier>()
        .map_err(|_| AppError::Internal(format!("Unknown plan name in catalog: {}", name)))?;
    Ok(Plan {
        id: row.get("id"),
        tier,
        price_monthly_cents: row.get("price_monthly_cents"),
        price_lifetime_cents: row.get("price_lifetime_cents"),
    })
}

const SELECT_COLS: &str = "id, name, rank, price_monthly_cents, price_lifetime_cents";

#[async_trait]
impl PlanCatalog for PostgresPersistence {
    async fn get_by_name(&self, tier: PlanTier) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE name = $1",
            SELECT_COLS
        ))
        .bind(tier.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!("SELECT {} FROM plans WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn list(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query(&format!("SELECT {} FROM plans ORDER BY rank", SELECT_COLS))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        rows.iter().map(row_to_plan).collect()
    }
}
