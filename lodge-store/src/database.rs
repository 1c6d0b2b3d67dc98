use lodge_shared::PackageAvailability;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(Debug, sqlx::FromRow)]
struct CapacityRow {
    available: i32,
    reserved: i32,
    sold: i32,
    max_capacity: i32,
}

impl From<CapacityRow> for PackageAvailability {
    fn from(row: CapacityRow) -> Self {
        PackageAvailability::new(row.available, row.reserved, row.sold, row.max_capacity)
    }
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub async fn fetch_package_availability(
        &self,
        package_id: &str,
    ) -> Result<Option<PackageAvailability>, sqlx::Error> {
        let row = sqlx::query_as::<_, CapacityRow>(
            "SELECT available, reserved, sold, max_capacity FROM package_capacity WHERE package_id = $1",
        )
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PackageAvailability::from))
    }

    /// Upserts the capacity row; used by admin pushes so the next fetch agrees
    /// with what subscribers were sent.
    pub async fn upsert_package_availability(
        &self,
        package_id: &str,
        availability: &PackageAvailability,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO package_capacity (package_id, available, reserved, sold, max_capacity, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (package_id) DO UPDATE
            SET available = EXCLUDED.available,
                reserved = EXCLUDED.reserved,
                sold = EXCLUDED.sold,
                max_capacity = EXCLUDED.max_capacity,
                updated_at = NOW()
            "#,
        )
        .bind(package_id)
        .bind(availability.available)
        .bind(availability.reserved)
        .bind(availability.sold)
        .bind(availability.max)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_ticket_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let flag: Option<bool> = sqlx::query_scalar(
            "SELECT high_demand FROM ticket_demand WHERE event_id = $1 AND ticket_definition_id = $2",
        )
        .bind(event_id)
        .bind(ticket_definition_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flag.unwrap_or(false))
    }
}
