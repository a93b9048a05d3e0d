use std::collections::HashMap;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, models::PolicyRow, schema};
use nuri_domain::policy::PolicyRecord;

const POLICY_COLUMNS: &str = "\
id, program_name, region, category, program_overview, apply_target, support_description, url, \
contact_agency, application_deadline, extras";

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &nuri_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Builds a pool without opening a connection; used by tests that never
	/// touch the metadata store.
	pub fn connect_lazy(cfg: &nuri_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect_lazy(&cfg.dsn)?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let lock_id: i64 = 7_210_914;
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(lock_id).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	pub async fn get_policy(&self, policy_id: i64) -> Result<Option<PolicyRecord>> {
		let row: Option<PolicyRow> =
			sqlx::query_as(&format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = $1"))
				.bind(policy_id)
				.fetch_optional(&self.pool)
				.await?;

		Ok(row.map(PolicyRow::into_record))
	}

	/// Returns only the records that exist; unknown ids are simply absent from
	/// the map.
	pub async fn lookup_policies(&self, ids: &[i64]) -> Result<HashMap<i64, PolicyRecord>> {
		if ids.is_empty() {
			return Ok(HashMap::new());
		}

		let rows: Vec<PolicyRow> =
			sqlx::query_as(&format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = ANY($1)"))
				.bind(ids)
				.fetch_all(&self.pool)
				.await?;

		Ok(rows.into_iter().map(|row| (row.id, row.into_record())).collect())
	}

	pub async fn upsert_policy(&self, record: &PolicyRecord) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO policies (
	id,
	program_name,
	region,
	category,
	program_overview,
	apply_target,
	support_description,
	url,
	contact_agency,
	application_deadline,
	extras
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
ON CONFLICT (id) DO UPDATE SET
	program_name = EXCLUDED.program_name,
	region = EXCLUDED.region,
	category = EXCLUDED.category,
	program_overview = EXCLUDED.program_overview,
	apply_target = EXCLUDED.apply_target,
	support_description = EXCLUDED.support_description,
	url = EXCLUDED.url,
	contact_agency = EXCLUDED.contact_agency,
	application_deadline = EXCLUDED.application_deadline,
	extras = EXCLUDED.extras",
		)
		.bind(record.id)
		.bind(&record.program_name)
		.bind(&record.region)
		.bind(&record.category)
		.bind(&record.program_overview)
		.bind(&record.apply_target)
		.bind(&record.support_description)
		.bind(&record.url)
		.bind(&record.contact_agency)
		.bind(&record.application_deadline)
		.bind(serde_json::Value::Object(record.extras.clone()))
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}
