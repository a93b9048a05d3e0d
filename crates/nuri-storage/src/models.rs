use serde_json::Value;

use nuri_domain::policy::PolicyRecord;

#[derive(Debug, sqlx::FromRow)]
pub struct PolicyRow {
	pub id: i64,
	pub program_name: String,
	pub region: String,
	pub category: String,
	pub program_overview: String,
	pub apply_target: String,
	pub support_description: String,
	pub url: Option<String>,
	pub contact_agency: Option<String>,
	pub application_deadline: Option<String>,
	pub extras: Value,
}
impl PolicyRow {
	pub fn into_record(self) -> PolicyRecord {
		let extras = match self.extras {
			Value::Object(map) => map,
			_ => serde_json::Map::new(),
		};

		PolicyRecord {
			id: self.id,
			program_name: self.program_name,
			region: self.region,
			category: self.category,
			program_overview: self.program_overview,
			apply_target: self.apply_target,
			support_description: self.support_description,
			url: self.url,
			contact_agency: self.contact_agency,
			application_deadline: self.application_deadline,
			extras,
		}
	}
}
