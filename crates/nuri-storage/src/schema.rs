pub fn render_schema() -> String {
	"\
CREATE TABLE IF NOT EXISTS policies (
	id BIGINT PRIMARY KEY,
	program_name TEXT NOT NULL,
	region TEXT NOT NULL,
	category TEXT NOT NULL,
	program_overview TEXT NOT NULL DEFAULT '',
	apply_target TEXT NOT NULL DEFAULT '',
	support_description TEXT NOT NULL DEFAULT '',
	url TEXT,
	contact_agency TEXT,
	application_deadline TEXT,
	extras JSONB NOT NULL DEFAULT '{}'::jsonb
);
CREATE INDEX IF NOT EXISTS idx_policies_region ON policies (region);
CREATE INDEX IF NOT EXISTS idx_policies_category ON policies (category)"
		.to_string()
}
