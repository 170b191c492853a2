pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_people.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_people.sql")),
				"tables/002_waiting_entries.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_waiting_entries.sql")),
				"tables/003_edges.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_edges.sql")),
				"tables/004_generations.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_generations.sql")),
				"tables/005_matches.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_matches.sql")),
				"tables/006_match_participants.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_match_participants.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
