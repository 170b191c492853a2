use sqlx::PgConnection;
use time::OffsetDateTime;

use matcher_domain::{EdgeWeight, PairKey, PersonId};

use crate::{
	Error, Result,
	models::{EdgeRow, Generation, MatchDbRow, MatchRow, Person, WaitingEntry, WaitingRow},
};

/// Seeds a person. Registration proper lives outside this crate.
pub async fn insert_person(executor: &mut PgConnection, name: &str, email: &str) -> Result<Person> {
	let person = sqlx::query_as::<_, Person>(
		"\
INSERT INTO people (name, email)
VALUES ($1, $2)
ON CONFLICT (email) DO NOTHING
RETURNING person_id, name, email, created_at",
	)
	.bind(name)
	.bind(email)
	.fetch_optional(&mut *executor)
	.await?;

	person.ok_or_else(|| Error::Conflict(format!("Email {email} is already registered.")))
}

pub async fn person_exists(executor: &mut PgConnection, person_id: PersonId) -> Result<bool> {
	let exists: bool =
		sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM people WHERE person_id = $1)")
			.bind(person_id.0)
			.fetch_one(&mut *executor)
			.await?;

	Ok(exists)
}

pub async fn live_person_ids(
	executor: &mut PgConnection,
	ids: &[PersonId],
) -> Result<Vec<PersonId>> {
	let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
	let rows: Vec<i64> = sqlx::query_scalar(
		"SELECT person_id FROM people WHERE person_id = ANY($1) ORDER BY person_id",
	)
	.bind(&ids)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows.into_iter().map(PersonId).collect())
}

/// Returns `None` when the person is already waiting.
pub async fn insert_waiting(
	executor: &mut PgConnection,
	person_id: PersonId,
	signup_time: OffsetDateTime,
) -> Result<Option<WaitingEntry>> {
	let row = sqlx::query_as::<_, WaitingRow>(
		"\
INSERT INTO waiting_entries (person_id, signup_time)
VALUES ($1, $2)
ON CONFLICT (person_id) DO NOTHING
RETURNING person_id, signup_time",
	)
	.bind(person_id.0)
	.bind(signup_time)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(row.map(WaitingEntry::from))
}

pub async fn get_waiting(
	executor: &mut PgConnection,
	person_id: PersonId,
) -> Result<Option<WaitingEntry>> {
	let row = sqlx::query_as::<_, WaitingRow>(
		"SELECT person_id, signup_time FROM waiting_entries WHERE person_id = $1",
	)
	.bind(person_id.0)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(row.map(WaitingEntry::from))
}

pub async fn delete_waiting(executor: &mut PgConnection, person_id: PersonId) -> Result<bool> {
	let result = sqlx::query("DELETE FROM waiting_entries WHERE person_id = $1")
		.bind(person_id.0)
		.execute(&mut *executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn delete_waiting_many(executor: &mut PgConnection, ids: &[PersonId]) -> Result<u64> {
	let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
	let result = sqlx::query("DELETE FROM waiting_entries WHERE person_id = ANY($1)")
		.bind(&ids)
		.execute(&mut *executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn list_waiting(executor: &mut PgConnection) -> Result<Vec<WaitingEntry>> {
	let rows = sqlx::query_as::<_, WaitingRow>(
		"SELECT person_id, signup_time FROM waiting_entries ORDER BY signup_time ASC, person_id ASC",
	)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows.into_iter().map(WaitingEntry::from).collect())
}

pub async fn edges_among(executor: &mut PgConnection, ids: &[PersonId]) -> Result<Vec<EdgeWeight>> {
	let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
	let rows = sqlx::query_as::<_, EdgeRow>(
		"\
SELECT person_low, person_high, weight
FROM edges
WHERE person_low = ANY($1) AND person_high = ANY($1)
ORDER BY person_low, person_high",
	)
	.bind(&ids)
	.fetch_all(&mut *executor)
	.await?;
	let mut edges = Vec::with_capacity(rows.len());

	for row in rows {
		let pair = PairKey::new(PersonId(row.person_low), PersonId(row.person_high)).ok_or_else(
			|| Error::InvalidArgument(format!("Edge row pairs person {} with itself.", row.person_low)),
		)?;

		edges.push(EdgeWeight { pair, weight: row.weight });
	}

	Ok(edges)
}

pub async fn edge_weight(executor: &mut PgConnection, pair: PairKey) -> Result<Option<i64>> {
	let weight: Option<i64> =
		sqlx::query_scalar("SELECT weight FROM edges WHERE person_low = $1 AND person_high = $2")
			.bind(pair.low().0)
			.bind(pair.high().0)
			.fetch_optional(&mut *executor)
			.await?;

	Ok(weight)
}

pub async fn upsert_edge(
	executor: &mut PgConnection,
	edge: EdgeWeight,
	updated_at: OffsetDateTime,
) -> Result<()> {
	if edge.weight < 0 {
		return Err(Error::InvalidArgument(format!(
			"Edge {} cannot store negative weight {}.",
			edge.pair, edge.weight
		)));
	}

	sqlx::query(
		"\
INSERT INTO edges (person_low, person_high, weight, updated_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (person_low, person_high) DO UPDATE
SET
	weight = EXCLUDED.weight,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(edge.pair.low().0)
	.bind(edge.pair.high().0)
	.bind(edge.weight)
	.bind(updated_at)
	.execute(&mut *executor)
	.await?;

	Ok(())
}

/// Allocates the next generation id. Callers must hold the round lock.
pub async fn insert_generation(
	executor: &mut PgConnection,
	created_at: OffsetDateTime,
) -> Result<Generation> {
	let generation = sqlx::query_as::<_, Generation>(
		"\
INSERT INTO generations (generation_id, created_at)
SELECT COALESCE(MAX(generation_id), 0) + 1, $1
FROM generations
RETURNING generation_id, created_at",
	)
	.bind(created_at)
	.fetch_one(&mut *executor)
	.await?;

	Ok(generation)
}

pub async fn insert_match(executor: &mut PgConnection, row: &MatchRow) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO matches (generation_id, position, person1_id, person2_id)
VALUES ($1, $2, $3, $4)",
	)
	.bind(row.generation_id)
	.bind(row.position)
	.bind(row.person1_id.0)
	.bind(row.person2_id.map(|id| id.0))
	.execute(&mut *executor)
	.await?;

	let people: Vec<i64> =
		std::iter::once(row.person1_id).chain(row.person2_id).map(|id| id.0).collect();
	let claimed = sqlx::query(
		"\
INSERT INTO match_participants (generation_id, person_id)
SELECT $1, unnest($2::bigint[])
ON CONFLICT (generation_id, person_id) DO NOTHING",
	)
	.bind(row.generation_id)
	.bind(&people)
	.execute(&mut *executor)
	.await?
	.rows_affected();

	if claimed != people.len() as u64 {
		return Err(Error::Conflict(format!(
			"A person in match {} appears twice in generation {}.",
			row.position, row.generation_id
		)));
	}

	Ok(())
}

pub async fn get_generation(
	executor: &mut PgConnection,
	generation_id: i64,
) -> Result<Option<Generation>> {
	let generation = sqlx::query_as::<_, Generation>(
		"SELECT generation_id, created_at FROM generations WHERE generation_id = $1",
	)
	.bind(generation_id)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(generation)
}

pub async fn latest_generation(executor: &mut PgConnection) -> Result<Option<Generation>> {
	let generation = sqlx::query_as::<_, Generation>(
		"SELECT generation_id, created_at FROM generations ORDER BY generation_id DESC LIMIT 1",
	)
	.fetch_optional(&mut *executor)
	.await?;

	Ok(generation)
}

pub async fn list_matches(executor: &mut PgConnection, generation_id: i64) -> Result<Vec<MatchRow>> {
	let rows = sqlx::query_as::<_, MatchDbRow>(
		"\
SELECT generation_id, position, person1_id, person2_id
FROM matches
WHERE generation_id = $1
ORDER BY position",
	)
	.bind(generation_id)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows.into_iter().map(MatchRow::from).collect())
}
