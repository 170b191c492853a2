use time::OffsetDateTime;

use matcher_config::Postgres;
use matcher_domain::{EdgeWeight, PairKey, PersonId};
use matcher_storage::{
	PgRoundStore, RoundStore,
	db::{Db, ROUND_LOCK_ID},
	models::RoundCommit,
};
use matcher_testkit::TestDatabase;

async fn open_store(test_db: &TestDatabase) -> PgRoundStore {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 4 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	PgRoundStore::new(db)
}

async fn seed(store: &PgRoundStore, count: usize) -> Vec<PersonId> {
	let mut people = Vec::with_capacity(count);

	for i in 0..count {
		let person = store
			.insert_person(&format!("Person {i}"), &format!("person{i}@example.com"))
			.await
			.expect("Failed to insert person.");

		people.push(PersonId(person.person_id));
	}

	people
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn schema_bootstrap_is_repeatable() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_repeatable; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;

	store.db().ensure_schema().await.expect("Failed to re-apply schema.");

	let count: i64 = sqlx::query_scalar(
		"\
SELECT count(*)
FROM information_schema.tables
WHERE table_name IN (
	'people',
	'waiting_entries',
	'edges',
	'generations',
	'matches',
	'match_participants'
)",
	)
	.fetch_one(&store.db().pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 6);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn edges_reject_non_canonical_pairs() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping edges_reject_non_canonical_pairs; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;
	let people = seed(&store, 2).await;
	let result = sqlx::query("INSERT INTO edges (person_low, person_high, weight) VALUES ($1, $2, 0)")
		.bind(people[1].0)
		.bind(people[0].0)
		.execute(&store.db().pool)
		.await;

	assert!(result.is_err(), "Expected the canonical ordering check to reject the row.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn signup_is_idempotent() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping signup_is_idempotent; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;
	let people = seed(&store, 1).await;
	let first = store.add_waiting(people[0]).await.expect("Failed to sign up.");
	let second = store.add_waiting(people[0]).await.expect("Failed to sign up again.");

	assert!(first.created());
	assert!(!second.created());
	assert_eq!(store.list_waiting().await.expect("list").len(), 1);

	let err = store.add_waiting(PersonId(people[0].0 + 1_000)).await.expect_err("unknown person");

	assert!(matches!(err, matcher_storage::Error::NotFound(_)));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn round_commit_is_atomic() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping round_commit_is_atomic; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;
	let people = seed(&store, 3).await;
	let pair = PairKey::new(people[0], people[1]).expect("distinct pair");

	for person in &people {
		store.add_waiting(*person).await.expect("Failed to sign up.");
	}

	store.set_edge_weight(EdgeWeight { pair, weight: 4 }).await.expect("Failed to set edge.");

	// A match row naming an unregistered person violates a foreign key at commit.
	let round = store.begin_round().await.expect("Failed to begin round.");
	let bogus = PersonId(people[2].0 + 1_000);
	let result = round
		.commit(RoundCommit {
			created_at: OffsetDateTime::now_utc(),
			pairs: vec![pair],
			leftover: Some(bogus),
			edge_updates: vec![EdgeWeight { pair, weight: 5 }],
			matched: vec![people[0], people[1]],
		})
		.await;

	assert!(result.is_err());
	assert_eq!(store.edge_weight(pair).await.expect("edge"), Some(4));
	assert_eq!(store.list_waiting().await.expect("list").len(), 3);
	assert_eq!(store.generation(None).await.expect("latest"), None);

	let mut round = store.begin_round().await.expect("Failed to begin round.");
	let waiting = round.waiting().await.expect("Failed to read waiting.");

	assert_eq!(waiting.len(), 3);

	let generation = round
		.commit(RoundCommit {
			created_at: OffsetDateTime::now_utc(),
			pairs: vec![pair],
			leftover: Some(people[2]),
			edge_updates: vec![EdgeWeight { pair, weight: 5 }],
			matched: vec![people[0], people[1]],
		})
		.await
		.expect("Failed to commit.");

	assert_eq!(generation.generation_id, 1);
	assert_eq!(store.edge_weight(pair).await.expect("edge"), Some(5));

	let rows = store.matches_for_generation(1).await.expect("Failed to list matches.");

	assert_eq!(rows.len(), 2);
	assert_eq!(rows[1].person2_id, None);

	let waiting = store.list_waiting().await.expect("list");

	assert_eq!(waiting.len(), 1);
	assert_eq!(waiting[0].person_id, people[2]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn commit_rejects_a_person_in_two_matches() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping commit_rejects_a_person_in_two_matches; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;
	let people = seed(&store, 3).await;

	for person in &people {
		store.add_waiting(*person).await.expect("Failed to sign up.");
	}

	// people[1] is person2 of the first row and person1 of the second.
	let round = store.begin_round().await.expect("Failed to begin round.");
	let err = round
		.commit(RoundCommit {
			created_at: OffsetDateTime::now_utc(),
			pairs: vec![
				PairKey::new(people[0], people[1]).expect("distinct pair"),
				PairKey::new(people[1], people[2]).expect("distinct pair"),
			],
			leftover: None,
			edge_updates: Vec::new(),
			matched: people.clone(),
		})
		.await
		.expect_err("Expected a repeated person to be rejected.");

	assert!(matches!(err, matcher_storage::Error::Conflict(_)));
	assert_eq!(store.generation(None).await.expect("latest"), None);
	assert_eq!(store.list_waiting().await.expect("list").len(), 3);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MATCHER_PG_DSN to run."]
async fn rounds_serialize_on_the_advisory_lock() {
	let Some(base_dsn) = matcher_testkit::env_dsn() else {
		eprintln!("Skipping rounds_serialize_on_the_advisory_lock; set MATCHER_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = open_store(&test_db).await;
	let try_lock = "SELECT pg_try_advisory_xact_lock($1)";
	let first = store.begin_round().await.expect("Failed to begin round.");
	let acquired: bool = sqlx::query_scalar(try_lock)
		.bind(ROUND_LOCK_ID)
		.fetch_one(&store.db().pool)
		.await
		.expect("Failed to check the round lock.");

	assert!(!acquired, "The open round must hold the lock.");

	first.rollback().await.expect("Failed to roll back.");

	let acquired: bool = sqlx::query_scalar(try_lock)
		.bind(ROUND_LOCK_ID)
		.fetch_one(&store.db().pool)
		.await
		.expect("Failed to check the round lock.");

	assert!(acquired, "Rolling back must release the lock.");

	drop(store);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
