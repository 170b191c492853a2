use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

use matcher_domain::{EdgeWeight, PairKey, PersonId};

use crate::{
	BoxFuture, Error, Result, RoundStore, RoundTx,
	db::{Db, ROUND_LOCK_ID},
	models::{Generation, MatchRow, Person, RoundCommit, SignupOutcome, WaitingEntry},
	queries,
};

/// Postgres-backed round store.
///
/// Rounds serialize on a transaction-scoped advisory lock, so separate
/// processes sharing one database still commit one round at a time.
pub struct PgRoundStore {
	db: Db,
}
impl PgRoundStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	pub async fn insert_person(&self, name: &str, email: &str) -> Result<Person> {
		let mut conn = self.db.pool.acquire().await?;

		queries::insert_person(&mut conn, name, email).await
	}

	pub async fn set_edge_weight(&self, edge: EdgeWeight) -> Result<()> {
		let mut conn = self.db.pool.acquire().await?;

		queries::upsert_edge(&mut conn, edge, OffsetDateTime::now_utc()).await
	}

	pub async fn edge_weight(&self, pair: PairKey) -> Result<Option<i64>> {
		let mut conn = self.db.pool.acquire().await?;

		queries::edge_weight(&mut conn, pair).await
	}

	async fn add_waiting_inner(&self, person_id: PersonId) -> Result<SignupOutcome> {
		let mut conn = self.db.pool.acquire().await?;
		let inserted =
			match queries::insert_waiting(&mut conn, person_id, OffsetDateTime::now_utc()).await {
				Ok(inserted) => inserted,
				Err(Error::Sqlx(sqlx::Error::Database(err))) if err.is_foreign_key_violation() =>
					return Err(Error::NotFound(format!("Person {person_id} does not exist."))),
				Err(err) => return Err(err),
			};

		if let Some(entry) = inserted {
			return Ok(SignupOutcome::Inserted(entry));
		}

		match queries::get_waiting(&mut conn, person_id).await? {
			Some(entry) => Ok(SignupOutcome::Existing(entry)),
			None => Err(Error::Conflict(format!(
				"Waiting entry for person {person_id} changed during sign-up."
			))),
		}
	}

	async fn generation_inner(&self, generation_id: Option<i64>) -> Result<Option<Generation>> {
		let mut conn = self.db.pool.acquire().await?;

		match generation_id {
			Some(generation_id) => queries::get_generation(&mut conn, generation_id).await,
			None => queries::latest_generation(&mut conn).await,
		}
	}

	async fn begin_round_inner(&self) -> Result<Box<dyn RoundTx>> {
		let mut tx = self.db.pool.begin().await?;

		// Held until the transaction ends. The default READ COMMITTED level is
		// kept so the waiting read sees every round committed before the grant.
		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(ROUND_LOCK_ID).execute(&mut *tx).await?;

		Ok(Box::new(PgRound { tx }))
	}
}

impl RoundStore for PgRoundStore {
	fn person_exists(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move {
			let mut conn = self.db.pool.acquire().await?;

			queries::person_exists(&mut conn, person_id).await
		})
	}

	fn add_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<SignupOutcome>> {
		Box::pin(self.add_waiting_inner(person_id))
	}

	fn remove_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move {
			let mut conn = self.db.pool.acquire().await?;

			queries::delete_waiting(&mut conn, person_id).await
		})
	}

	fn list_waiting(&self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>> {
		Box::pin(async move {
			let mut conn = self.db.pool.acquire().await?;

			queries::list_waiting(&mut conn).await
		})
	}

	fn generation(&self, generation_id: Option<i64>) -> BoxFuture<'_, Result<Option<Generation>>> {
		Box::pin(self.generation_inner(generation_id))
	}

	fn matches_for_generation(&self, generation_id: i64) -> BoxFuture<'_, Result<Vec<MatchRow>>> {
		Box::pin(async move {
			let mut conn = self.db.pool.acquire().await?;

			queries::list_matches(&mut conn, generation_id).await
		})
	}

	fn begin_round(&self) -> BoxFuture<'_, Result<Box<dyn RoundTx>>> {
		Box::pin(self.begin_round_inner())
	}
}

struct PgRound {
	tx: Transaction<'static, Postgres>,
}

impl RoundTx for PgRound {
	fn waiting(&mut self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>> {
		Box::pin(queries::list_waiting(&mut self.tx))
	}

	fn live_person_ids<'a>(
		&'a mut self,
		ids: &'a [PersonId],
	) -> BoxFuture<'a, Result<Vec<PersonId>>> {
		Box::pin(queries::live_person_ids(&mut self.tx, ids))
	}

	fn edges_among<'a>(&'a mut self, ids: &'a [PersonId]) -> BoxFuture<'a, Result<Vec<EdgeWeight>>> {
		Box::pin(queries::edges_among(&mut self.tx, ids))
	}

	fn commit(self: Box<Self>, round: RoundCommit) -> BoxFuture<'static, Result<Generation>> {
		Box::pin(async move {
			let mut tx = self.tx;
			let generation = queries::insert_generation(&mut tx, round.created_at).await?;

			for row in round.match_rows(generation.generation_id) {
				queries::insert_match(&mut tx, &row).await?;
			}
			for edge in &round.edge_updates {
				queries::upsert_edge(&mut tx, *edge, round.created_at).await?;
			}

			queries::delete_waiting_many(&mut tx, &round.matched).await?;

			tx.commit().await?;

			Ok(generation)
		})
	}

	fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			self.tx.rollback().await?;

			Ok(())
		})
	}
}
