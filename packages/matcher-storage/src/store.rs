use std::{future::Future, pin::Pin};

use matcher_domain::{EdgeWeight, PersonId};

use crate::{
	Result,
	models::{Generation, MatchRow, RoundCommit, SignupOutcome, WaitingEntry},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence boundary for waiting entries, edges, generations, and matches.
///
/// Reads and sign-ups may run at any time. Every round-level write goes
/// through a [`RoundTx`], of which at most one is open at once.
pub trait RoundStore
where
	Self: Send + Sync,
{
	fn person_exists(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>>;

	/// Inserts a waiting entry, or returns the existing one untouched.
	fn add_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<SignupOutcome>>;

	fn remove_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>>;

	/// Ordered by sign-up time, then id.
	fn list_waiting(&self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>>;

	/// `None` selects the latest generation.
	fn generation(&self, generation_id: Option<i64>) -> BoxFuture<'_, Result<Option<Generation>>>;

	fn matches_for_generation(&self, generation_id: i64) -> BoxFuture<'_, Result<Vec<MatchRow>>>;

	/// Waits for exclusive round access and opens the round transaction.
	fn begin_round(&self) -> BoxFuture<'_, Result<Box<dyn RoundTx>>>;
}

/// One exclusive round. Dropping it without committing discards every write
/// and releases the round lock.
pub trait RoundTx
where
	Self: Send,
{
	/// The waiting set as of a single snapshot.
	fn waiting(&mut self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>>;

	/// The subset of `ids` that names registered people.
	fn live_person_ids<'a>(
		&'a mut self,
		ids: &'a [PersonId],
	) -> BoxFuture<'a, Result<Vec<PersonId>>>;

	/// Stored edges with both endpoints in `ids`.
	fn edges_among<'a>(&'a mut self, ids: &'a [PersonId]) -> BoxFuture<'a, Result<Vec<EdgeWeight>>>;

	/// Applies the whole round or nothing.
	fn commit(self: Box<Self>, round: RoundCommit) -> BoxFuture<'static, Result<Generation>>;

	fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}
