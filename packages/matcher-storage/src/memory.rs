use std::{
	collections::{BTreeMap, BTreeSet},
	future,
	sync::{Arc, Mutex, MutexGuard},
};

use time::OffsetDateTime;
use tokio::sync::OwnedMutexGuard;

use matcher_domain::{EdgeWeight, PairKey, PersonId};

use crate::{
	BoxFuture, Error, Result, RoundStore, RoundTx,
	models::{Generation, MatchRow, Person, RoundCommit, SignupOutcome, WaitingEntry},
};

/// In-process round store with the same contract as the Postgres one.
///
/// Commits are applied to a copy of the state and swapped in only once every
/// referential check passes.
#[derive(Clone, Default)]
pub struct MemoryRoundStore {
	state: Arc<Mutex<State>>,
	round_lock: Arc<tokio::sync::Mutex<()>>,
}
impl MemoryRoundStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_person(&self, name: &str, email: &str) -> Result<Person> {
		let mut state = lock(&self.state);

		if state.people.values().any(|person| person.email == email) {
			return Err(Error::Conflict(format!("Email {email} is already registered.")));
		}

		state.next_person_id += 1;

		let person = Person {
			person_id: state.next_person_id,
			name: name.to_string(),
			email: email.to_string(),
			created_at: OffsetDateTime::now_utc(),
		};

		state.people.insert(PersonId(person.person_id), person.clone());

		Ok(person)
	}

	pub fn set_edge_weight(&self, edge: EdgeWeight) -> Result<()> {
		let mut state = lock(&self.state);

		state.check_edge(&edge)?;
		state.edges.insert(edge.pair, edge.weight);

		Ok(())
	}

	pub fn edge_weight(&self, pair: PairKey) -> Option<i64> {
		lock(&self.state).edges.get(&pair).copied()
	}

	/// Every stored edge in canonical pair order.
	pub fn edges(&self) -> Vec<EdgeWeight> {
		lock(&self.state)
			.edges
			.iter()
			.map(|(pair, weight)| EdgeWeight { pair: *pair, weight: *weight })
			.collect()
	}
}

impl RoundStore for MemoryRoundStore {
	fn person_exists(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>> {
		let exists = lock(&self.state).people.contains_key(&person_id);

		Box::pin(future::ready(Ok(exists)))
	}

	fn add_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<SignupOutcome>> {
		let mut state = lock(&self.state);
		let outcome = if !state.people.contains_key(&person_id) {
			Err(Error::NotFound(format!("Person {person_id} does not exist.")))
		} else if let Some(entry) = state.waiting.get(&person_id) {
			Ok(SignupOutcome::Existing(*entry))
		} else {
			let entry = WaitingEntry { person_id, signup_time: OffsetDateTime::now_utc() };

			state.waiting.insert(person_id, entry);

			Ok(SignupOutcome::Inserted(entry))
		};

		Box::pin(future::ready(outcome))
	}

	fn remove_waiting(&self, person_id: PersonId) -> BoxFuture<'_, Result<bool>> {
		let removed = lock(&self.state).waiting.remove(&person_id).is_some();

		Box::pin(future::ready(Ok(removed)))
	}

	fn list_waiting(&self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>> {
		let entries = lock(&self.state).waiting_in_signup_order();

		Box::pin(future::ready(Ok(entries)))
	}

	fn generation(&self, generation_id: Option<i64>) -> BoxFuture<'_, Result<Option<Generation>>> {
		let state = lock(&self.state);
		let generation = match generation_id {
			Some(generation_id) => state
				.generations
				.iter()
				.find(|generation| generation.generation_id == generation_id)
				.copied(),
			None => state.generations.last().copied(),
		};

		Box::pin(future::ready(Ok(generation)))
	}

	fn matches_for_generation(&self, generation_id: i64) -> BoxFuture<'_, Result<Vec<MatchRow>>> {
		let rows = lock(&self.state)
			.matches
			.iter()
			.filter(|row| row.generation_id == generation_id)
			.copied()
			.collect();

		Box::pin(future::ready(Ok(rows)))
	}

	fn begin_round(&self) -> BoxFuture<'_, Result<Box<dyn RoundTx>>> {
		Box::pin(async move {
			let guard = self.round_lock.clone().lock_owned().await;
			let round: Box<dyn RoundTx> =
				Box::new(MemoryRound { _guard: guard, state: self.state.clone() });

			Ok(round)
		})
	}
}

#[derive(Clone, Debug, Default)]
struct State {
	people: BTreeMap<PersonId, Person>,
	next_person_id: i64,
	waiting: BTreeMap<PersonId, WaitingEntry>,
	edges: BTreeMap<PairKey, i64>,
	generations: Vec<Generation>,
	matches: Vec<MatchRow>,
}
impl State {
	fn waiting_in_signup_order(&self) -> Vec<WaitingEntry> {
		let mut entries: Vec<WaitingEntry> = self.waiting.values().copied().collect();

		entries.sort_by_key(|entry| (entry.signup_time, entry.person_id));

		entries
	}

	fn require_person(&self, person_id: PersonId) -> Result<()> {
		if self.people.contains_key(&person_id) {
			Ok(())
		} else {
			Err(Error::NotFound(format!("Person {person_id} does not exist.")))
		}
	}

	fn check_edge(&self, edge: &EdgeWeight) -> Result<()> {
		if edge.weight < 0 {
			return Err(Error::InvalidArgument(format!(
				"Edge {} cannot store negative weight {}.",
				edge.pair, edge.weight
			)));
		}

		self.require_person(edge.pair.low())?;
		self.require_person(edge.pair.high())
	}

	fn apply(&mut self, round: &RoundCommit) -> Result<Generation> {
		let generation_id = self.generations.last().map_or(1, |last| last.generation_id + 1);
		let rows = round.match_rows(generation_id);
		let mut seen = BTreeSet::new();

		for row in &rows {
			for person in std::iter::once(row.person1_id).chain(row.person2_id) {
				self.require_person(person)?;

				if !seen.insert(person) {
					return Err(Error::Conflict(format!(
						"Person {person} appears twice in generation {generation_id}."
					)));
				}
			}
		}
		for edge in &round.edge_updates {
			self.check_edge(edge)?;
			self.edges.insert(edge.pair, edge.weight);
		}
		for person in &round.matched {
			self.waiting.remove(person);
		}

		let generation = Generation { generation_id, created_at: round.created_at };

		self.generations.push(generation);
		self.matches.extend(rows);

		Ok(generation)
	}
}

struct MemoryRound {
	_guard: OwnedMutexGuard<()>,
	state: Arc<Mutex<State>>,
}

impl RoundTx for MemoryRound {
	fn waiting(&mut self) -> BoxFuture<'_, Result<Vec<WaitingEntry>>> {
		let entries = lock(&self.state).waiting_in_signup_order();

		Box::pin(future::ready(Ok(entries)))
	}

	fn live_person_ids<'a>(
		&'a mut self,
		ids: &'a [PersonId],
	) -> BoxFuture<'a, Result<Vec<PersonId>>> {
		let state = lock(&self.state);
		let live: BTreeSet<PersonId> =
			ids.iter().copied().filter(|id| state.people.contains_key(id)).collect();

		Box::pin(future::ready(Ok(live.into_iter().collect())))
	}

	fn edges_among<'a>(&'a mut self, ids: &'a [PersonId]) -> BoxFuture<'a, Result<Vec<EdgeWeight>>> {
		let pool: BTreeSet<PersonId> = ids.iter().copied().collect();
		let edges = lock(&self.state)
			.edges
			.iter()
			.filter(|(pair, _)| pool.contains(&pair.low()) && pool.contains(&pair.high()))
			.map(|(pair, weight)| EdgeWeight { pair: *pair, weight: *weight })
			.collect();

		Box::pin(future::ready(Ok(edges)))
	}

	fn commit(self: Box<Self>, round: RoundCommit) -> BoxFuture<'static, Result<Generation>> {
		let mut state = lock(&self.state);
		let mut next = state.clone();
		let result = next.apply(&round);

		if result.is_ok() {
			*state = next;
		}

		drop(state);

		Box::pin(future::ready(result))
	}

	fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(future::ready(Ok(())))
	}
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
	state.lock().unwrap_or_else(|err| err.into_inner())
}
