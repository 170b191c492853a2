//! The round controller.
//!
//! A trigger walks `Idle -> ReadingWaiting -> Matching -> Committing -> Done`
//! and lands in `Aborted` on any failure. Everything up to `Committing` runs
//! under `matching.trigger_timeout_ms`; once the commit starts it either lands
//! or rolls back as a unit.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, MatcherService, Result};
use matcher_domain::{AffinityGraph, EdgeWeight, Matching, PersonId, min_weight_matching};
use matcher_storage::{RoundTx, models::RoundCommit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
	Idle,
	ReadingWaiting,
	Matching,
	Committing,
	Done,
	Aborted,
}
impl RoundPhase {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::ReadingWaiting => "reading_waiting",
			Self::Matching => "matching",
			Self::Committing => "committing",
			Self::Done => "done",
			Self::Aborted => "aborted",
		}
	}
}
impl fmt::Display for RoundPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairView {
	pub person1_id: PersonId,
	pub person2_id: PersonId,
	/// Weight of the pair going into this round.
	pub weight: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundReport {
	pub generation_id: i64,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub pairs: Vec<PairView>,
	pub leftover: Option<PersonId>,
	pub total_weight: i64,
}

struct PlannedRound {
	matching: Matching,
	pairs: Vec<PairView>,
	edge_updates: Vec<EdgeWeight>,
}

struct PhaseTracker {
	phase: RoundPhase,
}
impl PhaseTracker {
	fn new() -> Self {
		Self { phase: RoundPhase::Idle }
	}

	fn enter(&mut self, next: RoundPhase) {
		tracing::debug!(from = %self.phase, to = %next, "Round phase changed.");

		self.phase = next;
	}

	fn abort(&mut self, err: &Error) {
		match err {
			Error::Internal { message } => {
				tracing::error!(phase = %self.phase, error = %message, "Round aborted.");
			},
			_ => {
				tracing::warn!(phase = %self.phase, error = %err, "Round aborted.");
			},
		}

		self.enter(RoundPhase::Aborted);
	}
}

impl MatcherService {
	/// Runs one matching round over the current waiting set.
	///
	/// Matched people leave the waiting set and their pair weights grow by
	/// `matching.weight_increment`. An odd pool's leftover is recorded with no
	/// partner and stays waiting for the next round.
	pub async fn trigger(&self) -> Result<RoundReport> {
		let _gate = self.round_gate.lock().await;
		let mut tracker = PhaseTracker::new();
		let result = self.run_round(&mut tracker).await;

		if let Err(err) = &result {
			tracker.abort(err);
		}

		result
	}

	async fn run_round(&self, tracker: &mut PhaseTracker) -> Result<RoundReport> {
		let budget = Duration::from_millis(self.cfg.matching.trigger_timeout_ms);
		// Dropping the prepared future on timeout drops the open round, which
		// discards it and releases the round lock.
		let (round, plan) = match tokio::time::timeout(budget, self.prepare_round(tracker)).await
		{
			Ok(prepared) => prepared?,
			Err(_) => return Err(Error::Timeout { phase: tracker.phase }),
		};

		tracker.enter(RoundPhase::Committing);

		let created_at = OffsetDateTime::now_utc();
		let commit = RoundCommit {
			created_at,
			pairs: plan.matching.pairs.clone(),
			leftover: plan.matching.leftover,
			edge_updates: plan.edge_updates,
			matched: plan.matching.matched_people(),
		};
		let generation = round.commit(commit).await?;

		tracker.enter(RoundPhase::Done);
		tracing::info!(
			generation_id = generation.generation_id,
			pairs = plan.pairs.len(),
			leftover = ?plan.matching.leftover.map(|person| person.0),
			total_weight = plan.matching.total_weight,
			"Round committed."
		);

		Ok(RoundReport {
			generation_id: generation.generation_id,
			created_at: generation.created_at,
			pairs: plan.pairs,
			leftover: plan.matching.leftover,
			total_weight: plan.matching.total_weight,
		})
	}

	async fn prepare_round(
		&self,
		tracker: &mut PhaseTracker,
	) -> Result<(Box<dyn RoundTx>, PlannedRound)> {
		let mut round = self.store.begin_round().await?;

		match self.plan_round(&mut *round, tracker).await {
			Ok(plan) => Ok((round, plan)),
			Err(err) => {
				if let Err(rollback_err) = round.rollback().await {
					tracing::warn!(error = %rollback_err, "Failed to roll back round.");
				}

				Err(err)
			},
		}
	}

	async fn plan_round(
		&self,
		round: &mut dyn RoundTx,
		tracker: &mut PhaseTracker,
	) -> Result<PlannedRound> {
		tracker.enter(RoundPhase::ReadingWaiting);

		let waiting = round.waiting().await?;
		let waiting_ids: Vec<PersonId> = waiting.iter().map(|entry| entry.person_id).collect();
		let pool = round.live_person_ids(&waiting_ids).await?;

		if pool.len() < waiting_ids.len() {
			tracing::warn!(
				dropped = waiting_ids.len() - pool.len(),
				"Waiting entries without a registered person were left out of the round."
			);
		}
		if pool.len() < 2 {
			return Err(Error::InsufficientParticipants { waiting: pool.len() });
		}

		let max_pool_size = self.cfg.matching.max_pool_size as usize;

		if pool.len() > max_pool_size {
			return Err(Error::InvalidRequest {
				message: format!(
					"{} people are waiting; matching.max_pool_size allows {max_pool_size}.",
					pool.len()
				),
			});
		}

		let edges = round.edges_among(&pool).await?;

		tracker.enter(RoundPhase::Matching);

		let increment = self.cfg.matching.weight_increment;

		// A timeout here abandons the join handle only. The solver runs to
		// completion on the blocking pool and its result is discarded.
		tokio::task::spawn_blocking(move || plan_matching(pool, &edges, increment))
			.await
			.map_err(|err| Error::Internal { message: format!("Matching task failed: {err}.") })?
	}
}

fn plan_matching(pool: Vec<PersonId>, edges: &[EdgeWeight], increment: i64) -> Result<PlannedRound> {
	let graph = AffinityGraph::build(pool, edges)?;
	let matching = min_weight_matching(&graph)?;
	let mut pairs = Vec::with_capacity(matching.pairs.len());

	for pair in &matching.pairs {
		let weight = graph.weight(pair.low(), pair.high()).ok_or_else(|| Error::Internal {
			message: format!("Matched pair {pair} is not in the round's graph."),
		})?;

		pairs.push(PairView { person1_id: pair.low(), person2_id: pair.high(), weight });
	}

	let edge_updates = graph.encounter_updates(&matching, increment);

	Ok(PlannedRound { matching, pairs, edge_updates })
}
