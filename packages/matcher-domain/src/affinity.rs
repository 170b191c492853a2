use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Matching, PairKey, PersonId, Result};

/// Persisted familiarity between two people. A missing row means weight zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeWeight {
	pub pair: PairKey,
	pub weight: i64,
}

/// Complete weighted graph over one round's participants.
///
/// Built once per round from the edge rows among the participants and dropped
/// after matching. Vertices are kept in ascending id order, which is also the
/// order the engine uses to break ties.
#[derive(Clone, Debug)]
pub struct AffinityGraph {
	people: Vec<PersonId>,
	index: HashMap<PersonId, usize>,
	weights: Vec<i64>,
}
impl AffinityGraph {
	/// Duplicate ids collapse into one vertex. Edges touching people outside the
	/// pool are ignored.
	pub fn build<I>(people: I, edges: &[EdgeWeight]) -> Result<Self>
	where
		I: IntoIterator<Item = PersonId>,
	{
		let mut people: Vec<PersonId> = people.into_iter().collect();

		people.sort_unstable();
		people.dedup();

		if people.len() < 2 {
			return Err(Error::EmptyPool { size: people.len() });
		}

		let size = people.len();
		let index: HashMap<PersonId, usize> =
			people.iter().enumerate().map(|(position, person)| (*person, position)).collect();
		let mut weights = vec![0; size * size];

		for edge in edges {
			if edge.weight < 0 {
				return Err(Error::NegativeWeight { pair: edge.pair, weight: edge.weight });
			}

			let (Some(&a), Some(&b)) = (index.get(&edge.pair.low()), index.get(&edge.pair.high()))
			else {
				continue;
			};

			weights[a * size + b] = edge.weight;
			weights[b * size + a] = edge.weight;
		}

		Ok(Self { people, index, weights })
	}

	pub fn len(&self) -> usize {
		self.people.len()
	}

	pub fn is_empty(&self) -> bool {
		self.people.is_empty()
	}

	/// Participants in ascending id order.
	pub fn people(&self) -> &[PersonId] {
		&self.people
	}

	/// Weight between two distinct participants, or `None` when either is not in
	/// the graph.
	pub fn weight(&self, a: PersonId, b: PersonId) -> Option<i64> {
		PairKey::new(a, b)?;

		let i = *self.index.get(&a)?;
		let j = *self.index.get(&b)?;

		Some(self.weight_at(i, j))
	}

	pub(crate) fn weight_at(&self, i: usize, j: usize) -> i64 {
		self.weights[i * self.people.len() + j]
	}

	/// Edge rows to persist after `matching` is committed.
	///
	/// Every matched pair's weight grows by `increment`; all other weights stay as
	/// they were. Pairs not present in this graph are skipped.
	pub fn encounter_updates(&self, matching: &Matching, increment: i64) -> Vec<EdgeWeight> {
		matching
			.pairs
			.iter()
			.filter_map(|pair| {
				let weight = self.weight(pair.low(), pair.high())?;

				Some(EdgeWeight { pair: *pair, weight: weight.saturating_add(increment) })
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn edge(a: i64, b: i64, weight: i64) -> EdgeWeight {
		EdgeWeight { pair: PairKey::new(PersonId(a), PersonId(b)).expect("distinct pair"), weight }
	}

	#[test]
	fn build_rejects_pools_below_two() {
		let err = AffinityGraph::build([PersonId(1)], &[]).expect_err("Expected empty pool.");

		assert!(matches!(err, Error::EmptyPool { size: 1 }));

		let err = AffinityGraph::build([PersonId(1), PersonId(1)], &[])
			.expect_err("Expected duplicates to collapse.");

		assert!(matches!(err, Error::EmptyPool { size: 1 }));
	}

	#[test]
	fn missing_edges_default_to_zero() {
		let graph = AffinityGraph::build([PersonId(3), PersonId(1), PersonId(2)], &[edge(1, 3, 4)])
			.expect("Failed to build graph.");

		assert_eq!(graph.people(), &[PersonId(1), PersonId(2), PersonId(3)]);
		assert_eq!(graph.weight(PersonId(3), PersonId(1)), Some(4));
		assert_eq!(graph.weight(PersonId(1), PersonId(2)), Some(0));
		assert_eq!(graph.weight(PersonId(1), PersonId(1)), None);
		assert_eq!(graph.weight(PersonId(1), PersonId(9)), None);
	}

	#[test]
	fn edges_outside_the_pool_are_ignored() {
		let graph = AffinityGraph::build([PersonId(1), PersonId(2)], &[edge(1, 9, 7)])
			.expect("Failed to build graph.");

		assert_eq!(graph.len(), 2);
		assert_eq!(graph.weight(PersonId(1), PersonId(2)), Some(0));
	}

	#[test]
	fn negative_weights_are_rejected() {
		let err = AffinityGraph::build([PersonId(1), PersonId(2)], &[edge(1, 2, -1)])
			.expect_err("Expected negative weight rejection.");

		assert!(matches!(err, Error::NegativeWeight { weight: -1, .. }));
	}

	#[test]
	fn encounter_updates_bump_only_matched_pairs() {
		let graph = AffinityGraph::build(
			[PersonId(1), PersonId(2), PersonId(3), PersonId(4)],
			&[edge(1, 2, 2), edge(3, 4, 0), edge(1, 3, 5)],
		)
		.expect("Failed to build graph.");
		let matching = Matching {
			pairs: vec![
				PairKey::new(PersonId(1), PersonId(2)).expect("distinct pair"),
				PairKey::new(PersonId(3), PersonId(4)).expect("distinct pair"),
			],
			leftover: None,
			total_weight: 2,
		};
		let updates = graph.encounter_updates(&matching, 1);

		assert_eq!(updates, vec![edge(1, 2, 3), edge(3, 4, 1)]);
	}
}
