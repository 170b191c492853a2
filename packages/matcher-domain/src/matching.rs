use serde::{Deserialize, Serialize};

use crate::{AffinityGraph, Error, PairKey, PersonId, Result, blossom};

// Scaled costs must leave headroom for the solver's dual arithmetic.
const MAX_SCALED_COST: i64 = i64::MAX / 8;

/// A near-perfect pairing of one round's participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
	/// Sorted by the lower id of each pair.
	pub pairs: Vec<PairKey>,
	/// Set only for odd pools.
	pub leftover: Option<PersonId>,
	pub total_weight: i64,
}
impl Matching {
	/// People who received a partner this round.
	pub fn matched_people(&self) -> Vec<PersonId> {
		self.pairs.iter().flat_map(|pair| [pair.low(), pair.high()]).collect()
	}
}

/// Computes a minimum total weight matching that leaves at most one participant
/// unpaired.
///
/// Among optimal matchings the result is fixed by walking participants in
/// ascending id order: each still-unpaired participant takes the lowest-id
/// partner that keeps the round optimal, and is left over only when no optimal
/// matching gives them a partner at that point. Identical graphs always produce
/// identical matchings.
pub fn min_weight_matching(graph: &AffinityGraph) -> Result<Matching> {
	let size = graph.len();

	if size < 2 {
		return Err(Error::Infeasible { size });
	}

	// Odd pools get a phantom vertex joined to everyone at zero cost; whoever it
	// is paired with is the leftover.
	let phantom = (size % 2 == 1).then_some(size);
	let mut remaining: Vec<usize> = (0..size).chain(phantom).collect();
	let mut pairs = Vec::with_capacity(size / 2);
	let mut leftover = None;
	let mut total_weight = 0_i64;

	while let Some(&anchor) = remaining.first() {
		let partner = lowest_optimal_partner(graph, &remaining, phantom)?;

		remaining.retain(|&vertex| vertex != anchor && vertex != partner);

		if Some(partner) == phantom {
			leftover = Some(graph.people()[anchor]);

			continue;
		}

		let pair = PairKey::new(graph.people()[anchor], graph.people()[partner])
			.ok_or(Error::Infeasible { size })?;

		total_weight = total_weight
			.checked_add(graph.weight_at(anchor, partner))
			.ok_or(Error::WeightOverflow { size })?;

		pairs.push(pair);
	}

	pairs.sort_unstable();

	Ok(Matching { pairs, leftover, total_weight })
}

/// Finds the lowest-ranked partner of `remaining[0]` over all minimum cost
/// perfect matchings of `remaining`.
///
/// Costs are scaled by `remaining.len()` and the anchor's edges carry the
/// partner's rank, which is always below the scale, so the rank only separates
/// matchings whose real weights tie.
fn lowest_optimal_partner(
	graph: &AffinityGraph,
	remaining: &[usize],
	phantom: Option<usize>,
) -> Result<usize> {
	let size = graph.len();
	let count = remaining.len();

	if count == 2 {
		return Ok(remaining[1]);
	}

	let scale = count as i64;
	let mut costs = Vec::with_capacity(count * (count - 1) / 2);
	let mut ceiling = 0_i64;

	for i in 0..count {
		for j in (i + 1)..count {
			let (a, b) = (remaining[i], remaining[j]);
			let weight =
				if Some(a) == phantom || Some(b) == phantom { 0 } else { graph.weight_at(a, b) };
			let rank = if i == 0 { (j - 1) as i64 } else { 0 };
			let cost = weight
				.checked_mul(scale)
				.and_then(|scaled| scaled.checked_add(rank))
				.filter(|cost| *cost < MAX_SCALED_COST)
				.ok_or(Error::WeightOverflow { size })?;

			ceiling = ceiling.max(cost);
			costs.push((i, j, cost));
		}
	}

	// The solver maximizes. Over perfect matchings of a complete graph, maximizing
	// `ceiling + 1 - cost` is the same as minimizing `cost`.
	let edges: Vec<(usize, usize, i64)> =
		costs.into_iter().map(|(i, j, cost)| (i, j, ceiling + 1 - cost)).collect();
	let mates = blossom::max_weight_matching(count, &edges, true);

	if mates.iter().any(Option::is_none) {
		return Err(Error::Infeasible { size });
	}

	let partner = mates[0].ok_or(Error::Infeasible { size })?;

	Ok(remaining[partner])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::EdgeWeight;

	fn graph(people: &[i64], edges: &[(i64, i64, i64)]) -> AffinityGraph {
		let edges: Vec<EdgeWeight> = edges
			.iter()
			.map(|&(a, b, weight)| EdgeWeight {
				pair: PairKey::new(PersonId(a), PersonId(b)).expect("distinct pair"),
				weight,
			})
			.collect();

		AffinityGraph::build(people.iter().copied().map(PersonId), &edges)
			.expect("Failed to build graph.")
	}

	fn pair(a: i64, b: i64) -> PairKey {
		PairKey::new(PersonId(a), PersonId(b)).expect("distinct pair")
	}

	#[test]
	fn two_people_are_paired() {
		let matching = min_weight_matching(&graph(&[5, 2], &[(2, 5, 3)])).expect("matching");

		assert_eq!(matching.pairs, vec![pair(2, 5)]);
		assert_eq!(matching.leftover, None);
		assert_eq!(matching.total_weight, 3);
	}

	#[test]
	fn avoids_heavy_pairs() {
		let matching = min_weight_matching(&graph(
			&[1, 2, 3, 4],
			&[(1, 2, 9), (3, 4, 9), (1, 3, 1), (2, 4, 1), (1, 4, 5), (2, 3, 5)],
		))
		.expect("matching");

		assert_eq!(matching.pairs, vec![pair(1, 3), pair(2, 4)]);
		assert_eq!(matching.total_weight, 2);
	}

	#[test]
	fn all_zero_weights_pair_in_id_order() {
		let matching = min_weight_matching(&graph(&[4, 3, 2, 1], &[])).expect("matching");

		assert_eq!(matching.pairs, vec![pair(1, 2), pair(3, 4)]);
	}

	#[test]
	fn odd_pool_leaves_highest_id_when_everything_ties() {
		let matching = min_weight_matching(&graph(&[1, 2, 3], &[])).expect("matching");

		assert_eq!(matching.pairs, vec![pair(1, 2)]);
		assert_eq!(matching.leftover, Some(PersonId(3)));
	}

	#[test]
	fn odd_pool_leaves_out_the_most_familiar_person() {
		// Person 1 has met everyone often; leaving them out is strictly cheapest.
		let matching = min_weight_matching(&graph(&[1, 2, 3], &[(1, 2, 4), (1, 3, 4), (2, 3, 1)]))
			.expect("matching");

		assert_eq!(matching.pairs, vec![pair(2, 3)]);
		assert_eq!(matching.leftover, Some(PersonId(1)));
		assert_eq!(matching.total_weight, 1);
	}

	#[test]
	fn matched_people_excludes_the_leftover() {
		let matching = min_weight_matching(&graph(&[1, 2, 3], &[])).expect("matching");

		assert_eq!(matching.leftover, Some(PersonId(3)));
		assert_eq!(matching.matched_people(), vec![PersonId(1), PersonId(2)]);
	}

	#[test]
	fn overflowing_weights_are_reported() {
		let err = min_weight_matching(&graph(&[1, 2, 3, 4], &[(1, 2, i64::MAX / 2)]))
			.expect_err("Expected overflow.");

		assert!(matches!(err, Error::WeightOverflow { size: 4 }));
	}
}
