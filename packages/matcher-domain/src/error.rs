use crate::ids::PairKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("A matching pool needs at least two people; got {size}.")]
	EmptyPool { size: usize },
	#[error("No near-perfect matching exists for {size} vertices.")]
	Infeasible { size: usize },
	#[error("Edge {pair} has negative weight {weight}.")]
	NegativeWeight { pair: PairKey, weight: i64 },
	#[error("Edge weights are too large to rank {size} vertices without overflow.")]
	WeightOverflow { size: usize },
}
