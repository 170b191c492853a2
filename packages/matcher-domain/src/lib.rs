pub mod affinity;
pub mod ids;
pub mod matching;

mod blossom;
mod error;

pub use affinity::{AffinityGraph, EdgeWeight};
pub use error::{Error, Result};
pub use ids::{PairKey, PersonId};
pub use matching::{Matching, min_weight_matching};
