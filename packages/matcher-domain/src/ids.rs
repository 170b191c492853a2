use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);
impl fmt::Display for PersonId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
impl From<i64> for PersonId {
	fn from(value: i64) -> Self {
		Self(value)
	}
}

/// Unordered pair of distinct people, stored with the smaller id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
	low: PersonId,
	high: PersonId,
}
impl PairKey {
	/// Returns `None` for a self pair.
	pub fn new(a: PersonId, b: PersonId) -> Option<Self> {
		match a.cmp(&b) {
			std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
			std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
			std::cmp::Ordering::Equal => None,
		}
	}

	pub fn low(&self) -> PersonId {
		self.low
	}

	pub fn high(&self) -> PersonId {
		self.high
	}
}
impl fmt::Display for PairKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {})", self.low, self.high)
	}
}
