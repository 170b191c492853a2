use time::OffsetDateTime;

use matcher_domain::{EdgeWeight, PairKey, PersonId};

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Person {
	pub person_id: i64,
	pub name: String,
	pub email: String,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitingEntry {
	pub person_id: PersonId,
	pub signup_time: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Generation {
	pub generation_id: i64,
	pub created_at: OffsetDateTime,
}

/// One persisted pairing. `person2_id` is `None` for the round's leftover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchRow {
	pub generation_id: i64,
	pub position: i32,
	pub person1_id: PersonId,
	pub person2_id: Option<PersonId>,
}

/// Everything a round writes, applied as one unit.
#[derive(Clone, Debug)]
pub struct RoundCommit {
	pub created_at: OffsetDateTime,
	pub pairs: Vec<PairKey>,
	pub leftover: Option<PersonId>,
	/// Absolute weights to store for each matched pair.
	pub edge_updates: Vec<EdgeWeight>,
	/// Waiting entries to clear.
	pub matched: Vec<PersonId>,
}
impl RoundCommit {
	/// Match rows in persisted order: pairs first, leftover last.
	pub fn match_rows(&self, generation_id: i64) -> Vec<MatchRow> {
		let pairs = self.pairs.iter().map(|pair| (pair.low(), Some(pair.high())));
		let leftover = self.leftover.map(|person| (person, None));

		pairs
			.chain(leftover)
			.enumerate()
			.map(|(position, (person1_id, person2_id))| MatchRow {
				generation_id,
				position: position as i32,
				person1_id,
				person2_id,
			})
			.collect()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignupOutcome {
	Inserted(WaitingEntry),
	/// The person was already waiting; carries the existing entry.
	Existing(WaitingEntry),
}
impl SignupOutcome {
	pub fn entry(&self) -> WaitingEntry {
		match self {
			Self::Inserted(entry) | Self::Existing(entry) => *entry,
		}
	}

	pub fn created(&self) -> bool {
		matches!(self, Self::Inserted(_))
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct WaitingRow {
	pub person_id: i64,
	pub signup_time: OffsetDateTime,
}
impl From<WaitingRow> for WaitingEntry {
	fn from(row: WaitingRow) -> Self {
		Self { person_id: PersonId(row.person_id), signup_time: row.signup_time }
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EdgeRow {
	pub person_low: i64,
	pub person_high: i64,
	pub weight: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MatchDbRow {
	pub generation_id: i64,
	pub position: i32,
	pub person1_id: i64,
	pub person2_id: Option<i64>,
}
impl From<MatchDbRow> for MatchRow {
	fn from(row: MatchDbRow) -> Self {
		Self {
			generation_id: row.generation_id,
			position: row.position,
			person1_id: PersonId(row.person1_id),
			person2_id: row.person2_id.map(PersonId),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn match_rows_put_the_leftover_last() {
		let commit = RoundCommit {
			created_at: OffsetDateTime::UNIX_EPOCH,
			pairs: vec![
				PairKey::new(PersonId(1), PersonId(4)).expect("distinct pair"),
				PairKey::new(PersonId(2), PersonId(3)).expect("distinct pair"),
			],
			leftover: Some(PersonId(5)),
			edge_updates: Vec::new(),
			matched: Vec::new(),
		};
		let rows = commit.match_rows(7);

		assert_eq!(rows.len(), 3);
		assert_eq!(rows[0].person2_id, Some(PersonId(4)));
		assert_eq!(rows[2].position, 2);
		assert_eq!(rows[2].person1_id, PersonId(5));
		assert_eq!(rows[2].person2_id, None);
		assert!(rows.iter().all(|row| row.generation_id == 7));
	}
}
