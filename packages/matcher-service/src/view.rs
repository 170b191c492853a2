use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, MatcherService, Result};
use matcher_domain::PersonId;
use matcher_storage::models::MatchRow;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
	pub person1_id: PersonId,
	/// `None` marks the round's leftover.
	pub person2_id: Option<PersonId>,
}
impl From<MatchRow> for MatchView {
	fn from(row: MatchRow) -> Self {
		Self { person1_id: row.person1_id, person2_id: row.person2_id }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundView {
	pub generation_id: i64,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub matches: Vec<MatchView>,
}

impl MatcherService {
	/// Returns one committed round, or the latest when `generation_id` is `None`.
	pub async fn view(&self, generation_id: Option<i64>) -> Result<RoundView> {
		if let Some(generation_id) = generation_id.filter(|id| *id <= 0) {
			return Err(Error::InvalidRequest {
				message: format!("generation_id must be positive; got {generation_id}."),
			});
		}

		let generation = self.store.generation(generation_id).await?.ok_or_else(|| {
			let message = match generation_id {
				Some(generation_id) => format!("Generation {generation_id} does not exist."),
				None => "No round has been committed yet.".to_string(),
			};

			Error::NotFound { message }
		})?;
		let rows = self.store.matches_for_generation(generation.generation_id).await?;

		Ok(RoundView {
			generation_id: generation.generation_id,
			created_at: generation.created_at,
			matches: rows.into_iter().map(MatchView::from).collect(),
		})
	}
}
