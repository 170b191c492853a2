use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, MatcherService, Result, validate_person_id};
use matcher_domain::PersonId;
use matcher_storage::models::WaitingEntry;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntryView {
	pub person_id: PersonId,
	#[serde(with = "crate::time_serde")]
	pub signup_time: OffsetDateTime,
}
impl From<WaitingEntry> for WaitingEntryView {
	fn from(entry: WaitingEntry) -> Self {
		Self { person_id: entry.person_id, signup_time: entry.signup_time }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignupResponse {
	pub entry: WaitingEntryView,
	/// `false` when the person was already waiting; the existing entry is returned.
	pub created: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawResponse {
	pub removed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaitingResponse {
	pub entries: Vec<WaitingEntryView>,
}

impl MatcherService {
	pub async fn signup(&self, person_id: PersonId) -> Result<SignupResponse> {
		validate_person_id(person_id)?;

		if !self.store.person_exists(person_id).await? {
			return Err(Error::NotFound { message: format!("Person {person_id} does not exist.") });
		}

		let outcome = self.store.add_waiting(person_id).await?;

		if outcome.created() {
			tracing::info!(person_id = person_id.0, "Person joined the waiting set.");
		} else {
			tracing::debug!(person_id = person_id.0, "Person is already waiting.");
		}

		Ok(SignupResponse { entry: outcome.entry().into(), created: outcome.created() })
	}

	pub async fn withdraw(&self, person_id: PersonId) -> Result<WithdrawResponse> {
		validate_person_id(person_id)?;

		let removed = self.store.remove_waiting(person_id).await?;

		if removed {
			tracing::info!(person_id = person_id.0, "Person left the waiting set.");
		}

		Ok(WithdrawResponse { removed })
	}

	pub async fn waiting(&self) -> Result<WaitingResponse> {
		let entries = self.store.list_waiting().await?;

		Ok(WaitingResponse { entries: entries.into_iter().map(WaitingEntryView::from).collect() })
	}
}
