pub mod round;
pub mod time_serde;
pub mod view;
pub mod waiting;

mod error;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use error::{Error, Result};
pub use round::{PairView, RoundPhase, RoundReport};
pub use view::{MatchView, RoundView};
pub use waiting::{SignupResponse, WaitingEntryView, WaitingResponse, WithdrawResponse};

use matcher_config::Config;
use matcher_domain::PersonId;
use matcher_storage::RoundStore;

pub struct MatcherService {
	pub cfg: Config,
	pub store: Arc<dyn RoundStore>,
	/// Queues triggers issued to this instance. The store's round lock still
	/// arbitrates between instances.
	round_gate: Mutex<()>,
}
impl MatcherService {
	pub fn new(cfg: Config, store: Arc<dyn RoundStore>) -> Self {
		Self { cfg, store, round_gate: Mutex::new(()) }
	}
}

pub(crate) fn validate_person_id(person_id: PersonId) -> Result<()> {
	if person_id.0 <= 0 {
		return Err(Error::InvalidRequest {
			message: format!("person_id must be positive; got {person_id}."),
		});
	}

	Ok(())
}
