//! axum binding for [`CallbackRoute`].

// crates.io
use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
};
// self
use crate::{
	_prelude::*,
	flows::{CallbackOutcome, CallbackRequest, CallbackRoute, FlowState},
};

/// Success body; carries no token material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentity {
	/// Surrogate id of the stored record.
	pub id: u64,
	/// Provider name.
	pub provider: String,
	/// Provider user id.
	pub provider_uid: String,
	/// Provider handle.
	pub display_name: Option<String>,
	/// Avatar URL.
	pub avatar: Option<String>,
	/// Final flow state.
	pub state: FlowState,
}
impl From<&CallbackOutcome> for LinkedIdentity {
	fn from(outcome: &CallbackOutcome) -> Self {
		let record = &outcome.record;

		Self {
			id: record.id,
			provider: record.provider.to_string(),
			provider_uid: record.provider_uid.clone(),
			display_name: record.display_name.clone(),
			avatar: record.avatar.clone(),
			state: outcome.state,
		}
	}
}

/// Failure body; never includes provider response bodies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Stable error code from [`Error::code`].
	pub error: String,
	/// Human-readable message.
	pub message: String,
}

impl CallbackRoute {
	/// Router serving `GET` on [`CallbackRoute::route_path`].
	pub fn router(self) -> Router {
		let path = self.route_path().to_owned();

		Router::new().route(&path, get(handle_callback)).with_state(Arc::new(self))
	}
}

async fn handle_callback(
	State(route): State<Arc<CallbackRoute>>,
	Query(params): Query<Vec<(String, String)>>,
) -> Response {
	let request = CallbackRequest::from_pairs(params);

	match route.handle(&request).await {
		Ok(outcome) => (StatusCode::OK, Json(LinkedIdentity::from(&outcome))).into_response(),
		Err(e) => error_response(&e),
	}
}

fn error_response(error: &Error) -> Response {
	let status =
		StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	let body = ErrorBody { error: error.code().to_owned(), message: error.to_string() };

	(status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn error_response_uses_error_status() {
		assert_eq!(error_response(&Error::MissingCode).status(), StatusCode::BAD_REQUEST);
		assert_eq!(error_response(&Error::EmptyExchange).status(), StatusCode::UNAUTHORIZED);
	}
}
