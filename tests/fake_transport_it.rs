// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use parking_lot::Mutex;
// self
use oauth2_link::{
	cache::RequestContext,
	config::ConfigKey,
	error::{Error, TransportError},
	flows::{CallbackRequest, CallbackRoute, FlowState},
	http::ProviderHttpClient,
	oauth::{
		EndpointKind, NetworkErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{Method, StatusCode},
		},
	},
	provider::{GitHub, ProviderClient, github},
	store::{IdentityStore, MemoryStore},
};

#[derive(Debug)]
struct ConnectionRefused;
impl Display for ConnectionRefused {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Connection refused.")
	}
}
impl StdError for ConnectionRefused {}

type Canned = Result<(u16, &'static str), ()>;

/// Transport answering from a script and recording every request it sees.
#[derive(Clone, Default)]
struct ScriptedHttpClient {
	script: Arc<Mutex<VecDeque<Canned>>>,
	seen: Arc<Mutex<Vec<(Method, String)>>>,
}
impl ScriptedHttpClient {
	fn new(script: impl IntoIterator<Item = Canned>) -> Self {
		Self { script: Arc::new(Mutex::new(script.into_iter().collect())), ..Default::default() }
	}
}
impl ProviderHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = ConnectionRefused;

	fn handle(&self) -> Self::Handle {
		ScriptedHandle(self.clone())
	}
}

struct ScriptedHandle(ScriptedHttpClient);
impl<'a> AsyncHttpClient<'a> for ScriptedHandle {
	type Error = HttpClientError<ConnectionRefused>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		self.0.seen.lock().push((request.method().clone(), request.uri().path().to_owned()));

		let next = self.0.script.lock().pop_front();

		Box::pin(async move {
			match next {
				Some(Ok((status, body))) => {
					let mut response = HttpResponse::new(body.as_bytes().to_vec());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					Ok(response)
				},
				Some(Err(())) | None => Err(HttpClientError::Reqwest(Box::new(ConnectionRefused))),
			}
		})
	}
}

fn build_client(
	http: ScriptedHttpClient,
) -> (Arc<GitHub<ScriptedHttpClient, NetworkErrorMapper>>, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::default());
	let descriptor = github::descriptor().expect("GitHub descriptor should build.");
	let config = descriptor
		.defaults
		.clone()
		.with(ConfigKey::ClientId, "cid")
		.with(ConfigKey::ClientSecret, "secret")
		.with(ConfigKey::RedirectUri, "/login/github");
	let client = GitHub::with_config(descriptor, config, store.clone(), http, NetworkErrorMapper);

	(Arc::new(client), store)
}

#[tokio::test]
async fn callback_runs_over_any_transport() {
	let http = ScriptedHttpClient::new([
		Ok((200, "{\"access_token\":\"abc\"}")),
		Ok((200, "{\"id\":\"node-7\",\"login\":\"hubot\"}")),
	]);
	let (client, store) = build_client(http.clone());
	let route = CallbackRoute::new(client).expect("Relative redirect URI should bind verbatim.");

	assert_eq!(route.path(), "/login/github");

	let outcome = route
		.handle(&CallbackRequest::from_query("code=c"))
		.await
		.expect("Scripted callback should succeed.");

	assert_eq!(outcome.state, FlowState::Persisted);
	assert_eq!(outcome.record.provider_uid, "node-7");
	assert_eq!(outcome.record.avatar, None);
	// No `expires_in` from the provider: the record is stored already expired.
	assert!(outcome.record.is_expired_at(outcome.record.created_at));
	assert_eq!(store.list().await.expect("Listing should succeed.").len(), 1);
	assert_eq!(
		*http.seen.lock(),
		vec![
			(Method::POST, "/login/oauth/access_token".to_owned()),
			(Method::GET, "/user".to_owned())
		]
	);
}

#[tokio::test]
async fn transport_failures_surface_as_transport_errors() {
	let (client, store) = build_client(ScriptedHttpClient::new([Err(())]));
	let ctx = RequestContext::new();
	let err = client
		.exchange_code_for_token(&ctx, &CallbackRequest::from_query("code=c"))
		.await
		.expect_err("Refused connection must fail the exchange.");

	assert!(matches!(
		err,
		Error::Transport(TransportError::Network { endpoint: EndpointKind::Token, .. })
	));
	assert_eq!(err.status_code(), 502);
	assert!(store.list().await.expect("Listing should succeed.").is_empty());
}

#[tokio::test]
async fn profile_failure_halts_before_upsert() {
	let http = ScriptedHttpClient::new([Ok((200, "{\"access_token\":\"abc\"}")), Ok((401, "{}"))]);
	let (client, store) = build_client(http);
	let route = CallbackRoute::new(client).expect("Callback route should bind.");
	let err = route
		.handle(&CallbackRequest::from_query("code=c"))
		.await
		.expect_err("Rejected profile fetch must fail the callback.");

	assert_eq!(err.code(), "provider_error");
	assert!(store.list().await.expect("Listing should succeed.").is_empty());
}
