//! Provider request construction, dispatch, and transport error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ProviderError, TransportError},
	http::{self, ProviderHttpClient},
};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Provider endpoint a request was addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
	/// Code-for-token exchange endpoint.
	Token,
	/// User-profile endpoint.
	Profile,
}
impl EndpointKind {
	/// Returns a stable label suitable for messages and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EndpointKind::Token => "token",
			EndpointKind::Profile => "profile",
		}
	}
}
impl Display for EndpointKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(&self, endpoint: EndpointKind, error: HttpClientError<E>) -> Error;
}

/// Mapper for any transport: every transport error becomes [`TransportError::Network`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NetworkErrorMapper;
impl<E> TransportErrorMapper<E> for NetworkErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(&self, endpoint: EndpointKind, err: HttpClientError<E>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
			other => map_common_transport_error(endpoint, other),
		}
	}
}

/// Default mapper for reqwest-backed transports; distinguishes timeouts and builder failures.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			other => map_common_transport_error(endpoint, other),
		}
	}
}

/// Builds the form-encoded POST sent to a token endpoint.
pub fn token_request(url: &Url, form: &[(&str, &str)]) -> Result<HttpRequest> {
	let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();

	Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(ACCEPT, JSON)
		.header(CONTENT_TYPE, FORM)
		.body(body.into_bytes())
		.map_err(|e| ConfigError::from(e).into())
}

/// Builds the bearer-authenticated GET sent to a profile endpoint.
pub fn profile_request(url: &Url, token: &str) -> Result<HttpRequest> {
	Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(ACCEPT, JSON)
		.header(AUTHORIZATION, format!("Bearer {token}"))
		.header(USER_AGENT, http::USER_AGENT)
		.body(Vec::new())
		.map_err(|e| ConfigError::from(e).into())
}

/// Dispatches `request` and decodes the JSON body of a 2xx response.
///
/// Non-2xx responses surface as [`ProviderError::Status`] without echoing the body.
pub async fn send_json<C, M>(
	client: &C,
	mapper: &M,
	endpoint: EndpointKind,
	request: HttpRequest,
) -> Result<Value>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let handle = client.handle();
	let response =
		handle.call(request).await.map_err(|err| mapper.map_transport_error(endpoint, err))?;
	let status = response.status();

	if !status.is_success() {
		return Err(ProviderError::Status { endpoint, status: status.as_u16() }.into());
	}

	serde_json::from_slice(response.body())
		.map_err(|source| ProviderError::MalformedJson { endpoint, source }.into())
}

fn map_common_transport_error<E>(endpoint: EndpointKind, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
		_ => TransportError::Other { endpoint, message: "unclassified transport failure".into() }
			.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: EndpointKind, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { endpoint }.into();
	}

	TransportError::network(endpoint, err).into()
}
