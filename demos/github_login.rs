//! Prints the GitHub authorization URL for the configured app and, when given the URL GitHub
//! redirected back to, completes the login and prints the linked identity.
//!
//! ```sh
//! export LINKS_GITHUB_CLIENT_ID=... LINKS_GITHUB_CLIENT_SECRET=...
//! export LINKS_GITHUB_REDIRECT_URI=http://localhost:8000/oauth/github
//! cargo run --example github_login
//! cargo run --example github_login -- 'http://localhost:8000/oauth/github?code=...'
//! ```

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use oauth2_link::{
	flows::{CallbackRequest, CallbackRoute},
	provider::{GitHub, ProviderClient},
	store::{FileStore, IdentityStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store: Arc<dyn IdentityStore> = Arc::new(FileStore::open("target/demo/identities.json")?);
	let github = Arc::new(GitHub::from_env(store.clone())?);

	println!("Send your user to {}.", github.redirect_url()?);
	println!("Serve the callback on {}.", github.callback_path()?);

	let Some(callback) = env::args().nth(1) else {
		println!("Pass the URL GitHub redirected to as the first argument to finish the login.");

		return Ok(());
	};
	let route = CallbackRoute::new(github)?;
	let outcome = route.handle(&CallbackRequest::from_url(&Url::parse(&callback)?)).await?;
	let record = &outcome.record;

	println!(
		"Linked {} account {} ({}) as record #{}.",
		record.provider,
		record.provider_uid,
		record.display_name.as_deref().unwrap_or("no handle"),
		record.id
	);
	println!("Known identities: {}.", store.list().await?.len());

	Ok(())
}
