use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

// Transport-level default; generation calls override this per request from
// the configured timeout.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
