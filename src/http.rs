//! HTTP transport for one device session.
//!
//! Each [`DeviceClient`] owns its cookie jar; nothing is shared across
//! sessions, so concurrent sessions (and tests) stay isolated. Calls carry
//! the timeout configured for the device and are never retried silently;
//! the session controller decides what a failed call means.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct DeviceClient {
    inner: Client,
    jar: Arc<Jar>,
    base: Url,
}

impl DeviceClient {
    pub fn new(address: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let base = Url::parse(&format!("http://{address}/"))
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"),
        );
        // the device's PHP endpoints answer differently to non-AJAX requests
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let jar = Arc::new(Jar::default());
        let inner = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { inner, jar, base })
    }

    fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap_or_else(|_| self.base.clone())
    }

    pub async fn get_page(&self, path: &str) -> Result<String> {
        let resp = self.inner.get(self.url(path)).send().await?;
        Ok(resp.error_for_status()?.text().await?)
    }

    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<String> {
        let resp = self.inner.post(self.url(path)).form(form).send().await?;
        Ok(resp.error_for_status()?.text().await?)
    }

    /// Install a cookie the device handed back in a page body instead of a
    /// Set-Cookie header (the login acknowledgement works that way).
    pub fn install_cookie(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}; Path=/"), &self.base);
    }

    #[cfg(test)]
    pub fn cookie_header(&self) -> Option<String> {
        use reqwest::cookie::CookieStore;
        self.jar
            .cookies(&self.base)
            .and_then(|v| v.to_str().map(|s| s.to_string()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_jar_is_scoped_per_client() {
        let a = DeviceClient::new(
            "192.168.0.1",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        let b = DeviceClient::new(
            "192.168.0.1",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();

        a.install_cookie("credential", "tok-a");
        assert_eq!(a.cookie_header().as_deref(), Some("credential=tok-a"));
        assert_eq!(b.cookie_header(), None);
    }

    #[test]
    fn invalid_address_is_rejected() {
        let err = DeviceClient::new(
            "not a host",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }
}
