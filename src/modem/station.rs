//! Arris-family station driver: the session controller.
//!
//! Owns the only long-lived mutable state in the pipeline, the session
//! cookie jar and the authentication state. The protocol is strictly
//! sequential per session: login completes before any read, reads never
//! overlap logout, and a failed session is terminal. Callers construct a
//! new [`StationModem`] to retry.

use async_trait::async_trait;
use chrono::Utc;

use crate::config::Config;
use crate::crypto::{self, ARRIS_PROFILE};
use crate::discovery::DeviceAddress;
use crate::error::{Error, Result};
use crate::http::DeviceClient;
use crate::modem::Modem;
use crate::models::{DocsisStatus, OverviewData, StatusData};
use crate::parser;

const LOGIN_PAGE_PATH: &str = "/";
const LOGIN_PATH: &str = "php/ajaxSet_Password.php";
const LOGOUT_PATH: &str = "php/logout.php";
const STATUS_PATH: &str = "php/status_status_data.php";
const OVERVIEW_PATH: &str = "php/overview_data.php";
const DOCSIS_PATH: &str = "php/status_docsis_data.php";
const RESTART_PATH: &str = "php/ajaxSet_status_restart.php";

/// Persistent session states. The transient resolve/fetch/authenticate
/// phases live inside `login()`; what survives between calls is only
/// whether the session is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Authenticated,
    Closed,
    Failed,
}

pub struct StationModem {
    address: DeviceAddress,
    client: DeviceClient,
    username: String,
    state: SessionState,
}

impl StationModem {
    pub fn new(address: DeviceAddress, config: &Config) -> Result<Self> {
        let client = DeviceClient::new(
            address.as_str(),
            config.http.timeout(),
            config.http.connect_timeout(),
        )?;
        Ok(Self {
            address,
            client,
            username: config.device.username.clone(),
            state: SessionState::Idle,
        })
    }

    fn require_authenticated(&self) -> Result<()> {
        match self.state {
            SessionState::Authenticated => Ok(()),
            SessionState::Idle => Err(Error::NotAuthenticated),
            SessionState::Closed | SessionState::Failed => Err(Error::SessionClosed),
        }
    }

    /// Authenticated GET. A transport failure poisons the session.
    async fn fetch_page(&mut self, path: &str) -> Result<String> {
        self.require_authenticated()?;
        match self.client.get_page(path).await {
            Ok(html) => Ok(html),
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.state = SessionState::Failed;
        Err(err)
    }
}

#[async_trait]
impl Modem for StationModem {
    fn name(&self) -> &'static str {
        "arris-station"
    }

    fn address(&self) -> &DeviceAddress {
        &self.address
    }

    async fn login(&mut self, password: &str) -> Result<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Authenticated => return Ok(()),
            SessionState::Closed | SessionState::Failed => return Err(Error::SessionClosed),
        }

        // Crypto material rotates per session; always fetch a fresh page.
        let login_page = match self.client.get_page(LOGIN_PAGE_PATH).await {
            Ok(html) => html,
            Err(err) => return self.fail(err),
        };
        let material = parser::extract_crypto_material(&login_page);

        let credential =
            match crypto::derive_credential(&self.username, password, &material, &ARRIS_PROFILE) {
                Ok(credential) => credential,
                Err(err) => return self.fail(err),
            };

        let form = [
            ("username", self.username.as_str()),
            ("password", credential.0.as_str()),
            ("sessionId", material.session_id.as_str()),
        ];
        let response = match self.client.post_form(LOGIN_PATH, &form).await {
            Ok(body) => body,
            Err(err) => return self.fail(err),
        };

        // Success signal: the response page instructs the browser to set a
        // credential cookie. Anything else means the device said no.
        let token = parser::extract_credential_string(&response);
        if token.is_empty() {
            return self.fail(Error::LoginFailed);
        }
        self.client.install_cookie("credential", &token);

        self.state = SessionState::Authenticated;
        tracing::debug!(address = %self.address, "session established");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if self.state == SessionState::Authenticated {
            // Best effort: the session is closed locally even if the device
            // never sees the logout.
            if let Err(err) = self.client.post_form(LOGOUT_PATH, &[("logout", "true")]).await {
                tracing::debug!(%err, "logout request failed, closing session anyway");
            }
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    async fn status(&mut self) -> Result<StatusData> {
        let html = self.fetch_page(STATUS_PATH).await?;
        Ok(parser::extract_status(&html))
    }

    async fn overview(&mut self) -> Result<OverviewData> {
        let html = self.fetch_page(OVERVIEW_PATH).await?;
        Ok(parser::extract_overview(&html))
    }

    async fn docsis(&mut self) -> Result<DocsisStatus> {
        let html = self.fetch_page(DOCSIS_PATH).await?;
        Ok(parser::extract_docsis(&html, Utc::now()))
    }

    async fn restart(&mut self) -> Result<()> {
        self.require_authenticated()?;
        match self
            .client
            .post_form(RESTART_PATH, &[("RestartReset", "Restart")])
            .await
        {
            Ok(_) => {
                tracing::info!(address = %self.address, "restart acknowledged");
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn modem() -> StationModem {
        StationModem::new(DeviceAddress::new("192.0.2.1"), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn reads_before_login_are_rejected_without_network() {
        let mut m = modem();
        assert!(matches!(m.docsis().await, Err(Error::NotAuthenticated)));
        assert!(matches!(m.status().await, Err(Error::NotAuthenticated)));
        assert!(matches!(m.overview().await, Err(Error::NotAuthenticated)));
        assert!(matches!(m.restart().await, Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_closes_the_session() {
        let mut m = modem();
        m.logout().await.unwrap();
        m.logout().await.unwrap();
        assert!(matches!(m.docsis().await, Err(Error::SessionClosed)));
        assert!(matches!(m.login("pw").await, Err(Error::SessionClosed)));
    }

    // ---- stub device ----

    const LOGIN_PAGE: &str = concat!(
        "<script>\n",
        "var csp_nonce = \"n1\";\n",
        "var myIv = 'aabbccddeeff00112233445566778899';\n",
        "var mySalt = '00112233445566778899aabbccddeeff';\n",
        "var currentSessionId = \"sid1\";\n",
        "</script>"
    );

    const LOGIN_PAGE_NO_SALT: &str = concat!(
        "<script>\n",
        "var csp_nonce = \"n1\";\n",
        "var myIv = 'aabbccddeeff00112233445566778899';\n",
        "var currentSessionId = \"sid1\";\n",
        "</script>"
    );

    const LOGIN_OK: &str = "<script>createCookie(\"credential\", 'tok123');</script>";

    const DOCSIS_PAGE: &str = concat!(
        "json_dsData = [{\"ChannelID\":\"1\",\"ChannelType\":\"SC-QAM\",",
        "\"Frequency\":\"602\",\"SNRLevel\":\"39.1\",\"PowerLevel\":\"3.2\",",
        "\"Modulation\":\"256QAM\",\"LockStatus\":\"Locked\"}];\n",
        "json_usData = [];"
    );

    fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn content_length(head: &str) -> Option<usize> {
        head.to_ascii_lowercase()
            .lines()
            .find_map(|l| l.strip_prefix("content-length:").map(|v| v.trim().to_string()))
            .and_then(|v| v.parse().ok())
    }

    async fn handle_connection(
        mut sock: tokio::net::TcpStream,
        login_page: &'static str,
        accept_login: bool,
        drop_reads: bool,
    ) {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        let header_end = loop {
            match sock.read(&mut tmp).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                        break pos + 4;
                    }
                }
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        if let Some(len) = content_length(&head) {
            while buf.len() < header_end + len {
                match sock.read(&mut tmp).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&tmp[..n]),
                }
            }
        }
        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
        let authed = head.to_ascii_lowercase().contains("credential=tok123");

        // a device that dies mid-session: login works, reads get the
        // connection torn down without a response
        if drop_reads && path != "/" && !path.contains("ajaxSet_Password") {
            let _ = sock.shutdown().await;
            return;
        }

        let (status, body) = if path == "/" {
            ("200 OK", login_page.to_string())
        } else if path.contains("ajaxSet_Password") {
            if accept_login {
                ("200 OK", LOGIN_OK.to_string())
            } else {
                ("200 OK", "<html>login denied</html>".to_string())
            }
        } else if path.contains("status_docsis_data") {
            if authed {
                ("200 OK", DOCSIS_PAGE.to_string())
            } else {
                ("403 Forbidden", String::new())
            }
        } else {
            ("200 OK", String::new())
        };
        let resp = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(resp.as_bytes()).await;
        let _ = sock.shutdown().await;
    }

    async fn start_stub(login_page: &'static str, accept_login: bool, drop_reads: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(handle_connection(sock, login_page, accept_login, drop_reads));
            }
        });
        address
    }

    #[tokio::test]
    async fn full_lifecycle_against_stub_device() {
        let addr = start_stub(LOGIN_PAGE, true, false).await;
        let mut m =
            StationModem::new(DeviceAddress::new(addr.as_str()), &Config::default()).unwrap();

        m.login("pw1").await.unwrap();

        // the read only succeeds if the jar replays the credential cookie
        let docsis = m.docsis().await.unwrap();
        assert_eq!(docsis.downstream.len(), 1);
        assert_eq!(docsis.downstream[0].channel_id, "1");

        m.logout().await.unwrap();
        assert!(matches!(m.docsis().await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn rejected_login_fails_the_session_terminally() {
        let addr = start_stub(LOGIN_PAGE, false, false).await;
        let mut m =
            StationModem::new(DeviceAddress::new(addr.as_str()), &Config::default()).unwrap();

        assert!(matches!(m.login("pw1").await, Err(Error::LoginFailed)));
        assert!(matches!(m.docsis().await, Err(Error::SessionClosed)));
        // no second attempt on a failed session instance
        assert!(matches!(m.login("pw1").await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn transport_failure_during_read_poisons_the_session() {
        let addr = start_stub(LOGIN_PAGE, true, true).await;
        let mut m =
            StationModem::new(DeviceAddress::new(addr.as_str()), &Config::default()).unwrap();

        m.login("pw1").await.unwrap();

        assert!(matches!(m.docsis().await, Err(Error::Transport(_))));
        // the failed session is terminal for every later call
        assert!(matches!(m.status().await, Err(Error::SessionClosed)));
        assert!(matches!(m.login("pw1").await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn incomplete_crypto_material_is_an_auth_setup_failure() {
        let addr = start_stub(LOGIN_PAGE_NO_SALT, true, false).await;
        let mut m =
            StationModem::new(DeviceAddress::new(addr.as_str()), &Config::default()).unwrap();

        let err = m.login("pw1").await.unwrap_err();
        assert!(matches!(err, Error::AuthSetup(ref msg) if msg.contains("salt")));
        assert!(matches!(m.docsis().await, Err(Error::SessionClosed)));
    }
}
