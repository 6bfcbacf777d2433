//! Local HTTP listener receiving Google's redirect at the end of the browser
//! consent flow.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};

const SIGNED_IN_PAGE: &str = "<html><body><h3>Signed in to gtasks</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";
const FAILED_PAGE: &str = "<html><body><h3>Authorization failed</h3>\
<p>Return to the terminal for details.</p></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Code { code: String, state: Option<String> },
    Error(String),
}

pub struct RedirectReceiver {
    listener: TcpListener,
    port: u16,
}

impl RedirectReceiver {
    /// Binds an OS-assigned port on the loopback interface.
    pub async fn bind() -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        debug!(port, "listening for consent redirect");
        Ok(Self { listener, port })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    pub async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> AuthResult<String> {
        tokio::time::timeout(timeout, self.accept_code(expected_state))
            .await
            .map_err(|_| AuthError::ConsentTimeout(timeout.as_secs()))?
    }

    async fn accept_code(&self, expected_state: &str) -> AuthResult<String> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let mut reader = BufReader::new(stream);
            let request_line = read_request_head(&mut reader).await?;
            debug!(%addr, request = %request_line.trim_end(), "redirect request");

            match parse_callback(&request_line) {
                Some(Callback::Code { code, state }) => {
                    if state.as_deref() != Some(expected_state) {
                        respond(reader.get_mut(), "400 Bad Request", FAILED_PAGE).await;
                        return Err(AuthError::StateMismatch);
                    }
                    respond(reader.get_mut(), "200 OK", SIGNED_IN_PAGE).await;
                    return Ok(code);
                }
                Some(Callback::Error(error)) => {
                    respond(reader.get_mut(), "200 OK", FAILED_PAGE).await;
                    return Err(AuthError::Denied(error));
                }
                None => respond(reader.get_mut(), "404 Not Found", "").await,
            }
        }
    }
}

/// Reads the request line and discards the headers.
async fn read_request_head(reader: &mut BufReader<TcpStream>) -> std::io::Result<String> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(request_line)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(error = %e, "could not answer redirect request");
    }
    let _ = stream.shutdown().await;
}

/// Extracts the OAuth result from a request line such as
/// `GET /?state=..&code=.. HTTP/1.1`. Returns `None` for unrelated requests.
pub fn parse_callback(request_line: &str) -> Option<Callback> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse("http://127.0.0.1/").ok()?.join(target).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Callback::Error(error));
    }
    code.map(|code| Callback::Code { code, state })
}

/// Points the user at the consent page. Falls back to printing the URL and
/// copying it to the clipboard when no browser can be launched.
pub fn open_in_browser(url: &str) {
    println!("Opening your browser to authorize gtasks. If nothing happens, visit:\n\n  {url}\n");
    if let Err(e) = webbrowser::open(url) {
        warn!(error = %e, "could not launch a browser");
        copy_to_clipboard(url);
    }
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_owned())) {
        Ok(()) => println!("The authorization URL has been copied to your clipboard."),
        Err(e) => debug!(error = %e, "clipboard unavailable"),
    }
}
