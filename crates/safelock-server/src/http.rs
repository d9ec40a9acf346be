//! HTTP transport.
//!
//! [`HttpDriver`] serves the device over HTTP/1.1 with `tiny_http`, one
//! request at a time, on the thread running the device loop.
//!
//! # Routes
//!
//! | Path                          | Target                  |
//! |-------------------------------|-------------------------|
//! | `/`, `/index.html`            | frameset                |
//! | `/top_frame.html`             | title frame             |
//! | `/menu_frame.html`            | command forms           |
//! | `/change_auth.html`           | credential form         |
//! | `/change_ap.html`             | provisioning form       |
//! | `/safe`, `/safe/`             | command endpoint        |
//! | anything else                 | unrouted                |
//!
//! Unrouted requests still reach the controller: a standalone device
//! answers them with the provisioning form, a joined one with 404.
//!
//! Parameters come from the query string followed by an urlencoded body.
//! Administrative credentials come from HTTP Basic authorization.
//!
//! # Progress
//!
//! An open reports one line per second. The first line commits the
//! response: status and headers go out immediately with `Connection:
//! close`, each line is flushed as it is reported, and the socket closes
//! once the final response has supplied whatever was not yet sent.

use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use safelock_app::{Driver, Progress};
use safelock_core::{Page, Params, Request, Response, Target};
use tiny_http::{Header, Server};
use tracing::{debug, warn};

use crate::{
    ServerError,
    gpio::SysfsActuator,
    host::{DropDirUpdates, HostRadio, LogAdvertiser},
    pages,
};

/// Largest request body read; the rest is ignored.
pub const MAX_BODY: u64 = 4096;

const STREAM_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n";

/// Map a request path (query already removed) to its target.
pub fn route(path: &str) -> Target {
    match path {
        "/" | "/index.html" => Target::Page(Page::Index),
        "/top_frame.html" => Target::Page(Page::TopFrame),
        "/menu_frame.html" => Target::Page(Page::MenuFrame),
        "/change_auth.html" => Target::Page(Page::ChangeAuth),
        "/change_ap.html" => Target::Page(Page::Provisioning),
        "/safe" | "/safe/" => Target::Command,
        _ => Target::Unrouted,
    }
}

/// Decode `Authorization: Basic ...` into a username and password.
pub fn basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Build a device request from the raw parts of an HTTP request.
pub fn decode_request(url: &str, authorization: Option<&str>, body: &[u8]) -> Request {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let target = route(path);

    let params: Params = form_urlencoded::parse(query.as_bytes())
        .chain(form_urlencoded::parse(body))
        .collect();

    let request = Request { target, params, credentials: None };
    match authorization.and_then(basic_credentials) {
        Some((username, password)) => request.with_credentials(username, password),
        None => request,
    }
}

/// HTTP response ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code
    pub status: u16,
    /// Value of `Content-Type`
    pub content_type: &'static str,
    /// Value of `WWW-Authenticate`, for challenges
    pub challenge: Option<String>,
    /// Body
    pub body: String,
}

/// Turn a device response into an HTTP reply.
pub fn encode_response(response: Response) -> Reply {
    match response {
        Response::Text(text) => {
            Reply { status: 200, content_type: "text/plain", challenge: None, body: text }
        },
        Response::Page { page, vars } => Reply {
            status: 200,
            content_type: "text/html",
            challenge: None,
            body: pages::render(page, &vars),
        },
        Response::Challenge { realm } => Reply {
            status: 401,
            content_type: "text/plain",
            challenge: Some(format!("Basic realm=\"{realm}\"")),
            body: "Authentication required".to_string(),
        },
        Response::NotFound => Reply {
            status: 404,
            content_type: "text/plain",
            challenge: None,
            body: "Not found".to_string(),
        },
    }
}

fn send(raw: tiny_http::Request, reply: Reply) -> io::Result<()> {
    let mut response = tiny_http::Response::from_data(reply.body).with_status_code(reply.status);

    let mut headers = vec![("Content-Type", reply.content_type.to_string())];
    if let Some(challenge) = reply.challenge {
        headers.push(("WWW-Authenticate", challenge));
    }

    for (name, value) in headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!(header = name, "header value not representable"),
        }
    }

    raw.respond(response)
}

enum Stage {
    /// Nothing sent yet
    Pending(Box<tiny_http::Request>),
    /// Headers and some lines already on the wire
    Streaming {
        writer: Box<dyn Write + Send>,
        sent: String,
    },
    /// The connection failed mid-stream
    Broken,
}

/// Answers one HTTP request, either all at once or as streamed progress.
pub struct HttpResponder {
    stage: Stage,
}

impl HttpResponder {
    fn new(raw: tiny_http::Request) -> Self {
        Self { stage: Stage::Pending(Box::new(raw)) }
    }

    fn finish(self, reply: Reply) -> io::Result<()> {
        match self.stage {
            Stage::Pending(raw) => send(*raw, reply),
            Stage::Streaming { mut writer, sent } => {
                let rest = reply.body.strip_prefix(sent.as_str()).unwrap_or(&reply.body);
                writer.write_all(rest.as_bytes())?;
                writer.flush()
            },
            Stage::Broken => {
                debug!("dropping response for a broken stream");
                Ok(())
            },
        }
    }
}

impl Progress for HttpResponder {
    fn progress(&mut self, line: &str) {
        let stage = std::mem::replace(&mut self.stage, Stage::Broken);
        self.stage = match stage {
            Stage::Pending(raw) => {
                let mut writer = (*raw).into_writer();
                match write_flushed(&mut writer, &format!("{STREAM_HEAD}{line}")) {
                    Ok(()) => Stage::Streaming { writer, sent: line.to_string() },
                    Err(err) => {
                        warn!(%err, "failed to start progress stream");
                        Stage::Broken
                    },
                }
            },
            Stage::Streaming { mut writer, mut sent } => {
                match write_flushed(&mut writer, &format!("\n{line}")) {
                    Ok(()) => {
                        sent.push('\n');
                        sent.push_str(line);
                        Stage::Streaming { writer, sent }
                    },
                    Err(err) => {
                        warn!(%err, "progress stream broken");
                        Stage::Broken
                    },
                }
            },
            Stage::Broken => Stage::Broken,
        };
    }
}

fn write_flushed(writer: &mut dyn Write, text: &str) -> io::Result<()> {
    writer.write_all(text.as_bytes())?;
    writer.flush()
}

/// Host peripherals attached to the driver.
#[derive(Debug)]
pub struct Peripherals {
    /// Relay
    pub actuator: SysfsActuator,
    /// Network interface
    pub radio: HostRadio,
    /// Service discovery
    pub advertiser: LogAdvertiser,
    /// Firmware updates
    pub updates: DropDirUpdates,
}

/// Production [`Driver`]: HTTP requests plus host peripherals.
pub struct HttpDriver {
    server: Server,
    peripherals: Peripherals,
}

impl HttpDriver {
    /// Listen on `addr`.
    pub fn bind(addr: &str, peripherals: Peripherals) -> Result<Self, ServerError> {
        let server = Server::http(addr)
            .map_err(|err| ServerError::Bind { addr: addr.to_string(), reason: err.to_string() })?;
        Ok(Self { server, peripherals })
    }

    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Attached peripherals.
    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }
}

impl Driver for HttpDriver {
    type Error = ServerError;
    type Responder = HttpResponder;
    type Actuator = SysfsActuator;
    type Radio = HostRadio;
    type Advertiser = LogAdvertiser;
    type Updates = DropDirUpdates;

    fn poll_request(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(Request, Self::Responder)>, Self::Error> {
        let Some(mut raw) = self.server.recv_timeout(timeout)? else {
            return Ok(None);
        };

        let mut body = Vec::new();
        if let Err(err) = raw.as_reader().take(MAX_BODY).read_to_end(&mut body) {
            warn!(%err, "failed to read request body");
            body.clear();
        }

        let authorization = raw
            .headers()
            .iter()
            .find(|header| header.field.equiv("Authorization"))
            .map(|header| header.value.as_str().to_string());

        let request = decode_request(raw.url(), authorization.as_deref(), &body);
        if request.target == Target::Unrouted {
            debug!(url = raw.url(), "no route");
        }
        Ok(Some((request, HttpResponder::new(raw))))
    }

    fn respond(&mut self, responder: Self::Responder, response: Response) -> Result<(), Self::Error> {
        Ok(responder.finish(encode_response(response))?)
    }

    fn actuator(&mut self) -> &mut Self::Actuator {
        &mut self.peripherals.actuator
    }

    fn radio(&mut self) -> &mut Self::Radio {
        &mut self.peripherals.radio
    }

    fn advertiser(&mut self) -> &mut Self::Advertiser {
        &mut self.peripherals.advertiser
    }

    fn updates(&mut self) -> &mut Self::Updates {
        &mut self.peripherals.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes() {
        assert_eq!(route("/"), Target::Page(Page::Index));
        assert_eq!(route("/menu_frame.html"), Target::Page(Page::MenuFrame));
        assert_eq!(route("/change_ap.html"), Target::Page(Page::Provisioning));
        assert_eq!(route("/safe/"), Target::Command);
        assert_eq!(route("/safe"), Target::Command);
        assert_eq!(route("/etc/passwd"), Target::Unrouted);
    }

    #[test]
    fn query_and_body_both_feed_params() {
        let request = decode_request("/safe/?status=1", None, b"open=Open+Safe&duration=20");

        assert_eq!(request.target, Target::Command);
        assert_eq!(request.params.get("status"), Some("1"));
        assert_eq!(request.params.get("open"), Some("Open Safe"));
        assert_eq!(request.params.get("duration"), Some("20"));
        assert_eq!(request.credentials, None);
    }

    #[test]
    fn percent_encoding_decoded() {
        let request = decode_request("/safe", None, b"lock1=a%26b&lock2=a%26b&lock=");
        assert_eq!(request.params.get("lock1"), Some("a&b"));
    }

    #[test]
    fn basic_auth_decoded() {
        // "admin:s3cr:et"
        let header = "Basic YWRtaW46czNjcjpldA==";
        assert_eq!(basic_credentials(header), Some(("admin".into(), "s3cr:et".into())));

        let request = decode_request("/", Some(header), b"");
        let credentials = request.credentials.unwrap();
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password, "s3cr:et");
    }

    #[test]
    fn malformed_authorization_ignored() {
        assert_eq!(basic_credentials("Bearer abc"), None);
        assert_eq!(basic_credentials("Basic !!!"), None);
        // "nocolon"
        assert_eq!(basic_credentials("Basic bm9jb2xvbg=="), None);
        assert_eq!(decode_request("/safe", Some("Basic !!!"), b"").credentials, None);
    }

    #[test]
    fn unknown_path_keeps_its_parameters() {
        let request = decode_request("/generate_204?x=1", None, b"ssid=home");
        assert_eq!(request.target, Target::Unrouted);
        assert_eq!(request.params.get("ssid"), Some("home"));
    }

    #[test]
    fn challenge_reply() {
        let reply = encode_response(Response::Challenge { realm: "safe".into() });
        assert_eq!(reply.status, 401);
        assert_eq!(reply.challenge.as_deref(), Some("Basic realm=\"safe\""));
    }

    #[test]
    fn text_and_not_found_replies() {
        let reply = encode_response(Response::Text("Safe is unlocked".into()));
        assert_eq!((reply.status, reply.content_type), (200, "text/plain"));
        assert_eq!(reply.body, "Safe is unlocked");

        assert_eq!(encode_response(Response::NotFound).status, 404);
    }

    #[test]
    fn page_reply_is_html() {
        let reply = encode_response(Response::Page {
            page: Page::TopFrame,
            vars: vec![("device", "vault".into())],
        });
        assert_eq!(reply.content_type, "text/html");
        assert!(reply.body.contains("vault lock controls"));
    }
}
