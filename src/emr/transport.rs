use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ORIGIN, REFERER};
use reqwest::Url;

use super::forms::FormPayload;
use super::EmrError;

/// Browser User-Agent presented to the EMR.
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// A served page: status, final URL after redirects, and body text.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl PageResponse {
    /// The EMR signals success with a plain 200; anything else is a failure.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Cookie-holding HTTP seam between the session and the network.
pub trait EmrTransport {
    /// GET a page, following redirects.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<PageResponse, EmrError>;

    /// POST an urlencoded form, following redirects.
    fn post_form(
        &self,
        url: &str,
        fields: &FormPayload,
        referer: &str,
    ) -> Result<PageResponse, EmrError>;

    /// Names of the cookies currently held for the EMR host.
    fn cookie_names(&self) -> Vec<String>;
}

// ═══════════════════════════════════════════════════════════
// HttpTransport
// ═══════════════════════════════════════════════════════════

/// Blocking reqwest client with a shared cookie jar.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, accept_invalid_certs: bool) -> Result<Self, EmrError> {
        let base_url =
            Url::parse(base_url).map_err(|e| EmrError::InvalidUrl(format!("{base_url}: {e}")))?;
        let jar = Arc::new(Jar::default());

        let client = reqwest::blocking::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| EmrError::Http(e.to_string()))?;

        Ok(Self {
            client,
            jar,
            base_url,
        })
    }

    fn origin(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }

    fn map_send_error(&self, e: reqwest::Error) -> EmrError {
        if e.is_connect() {
            EmrError::Connection(self.origin())
        } else {
            EmrError::Http(e.to_string())
        }
    }

    fn read(&self, response: reqwest::blocking::Response) -> Result<PageResponse, EmrError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response
            .text()
            .map_err(|e| EmrError::Http(e.to_string()))?;
        Ok(PageResponse { status, url, body })
    }
}

impl EmrTransport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<PageResponse, EmrError> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().map_err(|e| self.map_send_error(e))?;
        self.read(response)
    }

    fn post_form(
        &self,
        url: &str,
        fields: &FormPayload,
        referer: &str,
    ) -> Result<PageResponse, EmrError> {
        let response = self
            .client
            .post(url)
            .header(ORIGIN, self.origin())
            .header(REFERER, referer)
            .form(fields.pairs())
            .send()
            .map_err(|e| self.map_send_error(e))?;
        self.read(response)
    }

    fn cookie_names(&self) -> Vec<String> {
        let Some(header) = self.jar.cookies(&self.base_url) else {
            return Vec::new();
        };
        let Ok(header) = header.to_str() else {
            return Vec::new();
        };
        header
            .split(';')
            .filter_map(|pair| pair.split('=').next())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════
// MockTransport
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub fields: FormPayload,
}

impl RecordedRequest {
    pub fn path(&self) -> String {
        path_of(&self.url)
    }
}

/// Scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub final_url: Option<String>,
    pub body: String,
}

impl MockReply {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            final_url: None,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            final_url: None,
            body: String::new(),
        }
    }

    /// Pretend the request was redirected to `url`.
    pub fn redirected_to(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }
}

/// Mock transport for testing: replies are keyed by method and URL path,
/// unmatched requests get an empty 200, and every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    replies: HashMap<(Method, String), Result<MockReply, String>>,
    cookies: Vec<String>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: Method, path: &str, reply: MockReply) -> Self {
        self.replies.insert((method, path_of(path)), Ok(reply));
        self
    }

    /// Make requests to `path` fail as if the connection dropped.
    pub fn failing(mut self, method: Method, path: &str) -> Self {
        self.replies
            .insert((method, path_of(path)), Err(format!("connection refused: {path}")));
        self
    }

    pub fn with_cookie(mut self, name: &str) -> Self {
        self.cookies.push(name.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    /// Recorded POSTs whose URL path equals `path` (query ignored).
    pub fn posts_to(&self, path: &str) -> Vec<RecordedRequest> {
        let wanted = path_of(path);
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == Method::Post && r.path() == wanted)
            .cloned()
            .collect()
    }

    fn respond(&self, request: RecordedRequest) -> Result<PageResponse, EmrError> {
        let key = (request.method, request.path());
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);

        match self.replies.get(&key) {
            Some(Ok(reply)) => Ok(PageResponse {
                status: reply.status,
                url: reply.final_url.clone().unwrap_or(url),
                body: reply.body.clone(),
            }),
            Some(Err(message)) => Err(EmrError::Connection(message.clone())),
            None => Ok(PageResponse {
                status: 200,
                url,
                body: String::new(),
            }),
        }
    }
}

impl EmrTransport for MockTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<PageResponse, EmrError> {
        self.respond(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields: FormPayload::new(),
        })
    }

    fn post_form(
        &self,
        url: &str,
        fields: &FormPayload,
        _referer: &str,
    ) -> Result<PageResponse, EmrError> {
        self.respond(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            query: Vec::new(),
            fields: fields.clone(),
        })
    }

    fn cookie_names(&self) -> Vec<String> {
        self.cookies.clone()
    }
}

/// URL path without scheme, host or query.
fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}
