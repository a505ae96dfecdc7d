// Shared harness for the integration suites: an app over a throwaway SQLite
// file and media directory, plus a client that carries cookies between
// requests like a browser would.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use emberlog::config::{
    AuthConfig, CacheConfig, Config, DatabaseConfig, MediaConfig, ServerConfig,
};
use emberlog::routes::build_router;
use emberlog::AppState;

// A valid 1x1 GIF for upload tests.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _root: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_ttl(20).await
    }

    pub async fn spawn_with_ttl(cache_ttl_secs: u64) -> Self {
        let root = TempDir::new().expect("temp dir");
        let config = Config {
            database: DatabaseConfig {
                url: format!("sqlite:{}/test.db", root.path().display()),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_owned(),
                port: 0,
            },
            cache: CacheConfig {
                capacity: 32,
                ttl_secs: cache_ttl_secs,
            },
            media: MediaConfig {
                root: root.path().join("media").display().to_string(),
            },
            auth: AuthConfig {
                session_secret: "integration-test-secret".to_owned(),
                session_ttl_days: 14,
            },
        };
        let state = AppState::new(config).await.expect("app state");
        let router = build_router(state.clone());
        Self {
            router,
            state,
            _root: root,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Cookie-less GET, for guest behavior.
    pub async fn get(&self, path: &str) -> Response {
        self.request(
            Request::get(path)
                .body(Body::empty())
                .expect("request build"),
        )
        .await
    }

    pub fn client(&self) -> TestClient<'_> {
        TestClient {
            app: self,
            cookies: Vec::new(),
        }
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location_of(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

pub fn assert_redirect(response: &Response, expected: &str) {
    assert_eq!(
        response.status(),
        StatusCode::SEE_OTHER,
        "expected a redirect to {expected}"
    );
    assert_eq!(location_of(response), expected);
}

pub struct TestClient<'a> {
    app: &'a TestApp,
    cookies: Vec<(String, String)>,
}

impl TestClient<'_> {
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn absorb_cookies(&mut self, response: &Response) {
        for header in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let first = raw.split(';').next().unwrap_or("");
            let Some((name, value)) = first.split_once('=') else {
                continue;
            };
            let name = name.trim().to_owned();
            let value = value.trim().to_owned();
            self.cookies.retain(|(key, _)| key != &name);
            if !value.is_empty() && !raw.contains("Max-Age=0") {
                self.cookies.push((name, value));
            }
        }
    }

    pub async fn get(&mut self, path: &str) -> Response {
        let mut builder = Request::get(path);
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }
        let response = self
            .app
            .request(builder.body(Body::empty()).expect("request build"))
            .await;
        self.absorb_cookies(&response);
        response
    }

    /// Grabs the CSRF cookie the middleware plants on any page.
    pub async fn csrf_token(&mut self) -> String {
        if let Some(token) = self.cookie("csrftoken") {
            return token;
        }
        let _ = self.get("/auth/login").await;
        self.cookie("csrftoken").expect("csrf cookie issued")
    }

    /// POSTs a urlencoded form. The matching `csrf_token` field is filled in
    /// automatically unless the caller supplied one.
    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> Response {
        let token = self.csrf_token().await;
        let mut pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        if !pairs.iter().any(|(key, _)| key == "csrf_token") {
            pairs.push(("csrf_token".to_owned(), token));
        }
        let body = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", urlencode(key), urlencode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let mut builder = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }
        let response = self
            .app
            .request(builder.body(Body::from(body)).expect("request build"))
            .await;
        self.absorb_cookies(&response);
        response
    }

    pub async fn post_multipart(&mut self, path: &str, form: MultipartForm) -> Response {
        let token = self.csrf_token().await;
        let (content_type, body) = form.text("csrf_token", &token).finish();

        let mut builder = Request::post(path).header(header::CONTENT_TYPE, content_type);
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(header::COOKIE, cookies);
        }
        let response = self
            .app
            .request(builder.body(Body::from(body)).expect("request build"))
            .await;
        self.absorb_cookies(&response);
        response
    }

    pub async fn signup(&mut self, username: &str, password: &str) -> Response {
        self.post_form(
            "/auth/signup",
            &[
                ("username", username),
                ("password", password),
                ("password2", password),
            ],
        )
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Response {
        self.post_form(
            "/auth/login",
            &[("username", username), ("password", password), ("next", "/")],
        )
        .await
    }

    /// Signup plus login; panics if either step does not land where it should.
    pub async fn register(&mut self, username: &str, password: &str) {
        let response = self.signup(username, password).await;
        assert_redirect(&response, "/");
        let response = self.login(username, password).await;
        assert_redirect(&response, "/");
        assert!(
            self.cookie("sessionid").is_some(),
            "login should set a session cookie"
        );
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Hand-built multipart body for the post forms.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "emberlog-test-boundary-7MA4YWxk".to_owned(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
