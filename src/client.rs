// Session client: a small blocking HTTP client that holds one cookie jar
// and talks to a pwn.college instance. Login is form-based and protected
// by a CSRF nonce embedded in every page; the internal JSON API wants the
// same nonce in a `CSRF-Token` header.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scrape::{self, Challenge, Dojo, Module};

pub const DEFAULT_BASE_URL: &str = "https://pwn.college";

const USER_AGENT: &str = concat!("pwncollege-cli/", env!("CARGO_PKG_VERSION"));

/// Decode a JSON response body, bailing with status and a body excerpt on
/// non-success. A 403/500 usually carries an HTML error page, which would
/// otherwise surface as an opaque decode error.
fn decode_json<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    url: &str,
    what: &str,
) -> Result<T> {
    if !status.is_success() {
        bail!("{url} returned {status}: {}", excerpt(body));
    }
    serde_json::from_str(body).with_context(|| format!("parsing {what}"))
}

/// Trimmed body excerpt for error messages.
fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

/// Authenticated session against one pwn.college instance.
///
/// Holds a blocking reqwest client with a shared cookie jar. The jar is kept
/// separately so the session cookie can be read back out for the `cookies`
/// subcommand.
pub struct PwnClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: String,
    logged_in: bool,
}

/// Payload for starting a challenge container.
#[derive(Serialize, Debug)]
struct DockerRequest<'a> {
    dojo: &'a str,
    module: &'a str,
    challenge: &'a str,
    practice: bool,
}

/// Response from the docker start endpoint.
#[derive(Deserialize, Debug)]
pub struct DockerResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from the docker status endpoint: the currently selected
/// challenge, if any container is running.
#[derive(Deserialize, Debug)]
pub struct DockerStatus {
    pub success: bool,
    #[serde(default)]
    pub dojo: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Payload for submitting a flag.
#[derive(Serialize, Debug)]
struct AttemptRequest<'a> {
    challenge_id: u64,
    submission: &'a str,
}

/// CTFd's response to a flag submission.
#[derive(Deserialize, Debug)]
pub struct AttemptResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<AttemptData>,
}

/// Verdict for one flag submission.
#[derive(Deserialize, Debug)]
pub struct AttemptData {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl PwnClient {
    /// Build a client for `base_url` (trailing slash trimmed, not logged in).
    pub fn new(base_url: &str) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(jar.clone())
            .build()
            .context("failed to build HTTP client")?;
        Ok(PwnClient {
            client,
            jar,
            base_url: base_url.trim_end_matches('/').to_string(),
            logged_in: false,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// GET a path relative to the base URL and return the body text.
    fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");
        let res = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url} failed"))?;
        let status = res.status();
        let body = res
            .text()
            .with_context(|| format!("reading body of {url}"))?;
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        Ok(body)
    }

    /// Fetch a fresh CSRF nonce from the landing page.
    pub fn nonce(&self) -> Result<String> {
        debug!("refreshing nonce via {}", self.base_url);
        let body = self.get_text("/")?;
        scrape::extract_nonce(&body)
    }

    /// Log in with username and password.
    ///
    /// The login POST answers 200 for bad credentials too; the only reliable
    /// success signal is a non-zero `userId` in the response body, so a zero
    /// id is reported as an error.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        debug!("logging in to {} as {username}", self.base_url);

        // Seed the session cookie the nonce is bound to.
        self.get_text("/login")?;
        let nonce = self.nonce()?;

        let url = format!("{}/login", self.base_url);
        let form = [
            ("name", username),
            ("password", password),
            ("_submit", "Submit"),
            ("nonce", nonce.as_str()),
        ];
        let res = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .with_context(|| format!("POST {url} failed"))?;
        let body = res.text().context("reading login response")?;

        let user_id = scrape::extract_user_id(&body)?;
        if user_id == 0 {
            bail!("login to {} rejected for {username}", self.base_url);
        }
        self.logged_in = true;
        debug!("logged in as {username} (user id {user_id})");
        Ok(())
    }

    /// Log out, if logged in.
    pub fn logout(&mut self) -> Result<()> {
        if !self.logged_in {
            warn!("not logged in to {}, skipping logout", self.base_url);
            return Ok(());
        }
        debug!("logging out of {}", self.base_url);
        self.get_text("/logout")?;
        self.logged_in = false;
        Ok(())
    }

    /// The `session` cookie value, if the jar holds one for the base URL.
    pub fn session_cookie(&self) -> Option<String> {
        if !self.logged_in {
            warn!("not logged in to {}, no session cookie", self.base_url);
        }
        let url = Url::parse(&self.base_url).ok()?;
        let header = self.jar.cookies(&url)?;
        let raw = header.to_str().ok()?;
        raw.split("; ")
            .find_map(|pair| pair.strip_prefix("session=").map(str::to_string))
    }

    /// Start a challenge container.
    pub fn docker(
        &self,
        dojo: &str,
        module: &str,
        challenge: &str,
        practice: bool,
    ) -> Result<DockerResponse> {
        debug!("starting container for {dojo}/{module}/{challenge} (practice: {practice})");
        let nonce = self.nonce()?;
        let url = format!("{}/pwncollege_api/v1/docker", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("CSRF-Token", nonce)
            .json(&DockerRequest {
                dojo,
                module,
                challenge,
                practice,
            })
            .send()
            .with_context(|| format!("POST {url} failed"))?;
        let status = res.status();
        let body = res
            .text()
            .with_context(|| format!("reading body of {url}"))?;
        decode_json(status, &body, &url, "docker response")
    }

    /// Query which container is currently running, if any.
    pub fn docker_status(&self) -> Result<DockerStatus> {
        debug!("requesting container status");
        let nonce = self.nonce()?;
        let url = format!("{}/pwncollege_api/v1/docker", self.base_url);
        let res = self
            .client
            .get(&url)
            .header("CSRF-Token", nonce)
            .send()
            .with_context(|| format!("GET {url} failed"))?;
        let status = res.status();
        let body = res
            .text()
            .with_context(|| format!("reading body of {url}"))?;
        decode_json(status, &body, &url, "docker status response")
    }

    /// Submit a flag for a challenge id.
    pub fn attempt(&self, challenge_id: u64, flag: &str) -> Result<AttemptResponse> {
        debug!("submitting flag for challenge id {challenge_id}");
        let nonce = self.nonce()?;
        let url = format!("{}/api/v1/challenges/attempt", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("CSRF-Token", nonce)
            .json(&AttemptRequest {
                challenge_id,
                submission: flag,
            })
            .send()
            .with_context(|| format!("POST {url} failed"))?;
        let status = res.status();
        let body = res
            .text()
            .with_context(|| format!("reading body of {url}"))?;
        decode_json(status, &body, &url, "attempt response")
    }

    /// List all dojos.
    pub fn dojos(&self) -> Result<Vec<Dojo>> {
        debug!("requesting dojos");
        let body = self.get_text("/dojos")?;
        Ok(scrape::parse_dojos(&body))
    }

    /// List the modules of a dojo.
    pub fn modules(&self, dojo: &str) -> Result<Vec<Module>> {
        debug!("requesting modules of dojo {dojo}");
        let body = self.get_text(&format!("/{dojo}/"))?;
        scrape::parse_modules(&body, dojo)
    }

    /// List the challenges of a module.
    pub fn challenges(&self, dojo: &str, module: &str) -> Result<Vec<Challenge>> {
        debug!("requesting challenges of {dojo}/{module}");
        let body = self.get_text(&format!("/{dojo}/{module}"))?;
        Ok(scrape::parse_challenges(&body))
    }
}
