// Scrapers: stateless functions that turn pwn.college HTML into typed
// records, plus the two extractors for values embedded in the `var init`
// script blob (CSRF nonce and user id). The listing pages have no public
// API, so the selectors here mirror the markup the site actually serves.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// A dojo as listed on `/dojos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dojo {
    pub id: String,
    pub name: String,
    pub summary: String,
}

/// A module as listed on a dojo page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub summary: String,
}

/// A challenge as listed on a module page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Extract the CSRF nonce from the `var init` script blob every page embeds.
pub fn extract_nonce(html: &str) -> Result<String> {
    let re = Regex::new(r#"'csrfNonce': "([^"]+)""#).expect("nonce pattern is valid");
    let caps = re
        .captures(html)
        .ok_or_else(|| anyhow!("no csrfNonce found in page"))?;
    Ok(caps[1].to_string())
}

/// Extract the numeric user id from the `var init` script blob.
///
/// The site reports `0` when the session is not authenticated, so callers
/// use a non-zero id as the login-success signal.
pub fn extract_user_id(html: &str) -> Result<u64> {
    let re = Regex::new(r"'userId': ([0-9]+)").expect("user id pattern is valid");
    let caps = re
        .captures(html)
        .ok_or_else(|| anyhow!("no userId found in page"))?;
    caps[1].parse().context("userId is not a valid number")
}

/// Parse the `/dojos` listing.
///
/// Dojos are anchors pointing at `/dojo/{id}` with an `<h4>` name and a
/// `<p>` summary. Anchors without a name are skipped.
pub fn parse_dojos(html: &str) -> Vec<Dojo> {
    let doc = Html::parse_document(html);
    let anchor = Selector::parse(r#"a[href^="/dojo/"]"#).expect("dojo selector is valid");

    let mut dojos = Vec::new();
    for a in doc.select(&anchor) {
        let href = match a.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        let id = href
            .trim_start_matches("/dojo/")
            .trim_end_matches('/')
            .to_string();
        let name = match child_text(a, "h4", " ") {
            Some(n) => n,
            None => continue,
        };
        let summary = child_text(a, "p", ", ").unwrap_or_default();
        dojos.push(Dojo { id, name, summary });
    }
    dojos
}

/// Parse the module listing of a dojo page.
///
/// Module anchors have hrefs of the form `/{dojo}/{module}` (optionally with
/// a trailing slash); anything else on the page is ignored.
pub fn parse_modules(html: &str, dojo: &str) -> Result<Vec<Module>> {
    let href_re = Regex::new(&format!("^/{}/[a-z0-9-]+/?$", regex::escape(dojo)))
        .context("building module href pattern")?;
    let prefix = format!("/{dojo}/");

    let doc = Html::parse_document(html);
    let anchor = Selector::parse("a[href]").expect("anchor selector is valid");

    let mut modules = Vec::new();
    for a in doc.select(&anchor) {
        let href = match a.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if !href_re.is_match(href) {
            continue;
        }
        let id = match href.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.trim_end_matches('/').to_string(),
            None => continue,
        };
        let name = match child_text(a, "h4", " ") {
            Some(n) => n,
            None => continue,
        };
        let summary = child_text(a, "p", ", ").unwrap_or_default();
        modules.push(Module { id, name, summary });
    }
    Ok(modules)
}

/// Parse the challenge listing of a module page.
///
/// Each challenge sits in a `div` whose id starts with `challenges-body`,
/// carrying hidden inputs for the numeric id and the name, and an
/// `embed-responsive` div with the description.
pub fn parse_challenges(html: &str) -> Vec<Challenge> {
    let doc = Html::parse_document(html);
    let body = Selector::parse(r#"div[id^="challenges-body"]"#).expect("body selector is valid");
    let id_input = Selector::parse("input#challenge-id").expect("id selector is valid");
    let name_input = Selector::parse("input#challenge").expect("name selector is valid");
    let desc_div = Selector::parse("div.embed-responsive").expect("description selector is valid");

    let mut challenges = Vec::new();
    for block in doc.select(&body) {
        let id = match block.select(&id_input).next().and_then(|i| i.value().attr("value")) {
            Some(v) => v.to_string(),
            None => continue,
        };
        let name = match block.select(&name_input).next().and_then(|i| i.value().attr("value")) {
            Some(v) => v.to_string(),
            None => continue,
        };
        let description = block
            .select(&desc_div)
            .next()
            .map(|d| joined_text(d, " "))
            .unwrap_or_default();
        challenges.push(Challenge { id, name, description });
    }
    challenges
}

/// Text of the first `selector` match under `el`, or `None` if absent/empty.
fn child_text(el: ElementRef, selector: &str, sep: &str) -> Option<String> {
    let sel = Selector::parse(selector).expect("child selector is valid");
    let node = el.select(&sel).next()?;
    let text = joined_text(node, sep);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Collect the trimmed text fragments of a node, joined by `sep`.
fn joined_text(node: ElementRef, sep: &str) -> String {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The `var init` blob as served by the site, with the nonce and user id
    // every page embeds.
    fn init_script(user_id: u64) -> String {
        format!(
            r#"
            <script type="text/javascript">
              var init = {{
                  'urlRoot': "",
                  'csrfNonce': "FAKE-CSRF-NONCE",
                  'userMode': "users",
                  'userId': {user_id},
                  'start': null,
                  'end': null,
                  'theme_settings': null,
                  'dojo': "",
                  'module': ""
              }}
            </script>
            "#
        )
    }

    #[test]
    fn nonce_from_init_script() {
        let nonce = extract_nonce(&init_script(0)).unwrap();
        assert_eq!(nonce, "FAKE-CSRF-NONCE");
    }

    #[test]
    fn nonce_missing_is_an_error() {
        assert!(extract_nonce("<html><body>nothing here</body></html>").is_err());
    }

    #[test]
    fn user_id_nonzero() {
        let id = extract_user_id(&init_script(1234567890)).unwrap();
        assert_eq!(id, 1234567890);
    }

    #[test]
    fn user_id_zero_when_logged_out() {
        assert_eq!(extract_user_id(&init_script(0)).unwrap(), 0);
    }

    #[test]
    fn user_id_missing_is_an_error() {
        assert!(extract_user_id("<html></html>").is_err());
    }

    #[test]
    fn dojos_from_listing() {
        let html = r#"
        <ul>
          <li>
            <a href="/dojo/intro-to-cybersecurity">
              <h4>Intro to Cybersecurity</h4>
              <p>Earn your white belt!
                <span>21 modules</span>
              </p>
            </a>
          </li>
          <li>
            <a href="/dojo/program-security/">
              <h4>Program Security</h4>
              <p>Earn your yellow belt!</p>
            </a>
          </li>
          <li><a href="/about">About</a></li>
        </ul>
        "#;

        let dojos = parse_dojos(html);
        assert_eq!(dojos.len(), 2);
        assert_eq!(
            dojos[0],
            Dojo {
                id: "intro-to-cybersecurity".into(),
                name: "Intro to Cybersecurity".into(),
                summary: "Earn your white belt!, 21 modules".into(),
            }
        );
        // Trailing slash in the href is trimmed from the id.
        assert_eq!(dojos[1].id, "program-security");
        assert_eq!(dojos[1].summary, "Earn your yellow belt!");
    }

    #[test]
    fn dojo_anchor_without_name_is_skipped() {
        let html = r#"<a href="/dojo/broken"><p>No heading here</p></a>"#;
        assert!(parse_dojos(html).is_empty());
    }

    #[test]
    fn dojos_from_empty_page() {
        assert!(parse_dojos("<html><body></body></html>").is_empty());
    }

    #[test]
    fn modules_match_only_their_dojo() {
        let html = r#"
        <div>
          <a href="/example-dojo/hello-world/">
            <h4>Hello World</h4>
            <p>Your first module.</p>
          </a>
          <a href="/example-dojo/reverse-engineering">
            <h4>Reverse Engineering</h4>
            <p>Take things apart.</p>
          </a>
          <a href="/other-dojo/hello-world/">
            <h4>Wrong Dojo</h4>
          </a>
          <a href="/example-dojo/">
            <h4>Dojo Index</h4>
          </a>
        </div>
        "#;

        let modules = parse_modules(html, "example-dojo").unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].id, "hello-world");
        assert_eq!(modules[0].name, "Hello World");
        assert_eq!(modules[0].summary, "Your first module.");
        assert_eq!(modules[1].id, "reverse-engineering");
    }

    #[test]
    fn modules_from_empty_page() {
        let modules = parse_modules("<html></html>", "example-dojo").unwrap();
        assert!(modules.is_empty());
    }

    #[test]
    fn challenges_from_module_page() {
        let html = r#"
        <div id="challenges-body-1" class="accordion-item-body">
          <input id="challenge-id" type="hidden" value="123">
          <input id="challenge" type="hidden" value="hello-world">
          <div class="embed-responsive">
            Write your first program.
          </div>
        </div>
        <div id="challenges-body-2" class="accordion-item-body">
          <input id="challenge-id" type="hidden" value="124">
          <input id="challenge" type="hidden" value="hello-again">
          <div class="embed-responsive">Do it
            again.</div>
        </div>
        "#;

        let challenges = parse_challenges(html);
        assert_eq!(challenges.len(), 2);
        assert_eq!(
            challenges[0],
            Challenge {
                id: "123".into(),
                name: "hello-world".into(),
                description: "Write your first program.".into(),
            }
        );
        assert_eq!(challenges[1].id, "124");
        assert_eq!(challenges[1].description, "Do it again.");
    }

    #[test]
    fn challenge_block_without_inputs_is_skipped() {
        let html = r#"
        <div id="challenges-body-1">
          <div class="embed-responsive">Orphaned description.</div>
        </div>
        "#;
        assert!(parse_challenges(html).is_empty());
    }
}
