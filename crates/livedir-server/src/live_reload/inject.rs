//! Reload snippet injection into served HTML.
//!
//! Every HTML document gets a small script that subscribes to the reload
//! stream and reloads the page on each message. Where it goes is an
//! [`InjectionPolicy`] decision:
//!
//! - [`InjectAnchor::BodyClose`] (default): right before the first `</body>`,
//!   so the script runs after the page content.
//! - [`InjectAnchor::HeadOpen`]: right after the first `<head ...>` tag, so the
//!   subscription is opened before any slow-loading content.
//!
//! Documents without the anchor get the snippet appended at the end. Tag
//! matching is ASCII case-insensitive.

use livedir_config::InjectAnchor;

/// Path of the reload event stream.
pub const LIVE_RELOAD_PATH: &str = "/__livereload";

/// Plain reload script.
const RELOAD_SNIPPET: &str = r#"<script>
(() => {
  const es = new EventSource("/__livereload");
  es.onmessage = () => location.reload();
})();
</script>"#;

/// Reload script that first rewrites asset URLs so nothing comes from cache.
const CACHE_BUST_SNIPPET: &str = r#"<script>
(() => {
  const es = new EventSource("/__livereload");
  es.onmessage = () => {
    const stamp = Date.now().toString();
    for (const el of document.querySelectorAll("link[href], script[src], img[src]")) {
      const attr = el.hasAttribute("href") ? "href" : "src";
      const url = new URL(el.getAttribute(attr), location.href);
      if (url.origin !== location.origin) continue;
      url.searchParams.set("livedir", stamp);
      el.setAttribute(attr, url.pathname + url.search + url.hash);
    }
    location.reload();
  };
})();
</script>"#;

/// How the reload snippet is placed and what it does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InjectionPolicy {
    /// Anchor tag to inject at.
    pub anchor: InjectAnchor,
    /// Cache-bust same-origin assets before reloading.
    pub cache_bust: bool,
}

impl InjectionPolicy {
    /// The script injected under this policy.
    #[must_use]
    pub fn snippet(&self) -> &'static str {
        if self.cache_bust {
            CACHE_BUST_SNIPPET
        } else {
            RELOAD_SNIPPET
        }
    }
}

/// Insert the reload snippet into an HTML document.
///
/// Exactly one snippet is inserted: at the first anchor occurrence, or at the
/// end of the document when the anchor is missing.
#[must_use]
pub fn inject_reload(html: &[u8], policy: &InjectionPolicy) -> Vec<u8> {
    let snippet = policy.snippet().as_bytes();

    let at = match policy.anchor {
        InjectAnchor::BodyClose => find_ignore_ascii_case(html, b"</body>", 0),
        InjectAnchor::HeadOpen => find_head_open_end(html),
    }
    .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + snippet.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(snippet);
    out.extend_from_slice(&html[at..]);
    out
}

/// Offset just past the `>` of the first `<head>` tag, attributes allowed.
///
/// `<header>` and friends are not heads.
fn find_head_open_end(html: &[u8]) -> Option<usize> {
    const OPEN: &[u8] = b"<head";

    let mut from = 0;
    while let Some(start) = find_ignore_ascii_case(html, OPEN, from) {
        let after = start + OPEN.len();
        match html.get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() || *c == b'/' => {
                return html[after..]
                    .iter()
                    .position(|&c| c == b'>')
                    .map(|i| after + i + 1);
            }
            _ => from = start + 1,
        }
    }
    None
}

fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|i| from + i)
}
