//! Authorization-code extraction from redirect URLs.
//!
//! Different platforms and browsers normalize custom-scheme redirect URLs
//! inconsistently: some deliver a proper query string, some stuff the
//! parameters into the fragment, and some produce strings the URL parser
//! rejects outright (custom schemes with no recognized authority). Robust
//! extraction here is what prevents silent authentication failures.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"code=([^&]+)").expect("static regex"));
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"state=([^&]+)").expect("static regex"));

/// Authorization parameters pulled out of a redirect URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl AuthParams {
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

/// Extract `code` and `state` from an arbitrary redirect URL string.
///
/// Layered, first match wins:
/// 1. standard URL parse, query component;
/// 2. fragment parsed as query-encoded;
/// 3. permissive regex scan over the raw string.
///
/// Never fails: unparsable input yields both fields absent.
pub fn extract_auth_params(raw: &str) -> AuthParams {
    if let Ok(url) = Url::parse(raw) {
        let from_query = params_from_pairs(url.query_pairs());
        if from_query.has_code() {
            return from_query;
        }
        if let Some(fragment) = url.fragment() {
            let from_fragment =
                params_from_pairs(url::form_urlencoded::parse(fragment.as_bytes()));
            if from_fragment.has_code() {
                return from_fragment;
            }
        }
    }
    scan_raw(raw)
}

fn params_from_pairs<'a, I>(pairs: I) -> AuthParams
where
    I: Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
{
    let mut params = AuthParams::default();
    for (key, value) in pairs {
        match key.as_ref() {
            "code" if params.code.is_none() => params.code = Some(value.into_owned()),
            "state" if params.state.is_none() => params.state = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

/// Regex fallback for URLs the standard parser rejects.
fn scan_raw(raw: &str) -> AuthParams {
    let capture = |re: &Regex| {
        re.captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    AuthParams {
        code: capture(&CODE_RE),
        state: capture(&STATE_RE),
    }
}
