use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{node::Node, Html, Selector};
use url::Url;

use crate::models::ExtractedDocument;

// ── Anchors ──────────────────────────────────────────────────────────────────

const DESCRIPTION_ID: &str = "problem_description";
const SAMPLE_INPUT_PREFIX: &str = "sample-input-";
const SAMPLE_OUTPUT_PREFIX: &str = "sample-output-";
const SAMPLE_EXPLAIN_PREFIX: &str = "sample_explain_";

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem_title").unwrap());
static INFO_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem-info").unwrap());
static DESCRIPTION_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#problem_description").unwrap());
static INPUT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem_input").unwrap());
static OUTPUT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem_output").unwrap());
static LIMIT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem_limit").unwrap());
static HINT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#problem_hint").unwrap());
static SOURCE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#source").unwrap());
static IMG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

// ── Lazy static regexes ──────────────────────────────────────────────────────

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("problem page is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
    #[error("problem page has no #{0} element")]
    MissingField(&'static str),
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Decode a raw response body before it is handed to [`extract_document`].
pub fn decode(body: Vec<u8>) -> Result<String, ParseError> {
    Ok(String::from_utf8(body)?)
}

/// Pull the problem fields out of a full problem page.
///
/// Relative image sources are resolved against `base` in the parsed tree
/// first, so every fragment returned here already carries absolute URLs.
pub fn extract_document(html: &str, base: &Url) -> Result<ExtractedDocument, ParseError> {
    let mut document = Html::parse_document(html);
    absolutize_images(&mut document, base);

    let description = fragment(&document, &DESCRIPTION_SEL)
        .map(strip_tabs)
        .ok_or(ParseError::MissingField(DESCRIPTION_ID))?;

    let title = document
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let samples = extract_samples(&document);

    Ok(ExtractedDocument {
        title,
        info: fragment(&document, &INFO_SEL),
        description,
        input: fragment(&document, &INPUT_SEL).map(strip_tabs),
        output: fragment(&document, &OUTPUT_SEL).map(strip_tabs),
        limit: fragment(&document, &LIMIT_SEL),
        sample_inputs: samples.inputs,
        sample_outputs: samples.outputs,
        sample_explains: samples.explains,
        hint: fragment(&document, &HINT_SEL),
        source: fragment(&document, &SOURCE_SEL),
    })
}

// ── Image rewriting ──────────────────────────────────────────────────────────

fn absolutize_images(document: &mut Html, base: &Url) {
    let ids: Vec<_> = document.select(&IMG_SEL).map(|img| img.id()).collect();
    for id in ids {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        if let Node::Element(element) = node.value() {
            for (name, value) in element.attrs.iter_mut() {
                if &*name.local != "src" {
                    continue;
                }
                if let Some(resolved) = resolve_src(value, base) {
                    *value = resolved.into();
                }
            }
        }
    }
}

/// Returns `None` when `src` is empty or already carries a scheme.
fn resolve_src(src: &str, base: &Url) -> Option<String> {
    if src.is_empty() || SCHEME_RE.is_match(src) {
        return None;
    }
    let resolved = base.join(src).map(|u| u.to_string()).unwrap_or_else(|_| {
        format!("{}{}", base.as_str().trim_end_matches('/'), src)
    });
    Some(resolved)
}

// ── Samples ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Samples {
    inputs: Vec<String>,
    outputs: Vec<String>,
    explains: Vec<String>,
}

fn extract_samples(document: &Html) -> Samples {
    let mut samples = Samples::default();

    // Pairs are numbered from 1 and the first incomplete pair ends the list,
    // even if later indices are complete again.
    for index in 1.. {
        let input = fragment_by_id(document, &format!("{SAMPLE_INPUT_PREFIX}{index}"));
        let output = fragment_by_id(document, &format!("{SAMPLE_OUTPUT_PREFIX}{index}"));
        let (Some(input), Some(output)) = (input, output) else {
            break;
        };

        samples.inputs.push(input);
        samples.outputs.push(output);
        if let Some(explain) =
            fragment_by_id(document, &format!("{SAMPLE_EXPLAIN_PREFIX}{index}"))
        {
            samples.explains.push(explain);
        }
    }

    samples
}

/// Inner markup of the element with the given id; empty elements count as
/// missing.
fn fragment_by_id(document: &Html, id: &str) -> Option<String> {
    let sel = Selector::parse(&format!("#{id}")).ok()?;
    fragment(document, &sel).filter(|s| !s.is_empty())
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

fn fragment(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(|el| el.inner_html())
}

fn strip_tabs(markup: String) -> String {
    markup.replace('\t', "")
}
