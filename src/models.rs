use serde::{Deserialize, Serialize};

/// Structured content of one problem page.
///
/// Every field except `title` holds raw inner markup. Image references in
/// those fragments are already absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub title: String,
    pub info: Option<String>,
    pub description: String,
    pub input: Option<String>,
    pub output: Option<String>,
    pub limit: Option<String>,
    pub sample_inputs: Vec<String>,
    pub sample_outputs: Vec<String>,
    /// Appended only for samples that have an explanation, so positions do
    /// not line up with `sample_inputs` once one is skipped.
    pub sample_explains: Vec<String>,
    pub hint: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
