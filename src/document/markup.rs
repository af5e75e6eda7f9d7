use serde::Deserialize;

/// Host-side description of one page, as read from the existing document markup.
///
/// Style fields carry the inline `style` attribute text verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageMarkup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub container_style: String,
    #[serde(default)]
    pub annotations: Vec<AnnotationMarkup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnnotationMarkup {
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub runs: Vec<TextRunMarkup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextRunMarkup {
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub text: String,
}

/// Parses the JSON page list a webview bridge sends over.
pub fn pages_from_json(json: &str) -> serde_json::Result<Vec<PageMarkup>> {
    serde_json::from_str(json)
}
