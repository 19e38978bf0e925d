/// Reply payload of `GET_PAGE_TEXT`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageText {
    text: String,
}

impl PageText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
