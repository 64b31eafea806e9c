//! Quotes excerpted from a source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::events::EventKind;
use crate::ids;
use crate::timestamp;
use crate::traits::{Collection, CollectionItem, Document, DocumentKind};
use crate::version::default_schema_version;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteType {
    #[default]
    Direct,
    Indirect,
    Paraphrase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub quote_type: QuoteType,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_end: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Where the quote has been cited (free-form references).
    #[serde(default)]
    pub used_in: Vec<String>,
    #[serde(with = "timestamp", default = "timestamp::unknown")]
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// `"12"`, `"12-14"`, or empty when no page is recorded.
    pub fn page_range(&self) -> String {
        match (self.page, self.page_end) {
            (Some(start), Some(end)) if end != start => format!("{}-{}", start, end),
            (Some(start), _) => start.to_string(),
            (None, _) => String::new(),
        }
    }

    /// Whether the quote spans `page`.
    pub fn covers(&self, page: u32) -> bool {
        match (self.page, self.page_end) {
            (Some(start), Some(end)) => start <= page && page <= end,
            (Some(start), None) => start == page,
            (None, _) => false,
        }
    }
}

impl CollectionItem for Quote {
    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Fields supplied when adding a quote.
#[derive(Debug, Clone, Default)]
pub struct NewQuote {
    pub text: String,
    pub quote_type: QuoteType,
    pub page: Option<u32>,
    pub page_end: Option<u32>,
    pub comment: Option<String>,
    pub tags: Vec<String>,
}

impl NewQuote {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_pages(mut self, page: u32, page_end: Option<u32>) -> Self {
        self.page = Some(page);
        self.page_end = page_end;
        self
    }

    pub fn with_type(mut self, quote_type: QuoteType) -> Self {
        self.quote_type = quote_type;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotes {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

impl Default for Quotes {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            quotes: Vec::new(),
        }
    }
}

impl Quotes {
    pub fn get_by_page(&self, page: u32) -> Vec<&Quote> {
        self.quotes.iter().filter(|q| q.covers(page)).collect()
    }

    pub fn get_by_type(&self, quote_type: QuoteType) -> Vec<&Quote> {
        self.quotes
            .iter()
            .filter(|q| q.quote_type == quote_type)
            .collect()
    }

    pub fn get_direct(&self) -> Vec<&Quote> {
        self.get_by_type(QuoteType::Direct)
    }
}

impl Document for Quotes {
    const KIND: DocumentKind = DocumentKind::Quotes;

    fn schema_version(&self) -> &str {
        &self.schema_version
    }
}

impl Collection for Quotes {
    type Item = Quote;
    type NewItem = NewQuote;

    const FILE_NAME: &'static str = defaults::QUOTES_FILE;
    const ID_PREFIX: &'static str = ids::QUOTE_PREFIX;

    const ADDED: EventKind = EventKind::QuoteAdded;
    const UPDATED: EventKind = EventKind::QuoteUpdated;
    const DELETED: EventKind = EventKind::QuoteDeleted;

    fn items(&self) -> &[Quote] {
        &self.quotes
    }

    fn items_mut(&mut self) -> &mut Vec<Quote> {
        &mut self.quotes
    }

    fn build_item(id: String, new: NewQuote) -> Quote {
        Quote {
            id,
            text: new.text,
            quote_type: new.quote_type,
            page: new.page,
            page_end: new.page_end,
            comment: new.comment,
            tags: new.tags,
            used_in: Vec::new(),
            created_at: timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range() {
        let mut quotes = Quotes::default();
        let single = quotes.add(NewQuote::new("a").with_pages(12, None));
        let span = quotes.add(NewQuote::new("b").with_pages(12, Some(14)));
        let same = quotes.add(NewQuote::new("c").with_pages(7, Some(7)));
        let none = quotes.add(NewQuote::new("d"));

        assert_eq!(single.page_range(), "12");
        assert_eq!(span.page_range(), "12-14");
        assert_eq!(same.page_range(), "7");
        assert_eq!(none.page_range(), "");
    }

    #[test]
    fn test_get_by_page_covers_ranges() {
        let mut quotes = Quotes::default();
        quotes.add(NewQuote::new("single").with_pages(3, None));
        quotes.add(NewQuote::new("span").with_pages(2, Some(5)));
        quotes.add(NewQuote::new("nowhere"));

        assert_eq!(quotes.get_by_page(3).len(), 2);
        assert_eq!(quotes.get_by_page(5).len(), 1);
        assert!(quotes.get_by_page(6).is_empty());
        assert!(quotes.get_by_page(1).is_empty());
    }

    #[test]
    fn test_get_by_type() {
        let mut quotes = Quotes::default();
        quotes.add(NewQuote::new("d"));
        quotes.add(NewQuote::new("p").with_type(QuoteType::Paraphrase));
        assert_eq!(quotes.get_direct().len(), 1);
        assert_eq!(quotes.get_by_type(QuoteType::Paraphrase).len(), 1);
        assert!(quotes.get_by_type(QuoteType::Indirect).is_empty());
    }

    #[test]
    fn test_type_field_name_and_default() {
        let q: Quote = serde_json::from_str(r#"{"id":"q_1","text":"x"}"#).unwrap();
        assert_eq!(q.quote_type, QuoteType::Direct);

        let q: Quote =
            serde_json::from_str(r#"{"id":"q_1","text":"x","type":"indirect"}"#).unwrap();
        assert_eq!(q.quote_type, QuoteType::Indirect);
        assert_eq!(serde_json::to_value(&q).unwrap()["type"], "indirect");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let r: Result<Quote, _> = serde_json::from_str(r#"{"id":"q_1","type":"hearsay"}"#);
        assert!(r.is_err());
    }
}
