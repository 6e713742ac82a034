//! Publication model representing one record delivered by a library.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::library::{AbstractSource, LibraryError};

/// Abstract text attached to a publication after acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstract {
    pub text: String,
}

impl Abstract {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Abstract text on a single line
    pub fn text(&self) -> String {
        self.text.replace('\n', "")
    }
}

/// Review decision attached to a publication by a screening workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub is_accepted: bool,
    pub is_highlighted: bool,
    pub reject_reason: String,
}

/// A publication record from any library
///
/// Libraries fill the bibliographic core and put everything else in `values`,
/// keyed by library-specific names. `abstract_` and `review` are written by
/// collaborators downstream of acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Publication title
    pub title: String,

    /// First author / creator as reported by the library
    pub creator: String,

    /// Cover date of the issue or proceedings
    pub cover_date: NaiveDate,

    /// Library-specific metadata
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_: Option<Abstract>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<Review>,
}

/// Take up to `n` leading letters of `s`, stopping at the first non-letter
fn take_letters(s: &str, n: usize) -> String {
    s.trim()
        .chars()
        .take(n)
        .take_while(|c| c.is_alphabetic())
        .collect()
}

impl Publication {
    /// Create a new publication with required fields
    pub fn new(title: impl Into<String>, creator: impl Into<String>, cover_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            creator: creator.into(),
            cover_date,
            values: BTreeMap::new(),
            abstract_: None,
            review: None,
        }
    }

    /// Look up a library-specific value, ignoring empty ones
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn creator_short(&self) -> String {
        take_letters(&self.creator, 3)
    }

    pub fn title_short(&self) -> String {
        take_letters(&self.title, 5)
    }

    /// Citation key, e.g. `Tay2021Deep` for "Deep learning" by "Taylor C." in 2021
    pub fn bib_id(&self) -> String {
        format!(
            "{}{}{}",
            self.creator_short(),
            self.cover_date.year(),
            self.title_short()
        )
    }

    /// Fetch and attach the abstract from a library that serves them
    pub async fn attach_abstract(&mut self, source: &dyn AbstractSource) -> Result<(), LibraryError> {
        let abs = source.fetch_abstract(self).await?;
        self.abstract_ = Some(abs);
        Ok(())
    }

    /// Serialize as a single JSON line (without the trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Builder for constructing Publication objects
#[derive(Debug, Clone)]
pub struct PublicationBuilder {
    publication: Publication,
}

impl PublicationBuilder {
    pub fn new(title: impl Into<String>, creator: impl Into<String>, cover_date: NaiveDate) -> Self {
        Self {
            publication: Publication::new(title, creator, cover_date),
        }
    }

    /// Add a library-specific value; empty values are skipped
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.publication.values.insert(key.into(), value);
        }
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.publication.abstract_ = Some(Abstract::new(text));
        self
    }

    pub fn review(mut self, review: Review) -> Self {
        self.publication.review = Some(review);
        self
    }

    pub fn build(self) -> Publication {
        self.publication
    }
}

/// Errors reading or writing publications as JSON lines
#[derive(Debug, thiserror::Error)]
pub enum PublicationIoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected publication on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize publication: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write publications as JSON lines
pub fn write_literature<'a, W, I>(mut writer: W, literature: I) -> Result<usize, PublicationIoError>
where
    W: Write,
    I: IntoIterator<Item = &'a Publication>,
{
    let mut written = 0;
    for publication in literature {
        writeln!(writer, "{}", publication.to_json_line()?)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Read publications from JSON lines, skipping blank lines
pub fn read_literature<R: BufRead>(reader: R) -> Result<Vec<Publication>, PublicationIoError> {
    let mut literature = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let publication = serde_json::from_str(&line)
            .map_err(|source| PublicationIoError::Malformed { line: i + 1, source })?;
        literature.push(publication);
    }
    Ok(literature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_publication_builder() {
        let publication = PublicationBuilder::new("Deep learning", "Taylor C.", date(2021, 3, 1))
            .value("doi", "10.1234/test.1234")
            .value("issn", "")
            .abstract_text("An abstract.")
            .build();

        assert_eq!(publication.title, "Deep learning");
        assert_eq!(publication.value("doi"), Some("10.1234/test.1234"));
        assert_eq!(publication.value("issn"), None);
        assert!(!publication.values.contains_key("issn"));
        assert_eq!(publication.abstract_, Some(Abstract::new("An abstract.")));
    }

    #[test]
    fn test_bib_id() {
        let publication = Publication::new("Deep learning for graphs", "Taylor C.", date(2021, 3, 1));
        assert_eq!(publication.creator_short(), "Tay");
        assert_eq!(publication.title_short(), "Deep");
        assert_eq!(publication.bib_id(), "Tay2021Deep");

        let long_word = Publication::new("Transformers everywhere", "Vaswani A.", date(2017, 6, 12));
        assert_eq!(long_word.title_short(), "Trans");
        assert_eq!(long_word.bib_id(), "Vas2017Trans");
    }

    #[test]
    fn test_bib_id_stops_at_non_letter() {
        let publication = Publication::new("  A 3D survey", "Li, X.", date(2019, 1, 1));
        assert_eq!(publication.creator_short(), "Li");
        assert_eq!(publication.title_short(), "A");
        assert_eq!(publication.bib_id(), "Li2019A");
    }

    #[test]
    fn test_abstract_text_single_line() {
        let abs = Abstract::new("first\nsecond");
        assert_eq!(abs.text(), "firstsecond");
    }

    #[test]
    fn test_json_lines_file() {
        let literature = vec![
            PublicationBuilder::new("One", "Ada", date(2020, 1, 2))
                .value("eid", "2-s2.0-1")
                .build(),
            PublicationBuilder::new("Two", "Bob", date(2021, 5, 6))
                .review(Review {
                    is_accepted: false,
                    is_highlighted: false,
                    reject_reason: "off topic".to_string(),
                })
                .build(),
        ];

        let mut buf = Vec::new();
        assert_eq!(write_literature(&mut buf, &literature).unwrap(), 2);

        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"cover_date\":\"2020-01-02\""));
        assert!(!text.lines().next().unwrap().contains("review"));

        let read = read_literature(buf.as_slice()).unwrap();
        assert_eq!(read, literature);
    }

    #[test]
    fn test_read_literature_reports_line() {
        let input = "\n{\"title\":\"x\",\"creator\":\"y\",\"cover_date\":\"2020-01-01\"}\nnot json\n";
        let err = read_literature(input.as_bytes()).unwrap_err();
        match err {
            PublicationIoError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
