//! Content records and the tags derived from them.

use crate::event::{Tag, KIND_LONG_FORM, KIND_TEXT_NOTE};

/// What is being published. Articles are addressable through their stable
/// identifier; notes are independent events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Article { identifier: String },
    Note,
}

impl ContentKind {
    pub fn kind(&self) -> u32 {
        match self {
            ContentKind::Article { .. } => KIND_LONG_FORM,
            ContentKind::Note => KIND_TEXT_NOTE,
        }
    }

    /// The `d` identifier when the kind is addressable.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            ContentKind::Article { identifier } => Some(identifier),
            ContentKind::Note => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Article { .. } => "Article",
            ContentKind::Note => "Note",
        }
    }
}

/// Caller supplied fields of a publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentRecord {
    pub title: String,
    pub content: String,
    /// Topics, emitted as `t` tags.
    pub topics: Vec<String>,
    /// Reference URLs, emitted as `r` tags.
    pub urls: Vec<String>,
    /// Referenced event ids, emitted as `e` tags.
    pub events: Vec<String>,
}

/// Tags for `record` in a fixed order: `title`, `d` (articles only), then the
/// `t`, `r` and `e` tags each in input order. Values are passed through
/// verbatim.
pub fn build_tags(record: &ContentRecord, kind: &ContentKind) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(
        2 + record.topics.len() + record.urls.len() + record.events.len(),
    );
    tags.push(Tag::new("title", record.title.as_str()));
    if let Some(identifier) = kind.identifier() {
        tags.push(Tag::new("d", identifier));
    }
    tags.extend(record.topics.iter().map(|v| Tag::new("t", v.as_str())));
    tags.extend(record.urls.iter().map(|v| Tag::new("r", v.as_str())));
    tags.extend(record.events.iter().map(|v| Tag::new("e", v.as_str())));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_vecs(tags: &[Tag]) -> Vec<Vec<&str>> {
        tags.iter()
            .map(|t| t.0.iter().map(String::as_str).collect())
            .collect()
    }

    fn article() -> ContentKind {
        ContentKind::Article {
            identifier: "202401010000".into(),
        }
    }

    #[test]
    fn article_tags_match_example() {
        let record = ContentRecord {
            title: "Notes on X".into(),
            content: "body text".into(),
            topics: vec!["go".into(), "infra".into()],
            urls: vec!["https://example.com".into()],
            events: vec![],
        };
        assert_eq!(
            tag_vecs(&build_tags(&record, &article())),
            vec![
                vec!["title", "Notes on X"],
                vec!["d", "202401010000"],
                vec!["t", "go"],
                vec!["t", "infra"],
                vec!["r", "https://example.com"],
            ]
        );
    }

    #[test]
    fn groups_follow_precedence_and_input_order() {
        let record = ContentRecord {
            title: "T".into(),
            content: String::new(),
            topics: vec!["z".into(), "a".into(), "z".into()],
            urls: vec!["u2".into(), "u1".into()],
            events: vec!["e2".into(), "e1".into()],
        };
        let names: Vec<_> = build_tags(&record, &ContentKind::Note)
            .iter()
            .map(|t| t.0.join(":"))
            .collect();
        assert_eq!(
            names,
            vec!["title:T", "t:z", "t:a", "t:z", "r:u2", "r:u1", "e:e2", "e:e1"]
        );
    }

    #[test]
    fn notes_have_no_identifier_tag() {
        let record = ContentRecord {
            title: "T".into(),
            ..Default::default()
        };
        let tags = build_tags(&record, &ContentKind::Note);
        assert!(tags.iter().all(|t| t.0[0] != "d"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn values_pass_through_verbatim() {
        let record = ContentRecord {
            title: String::new(),
            topics: vec![" spaced ".into(), "".into()],
            urls: vec!["not a url".into()],
            events: vec!["xyz".into()],
            ..Default::default()
        };
        let tags = build_tags(&record, &ContentKind::Note);
        assert_eq!(tags[0], Tag::new("title", ""));
        assert_eq!(tags[1], Tag::new("t", " spaced "));
        assert_eq!(tags[2], Tag::new("t", ""));
        assert_eq!(tags[3], Tag::new("r", "not a url"));
        assert_eq!(tags[4], Tag::new("e", "xyz"));
    }

    #[test]
    fn building_is_deterministic() {
        let record = ContentRecord {
            title: "T".into(),
            topics: vec!["a".into(), "b".into()],
            urls: vec!["u".into()],
            events: vec!["e".into()],
            ..Default::default()
        };
        assert_eq!(build_tags(&record, &article()), build_tags(&record, &article()));
    }

    #[test]
    fn kind_numbers() {
        assert_eq!(article().kind(), 30023);
        assert_eq!(ContentKind::Note.kind(), 1);
        assert_eq!(article().identifier(), Some("202401010000"));
        assert_eq!(ContentKind::Note.identifier(), None);
    }
}
