use std::fmt;

use crate::remote::RemoteNode;

/// A single search term of a drive query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    NameEquals(String),
    InParents(String),
    MimeTypeEquals(String),
    MimeTypeNotEquals(String),
}

impl Clause {
    fn matches(&self, node: &RemoteNode) -> bool {
        match self {
            Self::NameEquals(name) => node.name == *name,
            Self::InParents(id) => node.parents.iter().any(|p| p == id),
            Self::MimeTypeEquals(mime) => node.mime_type == *mime,
            Self::MimeTypeNotEquals(mime) => node.mime_type != *mime,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameEquals(name) => write!(f, "name = '{}'", escape(name)),
            Self::InParents(id) => write!(f, "'{}' in parents", escape(id)),
            Self::MimeTypeEquals(mime) => write!(f, "mimeType = '{}'", escape(mime)),
            Self::MimeTypeNotEquals(mime) => write!(f, "mimeType != '{}'", escape(mime)),
        }
    }
}

/// Conjunction of clauses, rendered as the `q` parameter of a file listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_eq(self, name: impl Into<String>) -> Self {
        self.and(Clause::NameEquals(name.into()))
    }

    pub fn in_parents(self, id: impl Into<String>) -> Self {
        self.and(Clause::InParents(id.into()))
    }

    pub fn mime_type_eq(self, mime: impl Into<String>) -> Self {
        self.and(Clause::MimeTypeEquals(mime.into()))
    }

    pub fn mime_type_ne(self, mime: impl Into<String>) -> Self {
        self.and(Clause::MimeTypeNotEquals(mime.into()))
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the query locally. An empty query matches everything.
    pub fn matches(&self, node: &RemoteNode) -> bool {
        self.clauses.iter().all(|c| c.matches(node))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

/// Escape a string literal for a single-quoted query value.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FOLDER_MIME_TYPE;

    #[test]
    fn renders_conjunction() {
        let q = Query::new()
            .name_eq("notes.txt")
            .in_parents("abc123")
            .mime_type_ne(FOLDER_MIME_TYPE);
        assert_eq!(
            q.to_string(),
            "name = 'notes.txt' and 'abc123' in parents and mimeType != 'application/vnd.google-apps.folder'"
        );
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let q = Query::new().name_eq(r"it's a \ test");
        assert_eq!(q.to_string(), r"name = 'it\'s a \\ test'");
    }

    #[test]
    fn injection_stays_inside_literal() {
        let q = Query::new().name_eq("x' or name != 'y");
        assert_eq!(q.to_string(), r"name = 'x\' or name != \'y'");
        assert_eq!(q.clauses().len(), 1);
    }

    #[test]
    fn empty_query() {
        let q = Query::new();
        assert!(q.is_empty());
        assert_eq!(q.to_string(), "");
        assert!(q.matches(&RemoteNode::default()));
    }

    #[test]
    fn local_evaluation() {
        let node = RemoteNode {
            id: "f1".into(),
            name: "a.txt".into(),
            mime_type: "text/plain".into(),
            parents: vec!["p1".into()],
            ..RemoteNode::default()
        };
        assert!(Query::new().name_eq("a.txt").in_parents("p1").matches(&node));
        assert!(!Query::new().name_eq("a.txt").in_parents("p2").matches(&node));
        assert!(Query::new().mime_type_ne(FOLDER_MIME_TYPE).matches(&node));
        assert!(!Query::new().mime_type_eq(FOLDER_MIME_TYPE).matches(&node));
    }
}
