//! Identifier generation and partial-match resolution.
//!
//! Every persisted record (task, group, session, worktree) gets an id of
//! the form `{6-char-hex}-{kind}-{slug}`, e.g. `019430-task-add-oauth`.
//! CLI flags that take an id accept any unambiguous prefix or slug
//! fragment via [`IdResolver`].

use std::collections::HashMap;

/// Generate a domain id from a kind tag and a human title.
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(title);
    format!("{}-{}-{}", hex_prefix, kind, slug)
}

pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Type-safe wrapper around a generated id string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(kind: &str, title: &str) -> Self {
        Self(generate_id(kind, title))
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn hex_prefix(&self) -> &str {
        &self.0[..self.0.len().min(6)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.splitn(3, '-').nth(1)
    }

    pub fn slug(&self) -> Option<&str> {
        self.0.splitn(3, '-').nth(2)
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DomainId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DomainId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for DomainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DomainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// Resolves a partial id/slug fragment (as typed on a CLI flag) to exactly
/// one full id, or reports ambiguity.
pub struct IdResolver<'a> {
    ids: &'a HashMap<String, String>,
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: &'a HashMap<String, String>) -> Self {
        Self { ids }
    }

    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        let matches: Vec<String> = self
            .ids
            .keys()
            .filter(|id| Self::matches(id, reference))
            .cloned()
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.into_iter().next().unwrap())),
            _ => Err(matches),
        }
    }

    fn matches(id: &str, reference: &str) -> bool {
        if id == reference {
            return true;
        }
        if id.starts_with(reference) {
            return true;
        }
        if let Some(slug_start) = id.find('-') {
            let slug_part = &id[slug_start + 1..];
            if slug_part.contains(reference) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_embeds_kind_and_slug() {
        let id = generate_id("task", "Add OAuth Authentication");
        assert!(id.contains("-task-"));
        assert!(id.contains("add-oauth-authentication"));
    }

    #[test]
    fn slugify_strips_apostrophes_and_punctuation() {
        assert_eq!(slugify("don't stop"), "dont-stop");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
    }

    #[test]
    fn domain_id_parts() {
        let id = DomainId::from_string("019430-task-add-oauth".to_string());
        assert_eq!(id.hex_prefix(), "019430");
        assert_eq!(id.kind(), Some("task"));
        assert_eq!(id.slug(), Some("add-oauth"));
    }

    #[test]
    fn resolver_hex_prefix_and_ambiguity() {
        let mut ids = HashMap::new();
        ids.insert("019430-task-add-oauth".to_string(), "Add OAuth".to_string());
        ids.insert("019431-task-oauth-db".to_string(), "OAuth DB".to_string());
        let resolver = IdResolver::new(&ids);

        assert_eq!(
            resolver.resolve("019430").unwrap(),
            Some("019430-task-add-oauth".to_string())
        );
        assert!(resolver.resolve("oauth").is_err());
        assert_eq!(resolver.resolve("nonexistent").unwrap(), None);
    }
}
