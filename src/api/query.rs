//! Search query tokenizer for list endpoints.
//!
//! A query such as `status:active slug:acme "big corp"` is split on
//! whitespace, with double quotes grouping words. Tokens of the form
//! `key:value` are collected per key; everything else is free text.

use std::collections::BTreeMap;

use crate::auth::organization::OrgStatus;
use crate::domain::OrgId;
use crate::storage::repositories::OrganizationFilter;

/// A tokenized search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: BTreeMap<String, Vec<String>>,
    pub text: Vec<String>,
}

impl SearchQuery {
    pub fn parse(query: &str) -> Self {
        let mut parsed = SearchQuery::default();
        for token in split_tokens(query) {
            match token.split_once(':') {
                Some((key, value)) if !key.is_empty() => {
                    parsed.terms.entry(key.to_ascii_lowercase()).or_default().push(value.to_string());
                }
                _ => parsed.text.push(token),
            }
        }
        parsed
    }

    pub fn free_text(&self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text.join(" "))
        }
    }
}

/// Outcome of applying a search query to an organization filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMatch {
    /// The filter was narrowed and may still match rows.
    Filter,
    /// The query can never match anything.
    Nothing,
}

/// Narrow `filter` with the terms of `query`.
///
/// Unknown keys, unknown status values and non-numeric ids make the whole
/// query unmatchable rather than an error.
pub fn apply_organization_query(query: &str, filter: &mut OrganizationFilter) -> QueryMatch {
    let parsed = SearchQuery::parse(query);

    for (key, values) in &parsed.terms {
        match key.as_str() {
            "status" => {
                for value in values {
                    match OrgStatus::from_query_value(value) {
                        Some(status) => filter.statuses.push(status),
                        None => return QueryMatch::Nothing,
                    }
                }
            }
            "slug" => filter.slugs.extend(values.iter().cloned()),
            "id" => {
                for value in values {
                    match value.parse::<OrgId>() {
                        Ok(id) => filter.ids.push(id),
                        Err(_) => return QueryMatch::Nothing,
                    }
                }
            }
            "email" => filter.member_emails.extend(values.iter().map(|v| v.to_lowercase())),
            _ => return QueryMatch::Nothing,
        }
    }

    filter.text = parsed.free_text();
    QueryMatch::Filter
}

fn split_tokens(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in query.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
