//! Full-text query planning
//!
//! User input is never passed to FTS5 as-is. It is split into word tokens the
//! same way the `unicode61` tokenizer splits text, and every token is emitted
//! as a quoted string, so punctuation can neither break the MATCH syntax nor
//! act as an operator. Double-quoted spans become phrase queries and a trailing
//! `*` on a bare term becomes a prefix query.

/// How a raw query string will be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// FTS5 MATCH expression built from quoted tokens
    Match(String),
    /// No word tokens: case-insensitive substring over title and content
    Substring(String),
    /// Blank query
    Empty,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryPlan::Empty)
    }
}

/// Split text into word tokens (runs of alphanumeric characters)
pub fn word_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn quote(token: &str) -> String {
    // Tokens are alphanumeric only, so they never contain a double quote
    format!("\"{}\"", token)
}

/// Build an execution plan for a user query
pub fn plan_query(raw: &str) -> QueryPlan {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return QueryPlan::Empty;
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut rest = trimmed;

    while !rest.is_empty() {
        if let Some(after_quote) = rest.strip_prefix('"') {
            // Phrase: up to the closing quote, or the end of input if unbalanced
            let (phrase, remainder) = match after_quote.find('"') {
                Some(end) => (&after_quote[..end], &after_quote[end + 1..]),
                None => (after_quote, ""),
            };
            let words = word_tokens(phrase);
            if !words.is_empty() {
                clauses.push(quote(&words.join(" ")));
            }
            rest = remainder.trim_start();
            continue;
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || c == '"')
            .unwrap_or(rest.len());
        let (term, remainder) = rest.split_at(end);
        rest = remainder.trim_start();

        let prefix = term.ends_with('*');
        let words = word_tokens(term);
        let last = words.len().saturating_sub(1);
        for (i, word) in words.iter().enumerate() {
            if prefix && i == last {
                clauses.push(format!("{}*", quote(word)));
            } else {
                clauses.push(quote(word));
            }
        }
    }

    if clauses.is_empty() {
        QueryPlan::Substring(trimmed.to_string())
    } else {
        QueryPlan::Match(clauses.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_terms_are_quoted() {
        assert_eq!(
            plan_query("rust memory"),
            QueryPlan::Match("\"rust\" \"memory\"".to_string())
        );
    }

    #[test]
    fn test_special_characters_never_reach_fts() {
        assert_eq!(
            plan_query("Test & Example"),
            QueryPlan::Match("\"Test\" \"Example\"".to_string())
        );
        assert_eq!(
            plan_query("title:foo (bar) -baz ^qux"),
            QueryPlan::Match("\"title\" \"foo\" \"bar\" \"baz\" \"qux\"".to_string())
        );
        assert_eq!(
            plan_query("AND OR NOT"),
            QueryPlan::Match("\"AND\" \"OR\" \"NOT\"".to_string())
        );
    }

    #[test]
    fn test_phrases_and_prefixes() {
        assert_eq!(
            plan_query("\"load my tasks\" deploy*"),
            QueryPlan::Match("\"load my tasks\" \"deploy\"*".to_string())
        );
        // Unbalanced quote runs to the end
        assert_eq!(
            plan_query("\"half open"),
            QueryPlan::Match("\"half open\"".to_string())
        );
        // A bare star is not a prefix of anything
        assert_eq!(plan_query("*"), QueryPlan::Substring("*".to_string()));
    }

    #[test]
    fn test_punctuation_only_falls_back_to_substring() {
        assert_eq!(plan_query("  &  "), QueryPlan::Substring("&".to_string()));
        assert_eq!(plan_query("\"\""), QueryPlan::Substring("\"\"".to_string()));
        assert_eq!(plan_query("   "), QueryPlan::Empty);
    }

    #[test]
    fn test_unicode_words() {
        assert_eq!(
            plan_query("café-crème"),
            QueryPlan::Match("\"café\" \"crème\"".to_string())
        );
    }
}
