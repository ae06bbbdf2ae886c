//! crates/stylecal_core/src/rules.rs
//!
//! The keyword rule engine: an ordered snapshot of enabled rules used to map
//! event text to at most one [`Category`], plus keyword administration.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{Category, Keyword, RuleWithKeywords};
use crate::error::RuleAdminError;
use crate::ports::{PortError, RuleStore};

/// Shortest keyword accepted by administration.
pub const MIN_KEYWORD_LEN: usize = 2;

/// Trims and lower-cases a keyword.
pub fn normalize_keyword(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Evaluation order of a rule: priority descending, then creation time and
/// id ascending. Sorting by this key yields one total order.
pub fn rule_order_key(priority: i32, created_at: DateTime<Utc>, id: Uuid) -> (Reverse<i32>, DateTime<Utc>, Uuid) {
    (Reverse(priority), created_at, id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotRule {
    category: Category,
    keywords: Vec<String>,
}

/// An immutable, ordered view of the enabled rules and their enabled keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSnapshot {
    rules: Vec<SnapshotRule>,
}

impl RuleSnapshot {
    pub fn from_rules(rules: Vec<RuleWithKeywords>) -> Self {
        let mut enabled: Vec<RuleWithKeywords> = rules.into_iter().filter(|r| r.rule.enabled).collect();
        enabled.sort_by_key(|r| rule_order_key(r.rule.priority, r.rule.created_at, r.rule.id));

        let rules = enabled
            .into_iter()
            .map(|r| SnapshotRule {
                category: r.rule.target_category,
                keywords: r
                    .keywords
                    .into_iter()
                    .filter(|k| k.enabled)
                    .map(|k| normalize_keyword(&k.keyword))
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        Self { rules }
    }

    /// Categories in evaluation order.
    pub fn categories(&self) -> Vec<Category> {
        self.rules.iter().map(|r| r.category).collect()
    }

    /// Returns the category of the first rule with a keyword contained in `text`.
    pub fn classify(&self, text: &str) -> Option<Category> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|rule| rule.category)
    }

    /// Classifies an event by its title and description together.
    pub fn classify_event(&self, title: &str, description: &str) -> Option<Category> {
        self.classify(&format!("{title} {description}"))
    }
}

/// Keyword administration and snapshot loading on top of a [`RuleStore`].
#[derive(Clone)]
pub struct RuleAdmin {
    store: Arc<dyn RuleStore>,
}

impl RuleAdmin {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Reads the current rules. Never cached, so edits apply to the next call.
    pub async fn snapshot(&self) -> Result<RuleSnapshot, PortError> {
        Ok(RuleSnapshot::from_rules(self.store.list_rules().await?))
    }

    /// Enabled rules with their enabled keywords, in evaluation order.
    pub async fn list_rules(&self) -> Result<Vec<RuleWithKeywords>, RuleAdminError> {
        let mut rules: Vec<RuleWithKeywords> = self
            .store
            .list_rules()
            .await?
            .into_iter()
            .filter(|r| r.rule.enabled)
            .map(|mut r| {
                r.keywords.retain(|k| k.enabled);
                r
            })
            .collect();
        rules.sort_by_key(|r| rule_order_key(r.rule.priority, r.rule.created_at, r.rule.id));
        Ok(rules)
    }

    /// Adds `keyword` under `category`.
    ///
    /// A disabled keyword that already belongs to the same category is
    /// re-enabled. Any other existing keyword is reported as a duplicate
    /// naming its owner.
    pub async fn add_keyword(&self, category: &str, keyword: &str) -> Result<Keyword, RuleAdminError> {
        let category = category
            .parse::<Category>()
            .map_err(|e| RuleAdminError::Validation(e.to_string()))?;
        let keyword = normalize_keyword(keyword);
        if keyword.chars().count() < MIN_KEYWORD_LEN {
            return Err(RuleAdminError::Validation(format!(
                "keyword must be at least {MIN_KEYWORD_LEN} characters"
            )));
        }

        if let Some((existing, owner)) = self.store.find_keyword(&keyword).await? {
            if !existing.enabled && owner == category {
                self.store.ensure_rule(category).await?;
                let restored = self.store.set_keyword_enabled(existing.id, true).await?;
                info!("Re-enabled keyword '{}' under {}", keyword, category);
                return Ok(restored);
            }
            return Err(RuleAdminError::DuplicateKeyword {
                keyword,
                category: owner,
            });
        }

        let rule = self.store.ensure_rule(category).await?;
        match self.store.insert_keyword(rule.id, &keyword).await {
            Ok(created) => {
                info!("Added keyword '{}' under {}", keyword, category);
                Ok(created)
            }
            // Lost a race against a concurrent insert of the same keyword.
            Err(PortError::Conflict(_)) => {
                let owner = self
                    .store
                    .find_keyword(&keyword)
                    .await?
                    .map_or(category, |(_, owner)| owner);
                Err(RuleAdminError::DuplicateKeyword {
                    keyword,
                    category: owner,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-deletes a keyword. The row is kept so the text stays reserved.
    pub async fn remove_keyword(&self, keyword_id: Uuid) -> Result<Keyword, RuleAdminError> {
        let keyword = self.store.set_keyword_enabled(keyword_id, false).await?;
        info!("Disabled keyword '{}'", keyword.keyword);
        Ok(keyword)
    }
}
