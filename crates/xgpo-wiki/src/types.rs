use std::fmt;

pub const DEFAULT_BASE_QUERY: &str = "Grand Piece Online";

/// One matched wiki page, in the order the search API ranked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiResult {
    pub title: String,
    pub snippet: String,
    pub extract: String,
    pub source_url: String,
}

/// Topical bucket the aggregator queries independently.
///
/// Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Boss,
    Weapon,
    Ship,
    Gamepass,
    Merchant,
    TradeValue,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Boss,
        Category::Weapon,
        Category::Ship,
        Category::Gamepass,
        Category::Merchant,
        Category::TradeValue,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Boss => "Boss",
            Self::Weapon => "Weapon",
            Self::Ship => "Ship",
            Self::Gamepass => "Gamepass",
            Self::Merchant => "Merchant",
            Self::TradeValue => "Trade-Value",
        }
    }

    #[must_use]
    pub fn query_suffix(self) -> &'static str {
        match self {
            Self::Boss => "Boss",
            Self::Weapon => "Sword Weapon Gun",
            Self::Ship => "Ship Boat",
            Self::Gamepass => "Gamepass",
            Self::Merchant => "Merchant NPC",
            Self::TradeValue => "Trade Value Meta",
        }
    }

    /// `"<base> <suffix>"`, with a blank base replaced by [`DEFAULT_BASE_QUERY`].
    #[must_use]
    pub fn query_for(self, base_query: &str) -> String {
        format!("{} {}", normalize_base_query(base_query), self.query_suffix())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[must_use]
pub fn normalize_base_query(base_query: &str) -> &str {
    let trimmed = base_query.trim();
    if trimmed.is_empty() {
        DEFAULT_BASE_QUERY
    } else {
        trimmed
    }
}
