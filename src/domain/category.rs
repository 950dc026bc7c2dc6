use nonempty::NonEmpty;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Glyph used for categories that are not configured.
pub const FALLBACK_EMOJI: &str = "📝";

/// An editorial category with its display glyph and selection weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, also stored in article frontmatter.
    pub name: String,
    /// Display glyph.
    pub emoji: String,
    /// Relative selection weight; higher is picked more often.
    pub weight: u32,
}

impl Category {
    /// Creates a category.
    pub fn new(name: impl Into<String>, emoji: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            emoji: emoji.into(),
            weight,
        }
    }
}

/// The fixed set of editorial categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories(NonEmpty<Category>);

impl Categories {
    /// Builds the set from a list, returning `None` if the list is empty.
    #[must_use]
    pub fn new(categories: Vec<Category>) -> Option<Self> {
        NonEmpty::from_vec(categories).map(Self)
    }

    /// Picks a category at random, proportionally to weight.
    ///
    /// If every weight is zero the first category is returned.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> &Category {
        let total: u64 = self.0.iter().map(|c| u64::from(c.weight)).sum();
        if total == 0 {
            return self.0.first();
        }

        let mut remaining = rng.random_range(0..total);
        for category in self.0.iter() {
            let weight = u64::from(category.weight);
            if remaining < weight {
                return category;
            }
            remaining -= weight;
        }
        self.0.first()
    }

    /// Finds a category by name, ignoring case.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Category> {
        self.0.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the emoji for a category name, or [`FALLBACK_EMOJI`].
    #[must_use]
    pub fn emoji_for(&self, name: &str) -> &str {
        self.find(name).map_or(FALLBACK_EMOJI, |c| c.emoji.as_str())
    }

    /// The first (default) category.
    #[must_use]
    pub fn first(&self) -> &Category {
        self.0.first()
    }

    /// Iterates over the categories in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self(NonEmpty::from((
            Category::new("Artificial Intelligence", "🤖", 30),
            vec![
                Category::new("Cryptocurrency", "₿", 25),
                Category::new("Technology", "💻", 20),
                Category::new("Finance", "📈", 15),
                Category::new("Web3", "🌐", 10),
            ],
        )))
    }
}
