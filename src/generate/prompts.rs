//! Prompt text for each generation step.

use std::fmt::Write as _;

use super::topics::TopicIdea;
use crate::domain::Category;

/// Existing titles listed in the fresh-topic prompt.
const MAX_AVOIDED_TITLES: usize = 30;

/// Characters of article body quoted in the FAQ/metadata prompt.
const MAX_QUOTED_BODY: usize = 6000;

/// Token budgets for each step.
pub mod budget {
    /// Fresh topic idea.
    pub const TOPIC: u32 = 800;
    /// Combined research and outline.
    pub const RESEARCH: u32 = 5000;
    /// Article body.
    pub const ARTICLE: u32 = 8000;
    /// Combined FAQ and metadata.
    pub const FAQ_AND_METADATA: u32 = 2500;
}

/// Asks for one new topic in `category`, unlike any of `existing_titles`.
#[must_use]
pub fn fresh_topic(category: &Category, existing_titles: &[String], year: i32) -> String {
    let mut prompt = format!(
        "You are a trend analyst covering {name}. Propose ONE article topic.\n\n\
         REQUIREMENTS:\n\
         - Target a keyword people actually search for\n\
         - Be timely for {year}\n\
         - Do not overlap with any existing article listed below\n\n\
         EXISTING ARTICLES:\n",
        name = category.name,
    );
    for title in existing_titles.iter().take(MAX_AVOIDED_TITLES) {
        let _ = writeln!(prompt, "- {title}");
    }
    let _ = write!(
        prompt,
        "\nRespond with a single JSON object:\n\
         {{\n  \"title\": \"title containing the keyword, at most 60 characters\",\n  \
         \"targetKeyword\": \"primary search keyword\",\n  \
         \"searchIntent\": \"informational|transactional|commercial\",\n  \
         \"difficulty\": \"low|medium|high\",\n  \
         \"category\": \"{name}\"\n}}\n\n\
         Output ONLY the JSON.",
        name = category.name,
    );
    prompt
}

/// Asks for research notes and a section outline in one response.
#[must_use]
pub fn research_and_outline(topic: &TopicIdea) -> String {
    format!(
        "You are a senior researcher in {category}. Prepare material for an article.\n\n\
         TOPIC: \"{title}\"\n\
         TARGET KEYWORD: \"{keyword}\"\n\n\
         PART 1, RESEARCH:\n\
         - Core definitions and how it works in practice\n\
         - Current developments with specific names, dates and figures\n\
         - Common misconceptions\n\
         - Trade-offs against the main alternatives\n\n\
         PART 2, OUTLINE:\n\
         - A hook for the introduction\n\
         - 6 to 10 H2 sections, each with the points it must cover\n\
         - A conclusion with concrete next steps\n\n\
         Be specific. Output plain Markdown.",
        category = topic.category,
        title = topic.title,
        keyword = topic.target_keyword,
    )
}

/// Asks for the article body, following the research and outline.
///
/// `related` titles are offered for internal links.
#[must_use]
pub fn article(topic: &TopicIdea, research: &str, related: &[String]) -> String {
    let mut prompt = format!(
        "Write a complete article in MDX-compatible Markdown.\n\n\
         TITLE: \"{title}\"\n\
         TARGET KEYWORD: \"{keyword}\"\n\
         CATEGORY: {category}\n\n\
         RESEARCH AND OUTLINE:\n{research}\n\n\
         RULES:\n\
         - At least 2500 words\n\
         - Start directly with the introduction; do not repeat the title as an H1\n\
         - Use ## for sections and ### for subsections\n\
         - Tables must be standalone, never inside list items\n\
         - Write \"less than 10\" instead of \"<10\"; never use bare < or >\n\
         - Close every code block\n\
         - No frontmatter, no FAQ section, no reasoning tags\n",
        title = topic.title,
        keyword = topic.target_keyword,
        category = topic.category,
        research = research.trim(),
    );
    if !related.is_empty() {
        prompt.push_str("\nWhere relevant, mention these related articles:\n");
        for title in related {
            let _ = writeln!(prompt, "- {title}");
        }
    }
    prompt
}

/// Asks for FAQs and frontmatter metadata for a written article.
#[must_use]
pub fn faq_and_metadata(topic: &TopicIdea, body: &str) -> String {
    let quoted: String = body.chars().take(MAX_QUOTED_BODY).collect();
    format!(
        "Produce FAQs and SEO metadata for this article.\n\n\
         TITLE: \"{title}\"\n\
         TARGET KEYWORD: \"{keyword}\"\n\n\
         ARTICLE:\n{quoted}\n\n\
         Respond with a single JSON object:\n\
         {{\n  \"metadata\": {{\n    \
         \"title\": \"at most 60 characters\",\n    \
         \"description\": \"150 to 160 characters\",\n    \
         \"slug\": \"lowercase-words-with-hyphens\",\n    \
         \"keywords\": [\"5 to 8 keywords\"],\n    \
         \"readTime\": \"N min read\"\n  }},\n  \
         \"faqs\": [{{\"question\": \"...\", \"answer\": \"...\"}}]\n}}\n\n\
         Include 5 to 8 FAQs. Output ONLY the JSON.",
        title = topic.title,
        keyword = topic.target_keyword,
    )
}
