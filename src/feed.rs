//! RSS, Atom and sitemap generation from stored articles.
//!
//! All three are built from the same slice of articles, which callers take
//! from [`Directory::list`](crate::storage::Directory::list) so entries are
//! already newest first.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use atom_syndication::{
    Entry, EntryBuilder, FeedBuilder, FixedDateTime, GeneratorBuilder, LinkBuilder, PersonBuilder,
    Text,
};
use chrono::{DateTime, Utc};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder};

use crate::domain::{Article, SiteConfig};

/// URL path segment articles are served under.
pub const ARTICLE_PATH: &str = "articles";

/// File name of the RSS feed.
pub const RSS_FILE: &str = "feed.xml";

/// File name of the Atom feed.
pub const ATOM_FILE: &str = "atom.xml";

/// File name of the sitemap.
pub const SITEMAP_FILE: &str = "sitemap.xml";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const GENERATOR: &str = env!("CARGO_PKG_NAME");

fn base_url(site: &SiteConfig) -> &str {
    site.url.trim_end_matches('/')
}

/// Canonical URL of an article.
#[must_use]
pub fn article_url(site: &SiteConfig, article: &Article) -> String {
    format!("{}/{ARTICLE_PATH}/{}", base_url(site), article.slug())
}

/// Renders an RSS 2.0 channel.
#[must_use]
pub fn rss(site: &SiteConfig, articles: &[Article]) -> String {
    let author = format!("{} ({})", site.email, site.author);
    let items: Vec<rss::Item> = articles
        .iter()
        .map(|article| {
            let link = article_url(site, article);
            ItemBuilder::default()
                .title(article.meta().title.clone())
                .link(Some(link.clone()))
                .guid(GuidBuilder::default().permalink(true).value(link).build())
                .description(article.meta().description.clone())
                .pub_date(article.published().to_rfc2822())
                .author(author.clone())
                .categories(vec![
                    CategoryBuilder::default()
                        .name(article.meta().category.clone())
                        .build(),
                ])
                .build()
        })
        .collect();

    ChannelBuilder::default()
        .title(site.title.clone())
        .link(base_url(site).to_string())
        .description(site.description.clone())
        .language(site.language.clone())
        .generator(GENERATOR.to_string())
        .items(items)
        .build()
        .to_string()
}

/// Renders an Atom 1.0 feed.
///
/// The feed's `updated` time is the newest article date, or the Unix epoch
/// for an empty feed.
#[must_use]
pub fn atom(site: &SiteConfig, articles: &[Article]) -> String {
    let base = base_url(site);
    let updated = articles
        .iter()
        .map(Article::published)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .fixed_offset();

    let entries: Vec<Entry> = articles
        .iter()
        .map(|article| atom_entry(site, article))
        .collect();

    FeedBuilder::default()
        .title(Text::plain(site.title.clone()))
        .id(base)
        .updated(updated)
        .authors(vec![
            PersonBuilder::default()
                .name(site.author.clone())
                .email(Some(site.email.clone()))
                .build(),
        ])
        .links(vec![
            LinkBuilder::default()
                .href(format!("{base}/{ATOM_FILE}"))
                .rel("self".to_string())
                .mime_type(Some("application/atom+xml".to_string()))
                .build(),
            LinkBuilder::default()
                .href(base.to_string())
                .rel("alternate".to_string())
                .build(),
        ])
        .subtitle(Some(Text::plain(site.description.clone())))
        .generator(Some(GeneratorBuilder::default().value(GENERATOR).build()))
        .lang(site.language.clone())
        .entries(entries)
        .build()
        .to_string()
}

fn atom_entry(site: &SiteConfig, article: &Article) -> Entry {
    let link = article_url(site, article);
    let published: FixedDateTime = article.published().fixed_offset();

    EntryBuilder::default()
        .title(Text::plain(article.meta().title.clone()))
        .id(link.clone())
        .updated(published)
        .published(Some(published))
        .summary(Some(Text::plain(article.meta().description.clone())))
        .links(vec![
            LinkBuilder::default()
                .href(link)
                .rel("alternate".to_string())
                .build(),
        ])
        .build()
}

/// Renders a sitemap listing the site root and every article.
#[must_use]
pub fn sitemap(site: &SiteConfig, articles: &[Article]) -> String {
    let mut xml = String::with_capacity(256 + articles.len() * 128);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"");
    xml.push_str(SITEMAP_NS);
    xml.push_str("\">\n");

    push_url(&mut xml, &format!("{}/", base_url(site)), None);
    for article in articles {
        let lastmod = article.published().format("%Y-%m-%d").to_string();
        push_url(&mut xml, &article_url(site, article), Some(&lastmod));
    }

    xml.push_str("</urlset>\n");
    xml
}

fn push_url(xml: &mut String, loc: &str, lastmod: Option<&str>) {
    xml.push_str("  <url>\n    <loc>");
    xml.push_str(&escape_xml(loc));
    xml.push_str("</loc>\n");
    if let Some(lastmod) = lastmod {
        xml.push_str("    <lastmod>");
        xml.push_str(lastmod);
        xml.push_str("</lastmod>\n");
    }
    xml.push_str("  </url>\n");
}

fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}

/// Writes the RSS feed, Atom feed and sitemap into `out_dir`.
///
/// Returns the written paths.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or a file cannot be
/// written.
pub fn write_all(
    out_dir: &Path,
    site: &SiteConfig,
    articles: &[Article],
) -> Result<Vec<PathBuf>, FeedError> {
    fs::create_dir_all(out_dir).map_err(|e| FeedError(out_dir.to_path_buf(), e))?;

    let outputs = [
        (RSS_FILE, rss(site, articles)),
        (ATOM_FILE, atom(site, articles)),
        (SITEMAP_FILE, sitemap(site, articles)),
    ];
    outputs
        .into_iter()
        .map(|(name, xml)| {
            let path = out_dir.join(name);
            fs::write(&path, xml).map_err(|e| FeedError(path.clone(), e))?;
            tracing::info!("wrote {}", path.display());
            Ok(path)
        })
        .collect()
}

/// A feed file could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {path}: {error}", path = .0.display(), error = .1)]
pub struct FeedError(PathBuf, #[source] std::io::Error);
