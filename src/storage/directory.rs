//! A filesystem backed store of articles.
//!
//! Each article is a single file in a flat directory, named `{slug}.{ext}`,
//! holding YAML frontmatter followed by a Markdown body. The [`Directory`]
//! is a thin view over that directory: it caches nothing, so every read
//! reflects what is on disk at the time.

use std::{
    ffi::OsStr,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use walkdir::WalkDir;

use super::frontmatter::{self, ParseError};
use crate::domain::{Article, Config, Slug, date::normalize_date};

/// A filesystem backed store of articles.
#[derive(Debug, Clone)]
pub struct Directory {
    /// The directory articles are stored in.
    dir: PathBuf,
    /// File extension of article files, without the leading dot.
    extension: String,
}

impl Directory {
    /// Opens a store over `dir`. The directory need not exist yet.
    #[must_use]
    pub fn new(dir: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            dir,
            extension: extension.into(),
        }
    }

    /// Opens the store configured for a project root.
    #[must_use]
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(config.content_dir(root), config.content.extension.clone())
    }

    /// The directory articles are stored in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path an article with this slug is (or would be) stored at.
    #[must_use]
    pub fn path_for(&self, slug: &Slug) -> PathBuf {
        self.dir.join(format!("{slug}.{}", self.extension))
    }

    /// Whether a file already exists for this slug.
    #[must_use]
    pub fn contains(&self, slug: &Slug) -> bool {
        self.path_for(slug).exists()
    }

    /// Lists every parseable article, newest first.
    ///
    /// Nothing is read until the listing is iterated, and each iteration
    /// rescans the directory.
    #[must_use]
    pub const fn list(&self) -> Listing<'_> {
        Listing { store: self }
    }

    /// Loads a single article.
    ///
    /// A trailing `.{ext}` on `slug` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotFound`] if there is no such article (including
    /// when `slug` is not a valid slug), or an error if the file cannot be
    /// read or parsed.
    pub fn get(&self, slug: &str) -> Result<Article, LoadError> {
        let suffix = format!(".{}", self.extension);
        let slug = slug.strip_suffix(&suffix).unwrap_or(slug);
        let slug = Slug::new(slug).map_err(|_| LoadError::NotFound)?;
        load(&self.path_for(&slug), slug)
    }

    /// Writes a new article file.
    ///
    /// The file is created exclusively: an existing file with the same slug
    /// is never overwritten. If writing fails part way, the partial file is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CreateError::Collision`] if the slug is taken, or
    /// [`CreateError::Io`] if the file cannot be written.
    pub fn create(&self, slug: &Slug, content: &str) -> Result<PathBuf, CreateError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(slug);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CreateError::Collision(slug.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_all(file, content) {
            if let Err(cleanup) = fs::remove_file(&path) {
                tracing::warn!("failed to remove partial file {}: {cleanup}", path.display());
            }
            return Err(e.into());
        }

        tracing::debug!("wrote {}", path.display());
        Ok(path)
    }

    /// Removes an article file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn delete(&self, slug: &Slug) -> io::Result<()> {
        fs::remove_file(self.path_for(slug))
    }

    /// Slugs of every article file, whether or not it parses.
    #[must_use]
    pub fn slugs(&self) -> Vec<Slug> {
        let mut slugs: Vec<_> = self
            .article_paths()
            .iter()
            .filter_map(|path| slug_from_path(path))
            .collect();
        slugs.sort();
        slugs
    }

    fn article_paths(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension() == Some(OsStr::new(&self.extension)))
            .map(walkdir::DirEntry::into_path)
            .collect()
    }

    fn scan(&self) -> Vec<Article> {
        let now = Utc::now();
        let mut articles: Vec<_> = self
            .article_paths()
            .into_par_iter()
            .filter_map(|path| try_load(&path))
            .map(|article| (normalize_date(&article.meta().date, now), article))
            .collect();

        articles.sort_by(|(a_date, a), (b_date, b)| {
            b_date
                .cmp(a_date)
                .then_with(|| a.slug().cmp(b.slug()))
        });
        articles.into_iter().map(|(_, article)| article).collect()
    }
}

/// A lazy, restartable listing of the articles in a [`Directory`].
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a> {
    store: &'a Directory,
}

impl Listing<'_> {
    /// Scans the directory and iterates the articles, newest first.
    #[must_use]
    pub fn iter(&self) -> std::vec::IntoIter<Article> {
        self.store.scan().into_iter()
    }
}

impl IntoIterator for Listing<'_> {
    type Item = Article;
    type IntoIter = std::vec::IntoIter<Article>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &Listing<'_> {
    type Item = Article;
    type IntoIter = std::vec::IntoIter<Article>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn write_all(file: File, content: &str) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes())?;
    writer.flush()
}

fn slug_from_path(path: &Path) -> Option<Slug> {
    let stem = path.file_stem()?.to_str()?;
    Slug::new(stem).ok()
}

fn try_load(path: &Path) -> Option<Article> {
    let Some(slug) = slug_from_path(path) else {
        tracing::debug!("skipping file with invalid slug at {}", path.display());
        return None;
    };
    match load(path, slug) {
        Ok(article) => Some(article),
        Err(e) => {
            tracing::warn!("skipping {}: {e}", path.display());
            None
        }
    }
}

fn load(path: &Path, slug: Slug) -> Result<Article, LoadError> {
    let text = fs::read_to_string(path).map_err(|io_error| match io_error.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound,
        _ => LoadError::Io(io_error),
    })?;
    let (meta, body) = frontmatter::parse(&text)?;
    Ok(Article::new(slug, meta, body))
}

/// Errors that can occur when loading an article.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No article exists with the requested slug.
    #[error("article not found")]
    NotFound,
    /// The file exists but could not be read.
    #[error("failed to read article: {0}")]
    Io(#[from] io::Error),
    /// The file could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors that can occur when creating an article.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// A file with this slug already exists.
    #[error("an article with slug '{0}' already exists")]
    Collision(Slug),
    /// The file could not be written.
    #[error("failed to write article: {0}")]
    Io(#[from] io::Error),
}
