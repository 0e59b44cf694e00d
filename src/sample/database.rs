//! In-memory article store backing the sample.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub text: String,
}

pub trait ArticleDatabase {
    fn articles(&self) -> Vec<Article>;
    fn article(&self, id: u64) -> Option<Article>;
}

pub const DEFAULT_ARTICLE_COUNT: u64 = 50;

pub struct InMemoryArticleDatabase {
    articles: Vec<Article>,
}

impl InMemoryArticleDatabase {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles }
    }

    /// `count` generated articles with ids `1..=count`.
    pub fn generated(count: u64) -> Self {
        Self::new(
            (1..=count)
                .map(|id| Article {
                    id,
                    title: format!("Article #{id}"),
                    text: format!("Body of article #{id}. ").repeat(3).trim_end().to_string(),
                })
                .collect(),
        )
    }
}

impl Default for InMemoryArticleDatabase {
    fn default() -> Self {
        Self::generated(DEFAULT_ARTICLE_COUNT)
    }
}

impl ArticleDatabase for InMemoryArticleDatabase {
    fn articles(&self) -> Vec<Article> {
        self.articles.clone()
    }

    fn article(&self, id: u64) -> Option<Article> {
        self.articles.iter().find(|a| a.id == id).cloned()
    }
}
