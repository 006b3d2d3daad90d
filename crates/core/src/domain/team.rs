use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleId(pub String);

/// One knowledge-base entry. The id is the timestamp of the message that
/// created it, so ids are unique within a team and ordered by creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The per-team record. Created lazily as a shell on first read-miss and
/// only persisted once a mutation happens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub bot_connected: bool,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl Team {
    pub fn shell(id: TeamId) -> Self {
        Self { id, domain: None, bot_connected: false, articles: Vec::new() }
    }

    pub fn find_article(&self, id: &ArticleId) -> Option<&Article> {
        self.articles.iter().find(|article| &article.id == id)
    }

    pub fn find_article_mut(&mut self, id: &ArticleId) -> Option<&mut Article> {
        self.articles.iter_mut().find(|article| &article.id == id)
    }

    /// Removes the article with the given id, preserving the order of the
    /// survivors. Returns the removed article, or `None` when absent.
    pub fn remove_article(&mut self, id: &ArticleId) -> Option<Article> {
        let index = self.articles.iter().position(|article| &article.id == id)?;
        Some(self.articles.remove(index))
    }

    pub fn push_article(&mut self, article: Article) {
        self.articles.push(article);
    }
}

/// Which field of an article a conversational edit targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditField {
    Title,
    Description,
    Content,
}

impl EditField {
    /// User-facing wording used in the edit question.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "short description",
            Self::Content => "content",
        }
    }

    /// Writes the reply text verbatim into exactly the targeted field.
    pub fn apply(&self, article: &mut Article, value: String) {
        match self {
            Self::Title => article.title = value,
            Self::Description => article.description = value,
            Self::Content => article.content = Some(value),
        }
    }
}
