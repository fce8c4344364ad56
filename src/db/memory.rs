//! In-memory storage backend
//!
//! [`MemoryStore`] implements every repository trait over plain maps
//! guarded by one async `RwLock`. It enforces the same uniqueness,
//! foreign-key and cascade rules as the SQL schema, so services behave
//! identically on either backend. Nothing is persisted.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::repositories::{
    ArticleRepository, CommentRepository, FollowRepository, MarkKind, MarkRepository,
    SessionRepository, TagRepository, UserRepository,
};
use crate::models::{
    Article, ArticleQuery, ArticleView, Comment, CommentView, FollowStats, Profile, Session, Tag,
    TagWithCount, User,
};

type Edges = BTreeMap<(i64, i64), DateTime<Utc>>;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    sessions: HashMap<String, Session>,
    articles: BTreeMap<i64, Article>,
    tags: BTreeMap<i64, Tag>,
    /// (article_id, tag_id)
    article_tags: BTreeSet<(i64, i64)>,
    comments: BTreeMap<i64, Comment>,
    /// (user_id, article_id)
    likes: Edges,
    /// (user_id, article_id)
    bookmarks: Edges,
    /// (follower_id, followee_id)
    follows: Edges,
    last_user_id: i64,
    last_article_id: i64,
    last_tag_id: i64,
    last_comment_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

fn window<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl Tables {
    fn marks(&self, kind: MarkKind) -> &Edges {
        match kind {
            MarkKind::Like => &self.likes,
            MarkKind::Bookmark => &self.bookmarks,
        }
    }

    fn marks_mut(&mut self, kind: MarkKind) -> &mut Edges {
        match kind {
            MarkKind::Like => &mut self.likes,
            MarkKind::Bookmark => &mut self.bookmarks,
        }
    }

    fn user_by_name(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    fn follow_stats(&self, user_id: i64, viewer: Option<i64>) -> FollowStats {
        FollowStats {
            follower_count: self.follows.keys().filter(|(_, to)| *to == user_id).count() as i64,
            following_count: self.follows.keys().filter(|(from, _)| *from == user_id).count()
                as i64,
            following: viewer.is_some_and(|v| self.follows.contains_key(&(v, user_id))),
        }
    }

    fn profile(&self, user_id: i64, viewer: Option<i64>) -> Option<Profile> {
        let user = self.users.get(&user_id)?;
        Some(Profile::from_user(user, self.follow_stats(user_id, viewer)))
    }

    fn tag_names(&self, article_id: i64) -> Vec<String> {
        let mut names: Vec<String> = self
            .article_tags
            .range((article_id, i64::MIN)..=(article_id, i64::MAX))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id))
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names
    }

    fn mark_count(&self, kind: MarkKind, article_id: i64) -> i64 {
        self.marks(kind)
            .keys()
            .filter(|(_, a)| *a == article_id)
            .count() as i64
    }

    fn article_view(&self, article: &Article, viewer: Option<i64>) -> Option<ArticleView> {
        let author = self.profile(article.author_id, viewer)?;
        let marked = |kind| viewer.is_some_and(|v| self.marks(kind).contains_key(&(v, article.id)));
        Some(ArticleView {
            id: article.id,
            slug: article.slug.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            body: article.body.clone(),
            body_html: article.body_html.clone(),
            tags: self.tag_names(article.id),
            author,
            like_count: self.mark_count(MarkKind::Like, article.id),
            comment_count: self
                .comments
                .values()
                .filter(|c| c.article_id == article.id)
                .count() as i64,
            bookmark_count: self.mark_count(MarkKind::Bookmark, article.id),
            liked: marked(MarkKind::Like),
            bookmarked: marked(MarkKind::Bookmark),
            created_at: article.created_at,
            updated_at: article.updated_at,
        })
    }

    fn comment_view(&self, comment: &Comment, viewer: Option<i64>) -> Option<CommentView> {
        Some(CommentView {
            id: comment.id,
            article_id: comment.article_id,
            body: comment.body.clone(),
            author: self.profile(comment.author_id, viewer)?,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        })
    }

    /// Unset filters match everything; a filter naming something that
    /// does not exist matches nothing.
    fn matches(&self, article: &Article, query: &ArticleQuery, search: Option<&str>) -> bool {
        if let Some(tag) = query.tag.as_deref() {
            let tagged = self.tags.values().any(|t| {
                (t.slug == tag || t.name == tag)
                    && self.article_tags.contains(&(article.id, t.id))
            });
            if !tagged {
                return false;
            }
        }
        if let Some(author) = query.author.as_deref() {
            match self.users.get(&article.author_id) {
                Some(u) if u.username == author => {}
                _ => return false,
            }
        }
        if let Some(liked_by) = query.liked_by.as_deref() {
            match self.user_by_name(liked_by) {
                Some(u) if self.likes.contains_key(&(u.id, article.id)) => {}
                _ => return false,
            }
        }
        if let Some(user_id) = query.bookmarked_by {
            if !self.bookmarks.contains_key(&(user_id, article.id)) {
                return false;
            }
        }
        if let Some(user_id) = query.feed_of {
            if !self.follows.contains_key(&(user_id, article.author_id)) {
                return false;
            }
        }
        if let Some(term) = search {
            if !article.title.to_ascii_lowercase().contains(term)
                && !article.description.to_ascii_lowercase().contains(term)
            {
                return false;
            }
        }
        true
    }

    fn remove_article(&mut self, id: i64) {
        self.articles.remove(&id);
        self.article_tags.retain(|(a, _)| *a != id);
        self.comments.retain(|_, c| c.article_id != id);
        self.likes.retain(|(_, a), _| *a != id);
        self.bookmarks.retain(|(_, a), _| *a != id);
    }

    fn remove_user(&mut self, id: i64) {
        self.users.remove(&id);
        self.sessions.retain(|_, s| s.user_id != id);
        let owned: Vec<i64> = self
            .articles
            .values()
            .filter(|a| a.author_id == id)
            .map(|a| a.id)
            .collect();
        for article_id in owned {
            self.remove_article(article_id);
        }
        self.comments.retain(|_, c| c.author_id != id);
        self.likes.retain(|(u, _), _| *u != id);
        self.bookmarks.retain(|(u, _), _| *u != id);
        self.follows.retain(|(a, b), _| *a != id && *b != id);
    }

    fn check_user_unique(&self, user: &User) -> Result<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.username == user.username {
                bail!("UNIQUE constraint failed: users.username");
            }
            if other.email == user.email {
                bail!("UNIQUE constraint failed: users.email");
            }
        }
        Ok(())
    }

    fn check_article_ref(&self, user_id: i64, article_id: i64) -> Result<()> {
        if !self.users.contains_key(&user_id) || !self.articles.contains_key(&article_id) {
            bail!("FOREIGN KEY constraint failed");
        }
        Ok(())
    }
}

/// Process-local store implementing all repository traits.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Users and sessions
// ============================================================================

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &User) -> Result<User> {
        let mut t = self.tables.write().await;
        t.check_user_unique(user)?;
        let now = Utc::now();
        let created = User {
            id: next_id(&mut t.last_user_id),
            created_at: now,
            updated_at: now,
            ..user.clone()
        };
        t.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.user_by_name(username).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, user: &User) -> Result<User> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user.id) {
            bail!("User not found after update");
        }
        t.check_user_unique(user)?;
        let updated = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        t.users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.tables.write().await.remove_user(id);
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = users.len() as i64;
        Ok((window(users, (page.max(1) - 1) * per_page, per_page), total))
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, session: &Session) -> Result<Session> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&session.user_id) {
            bail!("FOREIGN KEY constraint failed");
        }
        if t.sessions.contains_key(&session.id) {
            bail!("UNIQUE constraint failed: sessions.id");
        }
        t.sessions.insert(session.id.clone(), session.clone());
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(id);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        self.tables
            .write()
            .await
            .sessions
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let mut t = self.tables.write().await;
        let before = t.sessions.len();
        let now = Utc::now();
        t.sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - t.sessions.len()) as i64)
    }
}

// ============================================================================
// Articles and tags
// ============================================================================

#[async_trait]
impl ArticleRepository for MemoryStore {
    async fn create(&self, article: &Article) -> Result<Article> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&article.author_id) {
            bail!("FOREIGN KEY constraint failed");
        }
        if t.articles.values().any(|a| a.slug == article.slug) {
            bail!("UNIQUE constraint failed: articles.slug");
        }
        let now = Utc::now();
        let created = Article {
            id: next_id(&mut t.last_article_id),
            created_at: now,
            updated_at: now,
            ..article.clone()
        };
        t.articles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        Ok(self.tables.read().await.articles.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let t = self.tables.read().await;
        Ok(t.articles.values().find(|a| a.slug == slug).cloned())
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let t = self.tables.read().await;
        Ok(t.articles.values().any(|a| a.slug == slug))
    }

    async fn update(&self, article: &Article) -> Result<Article> {
        let mut t = self.tables.write().await;
        if t
            .articles
            .values()
            .any(|a| a.id != article.id && a.slug == article.slug)
        {
            bail!("UNIQUE constraint failed: articles.slug");
        }
        let Some(stored) = t.articles.get_mut(&article.id) else {
            bail!("Article not found");
        };
        stored.slug = article.slug.clone();
        stored.title = article.title.clone();
        stored.description = article.description.clone();
        stored.body = article.body.clone();
        stored.body_html = article.body_html.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.tables.write().await.remove_article(id);
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.read().await.articles.len() as i64)
    }

    async fn list_views(
        &self,
        query: &ArticleQuery,
        viewer: Option<i64>,
    ) -> Result<(Vec<ArticleView>, i64)> {
        let t = self.tables.read().await;
        let search = query.search_term();
        let mut matching: Vec<&Article> = t
            .articles
            .values()
            .filter(|a| t.matches(a, query, search.as_deref()))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as i64;
        let views = window(matching, query.offset, query.limit)
            .into_iter()
            .filter_map(|a| t.article_view(a, viewer))
            .collect();
        Ok((views, total))
    }

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<ArticleView>> {
        let t = self.tables.read().await;
        Ok(t.articles.get(&id).and_then(|a| t.article_view(a, viewer)))
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn create(&self, tag: &Tag) -> Result<Tag> {
        let mut t = self.tables.write().await;
        if t.tags.values().any(|x| x.slug == tag.slug) {
            bail!("UNIQUE constraint failed: tags.slug");
        }
        if t.tags.values().any(|x| x.name == tag.name) {
            bail!("UNIQUE constraint failed: tags.name");
        }
        let created = Tag {
            id: next_id(&mut t.last_tag_id),
            created_at: Utc::now(),
            ..tag.clone()
        };
        t.tags.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Tag>> {
        Ok(self.tables.read().await.tags.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let t = self.tables.read().await;
        Ok(t.tags.values().find(|x| x.slug == slug).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let t = self.tables.read().await;
        Ok(t
            .tags
            .values()
            .filter(|x| x.name.eq_ignore_ascii_case(name))
            .min_by_key(|x| x.id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let t = self.tables.read().await;
        let mut tags: Vec<Tag> = t.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn get_with_counts(&self, limit: usize) -> Result<Vec<TagWithCount>> {
        let t = self.tables.read().await;
        let mut counted: Vec<TagWithCount> = t
            .tags
            .values()
            .map(|tag| {
                let count = t.article_tags.iter().filter(|(_, id)| *id == tag.id).count();
                TagWithCount::new(tag.clone(), count as i64)
            })
            .collect();
        counted.sort_by(|a, b| {
            b.article_count
                .cmp(&a.article_count)
                .then_with(|| a.tag.name.cmp(&b.tag.name))
        });
        counted.truncate(limit);
        Ok(counted)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut t = self.tables.write().await;
        t.tags.remove(&id);
        t.article_tags.retain(|(_, tag_id)| *tag_id != id);
        Ok(())
    }

    async fn add_to_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.tags.contains_key(&tag_id) || !t.articles.contains_key(&article_id) {
            bail!("FOREIGN KEY constraint failed");
        }
        t.article_tags.insert((article_id, tag_id));
        Ok(())
    }

    async fn remove_from_article(&self, tag_id: i64, article_id: i64) -> Result<()> {
        self.tables
            .write()
            .await
            .article_tags
            .remove(&(article_id, tag_id));
        Ok(())
    }

    async fn clear_article(&self, article_id: i64) -> Result<()> {
        self.tables
            .write()
            .await
            .article_tags
            .retain(|(a, _)| *a != article_id);
        Ok(())
    }

    async fn get_by_article_id(&self, article_id: i64) -> Result<Vec<Tag>> {
        let t = self.tables.read().await;
        let mut tags: Vec<Tag> = t
            .article_tags
            .iter()
            .filter(|(a, _)| *a == article_id)
            .filter_map(|(_, tag_id)| t.tags.get(tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn delete_unused(&self) -> Result<u64> {
        let mut t = self.tables.write().await;
        let used: BTreeSet<i64> = t.article_tags.iter().map(|(_, tag_id)| *tag_id).collect();
        let before = t.tags.len();
        t.tags.retain(|id, _| used.contains(id));
        Ok((before - t.tags.len()) as u64)
    }
}

// ============================================================================
// Comments, marks and follows
// ============================================================================

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let mut t = self.tables.write().await;
        t.check_article_ref(comment.author_id, comment.article_id)?;
        let now = Utc::now();
        let created = Comment {
            id: next_id(&mut t.last_comment_id),
            created_at: now,
            updated_at: now,
            ..comment.clone()
        };
        t.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn update(&self, id: i64, body: &str) -> Result<Option<Comment>> {
        let mut t = self.tables.write().await;
        Ok(t.comments.get_mut(&id).map(|c| {
            c.body = body.to_string();
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }

    async fn list_views_by_article(
        &self,
        article_id: i64,
        viewer: Option<i64>,
    ) -> Result<Vec<CommentView>> {
        let t = self.tables.read().await;
        let mut comments: Vec<&Comment> = t
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments
            .into_iter()
            .filter_map(|c| t.comment_view(c, viewer))
            .collect())
    }

    async fn get_view(&self, id: i64, viewer: Option<i64>) -> Result<Option<CommentView>> {
        let t = self.tables.read().await;
        Ok(t.comments.get(&id).and_then(|c| t.comment_view(c, viewer)))
    }

    async fn count_by_article(&self, article_id: i64) -> Result<i64> {
        let t = self.tables.read().await;
        Ok(t.comments
            .values()
            .filter(|c| c.article_id == article_id)
            .count() as i64)
    }
}

/// Likes or bookmarks view of a shared [`MemoryStore`]
pub struct MemoryMarks {
    store: Arc<MemoryStore>,
    kind: MarkKind,
}

impl MemoryMarks {
    pub fn new(store: Arc<MemoryStore>, kind: MarkKind) -> Self {
        Self { store, kind }
    }
}

#[async_trait]
impl MarkRepository for MemoryMarks {
    fn kind(&self) -> MarkKind {
        self.kind
    }

    async fn add(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let mut t = self.store.tables.write().await;
        t.check_article_ref(user_id, article_id)?;
        let marks = t.marks_mut(self.kind);
        if marks.contains_key(&(user_id, article_id)) {
            return Ok(false);
        }
        marks.insert((user_id, article_id), Utc::now());
        Ok(true)
    }

    async fn remove(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let mut t = self.store.tables.write().await;
        Ok(t.marks_mut(self.kind).remove(&(user_id, article_id)).is_some())
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let t = self.store.tables.read().await;
        Ok(t.marks(self.kind).contains_key(&(user_id, article_id)))
    }

    async fn count_by_article(&self, article_id: i64) -> Result<i64> {
        let t = self.store.tables.read().await;
        Ok(t.mark_count(self.kind, article_id))
    }
}

impl MemoryStore {
    async fn list_edge(
        &self,
        user_id: i64,
        incoming: bool,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        let t = self.tables.read().await;
        let mut edges: Vec<(DateTime<Utc>, i64)> = t
            .follows
            .iter()
            .filter_map(|(&(from, to), &at)| match incoming {
                true if to == user_id => Some((at, from)),
                false if from == user_id => Some((at, to)),
                _ => None,
            })
            .collect();
        edges.sort_by(|a, b| b.cmp(a));
        let total = edges.len() as i64;
        let users = window(edges, offset, limit)
            .into_iter()
            .filter_map(|(_, id)| t.users.get(&id).cloned())
            .collect();
        Ok((users, total))
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let mut t = self.tables.write().await;
        if follower_id == followee_id {
            bail!("CHECK constraint failed: follower_id <> followee_id");
        }
        if !t.users.contains_key(&follower_id) || !t.users.contains_key(&followee_id) {
            bail!("FOREIGN KEY constraint failed");
        }
        if t.follows.contains_key(&(follower_id, followee_id)) {
            return Ok(false);
        }
        t.follows.insert((follower_id, followee_id), Utc::now());
        Ok(true)
    }

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let mut t = self.tables.write().await;
        Ok(t.follows.remove(&(follower_id, followee_id)).is_some())
    }

    async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let t = self.tables.read().await;
        Ok(t.follows.contains_key(&(follower_id, followee_id)))
    }

    async fn stats(&self, user_id: i64, viewer: Option<i64>) -> Result<FollowStats> {
        Ok(self.tables.read().await.follow_stats(user_id, viewer))
    }

    async fn list_followers(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        self.list_edge(user_id, true, offset, limit).await
    }

    async fn list_following(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64)> {
        self.list_edge(user_id, false, offset, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repositories;
    use crate::models::UserRole;
    use chrono::Duration;

    async fn user(repos: &Repositories, name: &str) -> User {
        repos
            .users
            .create(&User::new(
                name.to_string(),
                format!("{}@example.com", name),
                "hash".to_string(),
                UserRole::Author,
            ))
            .await
            .unwrap()
    }

    async fn article(repos: &Repositories, author: i64, slug: &str, title: &str) -> Article {
        repos
            .articles
            .create(&Article::new(
                slug.to_string(),
                title.to_string(),
                String::new(),
                "body".to_string(),
                "<p>body</p>".to_string(),
                author,
            ))
            .await
            .unwrap()
    }

    async fn tag(repos: &Repositories, article_id: i64, name: &str) {
        let tag = match repos.tags.get_by_name(name).await.unwrap() {
            Some(tag) => tag,
            None => repos
                .tags
                .create(&Tag::new(name.to_string(), name.to_string()))
                .await
                .unwrap(),
        };
        repos.tags.add_to_article(tag.id, article_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let repos = Repositories::memory();
        let ann = user(&repos, "ann").await;
        assert_eq!(ann.id, 1);

        let dup = User::new(
            "ann".to_string(),
            "other@example.com".to_string(),
            "h".to_string(),
            UserRole::Author,
        );
        assert!(repos.users.create(&dup).await.is_err());

        let ben = user(&repos, "ben").await;
        let renamed = User {
            email: ann.email.clone(),
            ..ben.clone()
        };
        assert!(repos.users.update(&renamed).await.is_err());
        assert_eq!(repos.users.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_article_view_aggregation() {
        let repos = Repositories::memory();
        let author = user(&repos, "author").await;
        let reader = user(&repos, "reader").await;
        let post = article(&repos, author.id, "post", "Post").await;
        tag(&repos, post.id, "zeta").await;
        tag(&repos, post.id, "alpha").await;

        assert!(repos.likes.add(reader.id, post.id).await.unwrap());
        assert!(!repos.likes.add(reader.id, post.id).await.unwrap());
        repos.bookmarks.add(reader.id, post.id).await.unwrap();
        repos.follows.follow(reader.id, author.id).await.unwrap();
        repos
            .comments
            .create(&Comment::new(post.id, reader.id, "hi".to_string()))
            .await
            .unwrap();

        let view = repos
            .articles
            .get_view(post.id, Some(reader.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.tags, vec!["alpha", "zeta"]);
        assert_eq!((view.like_count, view.bookmark_count, view.comment_count), (1, 1, 1));
        assert!(view.liked && view.bookmarked && view.author.following);

        let anonymous = repos.articles.get_view(post.id, None).await.unwrap().unwrap();
        assert!(!anonymous.liked && !anonymous.bookmarked && !anonymous.author.following);
    }

    #[tokio::test]
    async fn test_list_views_filters_and_paging() {
        let repos = Repositories::memory();
        let alice = user(&repos, "alice").await;
        let bob = user(&repos, "bob").await;
        let carol = user(&repos, "carol").await;

        let dragons = article(&repos, alice.id, "dragons", "Training Dragons").await;
        let rust = article(&repos, bob.id, "rust", "Rust ownership").await;
        tag(&repos, dragons.id, "fantasy").await;
        repos.likes.add(carol.id, rust.id).await.unwrap();
        repos.bookmarks.add(carol.id, dragons.id).await.unwrap();
        repos.follows.follow(carol.id, bob.id).await.unwrap();

        let slugs = |views: Vec<ArticleView>| views.into_iter().map(|v| v.slug).collect::<Vec<_>>();
        let q = || ArticleQuery {
            limit: 10,
            ..Default::default()
        };

        let (all, total) = repos.articles.list_views(&q(), None).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(slugs(all), vec!["rust", "dragons"]);

        let cases = [
            (q().with_tag("fantasy"), vec!["dragons"]),
            (q().with_author("bob"), vec!["rust"]),
            (q().with_liked_by("carol"), vec!["rust"]),
            (q().with_bookmarked_by(carol.id), vec!["dragons"]),
            (q().with_feed_of(carol.id), vec!["rust"]),
            (q().with_search("  dragons "), vec!["dragons"]),
            (q().with_tag("unknown"), vec![]),
            (q().with_liked_by("nobody"), vec![]),
        ];
        for (query, expected) in cases {
            let (views, total) = repos.articles.list_views(&query, None).await.unwrap();
            assert_eq!(total as usize, expected.len());
            assert_eq!(slugs(views), expected);
        }

        let (page, total) = repos
            .articles
            .list_views(&ArticleQuery { offset: 1, limit: 1, ..Default::default() }, None)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(slugs(page), vec!["dragons"]);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let repos = Repositories::memory();
        let author = user(&repos, "author").await;
        let reader = user(&repos, "reader").await;
        let post = article(&repos, author.id, "post", "Post").await;
        let other = article(&repos, reader.id, "other", "Other").await;
        repos.likes.add(author.id, other.id).await.unwrap();
        repos.follows.follow(reader.id, author.id).await.unwrap();
        repos
            .comments
            .create(&Comment::new(other.id, author.id, "mine".to_string()))
            .await
            .unwrap();
        repos
            .sessions
            .create(&Session::issue(author.id, Duration::days(1)))
            .await
            .unwrap();

        repos.users.delete(author.id).await.unwrap();

        assert!(repos.articles.get_by_id(post.id).await.unwrap().is_none());
        assert_eq!(repos.likes.count_by_article(other.id).await.unwrap(), 0);
        assert_eq!(repos.comments.count_by_article(other.id).await.unwrap(), 0);
        assert_eq!(repos.follows.stats(reader.id, None).await.unwrap().following_count, 0);
    }

    #[tokio::test]
    async fn test_follow_rules() {
        let repos = Repositories::memory();
        let ann = user(&repos, "ann").await;
        let ben = user(&repos, "ben").await;

        assert!(repos.follows.follow(ann.id, ann.id).await.is_err());
        assert!(repos.follows.follow(ann.id, 99).await.is_err());
        assert!(repos.follows.follow(ann.id, ben.id).await.unwrap());
        assert!(!repos.follows.follow(ann.id, ben.id).await.unwrap());

        let (followers, total) = repos.follows.list_followers(ben.id, 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(followers[0].username, "ann");

        assert!(repos.follows.unfollow(ann.id, ben.id).await.unwrap());
        assert!(!repos.follows.is_following(ann.id, ben.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_tags_unused_are_pruned() {
        let repos = Repositories::memory();
        let author = user(&repos, "author").await;
        let post = article(&repos, author.id, "post", "Post").await;
        tag(&repos, post.id, "kept").await;
        repos
            .tags
            .create(&Tag::new("orphan".to_string(), "orphan".to_string()))
            .await
            .unwrap();

        assert_eq!(repos.tags.delete_unused().await.unwrap(), 1);
        let counts = repos.tags.get_with_counts(10).await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].article_count, 1);

        repos.articles.delete(post.id).await.unwrap();
        assert_eq!(repos.tags.delete_unused().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_likes_count_once_each() {
        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::from_store(store);
        let author = user(&repos, "author").await;
        let post = article(&repos, author.id, "post", "Post").await;
        let mut readers = Vec::new();
        for i in 0..8 {
            readers.push(user(&repos, &format!("reader{}", i)).await.id);
        }

        let post_id = post.id;
        let mut handles = Vec::new();
        for reader in readers.iter().copied() {
            for _ in 0..3 {
                let likes = repos.likes.clone();
                handles.push(tokio::spawn(async move { likes.add(reader, post_id).await }));
            }
        }
        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, readers.len());
        assert_eq!(repos.likes.count_by_article(post.id).await.unwrap(), 8);
    }
}
