//! Side panels next to the chat
//!
//! The side panel shows the research topic, the current recommendations and
//! the participant's bookmarks. The preferences panel lists the topics the
//! agent believes the participant cares about. Neither panel knows the chat
//! session; the only cross-talk is the explain callback on the busy bus.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::activity::ActivityLogger;
use crate::busy::BusyBus;
use crate::channel::ChannelHandle;
use crate::error::{AdaError, Result};
use crate::types::events::OutboundEvent;
use crate::types::identifiers::ArticleId;
use crate::types::messages::Article;

/// Tab of the side panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PanelTab {
    /// Description of the task topic
    #[default]
    ResearchTopic,
    /// Current recommendations
    Recommendations,
    /// Bookmarked articles
    Bookmarks,
}

impl PanelTab {
    /// Name used in activity records
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResearchTopic => "RT",
            Self::Recommendations => "recommendation",
            Self::Bookmarks => "bookmarks",
        }
    }
}

impl fmt::Display for PanelTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct SideState {
    recommendations: Vec<Article>,
    bookmarks: Vec<Article>,
    expanded: HashSet<ArticleId>,
    active_tab: PanelTab,
}

impl SideState {
    fn is_bookmarked(&self, id: &ArticleId) -> bool {
        self.bookmarks.iter().any(|article| &article.id == id)
    }

    fn recommendation(&self, id: &ArticleId) -> Option<&Article> {
        self.recommendations.iter().find(|article| &article.id == id)
    }
}

/// Recommendations and bookmarks
#[derive(Clone)]
pub struct SidePanel {
    state: Arc<Mutex<SideState>>,
    bus: BusyBus,
    handle: ChannelHandle,
    activity: ActivityLogger,
}

impl SidePanel {
    /// Create an empty panel
    pub fn new(bus: BusyBus, handle: ChannelHandle, activity: ActivityLogger) -> Self {
        Self {
            state: Arc::new(Mutex::new(SideState::default())),
            bus,
            handle,
            activity,
        }
    }

    /// Replace the recommendations and bring their tab to the front
    pub fn handle_recommendations(&self, articles: &[Article]) {
        {
            let mut state = self.state.lock();
            state.recommendations = articles.to_vec();
            state.expanded.clear();
        }
        self.select_tab(PanelTab::Recommendations);
    }

    /// Replace the bookmarks with the agent's list
    pub fn handle_bookmarks(&self, articles: &[Article]) {
        let mut unique: Vec<Article> = Vec::with_capacity(articles.len());
        for article in articles {
            if !unique.iter().any(|kept| kept.id == article.id) {
                unique.push(article.clone());
            }
        }
        self.state.lock().bookmarks = unique;
    }

    /// Switch tab
    pub fn select_tab(&self, tab: PanelTab) {
        self.activity
            .log_event("Tab change", Some(json!({ "tab": tab.as_str() })));
        self.state.lock().active_tab = tab;
    }

    /// Ask the agent for the bookmark list
    pub fn request_bookmarks(&self) {
        self.handle.emit(OutboundEvent::GetBookmarks);
    }

    /// Bookmark a recommended article
    ///
    /// Returns `Ok(false)` if the article is already bookmarked.
    ///
    /// # Errors
    /// Returns `AdaError::ArticleNotFound` if the article is not among the
    /// current recommendations
    pub fn add_bookmark(&self, id: &ArticleId) -> Result<bool> {
        let article = {
            let state = self.state.lock();
            if state.is_bookmarked(id) {
                return Ok(false);
            }
            state.recommendation(id).cloned()
        };

        let Some(article) = article else {
            self.activity.log_event(
                "Error",
                Some(json!({ "article_id": id, "error": "Article not found" })),
            );
            return Err(AdaError::article_not_found(id.as_str()));
        };

        self.activity
            .log_event("Bookmark article", Some(json!({ "article_id": id })));
        self.handle.emit(OutboundEvent::AddBookmark {
            item_id: id.clone(),
        });
        self.state.lock().bookmarks.push(article);
        Ok(true)
    }

    /// Remove a bookmark
    ///
    /// Returns `false` if the article was not bookmarked.
    pub fn remove_bookmark(&self, id: &ArticleId) -> bool {
        if !self.state.lock().is_bookmarked(id) {
            return false;
        }

        self.activity.log_event(
            "Remove bookmarked article",
            Some(json!({ "article_id": id })),
        );
        self.handle.emit(OutboundEvent::RemoveBookmark {
            item_id: id.clone(),
        });
        self.state
            .lock()
            .bookmarks
            .retain(|article| &article.id != id);
        true
    }

    /// Add or remove a bookmark; returns whether the article ends up bookmarked
    ///
    /// # Errors
    /// Returns `AdaError::ArticleNotFound` when adding an article that is not
    /// recommended
    pub fn toggle_bookmark(&self, id: &ArticleId) -> Result<bool> {
        if self.is_bookmarked(id) {
            self.remove_bookmark(id);
            Ok(false)
        } else {
            self.add_bookmark(id).map(|_| true)
        }
    }

    /// Ask the agent why an article was recommended
    ///
    /// The explain callback echoes the request into the chat before
    /// `get_explanation` is emitted.
    ///
    /// # Errors
    /// Returns `AdaError::ArticleNotFound` for an article that is not
    /// recommended, `AdaError::Busy` while the agent is replying and
    /// `AdaError::NoExplainHandler` when no chat is attached
    pub fn request_explanation(&self, id: &ArticleId) -> Result<()> {
        let article = self
            .state
            .lock()
            .recommendation(id)
            .cloned()
            .ok_or_else(|| AdaError::article_not_found(id.as_str()))?;

        self.activity.log_event(
            "Get recommendation explanation",
            Some(json!({ "article_title": article.title, "article_id": article.id })),
        );
        self.bus.invoke_explain(&article)?;
        self.handle.emit(OutboundEvent::GetExplanation {
            item_id: article.id,
        });
        Ok(())
    }

    /// Expand or collapse an article summary; returns whether it is expanded
    pub fn toggle_summary(&self, id: &ArticleId) -> bool {
        let expanded = {
            let mut state = self.state.lock();
            if state.expanded.remove(id) {
                false
            } else {
                state.expanded.insert(id.clone());
                true
            }
        };
        let event = if expanded {
            "Expand summary"
        } else {
            "Collapse summary"
        };
        self.activity
            .log_event(event, Some(json!({ "article_id": id })));
        expanded
    }

    /// Current recommendations
    #[must_use]
    pub fn recommendations(&self) -> Vec<Article> {
        self.state.lock().recommendations.clone()
    }

    /// Bookmarks in the order they were added
    #[must_use]
    pub fn bookmarks(&self) -> Vec<Article> {
        self.state.lock().bookmarks.clone()
    }

    /// Whether an article is bookmarked
    #[must_use]
    pub fn is_bookmarked(&self, id: &ArticleId) -> bool {
        self.state.lock().is_bookmarked(id)
    }

    /// Tab in front
    #[must_use]
    pub fn active_tab(&self) -> PanelTab {
        self.state.lock().active_tab
    }

    /// Forget everything, e.g. when a new task starts
    pub fn reset(&self) {
        *self.state.lock() = SideState::default();
    }
}

/// Preference topics
#[derive(Clone)]
pub struct PreferencesPanel {
    topics: Arc<Mutex<Vec<String>>>,
    handle: ChannelHandle,
}

impl PreferencesPanel {
    /// Create an empty panel
    #[must_use]
    pub fn new(handle: ChannelHandle) -> Self {
        Self {
            topics: Arc::new(Mutex::new(Vec::new())),
            handle,
        }
    }

    /// Replace the topics with the agent's list
    pub fn handle_preferences(&self, topics: &[String]) {
        *self.topics.lock() = topics.to_vec();
    }

    /// Ask the agent for the preference list
    pub fn request_preferences(&self) {
        self.handle.emit(OutboundEvent::GetPreferences);
    }

    /// Drop a topic here and on the agent
    pub fn remove_preference(&self, topic: &str) {
        self.topics.lock().retain(|t| t != topic);
        self.handle.emit(OutboundEvent::RemovePreference {
            topic: topic.to_string(),
        });
    }

    /// Current topics
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().clone()
    }
}
