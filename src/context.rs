//! Per-session conversational context
//!
//! Held in memory only. A session loaded without prior context starts from
//! the defaults.

use serde::Serialize;

use crate::models::Recommendation;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    /// Raw text of the last remote query
    pub last_topic: Option<String>,
    pub category: Option<String>,
    pub follow_up: bool,
    pub recommendations: Vec<Recommendation>,
    pub last_response: Option<String>,
}

/// Context block sent with each recommendation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub last_topic: Option<String>,
    pub category: Option<String>,
    pub is_follow_up: bool,
    pub original_query: String,
    pub previous_recommendations: Vec<Recommendation>,
}

impl SessionContext {
    /// Snapshot for an outgoing request
    pub fn request_context(&self, query: &str, is_follow_up: bool) -> RequestContext {
        RequestContext {
            last_topic: self.last_topic.clone(),
            category: self.category.clone(),
            is_follow_up,
            original_query: query.to_lowercase(),
            previous_recommendations: self.recommendations.clone(),
        }
    }

    /// Fold a successful answer into the context
    pub fn record_answer(
        &mut self,
        query: &str,
        response: &str,
        category: Option<String>,
        recommendations: Vec<Recommendation>,
    ) {
        self.last_topic = Some(query.to_string());
        if category.is_some() {
            self.category = category;
        }
        self.follow_up = true;
        self.recommendations = recommendations;
        self.last_response = Some(response.to_string());
    }
}
