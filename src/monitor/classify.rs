//! Topic classification for discovered posts: keyword matching first, an
//! optional LLM pass for posts the keywords don't catch.

use crate::model::core::UserTopic;
use log::{debug, warn};
use openai_api_rs::v1::api::Client;
use openai_api_rs::v1::chat_completion::{self, ChatCompletionRequest};
use openai_api_rs::v1::common::GPT3_5_TURBO;

/// Classify a post against the owner's topics by keyword matching.
///
/// Topics are checked in creation order and the first topic with a keyword
/// hit wins. Matching is case-insensitive over title + summary. Topics
/// without keywords never match.
pub fn classify_by_keywords(
    topics: &[UserTopic],
    title: &str,
    summary: Option<&str>,
) -> Option<String> {
    let haystack = format!("{} {}", title, summary.unwrap_or("")).to_lowercase();

    for topic in topics {
        for keyword in topic.keyword_list() {
            if haystack.contains(&keyword) {
                debug!(
                    "Post '{}' matched topic '{}' on keyword '{}'",
                    title, topic.name, keyword
                );
                return Some(topic.name.clone());
            }
        }
    }

    None
}

pub struct ChatBot {
    model_name: String,
    client: Client,
}

impl ChatBot {
    /// Build a chatbot from the environment, or None when no key is set.
    pub fn from_env() -> Option<Self> {
        let openai_api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => return None,
        };

        let client = Client::new(openai_api_key);

        Some(ChatBot {
            model_name: GPT3_5_TURBO.to_string(),
            client: client,
        })
    }

    pub fn answer(&self, prompt: String) -> Result<String, anyhow::Error> {
        let model_name = self.model_name.clone();
        let req = ChatCompletionRequest::new(
            model_name,
            vec![chat_completion::ChatCompletionMessage {
                role: chat_completion::MessageRole::user,
                content: chat_completion::Content::Text(prompt),
                name: None,
            }],
        );

        let req = req.temperature(0.0);
        let result = self.client.chat_completion(req)?;
        let message = result.choices[0].message.content.clone();

        match message {
            Some(message) => Ok(message),
            None => Err(anyhow::anyhow!("No message returned")),
        }
    }
}

fn render_prompt(topics: &[UserTopic], title: &str, summary: Option<&str>) -> String {
    let topic_names = topics
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<&str>>()
        .join(", ");

    format!(
        "You are labeling blog posts for a personal knowledge base.\n\
         Available topics: {}.\n\
         Post title: {}\n\
         Post summary: {}\n\
         Reply with exactly one topic name from the list, or `none` if no topic fits. Do not explain.",
        topic_names,
        title,
        summary.unwrap_or("(no summary)")
    )
}

/// Keep only answers naming one of the user's topics; anything else, `none`
/// included, means unclassified.
fn match_answer(topics: &[UserTopic], answer: &str) -> Option<String> {
    let answer = answer.trim().trim_matches('`').trim_matches('.');

    topics
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(answer))
        .map(|t| t.name.clone())
}

/// Classify a post, keywords first, then the LLM when one is configured.
///
/// LLM failures degrade to unclassified, they never fail a scan.
pub fn classify_post(
    topics: &[UserTopic],
    chatbot: &Option<ChatBot>,
    title: &str,
    summary: Option<&str>,
) -> Option<String> {
    if topics.is_empty() {
        return None;
    }

    if let Some(topic) = classify_by_keywords(topics, title, summary) {
        return Some(topic);
    }

    let chatbot = match chatbot {
        Some(chatbot) => chatbot,
        None => return None,
    };

    let prompt = render_prompt(topics, title, summary);
    match chatbot.answer(prompt) {
        Ok(answer) => match_answer(topics, &answer),
        Err(e) => {
            warn!("LLM classification failed for '{}': {}", title, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn topic(name: &str, keywords: Option<&str>) -> UserTopic {
        UserTopic {
            id: 0,
            owner: "admin".to_string(),
            name: name.to_string(),
            keywords: keywords.map(|k| k.to_string()),
            color: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_classify_by_keywords_first_match_wins() {
        let topics = vec![
            topic("Rust", Some("rust, borrow checker")),
            topic("Databases", Some("postgres, sqlite")),
        ];

        assert_eq!(
            classify_by_keywords(&topics, "Rust and Postgres", None),
            Some("Rust".to_string())
        );
        assert_eq!(
            classify_by_keywords(&topics, "Tuning Postgres indexes", None),
            Some("Databases".to_string())
        );
    }

    #[test]
    fn test_classify_by_keywords_case_insensitive_over_summary() {
        let topics = vec![topic("Rust", Some("BORROW CHECKER"))];
        assert_eq!(
            classify_by_keywords(
                &topics,
                "A compiler story",
                Some("Fighting the borrow checker again")
            ),
            Some("Rust".to_string())
        );
    }

    #[test]
    fn test_classify_by_keywords_no_keywords_never_match() {
        let topics = vec![topic("Misc", None), topic("Empty", Some(" , ,"))];
        assert_eq!(classify_by_keywords(&topics, "Anything at all", None), None);
    }

    #[test]
    fn test_match_answer() {
        let topics = vec![topic("Rust", None), topic("Databases", None)];

        assert_eq!(match_answer(&topics, " rust "), Some("Rust".to_string()));
        assert_eq!(
            match_answer(&topics, "`Databases`"),
            Some("Databases".to_string())
        );
        assert_eq!(match_answer(&topics, "none"), None);
        assert_eq!(match_answer(&topics, "Machine Learning"), None);
    }

    #[test]
    fn test_render_prompt_lists_topics() {
        let topics = vec![topic("Rust", None), topic("Databases", None)];
        let prompt = render_prompt(&topics, "A post", None);
        assert!(prompt.contains("Rust, Databases"));
        assert!(prompt.contains("(no summary)"));
    }
}
