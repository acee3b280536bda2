//! Headline sentiment backends and keyword scoring
//!
//! Chain: NewsAPI (credentialed) → Reddit hot listings → neutral fallback.
//! Both backends gather headlines and hand them to `score_headlines`.
//!
//! ## Scoring
//!
//! Each keyword counts at most once per headline, matched as a lowercase
//! substring. With `p` positive and `n` negative hits the score is
//! `(p - n) / max(p + n, 1)`, labelled positive above 0.3 and negative below -0.3.

use super::{send_json, Backend, FetchError, HttpSession, SourceAdapter, USER_AGENT};
use crate::records::{SentimentLabel, SentimentRecord};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
const REDDIT_URL: &str = "https://www.reddit.com/r";
const REDDIT_USER_AGENT: &str = "Terminal-V/1.0";

const NEWSAPI_TIMEOUT: Duration = Duration::from_secs(10);
const REDDIT_TIMEOUT: Duration = Duration::from_secs(10);

const NEWSAPI_PAGE_SIZE: usize = 10;
const REDDIT_SUBREDDITS: [&str; 2] = ["CryptoCurrency", "investing"];
const REDDIT_POSTS_PER_SUBREDDIT: usize = 5;
const REDDIT_MIN_TITLE_LEN: usize = 20;

const MAX_KEYWORDS: usize = 10;

const POSITIVE_KEYWORDS: [&str; 10] = [
    "up", "rise", "gain", "bullish", "growth", "surge", "rally", "positive", "strong", "beat",
];
const NEGATIVE_KEYWORDS: [&str; 10] = [
    "down", "fall", "drop", "bearish", "decline", "crash", "loss", "negative", "weak", "miss",
];

/// Positive and negative keyword sets used for scoring
#[derive(Debug, Clone)]
pub struct SentimentKeywords {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for SentimentKeywords {
    fn default() -> Self {
        Self {
            positive: POSITIVE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            negative: NEGATIVE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Result of one scoring pass
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub score: f64,
    pub label: SentimentLabel,
    pub positive_hits: usize,
    pub negative_hits: usize,
    /// Matched keywords, deduplicated in first-seen order, at most 10
    pub keywords: Vec<String>,
}

pub fn score_headlines(headlines: &[String], keywords: &SentimentKeywords) -> SentimentScore {
    let mut positive_hits = 0usize;
    let mut negative_hits = 0usize;
    let mut matched: Vec<String> = Vec::new();

    for headline in headlines {
        let lower = headline.to_lowercase();

        for keyword in &keywords.positive {
            if lower.contains(keyword.as_str()) {
                positive_hits += 1;
                push_unique(&mut matched, keyword);
            }
        }
        for keyword in &keywords.negative {
            if lower.contains(keyword.as_str()) {
                negative_hits += 1;
                push_unique(&mut matched, keyword);
            }
        }
    }

    matched.truncate(MAX_KEYWORDS);

    let total = positive_hits + negative_hits;
    let score = if total == 0 {
        0.0
    } else {
        (positive_hits as f64 - negative_hits as f64) / total.max(1) as f64
    };

    SentimentScore {
        score,
        label: SentimentLabel::from_score(score),
        positive_hits,
        negative_hits,
        keywords: matched,
    }
}

fn push_unique(matched: &mut Vec<String>, keyword: &str) {
    if !matched.iter().any(|k| k == keyword) {
        matched.push(keyword.to_string());
    }
}

/// Score gathered headlines into a record; no headlines is a miss
pub(crate) fn record_from_headlines(headlines: Vec<String>) -> Result<SentimentRecord, FetchError> {
    if headlines.is_empty() {
        return Err(FetchError::Empty);
    }

    let scored = score_headlines(&headlines, &SentimentKeywords::default());

    Ok(SentimentRecord {
        sentiment_score: scored.score,
        sentiment_label: scored.label,
        article_count: headlines.len() as u32,
        keywords: scored.keywords,
        timestamp: Utc::now(),
    })
}

pub fn adapter(newsapi_key: Option<String>) -> SourceAdapter<SentimentRecord> {
    let session = HttpSession::with_user_agent("sentiment", USER_AGENT);
    let forum_session = HttpSession::with_user_agent("sentiment", REDDIT_USER_AGENT);

    SourceAdapter::new(vec![
        Box::new(NewsApiBackend::new(session.clone(), newsapi_key)),
        Box::new(RedditBackend::new(forum_session)),
    ])
    .with_session(session)
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsArticle {
    title: Option<String>,
}

pub(crate) fn newsapi_headlines(response: NewsApiResponse) -> Result<Vec<String>, FetchError> {
    if response.status != "ok" {
        return Err(FetchError::Malformed(format!("status '{}'", response.status)));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|article| article.title)
        .filter(|title| !title.trim().is_empty())
        .take(NEWSAPI_PAGE_SIZE)
        .collect())
}

pub struct NewsApiBackend {
    session: HttpSession,
    api_key: Option<String>,
}

impl NewsApiBackend {
    pub fn new(session: HttpSession, api_key: Option<String>) -> Self {
        Self { session, api_key }
    }
}

#[async_trait]
impl Backend<SentimentRecord> for NewsApiBackend {
    fn name(&self) -> &str {
        "newsapi"
    }

    fn timeout(&self) -> Duration {
        NEWSAPI_TIMEOUT
    }

    async fn fetch(&self, query: &str) -> Result<SentimentRecord, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("NEWSAPI_KEY not set".to_string()))?;

        let request = newsapi_request(&self.session.client()?, query, api_key);
        let response: NewsApiResponse = send_json(request).await?;
        record_from_headlines(newsapi_headlines(response)?)
    }
}

/// The key travels in a header so it never appears in the request URL
pub(crate) fn newsapi_request(
    client: &reqwest::Client,
    query: &str,
    api_key: &str,
) -> reqwest::RequestBuilder {
    let page_size = NEWSAPI_PAGE_SIZE.to_string();
    client
        .get(NEWSAPI_URL)
        .header("X-Api-Key", api_key)
        .query(&[
            ("q", query),
            ("sortBy", "publishedAt"),
            ("pageSize", page_size.as_str()),
            ("language", "en"),
        ])
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    #[serde(default)]
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: String,
}

pub(crate) fn reddit_headlines(listing: RedditListing) -> Vec<String> {
    listing
        .data
        .children
        .into_iter()
        .take(REDDIT_POSTS_PER_SUBREDDIT)
        .map(|child| child.data.title)
        .filter(|title| title.chars().count() > REDDIT_MIN_TITLE_LEN)
        .collect()
}

/// Public forum headlines; the query is not used, the listings are fixed
pub struct RedditBackend {
    session: HttpSession,
}

impl RedditBackend {
    pub fn new(session: HttpSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Backend<SentimentRecord> for RedditBackend {
    fn name(&self) -> &str {
        "reddit"
    }

    fn timeout(&self) -> Duration {
        REDDIT_TIMEOUT
    }

    async fn fetch(&self, _query: &str) -> Result<SentimentRecord, FetchError> {
        let client = self.session.client()?;
        let mut headlines = Vec::new();

        for subreddit in REDDIT_SUBREDDITS {
            let url = format!("{}/{}/hot.json", REDDIT_URL, subreddit);
            let limit = REDDIT_POSTS_PER_SUBREDDIT.to_string();
            let request = client.get(&url).query(&[("limit", limit.as_str())]);

            match send_json::<RedditListing>(request).await {
                Ok(listing) => headlines.extend(reddit_headlines(listing)),
                Err(e) => log::debug!("r/{} skipped: {}", subreddit, e),
            }
        }

        record_from_headlines(headlines)
    }

    async fn close(&self) -> Result<(), FetchError> {
        self.session.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headlines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_newsapi_key_stays_out_of_url() {
        let request = newsapi_request(&reqwest::Client::new(), "bitcoin", "SECRET-KEY-123")
            .build()
            .unwrap();

        assert!(!request.url().as_str().contains("SECRET-KEY-123"));
        assert_eq!(request.headers()["X-Api-Key"], "SECRET-KEY-123");
        assert!(request.url().query().unwrap().contains("q=bitcoin"));
    }

    #[test]
    fn test_positive_headlines() {
        let scored = score_headlines(
            &headlines(&["Bitcoin surges to new highs", "Market rally continues"]),
            &SentimentKeywords::default(),
        );

        assert_eq!(scored.score, 1.0);
        assert_eq!(scored.label, SentimentLabel::Positive);
        assert!(scored.keywords.contains(&"surge".to_string()));
        assert!(scored.keywords.contains(&"rally".to_string()));
    }

    #[test]
    fn test_negative_headlines() {
        let scored = score_headlines(
            &headlines(&["Stocks crash amid weak earnings", "Bearish outlook drops further"]),
            &SentimentKeywords::default(),
        );

        assert_eq!(scored.positive_hits, 0);
        assert_eq!(scored.negative_hits, 4);
        assert_eq!(scored.score, -1.0);
        assert_eq!(scored.label, SentimentLabel::Negative);
        assert_eq!(scored.keywords, vec!["crash", "weak", "drop", "bearish"]);
    }

    #[test]
    fn test_no_headlines_is_neutral() {
        let scored = score_headlines(&[], &SentimentKeywords::default());
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.label, SentimentLabel::Neutral);
        assert!(scored.keywords.is_empty());

        assert!(matches!(record_from_headlines(Vec::new()), Err(FetchError::Empty)));
    }

    #[test]
    fn test_keyword_counted_once_per_headline() {
        let scored = score_headlines(
            &headlines(&["Gain after gain after gain", "Another gain"]),
            &SentimentKeywords::default(),
        );
        assert_eq!(scored.positive_hits, 2);
        assert_eq!(scored.keywords, vec!["gain"]);
    }

    #[test]
    fn test_mixed_headline_counts_both_sets() {
        let scored = score_headlines(
            &headlines(&["Strong open then sharp decline"]),
            &SentimentKeywords::default(),
        );
        assert_eq!(scored.positive_hits, 1);
        assert_eq!(scored.negative_hits, 1);
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_keywords_capped_at_ten() {
        let all = POSITIVE_KEYWORDS.join(" ") + " " + &NEGATIVE_KEYWORDS.join(" ");
        let scored = score_headlines(&[all], &SentimentKeywords::default());
        assert_eq!(scored.keywords.len(), 10);
        assert_eq!(scored.positive_hits, 10);
    }

    #[test]
    fn test_record_counts_articles() {
        let record = record_from_headlines(headlines(&["Quiet session", "Bullish momentum"])).unwrap();
        assert_eq!(record.article_count, 2);
        assert_eq!(record.sentiment_label, SentimentLabel::Positive);
    }

    #[test]
    fn test_newsapi_headlines() {
        let response: NewsApiResponse = serde_json::from_str(
            r#"{"status":"ok","totalResults":3,"articles":[
                {"title":"Bitcoin rally extends"},
                {"title":null},
                {"title":"   "}
            ]}"#,
        )
        .unwrap();
        assert_eq!(newsapi_headlines(response).unwrap(), vec!["Bitcoin rally extends"]);

        let error: NewsApiResponse =
            serde_json::from_str(r#"{"status":"error","code":"apiKeyInvalid"}"#).unwrap();
        assert!(matches!(newsapi_headlines(error), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_reddit_headlines_filter_short_titles() {
        let listing: RedditListing = serde_json::from_str(
            r#"{"data":{"children":[
                {"data":{"title":"short"}},
                {"data":{"title":"Ethereum upgrade lands on mainnet today"}}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(
            reddit_headlines(listing),
            vec!["Ethereum upgrade lands on mainnet today"]
        );
    }

    #[tokio::test]
    async fn test_newsapi_without_key_is_unavailable() {
        let backend = NewsApiBackend::new(HttpSession::new("sentiment"), None);
        assert!(matches!(
            backend.fetch("bitcoin").await,
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Run only when testing with live API
    async fn test_live_reddit() {
        let backend = RedditBackend::new(HttpSession::with_user_agent("sentiment", REDDIT_USER_AGENT));
        let record = backend.fetch("").await.unwrap();
        assert!(record.article_count > 0);
    }
}
