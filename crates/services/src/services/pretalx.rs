//! Minimal pretalx REST client covering the submission and speaker
//! endpoints the sync needs. Responses are paginated; the client follows the
//! `next` URL until the server stops returning one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use thiserror::Error;

use super::config::PretalxConfig;

const PAGE_LIMIT: u32 = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PretalxError {
    #[error("pretalx request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid pretalx API token")]
    InvalidToken,
    #[error("pretalx API token is not configured")]
    MissingToken,
}

/// pretalx localizes free-text fields per event language; single-language
/// events return plain strings for the same fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MultiLingual {
    Plain(String),
    Localized(HashMap<String, String>),
}

impl MultiLingual {
    /// English text when present, otherwise any available localization.
    pub fn localized(&self) -> &str {
        match self {
            MultiLingual::Plain(text) => text,
            MultiLingual::Localized(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .map_or("", String::as_str),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PretalxQuestionRef {
    pub id: i64,
    pub question: MultiLingual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PretalxAnswer {
    pub answer: String,
    pub question: PretalxQuestionRef,
}

/// Accessors over a submission's or speaker's custom question answers,
/// matched by question text case-insensitively.
pub trait AnswersCollection {
    fn answers(&self) -> &[PretalxAnswer];

    fn get_answer(&self, question: &str) -> Option<&str> {
        let question = question.to_lowercase();
        self.answers()
            .iter()
            .find(|answer| answer.question.question.localized().to_lowercase() == question)
            .map(|answer| answer.answer.as_str())
    }

    /// Look the raw answer up in `mapping`, again case-insensitively. Used
    /// for choice questions whose labels differ from the stored values.
    fn get_mapped_answer<'m>(
        &self,
        question: &str,
        mapping: &'m HashMap<String, String>,
    ) -> Option<&'m str> {
        let raw = self.get_answer(question)?.to_lowercase();
        mapping
            .iter()
            .find(|(key, _)| key.to_lowercase() == raw)
            .map(|(_, value)| value.as_str())
    }
}

/// Compact speaker reference embedded in submission payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct PretalxSpeakerRef {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PretalxSpeaker {
    pub code: String,
    pub name: String,
    pub biography: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub answers: Vec<PretalxAnswer>,
}

impl AnswersCollection for PretalxSpeaker {
    fn answers(&self) -> &[PretalxAnswer] {
        &self.answers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    Submitted,
    Accepted,
    Confirmed,
    Rejected,
    Withdrawn,
    Canceled,
}

impl SubmissionState {
    fn as_query_value(self) -> &'static str {
        match self {
            SubmissionState::Submitted => "submitted",
            SubmissionState::Accepted => "accepted",
            SubmissionState::Confirmed => "confirmed",
            SubmissionState::Rejected => "rejected",
            SubmissionState::Withdrawn => "withdrawn",
            SubmissionState::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PretalxSubmission {
    pub code: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub description: Option<String>,
    pub state: SubmissionState,
    pub submission_type: MultiLingual,
    pub content_locale: Option<String>,
    pub track: Option<MultiLingual>,
    #[serde(default)]
    pub speakers: Vec<PretalxSpeakerRef>,
    #[serde(default)]
    pub answers: Vec<PretalxAnswer>,
}

impl AnswersCollection for PretalxSubmission {
    fn answers(&self) -> &[PretalxAnswer] {
        &self.answers
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    next: Option<String>,
}

/// Seam between the sync and the HTTP layer so reconciliation logic can be
/// exercised against canned payloads.
#[async_trait]
pub trait PretalxApi: Send + Sync {
    async fn list_submissions(
        &self,
        states: &[SubmissionState],
    ) -> Result<Vec<PretalxSubmission>, PretalxError>;

    async fn get_submission(&self, code: &str) -> Result<PretalxSubmission, PretalxError>;

    async fn list_speakers(&self) -> Result<Vec<PretalxSpeaker>, PretalxError>;

    async fn get_speaker(&self, code: &str) -> Result<PretalxSpeaker, PretalxError>;
}

pub struct PretalxClient {
    http: reqwest::Client,
    base_url: String,
    event_slug: String,
}

impl PretalxClient {
    pub fn new(config: &PretalxConfig) -> Result<PretalxClient, PretalxError> {
        if config.token.is_empty() {
            return Err(PretalxError::MissingToken);
        }

        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| PretalxError::InvalidToken)?;
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(PretalxClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            event_slug: config.event_slug.clone(),
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/events/{}/{}/", self.base_url, self.event_slug, resource)
    }

    async fn fetch_one<T>(&self, url: &str) -> Result<T, PretalxError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(url)
            .query(&[("questions", "all")])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Fetch every page of a list endpoint, following `next` links verbatim
    /// as the server hands them out.
    async fn fetch_all<T>(
        &self,
        url: &str,
        extra_query: &[(&str, String)],
    ) -> Result<Vec<T>, PretalxError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut results = Vec::new();

        let first = self
            .http
            .get(url)
            .query(&[
                ("limit", PAGE_LIMIT.to_string()),
                ("questions", "all".to_string()),
            ])
            .query(extra_query)
            .send()
            .await?
            .error_for_status()?;
        let mut page: Page<T> = first.json().await?;
        results.append(&mut page.results);

        while let Some(next) = page.next {
            let response = self.http.get(&next).send().await?.error_for_status()?;
            page = response.json().await?;
            results.append(&mut page.results);
        }

        Ok(results)
    }
}

#[async_trait]
impl PretalxApi for PretalxClient {
    async fn list_submissions(
        &self,
        states: &[SubmissionState],
    ) -> Result<Vec<PretalxSubmission>, PretalxError> {
        let state_query: Vec<(&str, String)> = states
            .iter()
            .map(|state| ("state", state.as_query_value().to_string()))
            .collect();

        self.fetch_all(&self.endpoint("submissions"), &state_query)
            .await
    }

    async fn get_submission(&self, code: &str) -> Result<PretalxSubmission, PretalxError> {
        let url = format!("{}{}/", self.endpoint("submissions"), code);
        self.fetch_one(&url).await
    }

    async fn list_speakers(&self) -> Result<Vec<PretalxSpeaker>, PretalxError> {
        self.fetch_all(&self.endpoint("speakers"), &[]).await
    }

    async fn get_speaker(&self, code: &str) -> Result<PretalxSpeaker, PretalxError> {
        let url = format!("{}{}/", self.endpoint("speakers"), code);
        self.fetch_one(&url).await
    }
}
