//! Reconciles the local database against pretalx. Confirmed submissions
//! become talks or workshops keyed by their pretalx code; referenced
//! speakers are pulled in alongside. Local-only edits to non-synced fields
//! survive a sync untouched.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use sqlx::SqlitePool;
use thiserror::Error;

use db::models::speaker::{
    set_talk_speakers, set_workshop_speakers, CreateSpeaker, Speaker, SpeakerError,
};
use db::models::talk::{CreateTalk, Talk, TalkError};
use db::models::workshop::{CreateWorkshop, Workshop, WorkshopError};
use uuid::Uuid;

use super::pretalx::{
    AnswersCollection, PretalxApi, PretalxError, PretalxSpeaker, PretalxSubmission,
    SubmissionState,
};

/// Gap between consecutive order values, leaving room for manual reordering
/// between synced sessions.
const ORDER_STEP: i64 = 10;

const DIFFICULTY_QUESTION: &str = "Difficulty";

static DIFFICULTY_MAP: LazyLock<HashMap<String, String>> = LazyLock::new(|| {
    HashMap::from([
        ("beginner".to_string(), "beginner".to_string()),
        ("intermediate".to_string(), "intermediate".to_string()),
        ("advanced".to_string(), "advanced".to_string()),
    ])
});

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Pretalx(#[from] PretalxError),
    #[error(transparent)]
    Speaker(#[from] SpeakerError),
    #[error(transparent)]
    Talk(#[from] TalkError),
    #[error(transparent)]
    Workshop(#[from] WorkshopError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub talks_created: usize,
    pub talks_updated: usize,
    pub workshops_created: usize,
    pub workshops_updated: usize,
    pub speakers_created: usize,
    pub speakers_updated: usize,
}

/// Records loaded before the sync plus those created during it, both keyed
/// by pretalx code. Lookups check the new side first.
struct CodeMap<T> {
    existing: HashMap<String, T>,
    new: HashMap<String, T>,
}

impl<T> CodeMap<T> {
    fn from_existing(existing: HashMap<String, T>) -> CodeMap<T> {
        CodeMap {
            existing,
            new: HashMap::new(),
        }
    }

    fn get(&self, code: &str) -> Option<&T> {
        self.new.get(code).or_else(|| self.existing.get(code))
    }

    fn get_mut(&mut self, code: &str) -> Option<&mut T> {
        self.new
            .get_mut(code)
            .or_else(|| self.existing.get_mut(code))
    }

    fn insert_new(&mut self, code: String, value: T) {
        self.new.insert(code, value);
    }

    fn new_count(&self) -> usize {
        self.new.len()
    }
}

fn by_pretalx_code<T>(records: Vec<T>, code_of: impl Fn(&T) -> Option<String>) -> HashMap<String, T> {
    records
        .into_iter()
        .filter_map(|record| code_of(&record).map(|code| (code, record)))
        .collect()
}

pub struct PretalxSync<'a> {
    api: &'a dyn PretalxApi,
    pool: &'a SqlitePool,
    speakers: CodeMap<Speaker>,
}

impl<'a> PretalxSync<'a> {
    pub async fn new(
        api: &'a dyn PretalxApi,
        pool: &'a SqlitePool,
    ) -> Result<PretalxSync<'a>, SyncError> {
        let speakers = by_pretalx_code(Speaker::find_synced(pool).await?, |speaker| {
            speaker.pretalx_code.clone()
        });

        Ok(PretalxSync {
            api,
            pool,
            speakers: CodeMap::from_existing(speakers),
        })
    }

    /// Pull every confirmed submission and reconcile talks, workshops and
    /// their speakers. Each entity type commits in a single transaction
    /// (one update pass, one create pass); safe to re-run, a second pass
    /// with the same remote data changes nothing.
    pub async fn full_sync(&mut self) -> Result<SyncSummary, SyncError> {
        let submissions = self
            .api
            .list_submissions(&[SubmissionState::Confirmed])
            .await?;
        tracing::info!("fetched {} confirmed submissions", submissions.len());

        let referenced: HashSet<&str> = submissions
            .iter()
            .flat_map(|submission| submission.speakers.iter())
            .map(|speaker| speaker.code.as_str())
            .collect();
        let speakers: Vec<PretalxSpeaker> = self
            .api
            .list_speakers()
            .await?
            .into_iter()
            .filter(|speaker| referenced.contains(speaker.code.as_str()))
            .collect();
        let speakers_updated = self.sync_speakers(&speakers).await?;

        let (workshops, talks): (Vec<_>, Vec<_>) = submissions
            .into_iter()
            .partition(|submission| is_workshop_submission(submission));

        let mut summary = SyncSummary {
            speakers_updated,
            ..SyncSummary::default()
        };
        self.sync_talks(&talks, &mut summary).await?;
        self.sync_workshops(&workshops, &mut summary).await?;

        // Speakers fetched one-by-one during association also count.
        summary.speakers_created = self.speakers.new_count();

        Ok(summary)
    }

    /// Refresh already-synced talks from their individual submission
    /// endpoints, leaving the rest of the database alone.
    pub async fn update_talks(&mut self, codes: &[String]) -> Result<usize, SyncError> {
        let mut existing =
            by_pretalx_code(Talk::find_synced(self.pool).await?, |talk| {
                talk.pretalx_code.clone()
            });

        let mut updated = 0;
        for code in codes {
            let Some(talk) = existing.get_mut(code) else {
                tracing::warn!("no synced talk with code {:?}", code);
                continue;
            };
            let submission = self.api.get_submission(code).await?;
            apply_submission_to_talk(talk, &submission);
            talk.update_synced_fields(self.pool).await?;
            self.associate_talk_speakers(talk.id, &submission).await?;
            updated += 1;
        }

        Ok(updated)
    }

    pub async fn update_workshops(&mut self, codes: &[String]) -> Result<usize, SyncError> {
        let mut existing =
            by_pretalx_code(Workshop::find_synced(self.pool).await?, |workshop| {
                workshop.pretalx_code.clone()
            });

        let mut updated = 0;
        for code in codes {
            let Some(workshop) = existing.get_mut(code) else {
                tracing::warn!("no synced workshop with code {:?}", code);
                continue;
            };
            let submission = self.api.get_submission(code).await?;
            apply_submission_to_workshop(workshop, &submission);
            workshop.update_synced_fields(self.pool).await?;
            self.associate_workshop_speakers(workshop.id, &submission)
                .await?;
            updated += 1;
        }

        Ok(updated)
    }

    pub async fn update_speakers(&mut self, codes: &[String]) -> Result<usize, SyncError> {
        let mut updated = 0;
        for code in codes {
            let remote = self.api.get_speaker(code).await?;
            if let Some(speaker) = self.speakers.get_mut(&remote.code) {
                apply_speaker_fields(speaker, &remote);
                speaker.update_synced_fields(self.pool).await?;
                updated += 1;
            } else {
                tracing::warn!("no synced speaker with code {:?}", code);
            }
        }

        Ok(updated)
    }

    /// One update pass over known speakers and one create pass for the
    /// rest, committed together.
    async fn sync_speakers(&mut self, remote: &[PretalxSpeaker]) -> Result<usize, SyncError> {
        let mut tx = self.pool.begin().await?;

        let mut updated = 0;
        for remote_speaker in remote {
            if let Some(speaker) = self.speakers.get_mut(&remote_speaker.code) {
                apply_speaker_fields(speaker, remote_speaker);
                speaker.update_synced_fields(&mut *tx).await?;
                updated += 1;
            }
        }

        for remote_speaker in remote {
            if self.speakers.get(&remote_speaker.code).is_none() {
                let speaker = Speaker::create(
                    &mut *tx,
                    create_speaker_payload(remote_speaker),
                )
                .await?;
                self.speakers
                    .insert_new(remote_speaker.code.clone(), speaker);
            }
        }

        tx.commit().await?;

        Ok(updated)
    }

    /// Speaker id for a code, fetching and creating the record when the
    /// listing pass has not brought it in (private or unlisted profiles).
    async fn get_or_fetch_speaker(&mut self, code: &str) -> Result<Uuid, SyncError> {
        if let Some(speaker) = self.speakers.get(code) {
            return Ok(speaker.id);
        }

        let remote = self.api.get_speaker(code).await?;
        let speaker = Speaker::create(self.pool, create_speaker_payload(&remote)).await?;
        let id = speaker.id;
        self.speakers.insert_new(remote.code.clone(), speaker);

        Ok(id)
    }

    async fn sync_talks(
        &mut self,
        submissions: &[PretalxSubmission],
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let mut existing =
            by_pretalx_code(Talk::find_synced(self.pool).await?, |talk| {
                talk.pretalx_code.clone()
            });
        let max_order = Talk::max_order(self.pool).await?;

        let mut session_ids: Vec<(Uuid, &PretalxSubmission)> = Vec::new();
        let mut tx = self.pool.begin().await?;

        for submission in submissions {
            let Some(talk) = existing.get_mut(&submission.code) else {
                continue;
            };
            apply_submission_to_talk(talk, submission);
            talk.update_synced_fields(&mut *tx).await?;
            summary.talks_updated += 1;
            session_ids.push((talk.id, submission));
        }

        let mut created = 0;
        for submission in submissions {
            if existing.contains_key(&submission.code) {
                continue;
            }
            created += 1;
            let talk = Talk::create(
                &mut *tx,
                CreateTalk {
                    title: submission.title.clone(),
                    abstract_text: submission.abstract_text.clone(),
                    language: Some(submission_language(submission)),
                    difficulty: submission_difficulty(submission),
                    session_type: Some(submission.submission_type.localized().to_lowercase()),
                    order: Some(max_order + ORDER_STEP * created),
                    pretalx_code: Some(submission.code.clone()),
                    ..Default::default()
                },
            )
            .await?;
            summary.talks_created += 1;
            session_ids.push((talk.id, submission));
        }

        tx.commit().await?;

        for (talk_id, submission) in session_ids {
            self.associate_talk_speakers(talk_id, submission).await?;
        }

        Ok(())
    }

    async fn sync_workshops(
        &mut self,
        submissions: &[PretalxSubmission],
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        let mut existing =
            by_pretalx_code(Workshop::find_synced(self.pool).await?, |workshop| {
                workshop.pretalx_code.clone()
            });
        let max_order = Workshop::max_order(self.pool).await?;

        let mut session_ids: Vec<(Uuid, &PretalxSubmission)> = Vec::new();
        let mut tx = self.pool.begin().await?;

        for submission in submissions {
            let Some(workshop) = existing.get_mut(&submission.code) else {
                continue;
            };
            apply_submission_to_workshop(workshop, submission);
            workshop.update_synced_fields(&mut *tx).await?;
            summary.workshops_updated += 1;
            session_ids.push((workshop.id, submission));
        }

        let mut created = 0;
        for submission in submissions {
            if existing.contains_key(&submission.code) {
                continue;
            }
            created += 1;
            let workshop = Workshop::create(
                &mut *tx,
                CreateWorkshop {
                    title: submission.title.clone(),
                    abstract_text: submission.abstract_text.clone(),
                    language: Some(submission_language(submission)),
                    difficulty: submission_difficulty(submission),
                    session_type: Some(submission.submission_type.localized().to_lowercase()),
                    requirements: submission.description.clone(),
                    order: Some(max_order + ORDER_STEP * created),
                    pretalx_code: Some(submission.code.clone()),
                    ..Default::default()
                },
            )
            .await?;
            summary.workshops_created += 1;
            session_ids.push((workshop.id, submission));
        }

        tx.commit().await?;

        for (workshop_id, submission) in session_ids {
            self.associate_workshop_speakers(workshop_id, submission)
                .await?;
        }

        Ok(())
    }

    async fn associate_talk_speakers(
        &mut self,
        talk_id: Uuid,
        submission: &PretalxSubmission,
    ) -> Result<(), SyncError> {
        let mut speaker_ids = Vec::with_capacity(submission.speakers.len());
        for speaker_ref in &submission.speakers {
            speaker_ids.push(self.get_or_fetch_speaker(&speaker_ref.code).await?);
        }
        set_talk_speakers(self.pool, talk_id, &speaker_ids).await?;

        Ok(())
    }

    async fn associate_workshop_speakers(
        &mut self,
        workshop_id: Uuid,
        submission: &PretalxSubmission,
    ) -> Result<(), SyncError> {
        let mut speaker_ids = Vec::with_capacity(submission.speakers.len());
        for speaker_ref in &submission.speakers {
            speaker_ids.push(self.get_or_fetch_speaker(&speaker_ref.code).await?);
        }
        set_workshop_speakers(self.pool, workshop_id, &speaker_ids).await?;

        Ok(())
    }
}

/// Workshops and sprints share the workshop table; everything else is a
/// talk.
fn is_workshop_submission(submission: &PretalxSubmission) -> bool {
    let kind = submission.submission_type.localized().to_lowercase();
    kind.contains("workshop") || kind.contains("sprint")
}

fn submission_language(submission: &PretalxSubmission) -> String {
    submission
        .content_locale
        .as_deref()
        .map(|locale| locale.chars().take(2).collect())
        .unwrap_or_else(|| "en".to_string())
}

fn submission_difficulty(submission: &PretalxSubmission) -> Option<String> {
    submission
        .get_mapped_answer(DIFFICULTY_QUESTION, &DIFFICULTY_MAP)
        .map(str::to_string)
}

fn apply_submission_to_talk(talk: &mut Talk, submission: &PretalxSubmission) {
    talk.title = submission.title.clone();
    talk.abstract_text = submission.abstract_text.clone().unwrap_or_default();
    talk.language = submission_language(submission);
    if let Some(difficulty) = submission_difficulty(submission) {
        talk.difficulty = difficulty;
    }
    talk.session_type = submission.submission_type.localized().to_lowercase();
}

fn apply_submission_to_workshop(workshop: &mut Workshop, submission: &PretalxSubmission) {
    workshop.title = submission.title.clone();
    workshop.abstract_text = submission.abstract_text.clone().unwrap_or_default();
    workshop.language = submission_language(submission);
    if let Some(difficulty) = submission_difficulty(submission) {
        workshop.difficulty = difficulty;
    }
    workshop.session_type = submission.submission_type.localized().to_lowercase();
    if let Some(requirements) = submission.description.clone() {
        workshop.requirements = requirements;
    }
}

fn create_speaker_payload(remote: &PretalxSpeaker) -> CreateSpeaker {
    CreateSpeaker {
        full_name: remote.name.clone(),
        bio: remote.biography.clone().unwrap_or_default(),
        email: remote.email.clone(),
        photo_url: remote.avatar.clone(),
        pretalx_code: Some(remote.code.clone()),
        ..Default::default()
    }
}

fn apply_speaker_fields(speaker: &mut Speaker, remote: &PretalxSpeaker) {
    speaker.full_name = remote.name.clone();
    if let Some(biography) = remote.biography.clone() {
        speaker.bio = biography;
    }
    if let Some(email) = remote.email.clone() {
        speaker.email = email;
    }
    if remote.avatar.is_some() {
        speaker.photo_url = remote.avatar.clone();
    }
}
