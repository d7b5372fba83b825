//! In-memory fakes for every collaborator
//!
//! Used by the unit tests and by `tests/`. Nothing here touches the network.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kit::FrameworkError;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SiteConfig;
use crate::events::{Event, EventBus};
use crate::models::{slugify, Tool, ToolStatus};
use crate::notifications::Notifier;
use crate::services::{
    AnalysisCache, CacheInvalidator, ContentGenerator, EmailMessage, GeneratedContent, Mailer,
    MediaUploader, RepositoryData, RepositoryFetcher, SocialPost, SocialPoster, StackAnalyzer,
};
use crate::workflows::Deps;

pub use crate::repositories::MemoryToolStore;

fn read<T: Clone>(value: &Mutex<T>) -> T {
    value.lock().map(|v| v.clone()).unwrap_or_else(|e| e.into_inner().clone())
}

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    match list.lock() {
        Ok(mut items) => items.push(item),
        Err(e) => e.into_inner().push(item),
    }
}

/// Site settings used across tests
pub fn site() -> SiteConfig {
    SiteConfig {
        name: "FOSS Alternative".to_string(),
        tagline: "Free & Open Source Alternatives of Popular Software".to_string(),
        url: "https://openalternative.test".to_string(),
        email: Some("admin@openalternative.test".to_string()),
    }
}

/// A draft tool with no enrichment, not yet stored
pub fn tool(slug: &str, name: &str) -> Tool {
    let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_else(Utc::now);
    Tool {
        id: 0,
        name: name.to_string(),
        slug: slug.to_string(),
        website_url: format!("https://{}.test", slug),
        repository_url: format!("https://github.com/{}/{}", slug, slug),
        tagline: None,
        description: None,
        content: None,
        submitter_name: None,
        submitter_email: None,
        status: ToolStatus::Draft,
        published_at: None,
        is_featured: false,
        stars: None,
        forks: None,
        score: None,
        license: None,
        first_commit_date: None,
        last_commit_date: None,
        favicon_url: None,
        screenshot_url: None,
        created_at: created,
        updated_at: created,
    }
}

/// Returns fixed repository statistics, or nothing when set missing
#[derive(Default)]
pub struct FakeRepositoryFetcher {
    calls: AtomicUsize,
    missing: AtomicBool,
    failing: AtomicBool,
    failures_left: AtomicUsize,
}

impl FakeRepositoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Behave like a 404
    pub fn set_missing(&self, missing: bool) {
        self.missing.store(missing, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `times` calls, then recover
    pub fn fail_next(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RepositoryFetcher for FakeRepositoryFetcher {
    async fn fetch(&self, _repository_url: &str) -> Result<Option<RepositoryData>, FrameworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) || self.take_failure() {
            return Err(FrameworkError::upstream("github", "rate limited"));
        }
        if self.missing.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let pushed_at = Utc::now();
        Ok(Some(RepositoryData {
            stars: 1000,
            forks: 100,
            score: 1200,
            license: Some("MIT".to_string()),
            created_at: Some(pushed_at - chrono::Duration::days(3650)),
            pushed_at: Some(pushed_at),
        }))
    }
}

/// Generates the same content for every website
#[derive(Default)]
pub struct FakeContentGenerator {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentGenerator for FakeContentGenerator {
    async fn generate(&self, website_url: &str) -> Result<GeneratedContent, FrameworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FrameworkError::upstream("anthropic", "overloaded"));
        }

        Ok(GeneratedContent {
            tagline: "Open source workspace for notes".to_string(),
            description: format!("A self-hosted alternative, found at {}.", website_url),
            content: "## Features\n\n- Notes\n- Sync".to_string(),
            categories: vec!["Productivity".to_string(), "Note Taking".to_string()],
            alternatives: vec!["Notion".to_string()],
        })
    }
}

/// Pretends to store assets on a CDN
#[derive(Default)]
pub struct FakeMediaUploader {
    favicons: AtomicUsize,
    screenshots: AtomicUsize,
    failing_screenshots: AtomicBool,
}

impl FakeMediaUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn favicon_calls(&self) -> usize {
        self.favicons.load(Ordering::SeqCst)
    }

    pub fn screenshot_calls(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    pub fn fail_screenshots(&self, failing: bool) {
        self.failing_screenshots.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaUploader for FakeMediaUploader {
    async fn upload_favicon(&self, _website_url: &str, key: &str) -> Result<String, FrameworkError> {
        self.favicons.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://cdn.openalternative.test/{}", key))
    }

    async fn upload_screenshot(&self, _website_url: &str, key: &str) -> Result<String, FrameworkError> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        if self.failing_screenshots.load(Ordering::SeqCst) {
            return Err(FrameworkError::upstream("browserless", "timeout"));
        }
        Ok(format!("https://cdn.openalternative.test/{}", key))
    }
}

/// Reports a fixed stack for every repository
pub struct FakeStackAnalyzer {
    stack: Vec<String>,
    calls: AtomicUsize,
}

impl FakeStackAnalyzer {
    pub fn new(stack: &[&str]) -> Self {
        Self {
            stack: stack.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StackAnalyzer for FakeStackAnalyzer {
    async fn analyze(&self, _repository_url: &str) -> Result<Vec<String>, FrameworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stack.clone())
    }
}

/// Analysis cache in a map; can be broken to test failing open
#[derive(Default)]
pub struct MemoryAnalysisCache {
    entries: Mutex<HashMap<String, (Vec<String>, Duration)>>,
    broken: AtomicBool,
}

impl MemoryAnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        read(&self.entries).get(key).map(|(_, ttl)| *ttl)
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), FrameworkError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(FrameworkError::upstream("redis", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisCache for MemoryAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<String>>, FrameworkError> {
        self.check()?;
        Ok(read(&self.entries).get(key).map(|(stack, _)| stack.clone()))
    }

    async fn set(&self, key: &str, stack: &[String], ttl: Duration) -> Result<(), FrameworkError> {
        self.check()?;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (stack.to_vec(), ttl));
        }
        Ok(())
    }
}

/// Records every invalidation call
#[derive(Default)]
pub struct RecordingCacheInvalidator {
    calls: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl RecordingCacheInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful invalidations, one entry per call
    pub fn invalidations(&self) -> Vec<Vec<String>> {
        read(&self.calls)
    }

    /// How often `tag` was invalidated
    pub fn count(&self, tag: &str) -> usize {
        self.invalidations()
            .iter()
            .filter(|tags| tags.iter().any(|t| t == tag))
            .count()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCacheInvalidator {
    async fn invalidate(&self, tags: &[String]) -> Result<(), FrameworkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FrameworkError::upstream("redis", "connection refused"));
        }
        push(&self.calls, tags.to_vec());
        Ok(())
    }
}

/// Keeps delivered messages; selected recipients fail with a retriable error
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(address.to_string());
        }
    }

    /// Delivered messages
    pub fn sent(&self) -> Vec<EmailMessage> {
        read(&self.sent)
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }

    /// Every send call, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), FrameworkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if read(&self.failing).contains(&message.to) {
            return Err(FrameworkError::upstream("mail", "503 Service Unavailable"));
        }
        push(&self.sent, message.clone());
        Ok(())
    }
}

/// Keeps published posts; can reject everything
#[derive(Default)]
pub struct FakeSocialPoster {
    posts: Mutex<Vec<SocialPost>>,
    rejecting: AtomicBool,
    attempts: AtomicUsize,
}

impl FakeSocialPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> Vec<SocialPost> {
        read(&self.posts)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

#[async_trait]
impl SocialPoster for FakeSocialPoster {
    async fn post(&self, post: &SocialPost) -> Result<(), FrameworkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(FrameworkError::upstream("social", "post rejected"));
        }
        push(&self.posts, post.clone());
        Ok(())
    }
}

/// Records events and cancellations instead of enqueueing
#[derive(Default)]
pub struct RecordingEventBus {
    sent: Mutex<Vec<Event>>,
    cancelled: Mutex<Vec<(String, String)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Event> {
        read(&self.sent)
    }

    pub fn cancellations(&self) -> Vec<(String, String)> {
        read(&self.cancelled)
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn send(&self, event: &Event) -> Result<(), FrameworkError> {
        push(&self.sent, event.clone());
        Ok(())
    }

    async fn cancel_pending(&self, workflow: &str, key: &str) -> Result<u64, FrameworkError> {
        push(&self.cancelled, (workflow.to_string(), key.to_string()));
        Ok(0)
    }
}

/// Every fake, kept around for assertions after building [`Deps`]
pub struct Harness {
    pub store: Arc<MemoryToolStore>,
    pub repositories: Arc<FakeRepositoryFetcher>,
    pub content: Arc<FakeContentGenerator>,
    pub media: Arc<FakeMediaUploader>,
    pub stacks: Arc<FakeStackAnalyzer>,
    pub cache: Arc<RecordingCacheInvalidator>,
    pub mailer: Arc<FakeMailer>,
    pub social: Arc<FakeSocialPoster>,
    pub events: Arc<RecordingEventBus>,
    pub site: SiteConfig,
}

/// A harness where every collaborator succeeds
pub fn deps() -> Harness {
    Harness {
        store: Arc::new(MemoryToolStore::new()),
        repositories: Arc::new(FakeRepositoryFetcher::new()),
        content: Arc::new(FakeContentGenerator::new()),
        media: Arc::new(FakeMediaUploader::new()),
        stacks: Arc::new(FakeStackAnalyzer::new(&["react", "postgresql"])),
        cache: Arc::new(RecordingCacheInvalidator::new()),
        mailer: Arc::new(FakeMailer::new()),
        social: Arc::new(FakeSocialPoster::new()),
        events: Arc::new(RecordingEventBus::new()),
        site: site(),
    }
}

impl Harness {
    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = site;
        self
    }

    pub fn build(&self) -> Deps {
        Deps {
            tools: self.store.clone(),
            repositories: self.repositories.clone(),
            content: self.content.clone(),
            media: self.media.clone(),
            stacks: self.stacks.clone(),
            cache: self.cache.clone(),
            notifier: Notifier::new(self.mailer.clone(), self.social.clone()),
            events: self.events.clone(),
            site: self.site.clone(),
        }
    }

    /// Store a tool named after its slug
    pub async fn seed_tool(
        &self,
        slug: &str,
        submitter_email: Option<&str>,
        status: ToolStatus,
        published_at: Option<chrono::DateTime<Utc>>,
    ) -> Tool {
        let mut seeded = tool(&slugify(slug), &title_case(slug));
        seeded.submitter_email = submitter_email.map(str::to_string);
        seeded.status = status;
        seeded.published_at = published_at;

        match self.store.insert(seeded) {
            Ok(tool) => tool,
            Err(err) => panic!("failed to seed tool '{}': {}", slug, err),
        }
    }
}

fn title_case(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
