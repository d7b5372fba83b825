//! Process-wide state
//!
//! Pools and clients are built once by [`AppState::init`] and handed to
//! workflows and actions through [`Deps`]; nothing reaches for a global.

use kit::{Config, DbConnection, ExecutionStore, FrameworkError, WorkflowRegistry, DB};
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::config::{MailConfig, ServicesConfig, SiteConfig};
use crate::events::QueueEventBus;
use crate::notifications::Notifier;
use crate::repositories::SeaOrmToolStore;
use crate::services::{
    http_client, AnthropicContentGenerator, CacheInvalidator, CachedStackAnalyzer, GithubClient,
    HttpMailer, HttpMediaUploader, HttpStackAnalyzer, LogCacheInvalidator, LogMailer, Mailer,
    RedisAnalysisCache, RedisCacheInvalidator, StackAnalyzer, WebhookSocialPoster,
};
use crate::workflows::{self, Deps};

pub struct AppState {
    pub db: DbConnection,
    pub executions: ExecutionStore,
    pub deps: Deps,
    pub registry: Arc<WorkflowRegistry>,
}

impl AppState {
    /// Connect to the database and Redis and wire every collaborator
    pub async fn init() -> Result<Self, FrameworkError> {
        let db = DB::connect().await?;
        let services = Config::get::<ServicesConfig>().unwrap_or_else(ServicesConfig::from_env);
        let mail = Config::get::<MailConfig>().unwrap_or_else(MailConfig::from_env);
        let site = Config::get::<SiteConfig>().unwrap_or_else(SiteConfig::from_env);

        let redis = match &services.redis_url {
            Some(url) => Some(connect_redis(url).await?),
            None => {
                tracing::warn!("REDIS_URL not set, cache invalidation is logged only");
                None
            }
        };

        let http = http_client()?;
        let executions = ExecutionStore::new(db.clone());

        let live_analyzer: Arc<dyn StackAnalyzer> = Arc::new(HttpStackAnalyzer::new(
            http.clone(),
            services.stack_analyzer_url.clone(),
        ));
        let (stacks, cache): (Arc<dyn StackAnalyzer>, Arc<dyn CacheInvalidator>) = match redis {
            Some(conn) => (
                Arc::new(CachedStackAnalyzer::new(
                    live_analyzer,
                    Arc::new(RedisAnalysisCache::new(conn.clone())),
                )),
                Arc::new(RedisCacheInvalidator::new(conn)),
            ),
            None => (live_analyzer, Arc::new(LogCacheInvalidator)),
        };

        let mailer: Arc<dyn Mailer> = if mail.driver == "log" {
            Arc::new(LogMailer)
        } else {
            Arc::new(HttpMailer::new(http.clone(), mail))
        };
        let social = Arc::new(WebhookSocialPoster::new(
            http.clone(),
            services.social_webhook_urls.clone(),
        ));

        let deps = Deps {
            tools: Arc::new(SeaOrmToolStore::new(db.clone())),
            repositories: Arc::new(GithubClient::new(http.clone(), services.github_token.clone())),
            content: Arc::new(AnthropicContentGenerator::new(
                http.clone(),
                services.anthropic_api_key.clone(),
                services.anthropic_model.clone(),
            )),
            media: Arc::new(
                HttpMediaUploader::new(http)
                    .browserless(services.browserless_url, services.browserless_token)
                    .storage(
                        services.storage_url,
                        services.storage_token,
                        services.storage_public_url,
                    ),
            ),
            stacks,
            cache,
            notifier: Notifier::new(mailer, social),
            events: Arc::new(QueueEventBus::new(executions.clone())),
            site,
        };
        let registry = Arc::new(workflows::registry(&deps));

        Ok(Self {
            db,
            executions,
            deps,
            registry,
        })
    }

    /// Close the database pool
    pub async fn shutdown(self) -> Result<(), FrameworkError> {
        let Self { db, deps, .. } = self;
        drop(deps);
        db.close().await?;
        tracing::info!("database pool closed");
        Ok(())
    }
}

async fn connect_redis(url: &str) -> Result<ConnectionManager, FrameworkError> {
    let client = redis::Client::open(url)?;
    let conn = ConnectionManager::new(client).await?;
    tracing::info!("connected to redis");
    Ok(conn)
}
