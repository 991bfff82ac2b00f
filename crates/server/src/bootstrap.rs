use std::{sync::Arc, time::Duration};

use bookbot_core::{
    config::{AppConfig, ConfigError},
    ApplicationError, CatalogError, Recommender,
};
use bookbot_slack::{
    events::book_dispatcher,
    service::RecommendationService,
    socket::{ReconnectPolicy, SocketModeRunner},
    transport::WebSocketTransport,
    web::{SlackWebClient, WebApiError},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{aladin::AladinCatalog, daily::DailyPick};

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
    pub daily_pick: Option<DailyPick<AladinCatalog>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog client setup failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("slack client setup failed: {0}")]
    Slack(#[from] WebApiError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog = AladinCatalog::from_config(&config.catalog)?;
    let recommender = Arc::new(Recommender::new(catalog, config.recommend.retry_policy()));
    let web = Arc::new(SlackWebClient::from_config(&config.slack)?);

    let dispatcher = book_dispatcher(
        config.slack.command.clone(),
        RecommendationService::new(Arc::clone(&recommender)),
    );
    let slack_runner = SocketModeRunner::new(
        Arc::new(WebSocketTransport::new(web.clone())),
        dispatcher,
        web.clone(),
        ReconnectPolicy::default(),
    );

    let daily_pick = match config.daily.active_channel() {
        Some(channel_id) => Some(DailyPick::new(
            Arc::clone(&recommender),
            web,
            channel_id,
            Duration::from_secs(config.daily.interval_hours.saturating_mul(60 * 60)),
        )),
        None => {
            if config.daily.enabled {
                let error = ApplicationError::Configuration(
                    "daily.channel_id is not set (BOOKBOT_DAILY_CHANNEL_ID or CHANNEL_ID)"
                        .to_owned(),
                );
                warn!(
                    event_name = "system.bootstrap.daily_disabled",
                    correlation_id = "bootstrap",
                    error = %error,
                    "daily pick enabled without a channel; skipping"
                );
            }
            None
        }
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        command = %config.slack.command,
        daily_pick = daily_pick.is_some(),
        "application wired"
    );

    Ok(Application { config, slack_runner, daily_pick })
}

#[cfg(test)]
mod tests {
    use bookbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?)
    }

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            slack_app_token: Some("xapp-valid".to_string()),
            slack_bot_token: Some("xoxb-valid".to_string()),
            catalog_api_key: Some("ttb-valid".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_app_token: Some("invalid-token".to_string()),
                ..overrides()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[test]
    fn bootstrap_rejects_missing_catalog_key() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides { catalog_api_key: Some("  ".to_string()), ..overrides() },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("catalog.api_key"));
    }

    #[test]
    fn daily_pick_follows_channel_configuration() {
        let with_channel = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                daily_channel_id: Some("C0DAILY".to_string()),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap");
        assert!(with_channel.daily_pick.is_some());

        let disabled = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                daily_enabled: Some(false),
                daily_channel_id: Some("C0DAILY".to_string()),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .expect("bootstrap");
        assert!(disabled.daily_pick.is_none());
        assert_eq!(disabled.config.slack.command, "/book");
    }
}
