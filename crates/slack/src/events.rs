use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bookbot_core::{find_genre, ApplicationError};
use thiserror::Error;

use crate::{
    blocks::{self, MessageTemplate, GENRE_REROLL_ACTION, GENRE_SELECT_ACTION, RANDOM_REROLL_ACTION},
    commands::{
        normalize_book_command, BookCommandService, CommandParseError, CommandRouteError,
        CommandRouter, SlashCommandPayload,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

impl SlackEnvelope {
    /// Where replies to this envelope are delivered, when Slack supplied one.
    pub fn response_url(&self) -> Option<&str> {
        match &self.event {
            SlackEvent::SlashCommand(payload) => payload.response_url.as_deref(),
            SlackEvent::BlockAction(event) => event.response_url.as_deref(),
            SlackEvent::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: Option<String>,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("malformed block action: {0}")]
    MalformedAction(String),
}

impl From<EventHandlerError> for ApplicationError {
    fn from(value: EventHandlerError) -> Self {
        match value {
            EventHandlerError::Parse(error) => Self::InvalidRequest(error.to_string()),
            EventHandlerError::Route(CommandRouteError::Application(error)) => error,
            EventHandlerError::MalformedAction(message) => Self::InvalidRequest(message),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl From<DispatchError> for ApplicationError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Handler(error) => error.into(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers the slash command and block action handlers against one service.
pub fn book_dispatcher<S>(command: impl Into<String>, service: S) -> EventDispatcher
where
    S: BookCommandService + Clone + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(command, service.clone()));
    dispatcher.register(BlockActionHandler::new(service));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    command: String,
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: BookCommandService,
{
    pub fn new(command: impl Into<String>, service: S) -> Self {
        Self { command: command.into(), router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: BookCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_book_command(payload.clone(), &self.command)?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(message))
    }
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BookCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BookCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let request_id = ctx.correlation_id.as_str();

        let message = match event.action_id.as_str() {
            GENRE_SELECT_ACTION | GENRE_REROLL_ACTION => {
                let label = event.value.as_deref().ok_or_else(|| {
                    EventHandlerError::MalformedAction(format!(
                        "`{}` arrived without a genre value",
                        event.action_id
                    ))
                })?;
                let message = match find_genre(label) {
                    Some(genre) => self.service.recommend_genre(genre, request_id).await?,
                    None => blocks::genre_picker_message(Some(&format!(
                        "`{label}` 장르를 찾지 못했습니다."
                    ))),
                };
                if event.action_id == GENRE_SELECT_ACTION {
                    message.replacing_original()
                } else {
                    message
                }
            }
            RANDOM_REROLL_ACTION => self.service.random_book(request_id).await?,
            _ => return Ok(HandlerResult::Ignored),
        };

        Ok(HandlerResult::Responded(message))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bookbot_core::{ApplicationError, CatalogError};

    use super::{
        book_dispatcher, BlockActionEvent, DispatchError, EventContext, EventDispatcher,
        EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent,
    };
    use crate::blocks::{GENRE_REROLL_ACTION, GENRE_SELECT_ACTION, RANDOM_REROLL_ACTION};
    use crate::commands::{tests::RecordingService, CommandRouteError, SlashCommandPayload};

    fn slash(text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-1".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/book".to_owned(),
                text: text.to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                request_id: "env-1".to_owned(),
                response_url: Some("https://hooks.slack.com/commands/1".to_owned()),
            }),
        }
    }

    fn action(action_id: &str, value: Option<&str>) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-block".to_owned(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                channel_id: Some("C1".to_owned()),
                user_id: "U2".to_owned(),
                action_id: action_id.to_owned(),
                value: value.map(str::to_owned),
                response_url: Some("https://hooks.slack.com/actions/1".to_owned()),
            }),
        }
    }

    fn ctx() -> EventContext {
        EventContext { correlation_id: "env-test".to_owned() }
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = book_dispatcher("/book", Arc::clone(&service));

        let result = dispatcher.dispatch(&slash("search 토지"), &ctx()).await.expect("dispatch");

        assert!(matches!(result, HandlerResult::Responded(_)));
        assert_eq!(service.calls(), vec!["search:토지"]);
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[tokio::test]
    async fn dispatcher_rejects_foreign_slash_command() {
        let dispatcher = book_dispatcher("/book", Arc::new(RecordingService::default()));
        let mut envelope = slash("random");
        if let SlackEvent::SlashCommand(payload) = &mut envelope.event {
            payload.command = "/quote".to_owned();
        }

        let error = dispatcher.dispatch(&envelope, &ctx()).await.expect_err("foreign command");

        assert!(matches!(
            ApplicationError::from(error),
            ApplicationError::InvalidRequest(message) if message.contains("/quote")
        ));
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();

        let result = dispatcher.dispatch(&slash("help"), &ctx()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn genre_select_replaces_picker_message() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = book_dispatcher("/book", Arc::clone(&service));

        let result = dispatcher
            .dispatch(&action(GENRE_SELECT_ACTION, Some("경제")), &ctx())
            .await
            .expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected response");
        };
        assert!(message.replace_original);
        assert_eq!(service.calls(), vec!["genre:경제"]);
    }

    #[tokio::test]
    async fn reroll_buttons_call_service_without_replacing() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = book_dispatcher("/book", Arc::clone(&service));

        let genre = dispatcher
            .dispatch(&action(GENRE_REROLL_ACTION, Some("만화")), &ctx())
            .await
            .expect("dispatch");
        let random = dispatcher
            .dispatch(&action(RANDOM_REROLL_ACTION, Some("random")), &ctx())
            .await
            .expect("dispatch");

        assert!(matches!(genre, HandlerResult::Responded(ref message) if !message.replace_original));
        assert!(matches!(random, HandlerResult::Responded(_)));
        assert_eq!(service.calls(), vec!["genre:만화", "random"]);
    }

    #[tokio::test]
    async fn genre_action_without_value_is_malformed() {
        let dispatcher = book_dispatcher("/book", Arc::new(RecordingService::default()));

        let error = dispatcher
            .dispatch(&action(GENRE_SELECT_ACTION, None), &ctx())
            .await
            .expect_err("malformed");

        assert!(matches!(
            error,
            DispatchError::Handler(EventHandlerError::MalformedAction(ref message))
                if message.contains(GENRE_SELECT_ACTION)
        ));
    }

    #[tokio::test]
    async fn unrelated_actions_are_ignored() {
        let dispatcher = book_dispatcher("/book", Arc::new(RecordingService::default()));

        let result = dispatcher
            .dispatch(&action("quote.refresh.v1", None), &ctx())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn route_errors_unwrap_to_application_errors() {
        let error = EventHandlerError::Route(CommandRouteError::Application(
            ApplicationError::Catalog(CatalogError::Status(500)),
        ));

        assert_eq!(
            ApplicationError::from(error),
            ApplicationError::Catalog(CatalogError::Status(500))
        );
    }
}
