use std::sync::Arc;

use async_trait::async_trait;
use bookbot_core::{find_genre, ApplicationError, Genre};
use thiserror::Error;

use crate::blocks::{self, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
    pub response_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookCommand {
    Recommend { genre: Option<String> },
    Random,
    Search { keyword: String },
    Help,
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

pub const GENRE_NOT_FOUND: &str = "❌ 해당 장르의 책을 찾지 못했습니다. 다시 시도해 주세요.";
pub const RANDOM_NOT_FOUND: &str = "책을 불러올 수 없습니다. API Key 또는 카테고리를 확인하세요.";
pub const SEARCH_NOT_FOUND: &str = "해당 키워드로 책을 찾지 못했습니다.";

pub fn normalize_book_command(
    payload: SlashCommandPayload,
    expected_command: &str,
) -> Result<CommandEnvelope, CommandParseError> {
    if !payload.command.trim().eq_ignore_ascii_case(expected_command.trim()) {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let text = payload.text.trim().to_owned();
    let (verb, args) = split_verb(&text);

    Ok(CommandEnvelope {
        command: payload.command.trim().to_owned(),
        verb,
        args,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        request_id: payload.request_id,
    })
}

fn split_verb(text: &str) -> (String, String) {
    let mut parts = text.split_whitespace();
    let verb = parts.next().unwrap_or("help").to_lowercase();
    let args = parts.collect::<Vec<_>>().join(" ");
    (verb, args)
}

fn classify_book_command(verb: &str, args: String) -> BookCommand {
    match verb {
        "recommend" | "genre" | "추천" | "장르" => {
            BookCommand::Recommend { genre: if args.is_empty() { None } else { Some(args) } }
        }
        "random" | "랜덤" => BookCommand::Random,
        "search" | "검색" => BookCommand::Search { keyword: args },
        "help" | "도움말" => BookCommand::Help,
        _ => BookCommand::Unknown { verb: verb.to_owned() },
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: BookCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let request_id = envelope.request_id.as_str();
        match classify_book_command(&envelope.verb, envelope.args.clone()) {
            BookCommand::Recommend { genre: None } => Ok(blocks::genre_picker_message(None)),
            BookCommand::Recommend { genre: Some(label) } => match find_genre(&label) {
                Some(genre) => self.service.recommend_genre(genre, request_id).await,
                None => Ok(blocks::genre_picker_message(Some(&format!(
                    "`{label}` 장르를 찾지 못했습니다."
                )))),
            },
            BookCommand::Random => self.service.random_book(request_id).await,
            BookCommand::Search { keyword } if keyword.trim().is_empty() => {
                Ok(blocks::error_message(
                    &format!(
                        "검색할 키워드를 입력해 주세요. 예: `{} search 데미안`",
                        envelope.command
                    ),
                    request_id,
                ))
            }
            BookCommand::Search { keyword } => {
                self.service.search_books(&keyword, request_id).await
            }
            BookCommand::Help => Ok(blocks::help_message(&envelope.command)),
            BookCommand::Unknown { verb } => Ok(blocks::error_message(
                &format!(
                    "지원하지 않는 명령어입니다: `{command} {verb}`. `{command} help`를 입력해 보세요.",
                    command = envelope.command
                ),
                request_id,
            )),
        }
    }
}

#[async_trait]
pub trait BookCommandService: Send + Sync {
    async fn recommend_genre(
        &self,
        genre: &'static Genre,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn random_book(&self, request_id: &str) -> Result<MessageTemplate, CommandRouteError>;

    async fn search_books(
        &self,
        keyword: &str,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

#[async_trait]
impl<S> BookCommandService for Arc<S>
where
    S: BookCommandService + ?Sized,
{
    async fn recommend_genre(
        &self,
        genre: &'static Genre,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        (**self).recommend_genre(genre, request_id).await
    }

    async fn random_book(&self, request_id: &str) -> Result<MessageTemplate, CommandRouteError> {
        (**self).random_book(request_id).await
    }

    async fn search_books(
        &self,
        keyword: &str,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        (**self).search_books(keyword, request_id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bookbot_core::Genre;

    use super::{
        classify_book_command, normalize_book_command, split_verb, BookCommand,
        BookCommandService, CommandEnvelope, CommandParseError, CommandRouteError, CommandRouter,
        SlashCommandPayload,
    };
    use crate::blocks::{self, Block, BlockElement, MessageTemplate, TextObject};

    #[derive(Default)]
    pub(crate) struct RecordingService {
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl RecordingService {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl BookCommandService for RecordingService {
        async fn recommend_genre(
            &self,
            genre: &'static Genre,
            _request_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("genre:{}", genre.label));
            Ok(blocks::help_message("/book"))
        }

        async fn random_book(
            &self,
            _request_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push("random".to_owned());
            Ok(blocks::help_message("/book"))
        }

        async fn search_books(
            &self,
            keyword: &str,
            _request_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(format!("search:{keyword}"));
            Ok(blocks::help_message("/book"))
        }
    }

    fn envelope(verb: &str, args: &str) -> CommandEnvelope {
        CommandEnvelope {
            command: "/book".to_owned(),
            verb: verb.to_owned(),
            args: args.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            request_id: format!("req-{verb}"),
        }
    }

    fn section_text(message: &MessageTemplate) -> String {
        match &message.blocks[0] {
            Block::Section { text: Some(TextObject::Mrkdwn { text }), .. } => text.clone(),
            other => panic!("expected markdown section, got {other:?}"),
        }
    }

    fn parse_book_command(input: &str) -> BookCommand {
        let (verb, args) = split_verb(input.trim());
        classify_book_command(&verb, args)
    }

    #[test]
    fn parse_book_command_recognizes_verbs_and_aliases() {
        assert_eq!(parse_book_command(""), BookCommand::Help);
        assert_eq!(parse_book_command("help"), BookCommand::Help);
        assert_eq!(parse_book_command("recommend"), BookCommand::Recommend { genre: None });
        assert_eq!(
            parse_book_command("추천 장르소설"),
            BookCommand::Recommend { genre: Some("장르소설".to_owned()) }
        );
        assert_eq!(parse_book_command("RANDOM"), BookCommand::Random);
        assert_eq!(parse_book_command("랜덤"), BookCommand::Random);
        assert_eq!(
            parse_book_command("search  해리   포터 "),
            BookCommand::Search { keyword: "해리 포터".to_owned() }
        );
        assert_eq!(
            parse_book_command("검색 데미안"),
            BookCommand::Search { keyword: "데미안".to_owned() }
        );
        assert_eq!(
            parse_book_command("borrow"),
            BookCommand::Unknown { verb: "borrow".to_owned() }
        );
    }

    #[test]
    fn normalize_book_command_rejects_other_commands() {
        let payload = SlashCommandPayload {
            command: "/quote".to_owned(),
            text: "random".to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            request_id: "req-1".to_owned(),
            response_url: None,
        };

        assert_eq!(
            normalize_book_command(payload, "/book"),
            Err(CommandParseError::UnsupportedCommand("/quote".to_owned()))
        );
    }

    #[test]
    fn normalize_book_command_splits_verb_and_args() {
        let envelope = normalize_book_command(
            SlashCommandPayload {
                command: "/book".to_owned(),
                text: "  Search   채식주의자 ".to_owned(),
                channel_id: "C123".to_owned(),
                user_id: "U123".to_owned(),
                request_id: "req-123".to_owned(),
                response_url: Some("https://hooks.slack.com/commands/1".to_owned()),
            },
            "/book",
        )
        .expect("normalized");

        assert_eq!(envelope.verb, "search");
        assert_eq!(envelope.args, "채식주의자");
        assert_eq!(envelope.request_id, "req-123");
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        let router = CommandRouter::new(RecordingService::default());

        for (verb, args) in [("recommend", "경제"), ("random", ""), ("search", "토지")] {
            router.route(envelope(verb, args)).await.expect("route");
        }

        assert_eq!(router.service.calls(), vec!["genre:경제", "random", "search:토지"]);
    }

    #[tokio::test]
    async fn recommend_without_known_genre_shows_picker() {
        let router = CommandRouter::new(RecordingService::default());

        let picker = router.route(envelope("recommend", "")).await.expect("picker");
        assert!(matches!(
            &picker.blocks[0],
            Block::Section { accessory: Some(BlockElement::StaticSelect(_)), .. }
        ));

        let unknown = router.route(envelope("recommend", "판타지")).await.expect("picker");
        assert!(section_text(&unknown).contains("`판타지` 장르를 찾지 못했습니다."));
        assert!(router.service.calls().is_empty());
    }

    #[tokio::test]
    async fn search_without_keyword_is_rejected_before_catalog_call() {
        let router = CommandRouter::new(RecordingService::default());

        let message = router.route(envelope("search", "")).await.expect("route");

        assert!(section_text(&message).contains("검색할 키워드를 입력해 주세요."));
        assert!(router.service.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_verb_points_to_help() {
        let router = CommandRouter::new(RecordingService::default());

        let message = router.route(envelope("borrow", "")).await.expect("route");

        assert!(section_text(&message).contains("`/book borrow`"));
        assert!(section_text(&message).contains("`/book help`"));
    }

    #[tokio::test]
    async fn unknown_verb_is_escaped_before_reaching_mrkdwn() {
        let router = CommandRouter::new(RecordingService::default());

        let message = router.route(envelope("<!channel>", "")).await.expect("route");
        let text = section_text(&message);

        assert!(text.contains("`/book &lt;!channel&gt;`"));
        assert!(!text.contains("<!channel>"));
        assert!(!message.fallback_text.contains("<!channel>"));
    }
}
