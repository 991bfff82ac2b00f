use bookbot_core::{catalog::MISSING_DESCRIPTION, Pick, GENRES};
use serde::Serialize;

pub const GENRE_SELECT_ACTION: &str = "book.genre.select.v1";
pub const GENRE_REROLL_ACTION: &str = "book.genre.reroll.v1";
pub const RANDOM_REROLL_ACTION: &str = "book.random.reroll.v1";

pub const DAILY_HEADING: &str = "오늘의 추천 도서입니다! 📚";
pub const DESCRIPTION_LIMIT: usize = 300;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    pub options: Vec<SelectOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageElement {
    pub image_url: String,
    pub alt_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockElement {
    Button(ButtonElement),
    StaticSelect(StaticSelectElement),
    Image(ImageElement),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<BlockElement>,
    },
    Actions {
        block_id: String,
        elements: Vec<BlockElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

/// Who sees a reply posted through a `response_url`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Ephemeral,
    InChannel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
    pub visibility: Visibility,
    pub replace_original: bool,
}

impl MessageTemplate {
    pub fn replacing_original(mut self) -> Self {
        self.replace_original = true;
        self
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
    visibility: Visibility,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self {
            fallback_text: fallback_text.into(),
            blocks: Vec::new(),
            visibility: Visibility::Ephemeral,
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build(block_id.into()));
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            fallback_text: self.fallback_text,
            blocks: self.blocks,
            visibility: self.visibility,
            replace_original: false,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
    accessory: Option<BlockElement>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: BlockElement) -> &mut Self {
        self.accessory = Some(element);
        self
    }

    fn build(self, block_id: String) -> Block {
        let text = if self.text.is_none() && self.fields.is_empty() {
            Some(TextObject::plain(" "))
        } else {
            self.text
        };
        Block::Section { block_id, text, fields: self.fields, accessory: self.accessory }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<BlockElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(BlockElement::Button(button));
        self
    }

    fn build(self) -> Vec<BlockElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Where a book card came from; decides visibility, heading and re-roll action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardOrigin {
    Genre,
    Random,
    Search,
    Daily,
}

pub fn book_card_message(pick: &Pick, origin: CardOrigin) -> MessageTemplate {
    let book = &pick.book;
    let title = decode_entities(book.display_title());
    let author = decode_entities(book.display_author());
    let publisher = decode_entities(book.display_publisher());
    let category = decode_entities(book.display_category(pick.genre));
    let description = truncate_chars(
        &decode_entities(book.description.as_deref().unwrap_or(MISSING_DESCRIPTION)),
        DESCRIPTION_LIMIT,
    );

    let escaped_title = escape_mrkdwn(&title);
    let title_line = match &book.link {
        Some(link) => format!("*<{link}|{}>*", escaped_title.replace('|', "/")),
        None => format!("*{escaped_title}*"),
    };

    let heading = (origin == CardOrigin::Daily).then_some(DAILY_HEADING);
    let summary = escape_mrkdwn(&format!("{title} - {author}"));
    let fallback = match heading {
        Some(heading) => format!("{heading} {summary}"),
        None => summary,
    };
    let visibility = match origin {
        CardOrigin::Genre => Visibility::Ephemeral,
        CardOrigin::Random | CardOrigin::Search | CardOrigin::Daily => Visibility::InChannel,
    };

    let mut builder = MessageBuilder::new(fallback).visibility(visibility);
    if let Some(heading) = heading {
        builder = builder.section("book.daily.heading.v1", |section| {
            section.mrkdwn(heading);
        });
    }

    builder = builder
        .section("book.card.summary.v1", |section| {
            section.mrkdwn(format!("{title_line}\n{}", escape_mrkdwn(&description)));
            if let Some(cover_url) = &book.cover_url {
                section.accessory(BlockElement::Image(ImageElement {
                    image_url: cover_url.clone(),
                    alt_text: title.clone(),
                }));
            }
        })
        .section("book.card.fields.v1", |section| {
            section
                .field(format!("*저자*\n{}", escape_mrkdwn(&author)))
                .field(format!("*출판사*\n{}", escape_mrkdwn(&publisher)))
                .field(format!("*장르*\n{}", escape_mrkdwn(&category)));
        });

    if let Some(isbn) = &book.isbn13 {
        builder = builder.context("book.card.isbn.v1", |context| {
            context.plain(format!("ISBN {isbn}"));
        });
    }

    let reroll = match (origin, pick.genre) {
        (CardOrigin::Genre, Some(genre)) => {
            Some(ButtonElement::new(GENRE_REROLL_ACTION, "다른 책 추천").value(genre.label))
        }
        (CardOrigin::Random, _) => {
            Some(ButtonElement::new(RANDOM_REROLL_ACTION, "다른 책 추천").value("random"))
        }
        _ => None,
    };
    if let Some(button) = reroll {
        builder = builder.actions("book.card.actions.v1", |actions| {
            actions.button(button.style(ButtonStyle::Primary));
        });
    }

    builder.build()
}

pub fn genre_picker_message(notice: Option<&str>) -> MessageTemplate {
    let options = GENRES
        .iter()
        .map(|genre| SelectOption {
            text: TextObject::plain(genre.label),
            value: genre.label.to_owned(),
        })
        .collect::<Vec<_>>();

    let prompt = match notice {
        Some(notice) => format!(
            ":warning: {}\n📚 장르를 선택하면 관련 도서를 추천합니다.",
            escape_mrkdwn(notice)
        ),
        None => "📚 장르를 선택하면 관련 도서를 추천합니다.".to_owned(),
    };

    MessageBuilder::new("장르를 선택해 주세요.")
        .section("book.genre.picker.v1", |section| {
            section.mrkdwn(prompt).accessory(BlockElement::StaticSelect(StaticSelectElement {
                action_id: GENRE_SELECT_ACTION.to_owned(),
                placeholder: TextObject::plain("장르를 선택해 주세요."),
                options,
            }));
        })
        .build()
}

pub fn help_message(command: &str) -> MessageTemplate {
    let genres = GENRES.iter().map(|genre| genre.label).collect::<Vec<_>>().join(", ");
    MessageBuilder::new("도서 추천 봇 도움말")
        .section("book.help.summary.v1", |section| {
            section.mrkdwn(format!(
                "*사용할 수 있는 명령어*\n• `{command} recommend` 장르를 골라 책을 추천받습니다.\n• `{command} recommend <장르>` 바로 해당 장르의 책을 추천받습니다.\n• `{command} random` 과연 어떤 책이 나올까요?\n• `{command} search <키워드>` 키워드로 책을 검색합니다.\n• `{command} help` 이 도움말을 보여줍니다."
            ));
        })
        .context("book.help.genres.v1", |context| {
            context.plain(format!("장르: {genres}"));
        })
        .build()
}

/// `summary` is escaped here; callers pass plain text with optional backtick spans.
pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    let summary = escape_mrkdwn(summary);
    MessageBuilder::new(summary.clone())
        .section("book.error.summary.v1", |section| {
            section.mrkdwn(summary);
        })
        .context("book.error.context.v1", |context| {
            context.plain(format!("요청 ID: {correlation_id}"));
        })
        .build()
}

/// Ephemeral single-line reply used when the catalog had nothing to offer.
pub fn notice_message(summary: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("book.notice.v1", |section| {
            section.plain(summary);
        })
        .build()
}

/// Decodes named and numeric HTML character references in one pass.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).replace('\u{a0}', " ")
}

pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
