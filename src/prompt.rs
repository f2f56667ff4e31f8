use serde::Deserialize;

use crate::text::truncate_chars;
use crate::types::{Article, ArticleBrief};

/// A provider-agnostic instruction template. Each slot may contain the
/// placeholders `{title}`, `{content}` and `{keywords}`; anything else
/// in braces is left verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_message: String,
    pub user_prompt: String,
    pub keywords_section: String,
    pub format_section: String,
}

/// Per-slot template overrides from configuration. Overriding one slot
/// leaves the defaults for the other slots intact.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlotOverrides {
    pub system_message: Option<String>,
    pub user_prompt: Option<String>,
    pub keywords_section: Option<String>,
    pub format_section: Option<String>,
}

impl PromptTemplate {
    /// Default template for per-article title+summary generation.
    pub fn summary_default() -> Self {
        Self {
            system_message: "You are a news editor creating engaging titles and summaries."
                .to_string(),
            user_prompt: "Given this article:\nTitle: {title}\nContent: {content}\n\n\
                          Generate:\n\
                          1. A concise, engaging title (max 80 characters)\n\
                          2. A brief summary (max 200 characters)"
                .to_string(),
            keywords_section: "\n\nFocus on these topics when they are relevant: {keywords}"
                .to_string(),
            format_section: "\n\nFormat as:\nTITLE: <title>\nSUMMARY: <summary>".to_string(),
        }
    }

    /// Default template for composing the morning editorial.
    pub fn editorial_default() -> Self {
        Self {
            system_message: "You are a morning news columnist. You write a single cohesive \
                             editorial that weaves the day's stories into one narrative."
                .to_string(),
            user_prompt: "Here are today's articles:\n\n{content}\n\n\
                          Write one cohesive morning editorial that connects these stories. \
                          Mention each story and name its source in the flow of the text."
                .to_string(),
            keywords_section: "\n\nGive extra attention to these topics: {keywords}".to_string(),
            format_section: "\n\nWrite plain markdown paragraphs. Do not append a source list; \
                             it is added separately."
                .to_string(),
        }
    }

    pub fn with_overrides(mut self, overrides: &SlotOverrides) -> Self {
        if let Some(ref slot) = overrides.system_message {
            self.system_message = slot.clone();
        }
        if let Some(ref slot) = overrides.user_prompt {
            self.user_prompt = slot.clone();
        }
        if let Some(ref slot) = overrides.keywords_section {
            self.keywords_section = slot.clone();
        }
        if let Some(ref slot) = overrides.format_section {
            self.format_section = slot.clone();
        }
        self
    }
}

/// Per-render placeholder values. Rendering is a pure function of
/// (template, context); the same inputs always produce the same output.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub title: Option<String>,
    pub content: Option<String>,
    pub keywords: Vec<String>,
    /// Character bound applied to `{content}` before substitution.
    /// `None` leaves the content unbounded (editorial digests are built
    /// from already-capped summaries).
    pub content_max: Option<usize>,
}

/// A fully rendered instruction, split by role channel. Backends without
/// a separate system channel use [`PromptRequest::combined`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
}

impl PromptRequest {
    /// Single instruction blob with the system message folded in, for
    /// backends that only have one input channel.
    pub fn combined(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}

/// Renders provider instructions from templates plus per-run values.
/// Content is truncated to `content_max` characters after HTML reduction
/// and before substitution, bounding provider payload size.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    pub summary: PromptTemplate,
    pub editorial: PromptTemplate,
    pub keywords: Vec<String>,
    pub content_max: usize,
}

impl PromptEngine {
    pub fn new(
        summary: PromptTemplate,
        editorial: PromptTemplate,
        keywords: Vec<String>,
        content_max: usize,
    ) -> Self {
        Self { summary, editorial, keywords, content_max }
    }

    /// Render one slot against a context. Substitution is textual and
    /// literal; placeholders with no recognized name stay as written.
    pub fn render_slot(&self, slot: &str, ctx: &RenderContext) -> String {
        let mut rendered = slot.to_string();
        if let Some(ref title) = ctx.title {
            rendered = rendered.replace("{title}", title);
        }
        if let Some(ref content) = ctx.content {
            let bounded = match ctx.content_max {
                Some(max) => truncate_chars(content, max),
                None => content.clone(),
            };
            rendered = rendered.replace("{content}", &bounded);
        }
        rendered.replace("{keywords}", &ctx.keywords.join(", "))
    }

    /// The keywords slot renders to the empty string when no keywords
    /// are configured, rather than erroring or leaving a dangling label.
    fn render_keywords(&self, template: &PromptTemplate, ctx: &RenderContext) -> String {
        if ctx.keywords.is_empty() {
            String::new()
        } else {
            self.render_slot(&template.keywords_section, ctx)
        }
    }

    fn render(&self, template: &PromptTemplate, ctx: &RenderContext) -> PromptRequest {
        let mut user = self.render_slot(&template.user_prompt, ctx);
        user.push_str(&self.render_keywords(template, ctx));
        user.push_str(&self.render_slot(&template.format_section, ctx));
        PromptRequest {
            system: self.render_slot(&template.system_message, ctx),
            user,
        }
    }

    /// Instruction for a per-article title+summary.
    pub fn summary_request(&self, article: &Article) -> PromptRequest {
        let ctx = RenderContext {
            title: Some(article.title.clone()),
            content: Some(article.content.clone()),
            keywords: self.keywords.clone(),
            content_max: Some(self.content_max),
        };
        self.render(&self.summary, &ctx)
    }

    /// Instruction for the editorial, built over all briefs in the order
    /// they were supplied.
    pub fn editorial_request(&self, briefs: &[ArticleBrief]) -> PromptRequest {
        let mut digest = String::new();
        for (i, brief) in briefs.iter().enumerate() {
            digest.push_str(&format!("{}. {}\n", i + 1, brief.title));
            digest.push_str(&format!("   Source: {}\n", brief.source_name));
            digest.push_str(&format!("   {}\n\n", brief.summary));
        }
        let ctx = RenderContext {
            title: None,
            content: Some(digest),
            keywords: self.keywords.clone(),
            content_max: None,
        };
        self.render(&self.editorial, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn engine() -> PromptEngine {
        PromptEngine::new(
            PromptTemplate::summary_default(),
            PromptTemplate::editorial_default(),
            Vec::new(),
            500,
        )
    }

    fn article(title: &str, content: &str) -> Article {
        Article {
            id: Article::derive_id("https://feed.example/rss", None, "https://feed.example/a"),
            title: title.to_string(),
            content: content.to_string(),
            source_name: "Example".to_string(),
            source_url: "https://feed.example/rss".to_string(),
            link: "https://feed.example/a".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn defaults_contain_required_placeholders() {
        let summary = PromptTemplate::summary_default();
        assert!(summary.user_prompt.contains("{title}"));
        assert!(summary.user_prompt.contains("{content}"));
        assert!(summary.keywords_section.contains("{keywords}"));

        let editorial = PromptTemplate::editorial_default();
        assert!(editorial.user_prompt.contains("{content}"));
    }

    #[test]
    fn renders_title_and_content() {
        let request = engine().summary_request(&article("Big Story", "Something happened."));
        assert!(request.user.contains("Big Story"));
        assert!(request.user.contains("Something happened."));
        assert!(request.user.contains("TITLE:"));
        assert!(request.system.contains("news editor"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let engine = engine();
        let article = article("Same Story", "Same content.");
        let first = engine.summary_request(&article);
        let second = engine.summary_request(&article);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_keywords_render_empty_section() {
        let request = engine().summary_request(&article("T", "C"));
        assert!(!request.user.contains("Focus on these topics"));
        // The user prompt and format section are unaffected.
        assert!(request.user.contains("Given this article"));
        assert!(request.user.contains("TITLE: <title>"));
    }

    #[test]
    fn keywords_are_joined_with_commas() {
        let mut engine = engine();
        engine.keywords = vec!["rust".to_string(), "ai".to_string()];
        let request = engine.summary_request(&article("T", "C"));
        assert!(request.user.contains("rust, ai"));
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let engine = engine();
        let ctx = RenderContext {
            title: Some("T".to_string()),
            ..Default::default()
        };
        let rendered = engine.render_slot("{title} keeps {mystery} intact", &ctx);
        assert_eq!(rendered, "T keeps {mystery} intact");
    }

    #[test]
    fn content_is_truncated_before_substitution() {
        let mut engine = engine();
        engine.content_max = 10;
        let request = engine.summary_request(&article("T", "0123456789overflow"));
        assert!(request.user.contains("0123456789"));
        assert!(!request.user.contains("overflow"));
    }

    #[test]
    fn overriding_one_slot_keeps_the_others() {
        let overrides = SlotOverrides {
            user_prompt: Some("Custom: {title} | {content}".to_string()),
            ..Default::default()
        };
        let template = PromptTemplate::summary_default().with_overrides(&overrides);
        assert_eq!(template.user_prompt, "Custom: {title} | {content}");
        assert_eq!(template.format_section, PromptTemplate::summary_default().format_section);
        assert_eq!(template.system_message, PromptTemplate::summary_default().system_message);
    }

    #[test]
    fn combined_folds_system_into_user() {
        let request = PromptRequest {
            system: "SYS".to_string(),
            user: "USER".to_string(),
        };
        assert_eq!(request.combined(), "SYS\n\nUSER");
    }

    #[test]
    fn editorial_request_numbers_briefs_in_order() {
        let briefs = vec![
            ArticleBrief {
                title: "First".to_string(),
                summary: "one".to_string(),
                source_name: "A".to_string(),
                link: "https://a".to_string(),
            },
            ArticleBrief {
                title: "Second".to_string(),
                summary: "two".to_string(),
                source_name: "B".to_string(),
                link: "https://b".to_string(),
            },
        ];
        let request = engine().editorial_request(&briefs);
        let first = request.user.find("1. First").unwrap();
        let second = request.user.find("2. Second").unwrap();
        assert!(first < second);
    }
}
