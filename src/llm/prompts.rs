//! Prompt templates for the typesetting completion


pub const SYSTEM_ROLE: &str = "你是一个专业的HTML排版专家，擅长将纯文本转换为美观的HTML文档。";

/// Prompt templates used for a typesetting request
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub system_role: String,
    pub typeset: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system_role: SYSTEM_ROLE.to_string(),
            typeset: TYPESET_TEMPLATE.to_string(),
        }
    }
}

/// Parameters for prompt template substitution
#[derive(Debug, Clone)]
pub struct PromptParams {
    pub content: String,
    pub intent: String,
}

/// The two messages sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesetPrompt {
    pub system: String,
    pub user: String,
}

impl PromptTemplates {
    /// Embed intent and content verbatim. Placeholders are only expanded in
    /// the template itself, never inside user-supplied text.
    pub fn render_typeset(&self, params: &PromptParams) -> TypesetPrompt {
        let user = self
            .typeset
            .split("{content}")
            .map(|part| part.replace("{intent}", &params.intent))
            .collect::<Vec<_>>()
            .join(&params.content);

        log::debug!(
            "Rendered typeset prompt: {} chars of content, intent {:?}",
            params.content.chars().count(),
            params.intent
        );

        TypesetPrompt {
            system: self.system_role.clone(),
            user,
        }
    }
}

const TYPESET_TEMPLATE: &str = "请将以下文本按照要求进行排版，返回完整的HTML代码（只返回HTML，不要有其他说明）：

排版要求：{intent}

待排版文本：
{content}

请生成美观、专业的HTML排版代码，包括适当的CSS样式。";
