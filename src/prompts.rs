//! Prompts for image description and for the document conversation.
//!
//! Callers can override the description template via
//! [`crate::config::PipelineConfig::description_prompt`]; the constants here
//! are used only when no override is provided.

use crate::pipeline::context::ContextWindow;

/// Instruction template sent with every image.
pub const DEFAULT_DESCRIPTION_PROMPT: &str = r#"You are an assistant helping to convert documents with images into accessible text formats.
Your task is to describe an image in detail, considering its context within the document.

Instructions:
1. Analyze the image carefully, considering all visual elements.
2. Provide a detailed description of the image that would be meaningful to someone who cannot see it.
3. Relate the image content to the surrounding text context where relevant.
4. Consider the user-provided context and preferences, if any, when describing the image.
5. Structure your description as follows:
   a. Brief overview
   b. Detailed description
   c. Relevance to document context
6. Use clear, concise language and avoid making assumptions about information not present in the image or context.
7. If the image contains text, include it verbatim in your description.
8. For diagrams, charts, or graphs, explain their type and the information they convey, including any relevant numbers or key data points.
9. Describe colors, shapes, spatial relationships, and any other visually significant elements.

Your description should enable a person who cannot see the image to understand its content and significance within the document."#;

/// System turn that opens every conversation.
pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about the following PDF document. Provide accurate and relevant information based on the document's content.";

/// Fixed assistant acknowledgement that closes the conversation seed.
pub const CHAT_ACKNOWLEDGEMENT: &str = "Certainly! I've reviewed the content of the PDF document you provided. I'm ready to answer any questions you have about it, provide summaries, or help you analyze specific parts of the document. What would you like to know?";

/// Assemble the user prompt for one image.
///
/// Layout: instruction template, the two context windows, then the caller's
/// instructions (omitted when blank).
pub fn description_prompt(template: &str, window: &ContextWindow, instructions: &str) -> String {
    let mut prompt = String::with_capacity(
        template.len() + window.before.len() + window.after.len() + instructions.len() + 128,
    );
    prompt.push_str(template);
    prompt.push_str("\n\nDocument Context:\n1. Text before the image:\n");
    prompt.push_str(&window.before);
    prompt.push_str("\n\n2. Text after the image:\n");
    prompt.push_str(&window.after);

    let instructions = instructions.trim();
    if !instructions.is_empty() {
        prompt.push_str("\n\nUser-provided context and preferences:\n");
        prompt.push_str(instructions);
    }
    prompt
}

/// The first user turn of a conversation: the whole document.
pub fn chat_document_turn(document: &str) -> String {
    format!(
        "Here's the content of the PDF document I want to discuss:\n\n{}\n\nPlease help me understand and analyze this document.",
        document
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> ContextWindow {
        ContextWindow {
            before: "Figure 3 shows revenue.".into(),
            after: "As seen above, Q4 dominates.".into(),
        }
    }

    #[test]
    fn prompt_contains_both_windows_in_order() {
        let p = description_prompt(DEFAULT_DESCRIPTION_PROMPT, &window(), "");
        let before = p.find("Figure 3 shows revenue.").unwrap();
        let after = p.find("As seen above").unwrap();
        assert!(before < after);
        assert!(p.starts_with("You are an assistant"));
    }

    #[test]
    fn blank_instructions_are_omitted() {
        let p = description_prompt(DEFAULT_DESCRIPTION_PROMPT, &window(), "   ");
        assert!(!p.contains("User-provided context"));
    }

    #[test]
    fn instructions_are_appended() {
        let p = description_prompt(DEFAULT_DESCRIPTION_PROMPT, &window(), "Mention the legend.");
        assert!(p.ends_with("User-provided context and preferences:\nMention the legend."));
    }

    #[test]
    fn template_demands_three_sections_and_verbatim_text() {
        assert!(DEFAULT_DESCRIPTION_PROMPT.contains("Brief overview"));
        assert!(DEFAULT_DESCRIPTION_PROMPT.contains("Detailed description"));
        assert!(DEFAULT_DESCRIPTION_PROMPT.contains("Relevance to document context"));
        assert!(DEFAULT_DESCRIPTION_PROMPT.contains("verbatim"));
    }

    #[test]
    fn document_turn_embeds_document() {
        let t = chat_document_turn("# Title");
        assert!(t.contains("\n\n# Title\n\n"));
    }
}
