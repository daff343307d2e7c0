//! Canned prompt templates.
//!
//! Prompts are guidance strings, not operations: they tell a model how to
//! use the search tools well for a given intent.

use std::collections::HashMap;

use rmcp::model::{
    GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageRole,
};

/// The prompt catalog advertised by `list_prompts`.
pub fn catalog() -> Vec<Prompt> {
    vec![
        Prompt::new(
            "find_by_exact_tags",
            Some("Find conversations carrying an exact set of tags"),
            Some(vec![
                PromptArgument {
                    name: "tags".into(),
                    title: None,
                    description: Some(
                        "Comma-separated key:value pairs, e.g. department:sales,priority:high"
                            .into(),
                    ),
                    required: Some(true),
                },
            ]),
        ),
        Prompt::new(
            "find_by_semantic_search",
            Some("Find conversations by meaning rather than exact wording"),
            Some(vec![
                PromptArgument {
                    name: "topic".into(),
                    title: None,
                    description: Some("What the conversations should be about".into()),
                    required: Some(true),
                },
                PromptArgument {
                    name: "threshold".into(),
                    title: None,
                    description: Some("Minimum similarity from 0 to 1 (default 0.7)".into()),
                    required: Some(false),
                },
            ]),
        ),
        Prompt::new(
            "help_me_search",
            Some("Pick the right search mode for a vague information need"),
            Some(vec![PromptArgument {
                name: "need".into(),
                title: None,
                description: Some("Plain-language description of what you are looking for".into()),
                required: Some(false),
            }]),
        ),
    ]
}

/// Render one prompt by name.
pub fn render(name: &str, arguments: Option<HashMap<String, String>>) -> Option<GetPromptResult> {
    let args = arguments.unwrap_or_default();
    match name {
        "find_by_exact_tags" => {
            let tags = args.get("tags").map_or("<key:value,...>", String::as_str);
            Some(guidance(
                "Exact-tag lookup",
                format!(
                    "Use the search_by_tags tool with this tag set: {tags}. \
                     Tag matching is exact and AND-combined: a vCon is returned only \
                     when every key carries exactly the given value. Keys and values \
                     are case-sensitive. Use get_unique_tags first if you are unsure \
                     which tags exist."
                ),
            ))
        }
        "find_by_semantic_search" => {
            let topic = args.get("topic").map_or("<topic>", String::as_str);
            let threshold = args.get("threshold").map_or("0.7", String::as_str);
            Some(guidance(
                "Semantic search",
                format!(
                    "Use search_vcons_semantic with query \"{topic}\" and threshold \
                     {threshold}. The engine matches meaning, not wording, over \
                     subjects, dialog text and analysis bodies. Recent writes may not \
                     be indexed yet; if results look incomplete, retry in a moment or \
                     lower the threshold. Combine with search_vcons_hybrid when exact \
                     terms also matter."
                ),
            ))
        }
        "help_me_search" => {
            let need = args.get("need").map_or("your question", String::as_str);
            Some(guidance(
                "Choosing a search mode",
                format!(
                    "To find {need}: use search_by_tags when you know exact labels \
                     (cheapest); search_vcons for keyword matches over subjects, \
                     parties and transcripts; search_vcons_semantic for \
                     meaning-based matches; search_vcons_hybrid when both exact \
                     terms and meaning matter. All modes accept start_date, \
                     end_date, a tag filter and a limit, and response_format of \
                     full, metadata, or ids_only to control payload size."
                ),
            ))
        }
        _ => None,
    }
}

fn guidance(description: &str, text: String) -> GetPromptResult {
    GetPromptResult {
        description: Some(description.to_owned()),
        messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
    }
}
