//! Prompts for the three model-backed stages: planning, source selection and
//! synthesis.

use shared::research::{ArticleSummary, SearchResult};
use shared::settings::CustomEngine;

/// Planning prompt. The model answers with the JSON object described in the
/// OUTPUT FORMAT section, parsed by [`crate::schema::PlanResponse`].
pub fn plan_prompt(question: &str, role: &str, engines: &[CustomEngine]) -> String {
    let engine_context = if engines.is_empty() {
        "    (No custom search engines configured)".to_string()
    } else {
        engines
            .iter()
            .enumerate()
            .map(|(i, engine)| {
                format!(
                    "    - Index: {}\n      Description: {}\n      Language: {}",
                    i, engine.description, engine.language
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"# PERSONA & ROLE
Your designated expert persona for this entire task is: **{role}**.
You are a sub-task expert in creating precise search plans from this persona's perspective.

# AVAILABLE SEARCH ENGINES
1.  **Tavily Search**: A general-purpose web search engine. Good for broad topics.
2.  **Google Custom Search Engines (CSEs)**: Specialized search engines. Use them ONLY when the user's question clearly aligns with a CSE's description.
{engine_context}

# TASK
Based on the user's question and your persona, generate a JSON object outlining the search plan.
1.  **Analysis**: Define the specific *domain* of this research and summarize the search *strategy* in one sentence.
2.  **General Queries**: Create 1-3 concise queries for the general-purpose search engine (Tavily). Generate both Chinese and English versions.
3.  **Custom Search Tasks**: Analyze if any configured CSEs are highly relevant. If so, create 1-3 specific queries for them, inspired by the CSE's description. If not, this array should be empty.

# CSE QUERY GENERATION GUIDELINES & EXAMPLE
Analyze the CSE's description for keywords that suggest specific search patterns.
- **Example CSE Description**: "Drug formulation search; trade names match more precisely; Russian sources list excipient amounts"
- **Example User Question**: "Osimertinib"
- **GOOD Example Query Set for this CSE**: ["Osimertinib formulation", "Tagrisso", "Osimertinib site:ru"]
This is a good example because it includes the scientific name, a known trade name ("Tagrisso"), and a specialized query using hints from the description.

# OUTPUT FORMAT (Strict JSON)
Your entire response MUST be a single, valid JSON object, with no markdown formatting.
{{
  "plan_summary": {{
    "domain": "The specific field of knowledge, e.g., 'Drug Formulation Information Retrieval'.",
    "strategy": "A brief, one-sentence summary of the search approach from the expert persona's perspective."
  }},
  "general_queries": {{
    "chinese": ["中文通用查询1"],
    "english": ["English general query 1"]
  }},
  "custom_search_tasks": [
    {{
      "cse_index": 0,
      "query": "A specific query tailored for the CSE at index 0"
    }}
  ]
}}

# USER QUESTION
{question}"#
    )
}

/// Source-selection prompt. Sources are numbered from 0 here, matching the
/// indices the model must return.
pub fn filter_prompt(question: &str, results: &[SearchResult]) -> String {
    let search_context = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[Source {}]\nURL: {}\nSnippet: {}\n---", i, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"# TASK
You are a research assistant. Your goal is to identify the most relevant search results that are likely to contain a direct and comprehensive answer to the user's question.

# INSTRUCTIONS
1.  Analyze the user's question and the provided search result snippets.
2.  Select the top 1 to 5 most promising search results. Prioritize results that seem comprehensive and directly related to the core of the question.
3.  Return your answer as a single, valid JSON object with a single key "relevant_indices", which is an array of the integer indexes of the selected sources.

# OUTPUT FORMAT (Strict JSON)
{{
  "relevant_indices": [0, 2, 4]
}}

# USER QUESTION
{question}

# SEARCH RESULTS
{search_context}"#
    )
}

/// Final report prompt. Snippets are numbered from 1 so `[n]` citations line
/// up with the source list shown to the reader.
pub fn synthesis_prompt(
    question: &str,
    results: &[SearchResult],
    articles: &[ArticleSummary],
    language: &str,
) -> String {
    let snippets = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Source {}]\nURL: {}\nOriginal Snippet: {}\n---",
                i + 1,
                r.url,
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let deep_reads = articles
        .iter()
        .map(|a| {
            format!(
                "[Deep Read of Source {}]\nURL: {}\nFull Content: {}\n---",
                a.original_index + 1,
                a.url,
                a.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"# ROLE
You are a professional research analyst. Your task is to synthesize **all** the provided information into a comprehensive and well-structured answer to the user's original question. You have two types of information: initial search result snippets and the full text of the most relevant articles.

# INSTRUCTIONS
1.  **Language**: Write your entire response in **{language}**.
2.  **Content**: Base your answer ONLY on the information provided in the "SEARCH RESULT SNIPPETS" and "DEEP READ CONTENT" below. Prioritize information from the deep read content as it is more detailed.
3.  **Citation**: For every piece of information or claim, you MUST cite the source by adding its number in brackets, like [1]. If a single sentence uses information from multiple sources, cite them all, like [1][3][5].
4.  **Structure**: Format your answer in Markdown. Use headings, bullet points, and bold text to create a clear and readable report.
5.  **Completeness**: If the provided information is insufficient to fully answer the question, explicitly state what is missing. Do not invent information.

# SEARCH RESULT SNIPPETS
---
{snippets}
---

# DEEP READ CONTENT
---
{deep_reads}
---

# USER's ORIGINAL QUESTION
{question}"#
    )
}
