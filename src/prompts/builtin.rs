//! Compiled-in default prompt templates, used whenever no site/item-type
//! override is registered. Mirrors the reference implementation's
//! hardcoded `RANKING_PROMPT` fallback and the analogous default strings
//! for decontextualization, analyzers, and synthesis.

/// Returns the compiled-in default template for `name`, or `None` if this
/// crate has no default for that prompt name.
#[must_use]
pub fn default_template(name: &str) -> Option<&'static str> {
    match name {
        "RankingPrompt" => Some(RANKING_PROMPT),
        "RankingPromptForGenerate" => Some(RANKING_PROMPT_FOR_GENERATE),
        "PrevQueryDecontextualizer" => Some(PREV_QUERY_DECONTEXTUALIZER_PROMPT),
        "DecontextualizeContextPrompt" => Some(DECONTEXTUALIZE_CONTEXT_PROMPT),
        "FullDecontextualizePrompt" => Some(FULL_DECONTEXTUALIZE_PROMPT),
        "DetectItemTypePrompt" => Some(DETECT_ITEM_TYPE_PROMPT),
        "DetectMultiItemTypeQueryPrompt" => Some(DETECT_MULTI_ITEM_TYPE_QUERY_PROMPT),
        "DetectQueryTypePrompt" => Some(DETECT_QUERY_TYPE_PROMPT),
        "RelevanceDetectionPrompt" => Some(RELEVANCE_DETECTION_PROMPT),
        "MemoryPrompt" => Some(MEMORY_PROMPT),
        "RequiredInfoPrompt" => Some(REQUIRED_INFO_PROMPT),
        "SummarizeResultsPrompt" => Some(SUMMARIZE_RESULTS_PROMPT),
        "SynthesizePromptForGenerate" => Some(SYNTHESIZE_PROMPT_FOR_GENERATE),
        "DescriptionPromptForGenerate" => Some(DESCRIPTION_PROMPT_FOR_GENERATE),
        _ => None,
    }
}

const RANKING_PROMPT: &str = "Assign a score between 0 and 100 to the following item \
based on how relevant it is to the user's question. If the score is above 50, provide a \
short description of the item highlighting the relevance to the user's question, without \
mentioning the user's question or the score.\n\
The user's question is: {request.query}. The item's description is: {item.description}\n\
Respond as JSON: {\"score\": <integer 0-100>, \"description\": <string>}";

const RANKING_PROMPT_FOR_GENERATE: &str = "Assign a score between 0 and 100 to the following \
item based on how useful it would be as supporting evidence for answering the user's question.\n\
The user's question is: {request.query}. The item's description is: {item.description}\n\
Respond as JSON: {\"score\": <integer 0-100>, \"description\": <string>}";

const PREV_QUERY_DECONTEXTUALIZER_PROMPT: &str = "Given the previous queries: {prev_queries} \
and the latest query: {request.query}, determine whether the latest query depends on the \
previous ones to be understood standalone.\n\
Respond as JSON: {\"requires_decontextualization\": \"True\"|\"False\", \"decontextualized_query\": <string>}";

const DECONTEXTUALIZE_CONTEXT_PROMPT: &str = "Given the page context: {context_description} \
and the query: {request.query}, produce a standalone version of the query.\n\
Respond as JSON: {\"requires_decontextualization\": \"True\"|\"False\", \"decontextualized_query\": <string>}";

const FULL_DECONTEXTUALIZE_PROMPT: &str = "Given the previous queries: {prev_queries}, the \
page context: {context_description}, and the query: {request.query}, produce a standalone \
version of the query.\n\
Respond as JSON: {\"requires_decontextualization\": \"True\"|\"False\", \"decontextualized_query\": <string>}";

const DETECT_ITEM_TYPE_PROMPT: &str = "What schema.org item type is the user seeking with \
this query: {request.query}?\nRespond as JSON: {\"item_type\": <string>}";

const DETECT_MULTI_ITEM_TYPE_QUERY_PROMPT: &str = "Does this query ask about more than one \
kind of item: {request.query}?\nRespond as JSON: {\"is_multi_type\": true|false}";

const DETECT_QUERY_TYPE_PROMPT: &str = "Classify this query: {request.query}.\n\
Respond as JSON: {\"query_type\": <string>}";

const RELEVANCE_DETECTION_PROMPT: &str = "Is this query relevant to a corpus about {item_type}: \
{request.query}?\nRespond as JSON: {\"is_relevant\": true|false}";

const MEMORY_PROMPT: &str = "Does answering this query require remembering something from \
earlier in the conversation: {request.query}?\nRespond as JSON: {\"requires_memory\": true|false}";

const REQUIRED_INFO_PROMPT: &str = "Does this query provide enough information to answer, or \
is something required missing: {request.query}?\n\
Respond as JSON: {\"has_required_info\": true|false, \"missing\": <string>}";

const SUMMARIZE_RESULTS_PROMPT: &str = "Summarize these top results for the query \
{request.query}: {results}.\nRespond as JSON: {\"summary\": <string>}";

const SYNTHESIZE_PROMPT_FOR_GENERATE: &str = "Using the following items: {items}, write a \
direct answer to the question: {request.query}. Cite the URLs of items you used.\n\
Respond as JSON: {\"answer\": <string>, \"urls\": [<string>, ...]}";

const DESCRIPTION_PROMPT_FOR_GENERATE: &str = "Given the item: {item.description} and the \
answer: {answer} it supports for the question {request.query}, write a one-sentence \
description of why this item is relevant.\n\
Respond as JSON: {\"description\": <string>}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_prompt_name_has_a_default() {
        let names = [
            "RankingPrompt",
            "RankingPromptForGenerate",
            "PrevQueryDecontextualizer",
            "DecontextualizeContextPrompt",
            "FullDecontextualizePrompt",
            "DetectItemTypePrompt",
            "DetectMultiItemTypeQueryPrompt",
            "DetectQueryTypePrompt",
            "RelevanceDetectionPrompt",
            "MemoryPrompt",
            "RequiredInfoPrompt",
            "SummarizeResultsPrompt",
            "SynthesizePromptForGenerate",
            "DescriptionPromptForGenerate",
        ];
        for name in names {
            assert!(default_template(name).is_some(), "missing default for {name}");
        }
    }

    #[test]
    fn unknown_name_has_no_default() {
        assert!(default_template("NotARealPrompt").is_none());
    }
}
