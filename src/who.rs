//! Diagnostics over a [`QueryContext`], modeling the informational payload
//! the reference deployment's `/who` endpoint returns: what site/item-type
//! a query resolved to, whether it was decontextualized, and which
//! precheck steps have completed.

use serde::Serialize;

use crate::query::QueryContext;

/// A point-in-time snapshot of a query's diagnostic state.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// The site(s) the request targeted, as configured on the request.
    pub site: String,
    /// The working item type resolved by `DetectItemType`, if it has run.
    pub item_type: String,
    /// The query actually used for retrieval, after decontextualization.
    pub decontextualized_query: String,
    /// Whether a decontextualizer judged the query needed rewriting.
    pub requires_decontextualization: bool,
    /// Whether the whole query has been marked done.
    pub query_done: bool,
    /// Named precheck steps and whether each has completed.
    pub steps: Vec<(String, bool)>,
    /// Whether the client connection is still considered alive.
    pub connection_alive: bool,
}

/// Builds a diagnostic snapshot of `ctx`'s current state.
#[must_use]
pub fn diagnostics(ctx: &QueryContext) -> Diagnostics {
    let working = ctx.snapshot();
    let steps = ctx.state.step_states();

    Diagnostics {
        site: ctx.primary_site(),
        item_type: working.item_type,
        decontextualized_query: working.decontextualized_query,
        requires_decontextualization: working.requires_decontextualization,
        query_done: working.query_done,
        steps,
        connection_alive: ctx.state.connection_alive.is_set(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SiteSelector;
    use crate::query::{GenerateMode, QueryRequest};
    use crate::test_support::test_context;

    fn request() -> QueryRequest {
        QueryRequest {
            query: "best movies".to_string(),
            prev_queries: Vec::new(),
            context_url: String::new(),
            site: SiteSelector::Sites(vec!["imdb".to_string()]),
            generate_mode: GenerateMode::None,
            decontextualized_query: None,
            query_id: "q1".to_string(),
        }
    }

    #[test]
    fn reports_primary_site_and_default_item_type() {
        let ctx = test_context(request());
        let diag = diagnostics(&ctx);
        assert_eq!(diag.site, "imdb");
        assert_eq!(diag.item_type, "Thing");
        assert!(!diag.query_done);
        assert!(diag.connection_alive);
    }

    #[test]
    fn reports_step_completion() {
        let ctx = test_context(request());
        ctx.state.start_step("Decon");
        ctx.state.step_done("Decon");
        let diag = diagnostics(&ctx);
        assert!(diag.steps.iter().any(|(name, done)| name == "Decon" && *done));
    }
}
