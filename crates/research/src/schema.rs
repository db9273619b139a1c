//! Wire schemas for the JSON the planner and the source filter return.

use serde::Deserialize;
use shared::research::{CustomSearchTask, GeneralQueries, Plan};

#[derive(Debug, Deserialize)]
pub struct PlanResponse {
    pub plan_summary: PlanSummary,
    pub general_queries: GeneralQueriesWire,
    #[serde(default)]
    pub custom_search_tasks: Vec<CustomSearchTaskWire>,
}

#[derive(Debug, Deserialize)]
pub struct PlanSummary {
    pub domain: String,
    pub strategy: String,
}

#[derive(Debug, Deserialize)]
pub struct GeneralQueriesWire {
    pub chinese: Vec<String>,
    pub english: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomSearchTaskWire {
    pub cse_index: usize,
    pub query: String,
}

impl PlanResponse {
    pub fn into_plan(self) -> Plan {
        let clean = |queries: Vec<String>| -> Vec<String> {
            queries
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect()
        };

        Plan {
            domain: self.plan_summary.domain,
            strategy: self.plan_summary.strategy,
            general_queries: GeneralQueries {
                primary_language: clean(self.general_queries.chinese),
                secondary_language: clean(self.general_queries.english),
            },
            custom_search_tasks: self
                .custom_search_tasks
                .into_iter()
                .map(|t| CustomSearchTask {
                    engine_index: t.cse_index,
                    query: t.query,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FilterResponse {
    pub relevant_indices: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::parse_json;

    #[test]
    fn test_plan_response_to_plan() {
        let raw = r#"{
            "plan_summary": {"domain": "Drug formulation", "strategy": "Search labels then regional registries."},
            "general_queries": {"chinese": ["奥希替尼 处方", "  "], "english": ["osimertinib formulation"]},
            "custom_search_tasks": [{"cse_index": 0, "query": "Tagrisso"}]
        }"#;
        let plan = parse_json::<PlanResponse>(raw, "search plan").unwrap().into_plan();
        assert_eq!(plan.domain, "Drug formulation");
        assert_eq!(plan.general_queries.primary_language, vec!["奥希替尼 处方"]);
        assert_eq!(plan.general_queries.secondary_language, vec!["osimertinib formulation"]);
        assert_eq!(plan.custom_search_tasks[0].engine_index, 0);
    }

    #[test]
    fn test_plan_without_custom_tasks() {
        let raw = r#"{
            "plan_summary": {"domain": "d", "strategy": "s"},
            "general_queries": {"chinese": [], "english": ["q"]}
        }"#;
        let plan = parse_json::<PlanResponse>(raw, "search plan").unwrap().into_plan();
        assert!(plan.custom_search_tasks.is_empty());
    }

    #[test]
    fn test_plan_shape_mismatch() {
        let missing_summary = r#"{"general_queries": {"chinese": [], "english": []}}"#;
        assert!(parse_json::<PlanResponse>(missing_summary, "search plan").is_err());

        let negative_index = r#"{
            "plan_summary": {"domain": "d", "strategy": "s"},
            "general_queries": {"chinese": [], "english": []},
            "custom_search_tasks": [{"cse_index": -1, "query": "q"}]
        }"#;
        assert!(parse_json::<PlanResponse>(negative_index, "search plan").is_err());
    }

    #[test]
    fn test_filter_response() {
        let parsed = parse_json::<FilterResponse>(r#"{"relevant_indices": [0, 2, 9]}"#, "source selection")
            .unwrap();
        assert_eq!(parsed.relevant_indices, vec![0, 2, 9]);
        assert!(parse_json::<FilterResponse>(r#"{"indices": [0]}"#, "source selection").is_err());
    }
}
