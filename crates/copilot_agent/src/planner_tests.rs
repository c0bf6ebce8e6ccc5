//! Unit tests for planner module.
//!
//! Note: end-to-end hybrid runs are in tests/pipeline_tests.rs

#[cfg(test)]
mod tests {
    use crate::config::{CampaignConfig, PlannerConfig};
    use crate::planner::*;
    use chrono::NaiveDate;
    use copilot_shared::{KpiFormula, RetrievedPassage};

    fn passage(chunk: &str, text: &str, score: f64) -> RetrievedPassage {
        let doc = chunk.split("::").next().unwrap();
        RetrievedPassage::new(doc, chunk, text, score)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_campaign_from_question() {
        let c = Planner::default().extract(
            "During 'Summer Beverages 1997', which category had the highest total quantity sold?",
            &[],
        );
        let range = c.date_range.unwrap();
        assert_eq!(range.label, "Summer Beverages 1997");
        assert_eq!(range.start, date(1997, 6, 1));
        assert_eq!(range.end, date(1997, 6, 30));
        assert!(c.category.is_none());
    }

    #[test]
    fn test_kpi_alias_and_campaign() {
        let c = Planner::default().extract("What was the AOV during Winter Classics 1997?", &[]);
        assert_eq!(c.formula, Some(KpiFormula::AverageOrderValue));
        assert_eq!(c.date_range.unwrap().start, date(1997, 12, 1));
    }

    #[test]
    fn test_bare_year() {
        let c = Planner::default().extract("Top customer by gross margin in 1997", &[]);
        let range = c.date_range.unwrap();
        assert_eq!(range.label, "1997");
        assert_eq!(range.end, date(1997, 12, 31));
        assert_eq!(c.formula, Some(KpiFormula::GrossMargin));
    }

    #[test]
    fn test_year_detection_can_be_disabled() {
        let config = PlannerConfig {
            detect_years: false,
            ..PlannerConfig::default()
        };
        let c = Planner::new(&config).extract("Revenue in 1998", &[]);
        assert!(c.date_range.is_none());
    }

    #[test]
    fn test_category_whole_word_case_insensitive() {
        let planner = Planner::default();
        assert_eq!(
            planner.extract("total revenue for dairy products", &[]).category,
            Some("Dairy Products".to_string())
        );
        assert_eq!(
            planner.extract("Revenue from Grains/Cereals?", &[]).category,
            Some("Grains/Cereals".to_string())
        );
        // Substring of a longer word does not count
        assert!(planner.extract("Seafoodish snacks", &[]).category.is_none());
    }

    #[test]
    fn test_unmatched_category_is_absent() {
        let c = Planner::default().extract("Total revenue for the Gadgets category in 1997", &[]);
        assert_eq!(c.category, None);
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_category_never_from_passages() {
        let passages = vec![passage("catalog::chunk0", "Beverages are our best sellers.", 0.9)];
        let c = Planner::default().extract("What is the total revenue?", &passages);
        assert!(c.category.is_none());
    }

    #[test]
    fn test_date_range_falls_back_to_single_campaign_passage() {
        let passages = vec![
            passage(
                "marketing_calendar::chunk0",
                "Summer Beverages 1997 runs in June. Winter Classics 1997 runs in December.",
                0.8,
            ),
            passage(
                "marketing_calendar::chunk2",
                "## Winter Classics 1997\n- Dates: 1997-12-01 to 1997-12-31",
                0.5,
            ),
        ];
        let c = Planner::default().extract("What was the holiday campaign revenue?", &passages);
        // First passage names two campaigns, so the second one decides
        assert_eq!(c.date_range.unwrap().label, "Winter Classics 1997");
        assert_eq!(c.evidence, vec!["marketing_calendar::chunk0", "marketing_calendar::chunk2"]);
    }

    #[test]
    fn test_question_beats_passages() {
        let passages = vec![passage(
            "marketing_calendar::chunk1",
            "Winter Classics 1997: 1997-12-01 to 1997-12-31",
            0.9,
        )];
        let c = Planner::default().extract("Revenue during Summer Beverages 1997", &passages);
        assert_eq!(c.date_range.unwrap().label, "Summer Beverages 1997");
        assert!(c.evidence.is_empty());
    }

    #[test]
    fn test_formula_from_passage() {
        let passages = vec![passage(
            "kpi_definitions::chunk1",
            "Gross Margin = SUM((UnitPrice - CostOfGoods) * Quantity * (1 - Discount))",
            0.7,
        )];
        let c = Planner::default().extract("Which customer was most profitable?", &passages);
        assert_eq!(c.formula, Some(KpiFormula::GrossMargin));
        assert_eq!(c.evidence, vec!["kpi_definitions::chunk1"]);
    }

    #[test]
    fn test_nothing_matches() {
        let c = Planner::default().extract("Hello there", &[]);
        assert!(c.is_empty());
        assert!(c.evidence.is_empty());
    }

    #[test]
    fn test_custom_campaign_table() {
        let config = PlannerConfig {
            campaigns: vec![CampaignConfig {
                name: "Spring Promo".into(),
                aliases: vec!["spring sale".into()],
                start: date(1998, 3, 1),
                end: date(1998, 3, 31),
            }],
            ..PlannerConfig::default()
        };
        let c = Planner::new(&config).extract("AOV for the Spring Sale", &[]);
        assert_eq!(c.date_range.unwrap().start, date(1998, 3, 1));
    }

    #[test]
    fn test_deterministic() {
        let planner = Planner::default();
        let q = "Beverages revenue during Summer Beverages 1997 using Gross Margin";
        assert_eq!(planner.extract(q, &[]), planner.extract(q, &[]));
    }
}
