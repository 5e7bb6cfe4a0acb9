use chem_domain::{ChemistryEvaluator, FilterThresholds, MutationLibrary, RuleCategory, RunConfig, ScoringService};

#[test]
fn test_evaluate_then_score_is_reproducible() {
    let evaluator = ChemistryEvaluator::new();
    let thresholds = FilterThresholds::default();
    let first = evaluator.evaluate("OCC").unwrap();
    let card = ScoringService::score(&first.descriptors, &thresholds);
    for _ in 0..5 {
        let again = evaluator.evaluate("C(C)O").unwrap();
        assert_eq!(again, first);
        assert_eq!(ScoringService::score(&again.descriptors, &thresholds), card);
    }
    assert_eq!(card.violations, 0);
    assert_eq!(card.score, first.descriptors.qed);
}

#[test]
fn test_lipophilic_structure_collects_violations() {
    // Cadena alquílica larga: LogP y enlaces rotables por encima del umbral
    let evaluator = ChemistryEvaluator::new();
    let evaluation = evaluator.evaluate("CCCCCCCCCCCCCCCCCCCCCC").unwrap();
    let thresholds = FilterThresholds::default();
    let card = ScoringService::score(&evaluation.descriptors, &thresholds);
    assert!(card.violations >= 2, "{card:?}");
    assert!(!card.passed_screening);
    let expected = ((evaluation.descriptors.qed - 0.1 * f64::from(card.violations)) * 10_000.0).round() / 10_000.0;
    assert_eq!(card.score, expected);
}

#[test]
fn test_every_rule_product_on_a_seed_set_is_valid_or_typed_error() {
    let evaluator = ChemistryEvaluator::new();
    let library = MutationLibrary::builtin().unwrap();
    for seed in ["CCO", "Fc1ccccc1", "Nc1ccc(O)cc1", "CN1C=NC2=C1C(=O)N(C)C(=O)N2C"] {
        let graph = evaluator.structure(seed).unwrap();
        for rule in library.select(&RuleCategory::ALL) {
            for product in rule.apply(seed, &graph, 32) {
                match product {
                    Ok(raw) => {
                        if let Ok(canonical) = evaluator.canonicalize(&raw) {
                            assert_eq!(evaluator.canonicalize(&canonical).unwrap(), canonical);
                        }
                    }
                    Err(e) => assert_eq!(e.rule(), rule.label()),
                }
            }
        }
    }
}

#[test]
fn test_scenario_config_is_valid() {
    let config = RunConfig::new(vec!["CCO".to_string()], 1, 5, 3);
    assert!(config.validate().is_ok());
    let bad = RunConfig::new(vec!["CCO".to_string()], 1, 2, 3);
    assert!(bad.validate().is_err());
}
