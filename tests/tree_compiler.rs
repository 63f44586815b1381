use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use taphold::config::{Backend, CodegenConfig, Dialect};
use taphold::{DecisionTreeNode, FeatureSchema, Mode, TapholdError, TreeCompiler};

const NAMES: [&str; 3] = ["a_dur", "b_dur", "w_avg"];

fn schema() -> FeatureSchema {
    FeatureSchema::new(NAMES).with_fractional(&["w_avg"])
}

fn config(backend: Backend) -> CodegenConfig {
    CodegenConfig {
        backend,
        ..CodegenConfig::default()
    }
}

fn leaf(v: f64) -> DecisionTreeNode {
    DecisionTreeNode::leaf(v)
}

fn stump(feature: usize, threshold: f64, t: f64, f: f64) -> DecisionTreeNode {
    DecisionTreeNode::split(feature, threshold, leaf(t), leaf(f))
}

// Thresholds the generated code can represent exactly: whole or half values
// for the integral features, f32-exact values for the fractional one.
fn random_tree(rng: &mut StdRng, depth: usize) -> DecisionTreeNode {
    if depth == 0 || rng.gen_bool(0.25) {
        return leaf(if rng.gen_bool(0.5) { 1.0 } else { 0.0 });
    }
    let feature = rng.gen_range(0..NAMES.len());
    let threshold = rng.gen_range(0..40) as f64 * 2.5;
    DecisionTreeNode::split(
        feature,
        threshold,
        random_tree(rng, depth - 1),
        random_tree(rng, depth - 1),
    )
}

fn random_row(rng: &mut StdRng) -> Vec<f64> {
    // whole numbers for the integral features, hitting thresholds exactly
    vec![
        rng.gen_range(-2..102) as f64,
        rng.gen_range(-2..102) as f64,
        rng.gen_range(-4..204) as f64 * 0.5,
    ]
}

// --- Minimal evaluator for the emitted C ---

fn tokenize(code: &str) -> Vec<String> {
    code.replace('(', " ( ")
        .replace(')', " ) ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn literal(token: &str) -> f64 {
    match token {
        "true" => 1.0,
        "false" => 0.0,
        t => t.trim_end_matches('f').parse().expect("numeric literal"),
    }
}

fn compare(vars: &HashMap<&str, f64>, name: &str, op: &str, value: &str) -> f64 {
    let x = vars[name];
    let t = literal(value);
    let holds = match op {
        "<=" => x <= t,
        ">" => x > t,
        other => panic!("unexpected comparison {}", other),
    };
    if holds {
        1.0
    } else {
        0.0
    }
}

fn eval_ternary(tokens: &[String], pos: &mut usize, vars: &HashMap<&str, f64>) -> f64 {
    if tokens[*pos] == "(" {
        *pos += 1;
        let cond = eval_ternary(tokens, pos, vars);
        assert_eq!(tokens[*pos], "?");
        *pos += 1;
        let t = eval_ternary(tokens, pos, vars);
        assert_eq!(tokens[*pos], ":");
        *pos += 1;
        let f = eval_ternary(tokens, pos, vars);
        assert_eq!(tokens[*pos], ")");
        *pos += 1;
        return if cond != 0.0 { t } else { f };
    }
    if *pos + 2 < tokens.len() && (tokens[*pos + 1] == "<=" || tokens[*pos + 1] == ">") {
        let r = compare(vars, &tokens[*pos], &tokens[*pos + 1], &tokens[*pos + 2]);
        *pos += 3;
        return r;
    }
    let v = literal(&tokens[*pos]);
    *pos += 1;
    v
}

fn run_ternary(code: &str, vars: &HashMap<&str, f64>) -> f64 {
    let start = code.find("return ").expect("return statement") + "return ".len();
    let end = code[start..].find(';').expect("terminated") + start;
    let tokens = tokenize(&code[start..end]);
    let mut pos = 0;
    let value = eval_ternary(&tokens, &mut pos, vars);
    assert_eq!(pos, tokens.len());
    value
}

fn run_branchless(code: &str, vars: &HashMap<&str, f64>) -> f64 {
    let mut env: HashMap<String, i64> = HashMap::new();
    let operand = |env: &HashMap<String, i64>, token: &str| -> i64 {
        env.get(token).copied().unwrap_or_else(|| token.parse().expect("integer operand"))
    };

    for line in code.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("return ") {
            return operand(&env, rest.trim_end_matches(';')) as f64;
        }
        let Some(rest) = line.strip_prefix("uint8_t ") else {
            continue;
        };
        let (name, rhs) = rest.trim_end_matches(';').split_once(" = ").expect("assignment");
        let tokens = tokenize(rhs);
        let value = if tokens.len() == 3 {
            compare(vars, &tokens[0], &tokens[1], &tokens[2]) as i64
        } else if let Some(var) = rhs.strip_prefix('-') {
            -operand(&env, var)
        } else {
            // ( f & ~mask ) | ( t & mask )
            let f = operand(&env, &tokens[1]);
            let mask = operand(&env, tokens[3].trim_start_matches('~'));
            let t = operand(&env, &tokens[7]);
            (f & !mask) | (t & mask)
        };
        env.insert(name.to_string(), value);
    }
    panic!("no return statement in\n{}", code)
}

fn vars_of(row: &[f64]) -> HashMap<&'static str, f64> {
    NAMES.iter().copied().zip(row.iter().copied()).collect()
}

#[test]
fn test_ternary_matches_direct_evaluation() {
    let mut rng = StdRng::seed_from_u64(11);
    let compiler = TreeCompiler::new(schema(), config(Backend::Ternary), Mode::ThirdDown);

    for _ in 0..60 {
        let tree = random_tree(&mut rng, 5);
        let code = compiler.compile(&tree).unwrap();
        for _ in 0..80 {
            let row = random_row(&mut rng);
            assert_eq!(run_ternary(&code, &vars_of(&row)), tree.predict(&row), "{}\n{:?}", code, row);
        }
    }
}

#[test]
fn test_branchless_matches_direct_evaluation() {
    let mut rng = StdRng::seed_from_u64(12);
    let compiler = TreeCompiler::new(schema(), config(Backend::Branchless), Mode::ThirdDown);

    for _ in 0..60 {
        let tree = random_tree(&mut rng, 5);
        let code = compiler.compile(&tree).unwrap();
        for _ in 0..80 {
            let row = random_row(&mut rng);
            assert_eq!(run_branchless(&code, &vars_of(&row)), tree.predict(&row), "{}\n{:?}", code, row);
        }
    }
}

#[test]
fn test_threshold_equal_values_take_the_true_branch() {
    let tree = DecisionTreeNode::split(
        0,
        40.0,
        stump(2, 37.5, 0.0, 1.0),
        stump(1, 12.5, 1.0, 0.0),
    );
    let rows = [
        vec![40.0, 0.0, 37.5],
        vec![40.0, 0.0, 38.0],
        vec![41.0, 12.0, 0.0],
        vec![41.0, 13.0, 0.0],
    ];

    for backend in [Backend::Ternary, Backend::Branchless] {
        let code = TreeCompiler::new(schema(), config(backend), Mode::ThirdDown)
            .compile(&tree)
            .unwrap();
        for row in &rows {
            let vars = vars_of(row);
            let compiled = match backend {
                Backend::Ternary => run_ternary(&code, &vars),
                Backend::Branchless => run_branchless(&code, &vars),
            };
            assert_eq!(compiled, tree.predict(row), "{:?} {:?}", backend, row);
        }
    }
    assert_eq!(tree.predict(&rows[0]), 0.0);
    assert_eq!(tree.predict(&rows[2]), 1.0);
}

#[test]
fn test_ternary_stump_collapses_to_comparison() {
    let schema = FeatureSchema::new(["x"]).with_fractional(&["x"]);
    let compiler = TreeCompiler::new(schema, config(Backend::Ternary), Mode::ThirdDown);

    assert_eq!(compiler.ternary_expression(&stump(0, 5.0, 1.0, 0.0)).unwrap(), "x <= 5.0f");
    assert_eq!(compiler.ternary_expression(&stump(0, 5.0, 0.0, 1.0)).unwrap(), "x > 5.0f");

    let integral = TreeCompiler::new(FeatureSchema::new(["x"]), config(Backend::Ternary), Mode::ThirdDown);
    assert_eq!(integral.ternary_expression(&stump(0, 5.0, 1.0, 0.0)).unwrap(), "x <= 5");

    let code = integral.compile(&stump(0, 5.0, 1.0, 0.0)).unwrap();
    assert!(code.contains("return x <= 5;\n"));
    assert!(!code.contains('?'));
}

#[test]
fn test_branchless_stump_collapses_to_comparison() {
    let compiler = TreeCompiler::new(FeatureSchema::new(["x"]), config(Backend::Branchless), Mode::ThirdDown);

    let code = compiler.compile(&stump(0, 5.0, 1.0, 0.0)).unwrap();
    assert!(code.contains("    uint8_t result_0 = x <= 5;\n"));
    assert!(code.contains("    return result_0;\n"));
    assert!(!code.contains("mask"));
    assert!(!code.contains("condition"));

    let negated = compiler.compile(&stump(0, 5.0, 0.0, 1.0)).unwrap();
    assert!(negated.contains("    uint8_t result_0 = x > 5;\n"));
    assert!(!negated.contains("mask"));
}

#[test]
fn test_branchless_general_case_uses_mask() {
    let compiler = TreeCompiler::new(FeatureSchema::new(["x", "y"]), config(Backend::Branchless), Mode::ThirdDown);
    let tree = DecisionTreeNode::split(0, 5.0, leaf(1.0), stump(1, 3.0, 1.0, 0.0));

    let code = compiler.compile(&tree).unwrap();
    let expected = "\
/**
 * Auto-generated branchless decision tree prediction function.
 */
bool pth_default_get_hold_prediction_when_third_press(void) {

    uint8_t result_0 = y <= 3;

    uint8_t condition_1 = x <= 5;
    uint8_t mask_1 = -condition_1;
    uint8_t result_1 = (result_0 & ~mask_1) | (1 & mask_1);
    return result_1;
}
";
    assert_eq!(code, expected);
}

#[test]
fn test_ternary_general_case_layout() {
    let compiler = TreeCompiler::new(FeatureSchema::new(["x", "y"]), config(Backend::Ternary), Mode::ThirdDown);
    let tree = DecisionTreeNode::split(0, 5.0, leaf(1.0), stump(1, 3.0, 0.0, 1.0));

    let code = compiler.compile_with_doc(&tree, "Trained on 1_024 events\n\n").unwrap();
    let expected = "
/**
 * Auto-generated decision tree prediction function.
 * At most 7 comparisons are necessary to get a result.
 *
 * Trained on 1_024 events
 *
 * @return whether the key is held.
 */
bool pth_default_get_hold_prediction_when_third_press(void) {
    // clang-format off
return (
  x <= 5
  ? true
  : y > 3
);
    // clang-format on
}
";
    assert_eq!(code, expected);
}

#[test]
fn test_probability_leaves_are_not_collapsed() {
    let compiler = TreeCompiler::new(
        FeatureSchema::new(["x"]),
        CodegenConfig {
            output_probability: true,
            ..config(Backend::Ternary)
        },
        Mode::ThirdDown,
    );
    let tree = DecisionTreeNode::split(
        0,
        5.0,
        DecisionTreeNode::leaf_with_counts(1.0, vec![2, 8]),
        DecisionTreeNode::leaf_with_counts(0.0, vec![8, 2]),
    );

    assert_eq!(
        compiler.ternary_expression(&tree).unwrap(),
        "(\n  x <= 5\n  ? 0.75f\n  : 0.25f\n)"
    );
    assert!(compiler.compile(&tree).unwrap().starts_with("\n/**"));
    assert!(compiler
        .compile(&tree)
        .unwrap()
        .contains("float pth_default_get_hold_prediction_when_third_press(void) {"));
}

#[test]
fn test_numeric_dialect_keeps_numbers() {
    let compiler = TreeCompiler::new(
        FeatureSchema::new(["x"]),
        CodegenConfig {
            dialect: Dialect::Numeric,
            ..config(Backend::Ternary)
        },
        Mode::ThirdDown,
    );
    assert_eq!(
        compiler.ternary_expression(&stump(0, 5.0, 1.0, 0.0)).unwrap(),
        "(\n  x <= 5.0f\n  ? 1\n  : 0\n)"
    );
}

#[test]
fn test_branchless_rejects_probabilities_and_fractional_leaves() {
    let probability = TreeCompiler::new(
        FeatureSchema::new(["x"]),
        CodegenConfig {
            output_probability: true,
            ..config(Backend::Branchless)
        },
        Mode::ThirdDown,
    );
    assert!(matches!(
        probability.compile(&stump(0, 5.0, 1.0, 0.0)),
        Err(TapholdError::Codegen(_))
    ));

    let labels = TreeCompiler::new(FeatureSchema::new(["x"]), config(Backend::Branchless), Mode::ThirdDown);
    assert!(matches!(
        labels.compile(&stump(0, 5.0, 0.5, 0.0)),
        Err(TapholdError::Codegen(_))
    ));
}

#[test]
fn test_compilation_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(3);
    let tree = random_tree(&mut rng, 6);

    for backend in [Backend::Ternary, Backend::Branchless] {
        let compiler = TreeCompiler::new(schema(), config(backend), Mode::PthUpAfterSecondDown);
        let first = compiler.compile(&tree).unwrap();
        let second = compiler.compile(&tree).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_feature_outside_schema_fails() {
    let compiler = TreeCompiler::new(FeatureSchema::new(["x"]), config(Backend::Ternary), Mode::ThirdDown);
    let tree = DecisionTreeNode::split(3, 5.0, leaf(1.0), leaf(0.0));
    assert!(matches!(
        compiler.compile(&tree),
        Err(TapholdError::FeatureOutOfRange { index: 3, limit: 1 })
    ));
}

#[test]
fn test_mode_schema_compiles_json_tree() {
    let schema = FeatureSchema::for_mode(Mode::PthUpAfterSecondUp);
    let index = schema
        .names()
        .iter()
        .position(|n| n == "pth_press_to_second_press_dur")
        .unwrap();
    let json = format!(
        r#"{{"type": "split", "feature": {}, "threshold": 180.5,
            "true_child": {{"type": "leaf", "output": 0.0}},
            "false_child": {{"type": "leaf", "output": 1.0}}}}"#,
        index
    );
    let tree = DecisionTreeNode::from_json(&json).unwrap();
    let code = TreeCompiler::for_mode(Mode::PthUpAfterSecondUp, config(Backend::Ternary))
        .compile(&tree)
        .unwrap();
    assert!(code.contains("bool pth_default_get_hold_prediction_when_pth_release_after_second_release(void) {"));
    assert!(code.contains("return pth_press_to_second_press_dur > 180;"));
}
