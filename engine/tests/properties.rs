//! Property tests for shelf-engine.

use proptest::prelude::*;
use serde_json::{json, Value};
use shelf_engine::{Error, FilterExpression, Predicate, QueryParams, SearchQuery, Store};

const NO_EXPAND: &[&str] = &[];

fn arb_doc() -> impl Strategy<Value = Value> {
    (
        -50i64..50,
        prop_oneof![Just("DE"), Just("NL"), Just("US")],
        proptest::option::of(0i64..5),
        proptest::collection::vec(0i64..10, 0..4),
    )
        .prop_map(|(n, country, stock, tags)| {
            let mut doc = json!({"n": n, "address": {"country": country}, "tags": tags});
            if let Some(stock) = stock {
                doc["stock"] = json!(stock);
            }
            doc
        })
}

fn arb_predicate() -> impl Strategy<Value = String> {
    prop_oneof![
        (-60i64..60).prop_map(|v| format!("n > {v}")),
        (-60i64..60).prop_map(|v| format!("n <= {v} or stock = 0")),
        Just(r#"address(country = "DE") and n >= 0"#.to_string()),
        Just("stock is not defined".to_string()),
        (0i64..10).prop_map(|v| format!("tags contains any ({v}, 3)")),
        (0i64..10).prop_map(|v| format!("not (n in ({v}, -{v}))")),
    ]
}

fn store_of(docs: &[Value]) -> Store {
    let mut store = Store::new();
    for (i, doc) in docs.iter().enumerate() {
        let mut doc = doc.clone();
        doc["id"] = json!(format!("d{i}"));
        doc["version"] = json!(1);
        store.add("p", "thing", doc).unwrap();
    }
    store
}

fn product(variant_values: &[i64]) -> Value {
    let variants: Vec<Value> = variant_values
        .iter()
        .map(|v| json!({"attributes": [{"name": "size", "value": v}]}))
        .collect();
    let (master, others) = variants.split_first().expect("at least one variant");
    json!({"masterVariant": master, "variants": others})
}

proptest! {
    #[test]
    fn prop_compile_once_evaluate_many(
        source in arb_predicate(),
        docs in proptest::collection::vec(arb_doc(), 1..20),
    ) {
        let shared = Predicate::compile(&source).unwrap();
        for doc in &docs {
            let fresh = Predicate::compile(&source).unwrap();
            prop_assert_eq!(shared.matches(doc).unwrap(), fresh.matches(doc).unwrap());
        }
    }

    #[test]
    fn prop_pagination_invariant(
        docs in proptest::collection::vec(arb_doc(), 0..40),
        source in arb_predicate(),
        offset in 0usize..50,
        limit in 0usize..30,
    ) {
        let store = store_of(&docs);
        let predicate = Predicate::compile(&source).unwrap();
        let expected_total = docs.iter().filter(|d| predicate.matches(d).unwrap()).count();

        let params = QueryParams::new().filter(source.as_str()).offset(offset).limit(limit);
        let page = store.query("p", "thing", &params).unwrap();

        prop_assert_eq!(page.total, expected_total);
        prop_assert_eq!(page.count, limit.min(expected_total.saturating_sub(offset)));
        prop_assert_eq!(page.count, page.results.len());
    }

    #[test]
    fn prop_version_monotonicity(updates in proptest::collection::vec(any::<bool>(), 1..20)) {
        let mut store = store_of(&[json!({"n": 0})]);
        let mut version = 1u64;
        for stale in updates {
            let expected = if stale { version + 7 } else { version };
            let result = store.update("p", "thing", "d0", expected, |doc| {
                doc["n"] = json!(doc["n"].as_i64().unwrap_or(0) + 1);
                Ok(())
            });
            match result {
                Ok(doc) => {
                    prop_assert!(!stale);
                    prop_assert_eq!(doc["version"].as_u64(), Some(version + 1));
                    version += 1;
                }
                Err(Error::ConcurrentModification { expected: e, actual }) => {
                    prop_assert!(stale);
                    prop_assert_eq!(e, expected);
                    prop_assert_eq!(actual, version);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            let stored = store.get("p", "thing", "d0", NO_EXPAND).unwrap().unwrap();
            prop_assert_eq!(stored["version"].as_u64(), Some(version));
        }
    }

    #[test]
    fn prop_range_bounds(value in -100i64..100, low in -50i64..0, high in 0i64..50) {
        let inclusive = SearchQuery::compile(
            &json!({"range": {"field": "n", "gte": low, "lte": high}}),
        ).unwrap();
        let exclusive = SearchQuery::compile(
            &json!({"range": {"field": "n", "gt": low, "lt": high}}),
        ).unwrap();
        let doc = json!({"n": value});
        prop_assert_eq!(inclusive.matches(&doc).unwrap(), low <= value && value <= high);
        prop_assert_eq!(exclusive.matches(&doc).unwrap(), low < value && value < high);
    }

    #[test]
    fn prop_or_of_ranges(value in -5i64..20) {
        let filter = FilterExpression::compile("n:range (0 TO 5), (8 TO 10)").unwrap();
        let expected = (0..=5).contains(&value) || (8..=10).contains(&value);
        prop_assert_eq!(filter.matches(&json!({"n": value})).unwrap(), expected);
    }

    #[test]
    fn prop_variant_marking_flags_first_match(
        sizes in proptest::collection::vec(0i64..6, 1..6),
        wanted in 0i64..6,
    ) {
        let filter = FilterExpression::compile(&format!("variants.attributes.size:{wanted}")).unwrap();
        let mut doc = product(&sizes);
        let matched = filter.evaluate(&mut doc, true).unwrap();

        let first = sizes.iter().position(|s| *s == wanted);
        prop_assert_eq!(matched, first.is_some());

        let mut flags = vec![doc["masterVariant"]["isMatchingVariant"].as_bool()];
        if let Some(others) = doc["variants"].as_array() {
            flags.extend(others.iter().map(|v| v["isMatchingVariant"].as_bool()));
        }
        let expected: Vec<Option<bool>> =
            (0..sizes.len()).map(|i| Some(Some(i) == first)).collect();
        prop_assert_eq!(flags, expected);
    }

    #[test]
    fn prop_expansion_of_absent_path_is_identity(doc in arb_doc(), clause in "[a-z]{1,8}(\\.[a-z]{1,8}){0,2}") {
        prop_assume!(doc.get(clause.split('.').next().unwrap_or_default()).is_none());
        let store = Store::new();
        let expanded = store.expand("p", &doc, &[clause.as_str()]).unwrap();
        prop_assert_eq!(expanded, doc);
    }
}

#[test]
fn concrete_comparison_example() {
    let predicate = Predicate::compile("numberProperty > 1233").unwrap();
    assert!(predicate.matches(&json!({"numberProperty": 1234})).unwrap());
    assert!(!predicate.matches(&json!({"numberProperty": 1200})).unwrap());
}
