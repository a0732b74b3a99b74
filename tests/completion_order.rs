//! Concurrent and sequential builds must be indistinguishable
//!
//! Scheduling only changes the order results are drained in; errors and
//! heap contents have to come out the same.

mod common;

use common::*;
use proptest::prelude::*;

/// Module bodies covering every gate's success and failure paths
fn module_source(kind: usize, name: &str) -> String {
    match kind {
        0 => format!("behaviour {} {{ public int x; public string s; }}", name),
        1 => format!(
            "using Math;\nbehaviour {} {{ public int v = max(2, 9) * 3; public int[] a; }}",
            name
        ),
        2 => format!("behaviour {} {{ public int n; fn f() {{ n = \"x\"; }} }}", name),
        3 => format!("behaviour {} {{ fn f() {{ gone = 1; }} }}", name),
        4 => format!("behaviour {} {{ public int z = 0; public int q = 1 / z; }}", name),
        _ => format!(
            "behaviour {} {{ [synced] private string o; public float f = 1.5 * 2; }}",
            name
        ),
    }
}

fn sources(kinds: &[usize]) -> Vec<(String, String)> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let name = format!("M{}", i);
            (format!("{}.vsp", name), module_source(kind, &name))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_concurrent_matches_sequential(kinds in prop::collection::vec(0usize..6, 1..7)) {
        let sources = sources(&kinds);
        let pairs: Vec<(&str, &str)> = sources.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();

        let mut sequential = registry(&pairs);
        let seq = sequential_builder().build(&mut sequential).unwrap();

        let mut concurrent = registry(&pairs);
        let con = concurrent_builder().build(&mut concurrent).unwrap();

        prop_assert_eq!(seq.outcome, con.outcome);
        prop_assert_eq!(seq.failed_gate, con.failed_gate);
        prop_assert_eq!(error_set(&seq.errors), error_set(&con.errors));
        for (path, _) in &pairs {
            prop_assert_eq!(staged(&sequential, path), staged(&concurrent, path));
            prop_assert_eq!(live(&sequential, path), live(&concurrent, path));
        }
    }
}

#[test]
fn test_mixed_failures_report_the_same_errors() {
    let sources = sources(&[0, 1, 2, 2, 5]);
    let pairs: Vec<(&str, &str)> = sources.iter().map(|(p, s)| (p.as_str(), s.as_str())).collect();

    let mut sequential = registry(&pairs);
    let seq = sequential_builder().build(&mut sequential).unwrap();
    let mut concurrent = registry(&pairs);
    let con = concurrent_builder().build(&mut concurrent).unwrap();

    // Two generator failures, compiled independently of each other
    assert_eq!(seq.error_count, 2);
    assert_eq!(error_set(&seq.errors), error_set(&con.errors));
    assert_eq!(staged(&sequential, "M0.vsp"), staged(&concurrent, "M0.vsp"));
    assert!(staged(&concurrent, "M0.vsp").is_some());
    assert!(staged(&concurrent, "M2.vsp").is_none());
}
