//! Sorter contract tests.
//!
//! Exercises the public `Sorter` surface end to end: allocation
//! bookkeeping, ordering, weights, activation, and contract violations.
//! Every scenario runs against both ordering policies unless it is about
//! hierarchy specifically.

use std::collections::BTreeSet;

use fair_core::{Resource, Resources, Scalar, SorterConfig, SorterKind};
use fairgrid_sorter::{DrfSorter, ScalarQuantities, Sorter, build_sorter};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn res(s: &str) -> Resources {
    s.parse().unwrap()
}

fn sorter(kind: SorterKind) -> DrfSorter {
    init_tracing();
    let mut sorter = DrfSorter::new(kind);
    sorter.initialize(None);
    sorter
}

fn both() -> [DrfSorter; 2] {
    [sorter(SorterKind::Hierarchical), sorter(SorterKind::Flat)]
}

fn add_active(sorter: &mut DrfSorter, clients: &[&str]) {
    for client in clients {
        sorter.add(client);
        sorter.activate(client);
    }
}

#[test]
fn lower_dominant_share_goes_first() {
    for mut sorter in both() {
        sorter.add_agent("agent-1", &res("cpus:10; mem:10"));
        add_active(&mut sorter, &["X", "Y"]);
        sorter.allocated("X", "agent-1", &res("cpus:8"));
        sorter.allocated("Y", "agent-1", &res("mem:2"));

        assert_eq!(sorter.share("X"), 0.8);
        assert_eq!(sorter.share("Y"), 0.2);
        assert_eq!(sorter.sort(), vec!["Y", "X"]);
    }
}

#[test]
fn sort_is_stable_without_mutation() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10; mem:100"));
        add_active(&mut sorter, &["c", "a", "b", "d/e", "d/f"]);
        sorter.allocated("a", "a1", &res("cpus:1"));
        sorter.allocated("d/e", "a1", &res("mem:10"));

        let first = sorter.sort();
        let second = sorter.sort();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }
}

#[test]
fn equal_shares_fall_back_to_client_id() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10"));
        add_active(&mut sorter, &["zeta", "alpha", "mid"]);
        assert_eq!(sorter.sort(), vec!["alpha", "mid", "zeta"]);
    }
}

#[test]
fn order_never_places_a_larger_share_first() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:16; mem:64; disk:100"));
        sorter.add_agent("a2", &res("cpus:16; mem:64; gpus:2"));

        let clients = ["fw1", "fw2", "eng/ml", "eng/web", "ops", "eng/ml/train"];
        add_active(&mut sorter, &clients);
        sorter.update_weight("eng", 2.0);

        let grants = [
            ("fw1", "a1", "cpus:3; mem:2"),
            ("fw2", "a2", "gpus:1"),
            ("eng/ml", "a1", "mem:40"),
            ("eng/web", "a2", "cpus:1.5"),
            ("ops", "a1", "disk:30; cpus:0.5"),
            ("eng/ml/train", "a2", "cpus:6"),
            ("fw1", "a2", "mem:10"),
        ];
        for (client, agent, resources) in grants {
            sorter.allocated(client, agent, &res(resources));
        }

        let order = sorter.sort();
        assert_eq!(order.len(), clients.len());
        for pair in order.windows(2) {
            assert!(
                sorter.share(&pair[0]) <= sorter.share(&pair[1]),
                "{} ({}) sorted ahead of {} ({})",
                pair[0],
                sorter.share(&pair[0]),
                pair[1],
                sorter.share(&pair[1]),
            );
        }
    }
}

#[test]
fn weights_scale_the_share() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10"));
        add_active(&mut sorter, &["x", "y"]);
        sorter.allocated("x", "a1", &res("cpus:4"));
        sorter.allocated("y", "a1", &res("cpus:2"));
        assert_eq!(sorter.sort(), vec!["y", "x"]);

        sorter.update_weight("x", 4.0);
        assert_eq!(sorter.share("x"), 0.1);
        assert_eq!(sorter.sort(), vec!["x", "y"]);

        sorter.update_weight("x", 1.0);
        assert_eq!(sorter.sort(), vec!["y", "x"]);
    }
}

#[test]
fn weights_are_inherited_by_descendants() {
    for mut sorter in both() {
        sorter.update_weight("a", 2.0);
        sorter.add("a/b");
        assert_eq!(sorter.weight("a/b"), 2.0);

        sorter.update_weight("a/b", 3.0);
        assert_eq!(sorter.weight("a/b"), 3.0);

        sorter.update_weight("a", 7.0);
        assert_eq!(sorter.weight("a/b"), 3.0);
        assert_eq!(sorter.weight("a/c"), 7.0);
        assert_eq!(sorter.weight("other"), 1.0);
    }
}

#[test]
fn weight_change_reaches_cached_clients() {
    let mut sorter = sorter(SorterKind::Hierarchical);
    sorter.add_agent("a1", &res("cpus:10"));
    add_active(&mut sorter, &["a/b", "c"]);
    sorter.allocated("a/b", "a1", &res("cpus:4"));
    sorter.allocated("c", "a1", &res("cpus:3"));
    assert_eq!(sorter.sort(), vec!["c", "a/b"]);

    // The cached weight of "a/b" must be dropped by an update at "a".
    sorter.update_weight("a", 2.0);
    assert_eq!(sorter.sort(), vec!["a/b", "c"]);
}

#[test]
fn inactive_clients_are_counted_but_not_sorted() {
    for mut sorter in both() {
        sorter.add("idle");
        add_active(&mut sorter, &["busy"]);

        assert!(sorter.contains("idle"));
        assert_eq!(sorter.count(), 2);
        assert_eq!(sorter.sort(), vec!["busy"]);

        sorter.activate("idle");
        assert_eq!(sorter.sort(), vec!["busy", "idle"]);

        sorter.deactivate("busy");
        sorter.deactivate("busy");
        assert_eq!(sorter.sort(), vec!["idle"]);
        assert_eq!(sorter.count(), 2);
    }
}

#[test]
fn deactivated_clients_keep_their_allocation() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:4"));
        add_active(&mut sorter, &["fw"]);
        sorter.allocated("fw", "a1", &res("cpus:2"));
        sorter.deactivate("fw");

        assert_eq!(sorter.allocation_of("fw", "a1"), res("cpus:2"));
        sorter.activate("fw");
        assert_eq!(sorter.share("fw"), 0.5);
    }
}

#[test]
fn add_and_remove_are_idempotent() {
    for mut sorter in both() {
        add_active(&mut sorter, &["fw"]);
        sorter.add("fw");
        assert_eq!(sorter.count(), 1);
        assert_eq!(sorter.sort(), vec!["fw"]);

        sorter.remove("fw");
        sorter.remove("fw");
        assert!(!sorter.contains("fw"));
        assert_eq!(sorter.count(), 0);
        assert!(sorter.sort().is_empty());
    }
}

#[test]
fn allocate_then_unallocate_restores_totals() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:8; mem:32"));
        add_active(&mut sorter, &["fw"]);
        sorter.allocated("fw", "a1", &res("cpus:0.3; mem:1"));
        let before = sorter.allocation_scalar_quantities("fw").clone();

        let grant = res("cpus:0.1; mem:0.7; ports:[31000-31010]");
        sorter.allocated("fw", "a1", &grant);
        sorter.unallocated("fw", "a1", &grant);

        assert_eq!(*sorter.allocation_scalar_quantities("fw"), before);
        assert_eq!(sorter.allocation_of("fw", "a1"), res("cpus:0.3; mem:1"));

        sorter.unallocated("fw", "a1", &res("cpus:0.3; mem:1"));
        assert!(sorter.allocation_of("fw", "a1").is_empty());
        assert!(sorter.allocation("fw").is_empty());
        assert!(sorter.allocation_scalar_quantities("fw").is_empty());
    }
}

#[test]
fn agent_totals_match_the_sum_of_clients() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:32; mem:256"));
        sorter.add_agent("a2", &res("cpus:32; mem:256"));
        add_active(&mut sorter, &["f1", "f2", "r/x"]);

        sorter.allocated("f1", "a1", &res("cpus:4; mem:8"));
        sorter.allocated("f2", "a1", &res("cpus:2"));
        sorter.allocated("r/x", "a1", &res("mem:16"));
        sorter.allocated("f1", "a2", &res("cpus:1"));
        sorter.unallocated("f1", "a1", &res("cpus:1"));
        sorter.update("f2", "a1", &res("cpus:2"), &res("cpus:3; mem:1"));
        sorter.remove("r/x");

        for (agent, expected) in [("a1", "cpus:6; mem:9"), ("a2", "cpus:1")] {
            let per_client = sorter.allocation_on(agent);
            let summed = per_client
                .values()
                .fold(Resources::new(), |acc, r| &acc + r);
            assert_eq!(summed, res(expected), "agent {agent}");
            assert_eq!(sorter.agent_total(agent), res(expected), "agent {agent}");
        }
        assert!(!sorter.allocation_on("a1").contains_key("r/x"));
    }
}

#[test]
fn update_with_new_quantities_reorders() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10"));
        add_active(&mut sorter, &["x", "y"]);
        sorter.allocated("x", "a1", &res("cpus:2"));
        sorter.allocated("y", "a1", &res("cpus:3"));
        assert_eq!(sorter.sort(), vec!["x", "y"]);

        sorter.update("x", "a1", &res("cpus:2"), &res("cpus:5"));
        assert_eq!(sorter.sort(), vec!["y", "x"]);
        assert_eq!(
            *sorter.allocation_scalar_quantities("x"),
            ScalarQuantities::from_resources(&res("cpus:5"))
        );
    }
}

#[test]
fn update_with_volume_metadata_keeps_quantities() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("disk:100; cpus:4"));
        add_active(&mut sorter, &["db"]);
        sorter.allocated("db", "a1", &res("disk(db):50; cpus:1"));

        let volume: Resources = Resource::scalar("disk", 50.0)
            .reserved("db", None)
            .volume("vol-1", Some("/var/lib/db"))
            .into();
        sorter.update("db", "a1", &res("disk(db):50"), &volume);

        assert_eq!(sorter.allocation_of("db", "a1"), &res("cpus:1") + &volume);
        assert_eq!(
            sorter.allocation_scalar_quantities("db").get("disk"),
            Scalar::from_f64(50.0)
        );
    }
}

#[test]
fn excluded_resources_do_not_dominate() {
    let mut excluded = BTreeSet::new();
    excluded.insert("gpus".to_string());

    let mut sorter = DrfSorter::flat();
    sorter.initialize(Some(excluded));
    sorter.add_agent("a1", &res("cpus:10; gpus:2"));
    add_active(&mut sorter, &["gpu-heavy", "cpu-heavy"]);
    sorter.allocated("gpu-heavy", "a1", &res("gpus:2; cpus:1"));
    sorter.allocated("cpu-heavy", "a1", &res("cpus:3"));

    assert_eq!(sorter.share("gpu-heavy"), 0.1);
    assert_eq!(sorter.sort(), vec!["gpu-heavy", "cpu-heavy"]);
}

#[test]
fn pool_changes_move_shares() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10; mem:10"));
        sorter.add_agent("a2", &res("mem:90"));
        add_active(&mut sorter, &["x", "y"]);
        sorter.allocated("x", "a1", &res("cpus:3"));
        sorter.allocated("y", "a1", &res("mem:10"));

        assert_eq!(
            *sorter.total_scalar_quantities(),
            ScalarQuantities::from_resources(&res("cpus:10; mem:100"))
        );
        assert_eq!(sorter.sort(), vec!["y", "x"]);

        sorter.remove_agent("a2", &res("mem:90"));
        assert!(sorter.agent_pool("a2").is_empty());
        assert_eq!(sorter.sort(), vec!["x", "y"]);
    }
}

#[test]
fn resources_the_pool_lacks_never_dominate() {
    for mut sorter in both() {
        sorter.add_agent("a1", &res("cpus:10"));
        add_active(&mut sorter, &["x"]);
        sorter.allocated("x", "a1", &res("cpus:1; gpus:4"));
        assert_eq!(sorter.share("x"), 0.1);
    }
}

#[test]
fn build_sorter_applies_config() {
    init_tracing();
    let config = SorterConfig::from_toml_str(
        r#"
kind = "flat"
fairness_exclude_resource_names = ["disk"]

[weights]
"eng" = 2.0
"#,
    )
    .unwrap();

    let mut sorter = build_sorter(&config).unwrap();
    sorter.add("eng/web");
    assert_eq!(sorter.weight("eng/web"), 2.0);

    sorter.add_agent("a1", &res("cpus:4; disk:10"));
    sorter.activate("eng/web");
    sorter.allocated("eng/web", "a1", &res("disk:10; cpus:1"));
    assert_eq!(sorter.share("eng/web"), 0.125);
}

#[test]
fn build_sorter_rejects_invalid_config() {
    let mut config = SorterConfig::default();
    config.weights.insert("eng".into(), -1.0);
    assert!(build_sorter(&config).is_err());
}

// ── Contract violations ────────────────────────────────────────────

#[test]
#[should_panic(expected = "sorter used before initialize(): add")]
fn use_before_initialize_is_fatal() {
    DrfSorter::hierarchical().add("fw");
}

#[test]
#[should_panic(expected = "sorter initialized twice")]
fn double_initialize_is_fatal() {
    let mut sorter = sorter(SorterKind::Flat);
    sorter.initialize(None);
}

#[test]
#[should_panic(expected = "unknown client 'ghost'")]
fn allocating_to_unknown_client_is_fatal() {
    let mut sorter = sorter(SorterKind::Hierarchical);
    sorter.allocated("ghost", "a1", &res("cpus:1"));
}

#[test]
#[should_panic(expected = "unknown client 'ghost'")]
fn activating_unknown_client_is_fatal() {
    sorter(SorterKind::Flat).activate("ghost");
}

#[test]
#[should_panic(expected = "does not hold")]
fn unallocating_more_than_held_is_fatal() {
    let mut sorter = sorter(SorterKind::Hierarchical);
    sorter.add("fw");
    sorter.allocated("fw", "a1", &res("cpus:1"));
    sorter.unallocated("fw", "a1", &res("cpus:1.5"));
}

#[test]
#[should_panic(expected = "does not hold")]
fn unallocating_on_the_wrong_agent_is_fatal() {
    let mut sorter = sorter(SorterKind::Flat);
    sorter.add("fw");
    sorter.allocated("fw", "a1", &res("cpus:1"));
    sorter.unallocated("fw", "a2", &res("cpus:1"));
}

#[test]
#[should_panic(expected = "does not hold")]
fn updating_unheld_resources_is_fatal() {
    let mut sorter = sorter(SorterKind::Hierarchical);
    sorter.add("fw");
    sorter.allocated("fw", "a1", &res("cpus:1"));
    sorter.update("fw", "a1", &res("mem:1"), &res("mem:2"));
}

#[test]
#[should_panic(expected = "scalar quantity overflow")]
fn overflowing_allocation_is_fatal() {
    let mut sorter = sorter(SorterKind::Flat);
    sorter.add("fw");
    sorter.allocated("fw", "a1", &res("mem:9000000000000000"));
    sorter.allocated("fw", "a1", &res("mem:9000000000000000"));
}

#[test]
#[should_panic(expected = "must be finite and positive")]
fn zero_weight_is_fatal() {
    sorter(SorterKind::Hierarchical).update_weight("eng", 0.0);
}

#[test]
#[should_panic(expected = "invalid client path 'a//b'")]
fn malformed_client_path_is_fatal() {
    sorter(SorterKind::Hierarchical).add("a//b");
}

#[test]
#[should_panic(expected = "does not contribute")]
fn removing_unknown_pool_resources_is_fatal() {
    let mut sorter = sorter(SorterKind::Flat);
    sorter.add_agent("a1", &res("cpus:1"));
    sorter.remove_agent("a1", &res("mem:1"));
}
