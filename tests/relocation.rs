//! Tests that failures are reported at the fixture's declaration site.

use std::sync::Arc;

use fixture_matrix::{
    check_eq, options, values, Config, EventCollector, FailureKind, Group, Runner, Signature, SuiteEvent, TestFn,
};

fn sum_test() -> TestFn {
    TestFn::new(
        "_test",
        Signature::new()
            .positional("total")
            .variadic("terms")
            .keyword_default("optional", 0),
        |args| {
            let terms: i64 = args.rest().iter().filter_map(|v| v.as_int()).sum();
            check_eq(args.int("total")?, terms + args.int("optional")?)
        },
    )
}

fn runner() -> Runner {
    Runner::new().with_config(Config::default())
}

#[test]
fn test_line() {
    let sum_tests = Group::builder("sum_tests")
        .shared_test(sum_test())
        .fixture("c", values![15, 5, 3])
        .fixture("optional_failure", values![1, 3, 2, options!(optional = 1)])
        .fixture("optional_badargs", values![3, 2, 1, options!(doesntexist = 1)])
        .build()
        .unwrap();

    let report = runner().run_unit(&sum_tests, "test_c").unwrap();
    let failure = &report.failures[0];
    assert!(failure.location.file.ends_with("relocation.rs"));
    assert_eq!(failure.location.enclosing, "sum_tests");
    assert!(failure.message.contains("sum_tests"));
    assert!(failure.message.contains(r#".fixture("c", values![15, 5, 3])"#));

    let report = runner().run_unit(&sum_tests, "test_optional_failure").unwrap();
    assert!(report.failures[0]
        .message
        .contains(r#".fixture("optional_failure", values![1, 3, 2, options!(optional = 1)])"#));

    let report = runner().run_unit(&sum_tests, "test_optional_badargs").unwrap();
    assert_eq!(report.errors[0].kind, FailureKind::ArgumentBinding);
    assert!(report.errors[0]
        .message
        .contains(r#".fixture("optional_badargs", values![3, 2, 1, options!(doesntexist = 1)])"#));
}

#[test]
fn test_each_fixture_has_its_own_line() {
    let group = Group::builder("lines")
        .shared_test(sum_test())
        .fixture("first", values![0, 1])
        .fixture("second", values![0, 2])
        .build()
        .unwrap();
    let report = runner().run_group(&group);
    assert_eq!(report.failures.len(), 2);
    let first = &report.failures[0].location;
    let second = &report.failures[1].location;
    assert_eq!(second.line, first.line + 1);
    assert!(first.line > group.declared_at().line);
}

#[test]
fn test_programmatic_fixtures_are_found_by_scanning() {
    let group = Group::builder("scanned")
        .shared_test(sum_test())
        .fixtures([
            ("fine", values![3, 1, 2]),
            ("broken", values![3, 1, 1]),
        ])
        .build()
        .unwrap();
    assert!(group.fixture("broken").unwrap().declared_at().is_none());

    let report = runner().run_unit(&group, "test_broken").unwrap();
    let failure = &report.failures[0];
    assert!(failure.location.line > group.declared_at().line);
    assert!(failure.message.contains(r#"("broken", values![3, 1, 1]),"#));
}

#[test]
fn test_disabled_source_reading_keeps_coarse_location() {
    let group = Group::builder("coarse")
        .shared_test(sum_test())
        .fixtures([("broken", values![3, 1, 1])])
        .build()
        .unwrap();
    let report = Runner::new()
        .with_config(Config::default().with_read_source(false))
        .run_unit(&group, "test_broken")
        .unwrap();
    assert_eq!(&report.failures[0].location, group.declared_at());
}

#[test]
fn test_relocated_failure_keeps_original_kind() {
    let collector = Arc::new(EventCollector::new());
    let group = Group::builder("kinds")
        .shared_test(sum_test())
        .fixture("wrong_type", values!["x", 1])
        .build()
        .unwrap();
    let report = Runner::with_tracer(collector.clone())
        .with_config(Config::default())
        .run_group(&group);
    assert_eq!(report.errors[0].kind, FailureKind::User);
    assert!(collector
        .events()
        .iter()
        .any(|event| matches!(event, SuiteEvent::Relocated { kind: FailureKind::User, .. })));
}
