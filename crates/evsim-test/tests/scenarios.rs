//! End-to-end kernel scenarios
//!
//! Each test runs on its own thread and therefore on a fresh kernel context
//! (seed 1, run 1, nanosecond resolution).

use std::cell::RefCell;
use std::rc::Rc;

use evsim_config::Config;
use evsim_core::{resolution, Time, TimeUnit};
use evsim_object::{create_object, ObjectExt, ObjectFactory, ObjectType};
use evsim_sched::Simulator;
use evsim_test::{build_topology, register_types, Ipv4, Node, NodeList, PingScenario, Sample, TraceRecorder};
use evsim_trace::{Callback, ContextCallback};

// ============================================================================
// SCHEDULING
// ============================================================================

#[test]
fn test_equal_timestamps_fire_in_insertion_order() {
    let fired = Rc::new(RefCell::new(Vec::new()));
    for label in ["A", "B"] {
        let fired = fired.clone();
        Simulator::schedule(Time::seconds(5.0), move || {
            fired.borrow_mut().push((label, Simulator::now().ticks()));
        });
    }
    Simulator::stop_at(Time::seconds(10.0));
    Simulator::run();

    assert_eq!(
        *fired.borrow(),
        vec![("A", 5_000_000_000), ("B", 5_000_000_000)]
    );
    assert_eq!(resolution(), TimeUnit::Ns);
}

#[test]
fn test_cancel_before_run() {
    let calls = Rc::new(RefCell::new(0));
    let c = calls.clone();
    let id = Simulator::schedule(Time::seconds(1.0), move || *c.borrow_mut() += 1);
    id.cancel();
    Simulator::run();

    assert_eq!(*calls.borrow(), 0);
    assert_eq!(Simulator::now(), Time::seconds(1.0));
    assert!(Simulator::is_finished());
    assert_eq!(Simulator::get_event_count(), 0);
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[test]
fn test_set_default_applies_to_new_objects() {
    register_types();
    Config::set_default("T::Size", 50u32);
    let sample = create_object::<Sample>();
    assert_eq!(sample.size(), 50);
    assert_eq!(sample.get_attribute("Size").get::<u32>(), Some(50));
}

#[test]
#[should_panic(expected = "OutOfRange")]
fn test_set_default_out_of_range_is_fatal() {
    register_types();
    Config::set_default("T::Size", 0u32);
}

#[test]
fn test_set_default_fail_safe_keeps_previous() {
    register_types();
    Config::set_default("T::Size", 50u32);
    assert!(!Config::set_default_fail_safe("T::Size", 0u32));
    assert_eq!(create_object::<Sample>().size(), 50);
    assert!(!Config::set_default_fail_safe("T::Missing", 1u32));
}

#[test]
fn test_object_factory_text_form() {
    register_types();
    let mut factory = ObjectFactory::for_type("T");
    factory.set("Size", 7u32);
    assert_eq!(factory.to_string(), "T[Size=7]");

    let parsed: ObjectFactory = "T[Size=7]".parse().unwrap();
    assert_eq!(parsed, factory);
    let sample = parsed.create_as::<Sample>();
    assert_eq!(sample.size(), 7);
    assert_eq!(sample.label(), "none");
}

// ============================================================================
// AGGREGATION AND PATHS
// ============================================================================

#[test]
fn test_aggregate_and_path_lookup() {
    let list = NodeList::install();
    let o1 = create_object::<Node>();
    let o2 = create_object::<Ipv4>();
    o1.aggregate_object(&o2);
    list.add(o1.clone());

    assert!(o1.get_object::<Ipv4>().unwrap().ptr_eq(&o2));
    assert!(o2.get_object::<Node>().unwrap().ptr_eq(&o1));

    let matches = Config::lookup_matches("/NodeList/0/$Ipv4");
    assert_eq!(matches.len(), 1);
    assert!(matches.get(0).unwrap().ptr_eq(&o2));
    assert_eq!(matches.get_matched_path(0), Some("/NodeList/0/$Ipv4"));
}

#[test]
fn test_connect_through_path_and_disconnect() {
    let list = build_topology(1);
    let ipv4 = list.get_node(0).and_then(|n| n.ipv4()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let sink = ContextCallback::new(move |path: &str, value: i32| s.borrow_mut().push((path.to_string(), value)));

    Config::connect("/NodeList/*/$Ipv4/Rx", sink.clone());
    ipv4.receive(42);
    assert_eq!(*seen.borrow(), vec![("/NodeList/0/$Ipv4/Rx".to_string(), 42)]);

    assert!(Config::disconnect("/NodeList/*/$Ipv4/Rx", sink));
    ipv4.receive(43);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_traced_value_through_object() {
    let ipv4 = create_object::<Ipv4>();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let c = changes.clone();
    let sink = Callback::new(move |change: (u32, u32)| c.borrow_mut().push(change));
    assert!(ipv4.trace_connect_without_context("Received", sink.clone()));

    ipv4.receive(10);
    ipv4.receive(10);
    assert_eq!(*changes.borrow(), vec![(0, 1), (1, 2)]);
    assert!(ipv4.trace_disconnect_without_context("Received", sink));
    ipv4.receive(10);
    assert_eq!(changes.borrow().len(), 2);
    assert_eq!(ipv4.received(), 3);
}

#[test]
fn test_default_ttl_through_path() {
    build_topology(2);
    Config::set("/NodeList/1/$Ipv4/Ttl", 32u8);
    let ttls: Vec<u8> = Config::lookup_matches("/NodeList/*/$Ipv4")
        .iter()
        .map(|o| o.get_attribute("Ttl").get::<u8>().unwrap())
        .collect();
    assert_eq!(ttls, vec![64, 32]);
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_same_seed_same_trace() {
    let scenario = PingScenario::default();
    let first = scenario.run();
    let second = scenario.run();
    assert!(!first.trace.is_empty());
    assert_eq!(first.trace, second.trace);
    assert_eq!(first.events, second.events);
}

#[test]
fn test_other_run_changes_jitter() {
    let first = PingScenario::default().run();
    let other = PingScenario {
        run: 2,
        ..PingScenario::default()
    }
    .run();
    assert_eq!(first.records, other.records);
    assert_ne!(first.trace, other.trace);
}

#[test]
fn test_recorder_sees_scheduled_context() {
    let recorder = TraceRecorder::new();
    let list = build_topology(2);
    Config::connect("/NodeList/*/$Ipv4/Rx", recorder.context_sink::<i32>());
    let ipv4 = list.get_node(1).and_then(|n| n.ipv4()).unwrap();
    Simulator::schedule_with_context(1, Time::millis(3), move || ipv4.receive(9));
    Simulator::run();

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_string(), "3000000 1 /NodeList/1/$Ipv4/Rx 9");
    assert_eq!(Ipv4::get_type_id().group_name(), "Network");
}
