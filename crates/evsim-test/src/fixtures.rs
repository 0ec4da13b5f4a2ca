//! Model fixtures
//!
//! Type names are unqualified so config paths read the way drivers write
//! them:
//!
//! ```text
//! /NodeList/0/$Ipv4/Rx
//! ```

use std::cell::{Cell, RefCell};

use evsim_config::Config;
use evsim_object::{
    create_object, make_accessor, make_boolean_checker, make_object_ptr_container_checker,
    make_object_vector_accessor, make_string_checker, make_trace_source_accessor, make_traced_value_accessor,
    make_uinteger_checker, make_uinteger_checker_range, AttributeValue, Object, ObjectCore, ObjectExt, ObjectRef,
    ObjectType, Ptr, TypeId,
};
use evsim_sched::Simulator;
use evsim_trace::{TracedCallback, TracedValue};

// ============================================================================
// NODE
// ============================================================================

#[derive(Default)]
pub struct Node {
    core: ObjectCore,
    id: Cell<u32>,
}

impl Node {
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    fn set_id(&self, id: u32) {
        self.id.set(id);
    }

    /// The Ipv4 aggregated to this node, if any
    pub fn ipv4(&self) -> Option<ObjectRef<Ipv4>> {
        self.get_object::<Ipv4>()
    }
}

impl Object for Node {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Node {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("Node", |tid| {
            tid.set_group_name("Network").add_constructor::<Node>().add_attribute(
                "Id",
                "Index of the node in the node list",
                0u32,
                make_accessor(Node::id, Node::set_id),
                make_uinteger_checker::<u32>(),
            )
        })
    }
}

// ============================================================================
// IPV4
// ============================================================================

/// Protocol stub with a received-packet trace source
#[derive(Default)]
pub struct Ipv4 {
    core: ObjectCore,
    ttl: Cell<u8>,
    rx: TracedCallback<i32>,
    received: TracedValue<u32>,
}

impl Ipv4 {
    pub fn ttl(&self) -> u8 {
        self.ttl.get()
    }

    fn set_ttl(&self, ttl: u8) {
        self.ttl.set(ttl);
    }

    fn rx(&self) -> &TracedCallback<i32> {
        &self.rx
    }

    fn received_count(&self) -> &TracedValue<u32> {
        &self.received
    }

    pub fn received(&self) -> u32 {
        self.received.get()
    }

    /// Deliver a packet of `bytes`
    pub fn receive(&self, bytes: i32) {
        self.rx.fire(bytes);
        self.received.update(|n| n + 1);
    }
}

impl Object for Ipv4 {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Ipv4 {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("Ipv4", |tid| {
            tid.set_group_name("Network")
                .add_constructor::<Ipv4>()
                .add_attribute(
                    "Ttl",
                    "Default time to live",
                    64u8,
                    make_accessor(Ipv4::ttl, Ipv4::set_ttl),
                    make_uinteger_checker::<u8>(),
                )
                .add_trace_source("Rx", "A packet was received", make_trace_source_accessor(Ipv4::rx), "i32")
                .add_trace_source(
                    "Received",
                    "Number of packets received so far",
                    make_traced_value_accessor(Ipv4::received_count),
                    "(u32, u32)",
                )
        })
    }
}

// ============================================================================
// NODE LIST
// ============================================================================

/// Root namespace object holding every node
#[derive(Default)]
pub struct NodeList {
    core: ObjectCore,
    nodes: RefCell<Vec<Ptr<Node>>>,
}

impl NodeList {
    /// Create the list, register it as root namespace object and arrange
    /// for it to be unregistered when the simulator is destroyed
    pub fn install() -> Ptr<NodeList> {
        let list = create_object::<NodeList>();
        Config::register_root_namespace_object(&list);
        let held = list.clone();
        Simulator::schedule_destroy(move || {
            Config::unregister_root_namespace_object(&held);
            held.nodes.borrow_mut().clear();
        });
        list
    }

    /// Append `node`, setting its `Id` to its index
    pub fn add(&self, node: Ptr<Node>) -> u32 {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len() as u32;
        node.set_attribute("Id", index);
        nodes.push(node);
        index
    }

    pub fn nodes(&self) -> Vec<Ptr<Node>> {
        self.nodes.borrow().clone()
    }

    pub fn get_node(&self, index: u32) -> Option<Ptr<Node>> {
        self.nodes.borrow().get(index as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }
}

impl Object for NodeList {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for NodeList {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("NodeList", |tid| {
            tid.add_constructor::<NodeList>().add_attribute(
                "NodeList",
                "Every node of the simulation",
                AttributeValue::Empty,
                make_object_vector_accessor(NodeList::nodes),
                make_object_ptr_container_checker::<Node>(),
            )
        })
    }
}

/// `count` nodes, each with an aggregated Ipv4, in a freshly installed
/// node list
pub fn build_topology(count: u32) -> Ptr<NodeList> {
    let list = NodeList::install();
    for _ in 0..count {
        let node = create_object::<Node>();
        node.aggregate_object(&create_object::<Ipv4>());
        list.add(node);
    }
    list
}

// ============================================================================
// SAMPLE TYPE
// ============================================================================

/// Type `T` with a bounded `Size`
#[derive(Default)]
pub struct Sample {
    core: ObjectCore,
    size: Cell<u32>,
    label: RefCell<String>,
    enabled: Cell<bool>,
}

impl Sample {
    pub fn size(&self) -> u32 {
        self.size.get()
    }

    fn set_size(&self, size: u32) {
        self.size.set(size);
    }

    pub fn label(&self) -> String {
        self.label.borrow().clone()
    }

    fn set_label(&self, label: String) {
        *self.label.borrow_mut() = label;
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

impl Object for Sample {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Sample {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("T", |tid| {
            tid.set_group_name("Sample")
                .add_constructor::<Sample>()
                .add_attribute(
                    "Size",
                    "Payload size",
                    10u32,
                    make_accessor(Sample::size, Sample::set_size),
                    make_uinteger_checker_range::<u32>(1, 100),
                )
                .add_attribute(
                    "Label",
                    "Free-form label",
                    "none",
                    make_accessor(Sample::label, Sample::set_label),
                    make_string_checker(),
                )
                .add_attribute(
                    "Enabled",
                    "Whether the sample is active",
                    true,
                    make_accessor(Sample::enabled, Sample::set_enabled),
                    make_boolean_checker(),
                )
        })
    }
}

/// Register every fixture type with the current kernel context
pub fn register_types() {
    Node::get_type_id();
    Ipv4::get_type_id();
    NodeList::get_type_id();
    Sample::get_type_id();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_ids_and_aggregation() {
        let list = build_topology(3);
        assert_eq!(list.len(), 3);
        let node = list.get_node(2).unwrap();
        assert_eq!(node.id(), 2);
        let ipv4 = node.ipv4().unwrap();
        assert!(ipv4.get_object::<Node>().unwrap().ptr_eq(&node));
        assert_eq!(Config::get_root_namespace_object_n(), 1);
    }

    #[test]
    fn test_destroy_unregisters_node_list() {
        let list = build_topology(1);
        Simulator::destroy();
        assert_eq!(Config::get_root_namespace_object_n(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_sample_defaults() {
        let sample = create_object::<Sample>();
        assert_eq!(sample.size(), 10);
        assert_eq!(sample.label(), "none");
        assert!(sample.enabled());
    }
}
