//! Small object graph shared by the unit tests of this crate
//!
//! ```text
//! NodeList --NodeList[i]--> Node --DeviceList[j]--> Device
//!                            |  \--Peer--> Node
//!                            +-- aggregated Ipv4 (Ttl, Rx)
//! ```

use std::cell::{Cell, RefCell};

use evsim_object::{
    create_object, make_accessor, make_object_ptr_container_checker, make_object_vector_accessor,
    make_pointer_accessor, make_pointer_checker, make_trace_source_accessor, make_uinteger_checker,
    make_uinteger_checker_range, Object, ObjectCore, ObjectExt, ObjectType, Ptr, TypeId,
};
use evsim_trace::TracedCallback;

#[derive(Default)]
pub struct Device {
    core: ObjectCore,
    mtu: Cell<u16>,
}

impl Device {
    pub fn mtu(&self) -> u16 {
        self.mtu.get()
    }

    fn set_mtu(&self, mtu: u16) {
        self.mtu.set(mtu);
    }
}

impl Object for Device {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Device {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("fixture::Device", |tid| {
            tid.add_constructor::<Device>().add_attribute(
                "Mtu",
                "Maximum transmission unit",
                1500u16,
                make_accessor(Device::mtu, Device::set_mtu),
                make_uinteger_checker_range::<u16>(68, 9000),
            )
        })
    }
}

#[derive(Default)]
pub struct Node {
    core: ObjectCore,
    id: Cell<u32>,
    devices: RefCell<Vec<Ptr<Device>>>,
    peer: RefCell<Option<Ptr<Node>>>,
}

impl Node {
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    fn set_id(&self, id: u32) {
        self.id.set(id);
    }

    pub fn devices(&self) -> Vec<Ptr<Device>> {
        self.devices.borrow().clone()
    }

    pub fn add_device(&self, device: Ptr<Device>) {
        self.devices.borrow_mut().push(device);
    }

    pub fn peer(&self) -> Option<Ptr<Node>> {
        self.peer.borrow().clone()
    }

    pub fn set_peer(&self, peer: Option<Ptr<Node>>) {
        *self.peer.borrow_mut() = peer;
    }
}

impl Object for Node {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Node {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("fixture::Node", |tid| {
            tid.add_constructor::<Node>()
                .add_attribute(
                    "Id",
                    "Node index",
                    0u32,
                    make_accessor(Node::id, Node::set_id),
                    make_uinteger_checker::<u32>(),
                )
                .add_attribute(
                    "DeviceList",
                    "Devices attached to the node",
                    evsim_object::AttributeValue::Empty,
                    make_object_vector_accessor(Node::devices),
                    make_object_ptr_container_checker::<Device>(),
                )
                .add_attribute(
                    "Peer",
                    "Node at the other end of a link",
                    evsim_object::AttributeValue::Pointer(None),
                    make_pointer_accessor(Node::peer, Node::set_peer),
                    make_pointer_checker::<Node>(),
                )
        })
    }
}

#[derive(Default)]
pub struct Ipv4 {
    core: ObjectCore,
    ttl: Cell<u8>,
    rx: TracedCallback<i32>,
}

impl Ipv4 {
    pub fn ttl(&self) -> u8 {
        self.ttl.get()
    }

    fn set_ttl(&self, ttl: u8) {
        self.ttl.set(ttl);
    }

    pub fn rx(&self) -> &TracedCallback<i32> {
        &self.rx
    }

    pub fn receive(&self, bytes: i32) {
        self.rx.fire(bytes);
    }
}

impl Object for Ipv4 {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for Ipv4 {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("fixture::Ipv4", |tid| {
            tid.add_constructor::<Ipv4>()
                .add_attribute(
                    "Ttl",
                    "Default time to live",
                    64u8,
                    make_accessor(Ipv4::ttl, Ipv4::set_ttl),
                    make_uinteger_checker::<u8>(),
                )
                .add_trace_source("Rx", "Packet received", make_trace_source_accessor(Ipv4::rx), "i32")
        })
    }
}

#[derive(Default)]
pub struct NodeList {
    core: ObjectCore,
    nodes: RefCell<Vec<Ptr<Node>>>,
}

impl NodeList {
    pub fn nodes(&self) -> Vec<Ptr<Node>> {
        self.nodes.borrow().clone()
    }

    pub fn add(&self, node: Ptr<Node>) {
        self.nodes.borrow_mut().push(node);
    }
}

impl Object for NodeList {
    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

impl ObjectType for NodeList {
    fn get_type_id() -> TypeId {
        TypeId::lookup_or_register("fixture::NodeList", |tid| {
            tid.add_constructor::<NodeList>().add_attribute(
                "NodeList",
                "Every node of the simulation",
                evsim_object::AttributeValue::Empty,
                make_object_vector_accessor(NodeList::nodes),
                make_object_ptr_container_checker::<Node>(),
            )
        })
    }
}

/// A node list of `count` nodes, each with one device and an aggregated
/// Ipv4, registered as root namespace object
pub fn topology(count: u32) -> Ptr<NodeList> {
    let list = create_object::<NodeList>();
    for i in 0..count {
        let node = create_object::<Node>();
        node.set_attribute("Id", i);
        node.add_device(create_object::<Device>());
        node.aggregate_object(&create_object::<Ipv4>());
        list.add(node);
    }
    crate::Config::register_root_namespace_object(&list);
    list
}
