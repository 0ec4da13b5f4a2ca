//! Walk every readable and writable attribute reachable from the root
//! namespace objects
//!
//! The walk descends pointer attributes, container attributes and
//! aggregate members. The path handed to the visitor is a config path that
//! resolves back to the visited object:
//!
//! ```text
//! /$fixture::NodeList/NodeList/0/$fixture::Node/DeviceList/0/$fixture::Device/Mtu
//! ```
//!
//! Objects already on the current branch are not entered again, so cycles
//! through pointer attributes terminate.

use std::collections::BTreeMap;

use evsim_object::{AttributeChecker, AttributeFlags, AttributeValue, Object, ObjectExt, Ptr, SupportLevel};

use crate::config::Config;

/// Callbacks of an attribute walk
///
/// Only `visit_attribute` is required; the structural callbacks bracket the
/// objects the walk enters.
pub trait AttributeVisitor {
    /// A readable, writable attribute `name` of `object`
    fn visit_attribute(&mut self, object: &Ptr<dyn Object>, name: &str, path: &str);

    fn start_visit_object(&mut self, _object: &Ptr<dyn Object>, _path: &str) {}

    fn end_visit_object(&mut self) {}

    fn start_visit_pointer_attribute(
        &mut self,
        _object: &Ptr<dyn Object>,
        _name: &str,
        _target: &Ptr<dyn Object>,
        _path: &str,
    ) {
    }

    fn end_visit_pointer_attribute(&mut self) {}

    fn start_visit_array_attribute(
        &mut self,
        _object: &Ptr<dyn Object>,
        _name: &str,
        _items: &BTreeMap<u32, Ptr<dyn Object>>,
        _path: &str,
    ) {
    }

    fn end_visit_array_attribute(&mut self) {}

    fn start_visit_array_item(&mut self, _index: u32, _item: &Ptr<dyn Object>, _path: &str) {}

    fn end_visit_array_item(&mut self) {}
}

#[derive(Debug, Default)]
pub struct AttributeIterator {
    examined: Vec<usize>,
    current_path: Vec<String>,
}

impl AttributeIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk from every root namespace object
    pub fn iterate(&mut self, visitor: &mut impl AttributeVisitor) {
        for root in Config::root_namespace_objects() {
            self.iterate_from(&root, visitor);
        }
    }

    /// Walk from `root` only
    pub fn iterate_from(&mut self, root: &Ptr<dyn Object>, visitor: &mut impl AttributeVisitor) {
        self.examined.clear();
        self.current_path.clear();
        self.push(format!("${}", root.instance_type_id().name()));
        visitor.start_visit_object(root, &self.path());
        self.do_iterate(root, visitor);
        visitor.end_visit_object();
        self.pop();
    }

    fn push(&mut self, segment: String) {
        self.current_path.push(segment);
    }

    fn pop(&mut self) {
        self.current_path.pop();
    }

    fn path(&self) -> String {
        format!("/{}", self.current_path.join("/"))
    }

    fn is_examined(&self, object: &Ptr<dyn Object>) -> bool {
        self.examined.contains(&object.addr())
    }

    fn do_iterate(&mut self, object: &Ptr<dyn Object>, visitor: &mut impl AttributeVisitor) {
        if self.is_examined(object) {
            return;
        }
        let mut tid = object.instance_type_id();
        while !tid.is_none() {
            for info in tid.attributes() {
                if info.support_level == SupportLevel::Obsolete || !info.accessor.has_getter() {
                    continue;
                }
                match info.checker {
                    AttributeChecker::Pointer { .. } => {
                        if info.support_level == SupportLevel::Deprecated {
                            continue;
                        }
                        let Ok(AttributeValue::Pointer(Some(target))) = info.accessor.get(object.peek()) else {
                            continue;
                        };
                        self.push(info.name.clone());
                        self.push(format!("${}", target.instance_type_id().name()));
                        visitor.start_visit_pointer_attribute(object, &info.name, &target, &self.path());
                        self.examined.push(object.addr());
                        self.do_iterate(&target, visitor);
                        self.examined.pop();
                        visitor.end_visit_pointer_attribute();
                        self.pop();
                        self.pop();
                    }
                    AttributeChecker::ObjectPtrContainer { .. } => {
                        let Ok(AttributeValue::ObjectPtrContainer(items)) = info.accessor.get(object.peek()) else {
                            continue;
                        };
                        self.push(info.name.clone());
                        visitor.start_visit_array_attribute(object, &info.name, &items, &self.path());
                        for (index, item) in &items {
                            self.push(index.to_string());
                            self.push(format!("${}", item.instance_type_id().name()));
                            visitor.start_visit_array_item(*index, item, &self.path());
                            self.examined.push(object.addr());
                            self.do_iterate(item, visitor);
                            self.examined.pop();
                            visitor.end_visit_array_item();
                            self.pop();
                            self.pop();
                        }
                        visitor.end_visit_array_attribute();
                        self.pop();
                    }
                    _ => {
                        if info.flags.contains(AttributeFlags::GET | AttributeFlags::SET)
                            && info.accessor.has_setter()
                        {
                            self.push(info.name.clone());
                            visitor.visit_attribute(object, &info.name, &self.path());
                            self.pop();
                        }
                    }
                }
            }
            tid = tid.parent();
        }

        let members = object.aggregate_members();
        if members.iter().any(|m| self.is_examined(m)) {
            return;
        }
        for member in members.iter().filter(|m| !m.ptr_eq(object)) {
            self.push(format!("${}", member.instance_type_id().name()));
            visitor.start_visit_object(member, &self.path());
            self.examined.push(object.addr());
            self.do_iterate(member, visitor);
            self.examined.pop();
            visitor.end_visit_object();
            self.pop();
        }
    }
}

/// Config path and current text of every attribute reachable from the root
/// namespace objects
pub fn collect_attribute_values(include_deprecated: bool) -> Vec<(String, String)> {
    struct Collector {
        include_deprecated: bool,
        values: Vec<(String, String)>,
    }

    impl AttributeVisitor for Collector {
        fn visit_attribute(&mut self, object: &Ptr<dyn Object>, name: &str, path: &str) {
            let Some((_, info)) = object.instance_type_id().find_attribute(name) else {
                return;
            };
            if info.support_level == SupportLevel::Deprecated && !self.include_deprecated {
                return;
            }
            if let Ok(value) = info.accessor.get(object.peek()) {
                self.values.push((path.to_string(), value.serialize_to_string(&info.checker)));
            }
        }
    }

    let mut collector = Collector {
        include_deprecated,
        values: Vec::new(),
    };
    AttributeIterator::new().iterate(&mut collector);
    collector.values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::topology;

    #[derive(Default)]
    struct Recorder {
        paths: Vec<String>,
        events: Vec<String>,
    }

    impl AttributeVisitor for Recorder {
        fn visit_attribute(&mut self, _object: &Ptr<dyn Object>, _name: &str, path: &str) {
            self.paths.push(path.to_string());
        }

        fn start_visit_pointer_attribute(
            &mut self,
            _object: &Ptr<dyn Object>,
            name: &str,
            _target: &Ptr<dyn Object>,
            _path: &str,
        ) {
            self.events.push(format!("pointer {name}"));
        }

        fn start_visit_array_item(&mut self, index: u32, _item: &Ptr<dyn Object>, _path: &str) {
            self.events.push(format!("item {index}"));
        }
    }

    #[test]
    fn test_paths_resolve_back() {
        let _list = topology(2);
        let mut recorder = Recorder::default();
        AttributeIterator::new().iterate(&mut recorder);
        assert!(recorder
            .paths
            .contains(&"/$fixture::NodeList/NodeList/1/$fixture::Node/DeviceList/0/$fixture::Device/Mtu".to_string()));
        assert!(recorder
            .paths
            .contains(&"/$fixture::NodeList/NodeList/0/$fixture::Node/$fixture::Ipv4/Ttl".to_string()));
        for path in &recorder.paths {
            assert!(Config::set_fail_safe(path, "100"), "{path}");
        }
    }

    #[test]
    fn test_pointer_cycles_terminate() {
        let list = topology(2);
        let nodes = list.nodes();
        nodes[0].set_peer(Some(nodes[1].clone()));
        nodes[1].set_peer(Some(nodes[0].clone()));

        let mut recorder = Recorder::default();
        AttributeIterator::new().iterate(&mut recorder);
        assert!(recorder.events.iter().filter(|e| *e == "pointer Peer").count() >= 2);
        assert!(recorder.events.contains(&"item 1".to_string()));

        nodes[0].set_peer(None);
        nodes[1].set_peer(None);
    }

    #[test]
    fn test_collect_attribute_values() {
        let _list = topology(1);
        let values = collect_attribute_values(false);
        assert!(values.contains(&(
            "/$fixture::NodeList/NodeList/0/$fixture::Node/Id".to_string(),
            "0".to_string()
        )));
        assert!(values.contains(&(
            "/$fixture::NodeList/NodeList/0/$fixture::Node/$fixture::Ipv4/Ttl".to_string(),
            "64".to_string()
        )));
    }
}
