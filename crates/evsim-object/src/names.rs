//! Object name service
//!
//! Objects can be given names arranged in a tree rooted at `/Names`. A name
//! is unique among its siblings and an object carries at most one name.
//! Config paths reach named objects through `/Names/<name>/<child>...`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use evsim_core::{log_function, KernelError, KernelResult, LogComponent, OrFatal};

use crate::object::Object;
use crate::ptr::Ptr;

static LOG: LogComponent = LogComponent::new("Names");

/// Path prefix of the name tree
pub const NAMES_ROOT: &str = "/Names";

struct NameNode {
    name: String,
    parent: Option<usize>,
    object: Ptr<dyn Object>,
    children: BTreeMap<String, usize>,
}

#[derive(Default)]
struct NameTree {
    roots: BTreeMap<String, usize>,
    nodes: HashMap<usize, NameNode>,
}

impl NameTree {
    fn siblings(&self, parent: Option<usize>) -> Option<&BTreeMap<String, usize>> {
        match parent {
            None => Some(&self.roots),
            Some(addr) => self.nodes.get(&addr).map(|n| &n.children),
        }
    }

    fn siblings_mut(&mut self, parent: Option<usize>) -> Option<&mut BTreeMap<String, usize>> {
        match parent {
            None => Some(&mut self.roots),
            Some(addr) => self.nodes.get_mut(&addr).map(|n| &mut n.children),
        }
    }

    /// Address of the node at `path`, `None` meaning the root
    fn resolve(&self, path: &str) -> KernelResult<Option<usize>> {
        let mut current = None;
        for segment in relative_segments(path) {
            let siblings = self.siblings(current).ok_or_else(|| KernelError::PathNoMatch(path.into()))?;
            let addr = siblings
                .get(segment)
                .copied()
                .ok_or_else(|| KernelError::PathNoMatch(path.into()))?;
            current = Some(addr);
        }
        Ok(current)
    }

    fn insert(&mut self, parent: Option<usize>, name: &str, object: Ptr<dyn Object>) -> KernelResult<()> {
        if name.is_empty() || name.contains('/') {
            return Err(KernelError::MalformedValue {
                expected: "object name".into(),
                value: name.into(),
            });
        }
        let addr = object.addr();
        if self.nodes.contains_key(&addr) {
            return Err(KernelError::DuplicateName(format!("{} (object already named)", name)));
        }
        let siblings = self
            .siblings_mut(parent)
            .ok_or_else(|| KernelError::PathNoMatch(name.into()))?;
        if siblings.contains_key(name) {
            return Err(KernelError::DuplicateName(name.into()));
        }
        siblings.insert(name.to_string(), addr);
        self.nodes.insert(
            addr,
            NameNode {
                name: name.to_string(),
                parent,
                object,
                children: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

thread_local! {
    static TREE: RefCell<NameTree> = RefCell::new(NameTree::default());
}

/// Segments of `path` below the name root; accepts `/Names/a/b`, `/a/b`
/// and `a/b`
fn relative_segments(path: &str) -> impl Iterator<Item = &str> {
    let stripped = path
        .strip_prefix(NAMES_ROOT)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(path);
    stripped.split('/').filter(|s| !s.is_empty())
}

/// Split a path into its parent part and its last segment
fn split_last(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("", trimmed),
    }
}

pub struct Names;

impl Names {
    /// Name `object` at `path`, whose parent part must already be named
    pub fn try_add<T: ?Sized + Object>(path: &str, object: &Ptr<T>) -> KernelResult<()> {
        let (context, name) = split_last(path);
        TREE.with(|t| {
            let mut tree = t.borrow_mut();
            let parent = tree.resolve(context)?;
            tree.insert(parent, name, object.upcast())
        })?;
        log_function!(LOG, "add {}", path);
        Ok(())
    }

    pub fn add<T: ?Sized + Object>(path: &str, object: &Ptr<T>) {
        Self::try_add(path, object).or_fatal()
    }

    /// Name `object` as `name` under the already named `context`
    pub fn try_add_under<C: ?Sized + Object, T: ?Sized + Object>(
        context: &Ptr<C>,
        name: &str,
        object: &Ptr<T>,
    ) -> KernelResult<()> {
        TREE.with(|t| {
            let mut tree = t.borrow_mut();
            let parent = context.addr();
            if !tree.nodes.contains_key(&parent) {
                return Err(KernelError::PathNoMatch(format!("unnamed context for {}", name)));
            }
            tree.insert(Some(parent), name, object.upcast())
        })
    }

    pub fn add_under<C: ?Sized + Object, T: ?Sized + Object>(context: &Ptr<C>, name: &str, object: &Ptr<T>) {
        Self::try_add_under(context, name, object).or_fatal()
    }

    /// Give the object at `path` the new last segment `new_name`
    pub fn try_rename(path: &str, new_name: &str) -> KernelResult<()> {
        if new_name.is_empty() || new_name.contains('/') {
            return Err(KernelError::MalformedValue {
                expected: "object name".into(),
                value: new_name.into(),
            });
        }
        TREE.with(|t| {
            let mut tree = t.borrow_mut();
            let addr = tree
                .resolve(path)?
                .ok_or_else(|| KernelError::PathNoMatch(path.into()))?;
            let (old_name, parent) = match tree.nodes.get(&addr) {
                Some(node) => (node.name.clone(), node.parent),
                None => return Err(KernelError::PathNoMatch(path.into())),
            };
            let siblings = tree
                .siblings_mut(parent)
                .ok_or_else(|| KernelError::PathNoMatch(path.into()))?;
            if siblings.contains_key(new_name) {
                return Err(KernelError::DuplicateName(new_name.into()));
            }
            siblings.remove(&old_name);
            siblings.insert(new_name.to_string(), addr);
            if let Some(node) = tree.nodes.get_mut(&addr) {
                node.name = new_name.to_string();
            }
            Ok(())
        })
    }

    pub fn rename(path: &str, new_name: &str) {
        Self::try_rename(path, new_name).or_fatal()
    }

    /// Short name of `object`, or an empty string when unnamed
    pub fn find_name<T: ?Sized + Object>(object: &Ptr<T>) -> String {
        TREE.with(|t| {
            t.borrow()
                .nodes
                .get(&object.addr())
                .map(|n| n.name.clone())
                .unwrap_or_default()
        })
    }

    /// Full path of `object` under `/Names`, or an empty string when unnamed
    pub fn find_path<T: ?Sized + Object>(object: &Ptr<T>) -> String {
        TREE.with(|t| {
            let tree = t.borrow();
            let mut segments = Vec::new();
            let mut current = Some(object.addr());
            while let Some(addr) = current {
                match tree.nodes.get(&addr) {
                    Some(node) => {
                        segments.push(node.name.clone());
                        current = node.parent;
                    }
                    None => return String::new(),
                }
            }
            segments.reverse();
            format!("{}/{}", NAMES_ROOT, segments.join("/"))
        })
    }

    /// Object named by `path`
    pub fn find(path: &str) -> Option<Ptr<dyn Object>> {
        TREE.with(|t| {
            let tree = t.borrow();
            let addr = tree.resolve(path).ok()??;
            tree.nodes.get(&addr).map(|n| n.object.clone())
        })
    }

    /// Child `name` of the named `context`
    pub fn find_under<C: ?Sized + Object>(context: &Ptr<C>, name: &str) -> Option<Ptr<dyn Object>> {
        TREE.with(|t| {
            let tree = t.borrow();
            let addr = tree.nodes.get(&context.addr())?.children.get(name).copied()?;
            tree.nodes.get(&addr).map(|n| n.object.clone())
        })
    }

    /// Named children of `context`, or of the root when `None`, by name order
    pub fn children(context: Option<&Ptr<dyn Object>>) -> Vec<(String, Ptr<dyn Object>)> {
        TREE.with(|t| {
            let tree = t.borrow();
            let siblings = match context {
                None => Some(&tree.roots),
                Some(c) => tree.nodes.get(&c.addr()).map(|n| &n.children),
            };
            siblings
                .into_iter()
                .flat_map(|s| s.iter())
                .filter_map(|(name, addr)| tree.nodes.get(addr).map(|n| (name.clone(), n.object.clone())))
                .collect()
        })
    }

    /// Forget every name and release the named objects
    pub fn clear() {
        let released = TREE.with(|t| std::mem::take(&mut *t.borrow_mut()));
        drop(released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectCore;

    struct Thing {
        core: ObjectCore,
    }

    impl Object for Thing {
        fn core(&self) -> &ObjectCore {
            &self.core
        }
    }

    fn thing() -> Ptr<Thing> {
        Ptr::new(Thing { core: ObjectCore::new() })
    }

    #[test]
    fn test_add_and_find() {
        Names::clear();
        let server = thing();
        let eth0 = thing();
        Names::add("server", &server);
        Names::add("/Names/server/eth0", &eth0);
        assert_eq!(Names::find("/Names/server").unwrap(), server);
        assert_eq!(Names::find("server/eth0").unwrap(), eth0);
        assert_eq!(Names::find_name(&eth0), "eth0");
        assert_eq!(Names::find_path(&eth0), "/Names/server/eth0");
        assert!(Names::find("/Names/client").is_none());
        Names::clear();
    }

    #[test]
    fn test_add_under_context() {
        Names::clear();
        let server = thing();
        let eth1 = thing();
        Names::add("server", &server);
        Names::add_under(&server, "eth1", &eth1);
        assert_eq!(Names::find_under(&server, "eth1").unwrap(), eth1);
        let unnamed = thing();
        assert!(Names::try_add_under(&unnamed, "x", &thing()).is_err());
        Names::clear();
    }

    #[test]
    fn test_duplicates_rejected() {
        Names::clear();
        let a = thing();
        Names::add("a", &a);
        assert_eq!(Names::try_add("a", &thing()).unwrap_err().kind(), "DuplicateName");
        assert_eq!(Names::try_add("b", &a).unwrap_err().kind(), "DuplicateName");
        assert_eq!(Names::try_add("x/y", &thing()).unwrap_err().kind(), "PathNoMatch");
        Names::clear();
    }

    #[test]
    fn test_rename() {
        Names::clear();
        let a = thing();
        let b = thing();
        Names::add("a", &a);
        Names::add("b", &b);
        assert_eq!(Names::try_rename("/Names/a", "b").unwrap_err().kind(), "DuplicateName");
        Names::rename("/Names/a", "c");
        assert_eq!(Names::find_name(&a), "c");
        assert!(Names::find("a").is_none());
        let names: Vec<String> = Names::children(None).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "c"]);
        Names::clear();
    }

    #[test]
    fn test_clear_releases_objects() {
        Names::clear();
        let a = thing();
        Names::add("a", &a);
        assert_eq!(a.aggregate_handles(), 2);
        Names::clear();
        assert_eq!(a.aggregate_handles(), 1);
    }
}
