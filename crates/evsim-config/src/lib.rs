//! evsim Config - Path based configuration of the object graph
//!
//! This crate provides:
//! - The config path language (`/NodeList/*/$Ipv4/Rx`)
//! - Root namespace objects and `Config::set`, `Config::connect` and friends
//! - Attribute defaults and global values by name
//! - A walk over every attribute reachable from the root namespace
//! - A config store saving and loading raw text or json files

pub mod attribute_iterator;
pub mod config;
pub mod config_store;
pub mod match_container;
pub mod path;

#[cfg(test)]
mod test_fixtures;

pub use attribute_iterator::*;
pub use config::Config;
pub use config_store::*;
pub use match_container::*;
pub use path::{name_matches, split_leaf, split_path, IndexMatcher};
