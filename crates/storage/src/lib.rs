#![forbid(unsafe_code)]

mod blocking;
mod db;
mod entry;
mod registry;

pub use db::Db;
