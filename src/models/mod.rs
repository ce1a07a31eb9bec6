//! Data models for datalayer.
//!
//! This module contains the record and graph types shared by codecs,
//! mappers and services.

mod batch;
mod entity;
mod item;
mod value;

pub use batch::BatchInfo;
pub use entity::{Entity, EntityRef};
pub use item::Item;
pub use value::Value;
