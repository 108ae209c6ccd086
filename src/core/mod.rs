pub mod codec;

pub mod config;

pub mod item;

pub mod matcher;

pub mod reflect;

pub mod scalar;

pub mod schema;

mod tag;
