pub mod bounds;
pub mod cache;
pub mod catalog;
pub mod collection;
pub mod expression;
pub mod fetch;
pub mod grammar;
pub mod image;
pub mod mosaic;
pub mod pansharpen;
pub mod reader;
pub mod reference;
pub mod scene;
pub mod template;
