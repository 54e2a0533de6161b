pub mod block;
pub mod config;
pub mod coordinator;
pub mod input;
pub mod manager;
pub mod markup;
pub mod model;
pub mod storage;
pub mod surface;
pub mod theme;
pub mod view;
