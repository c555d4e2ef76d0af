// src/lib.rs - printwatch: heterogeneous 3D printer fleet monitor
pub mod backend;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod status;
pub mod username;
