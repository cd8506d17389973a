//! HTTP gateway that turns glTF/GLB models into USDZ with an external
//! converter binary, either from direct uploads or from a GCS bucket.
pub mod config;
pub mod converter;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
