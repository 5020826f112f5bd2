pub mod auth;
pub mod config;
pub mod credential;
pub mod db;
pub mod entity;
pub mod error;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod service;
pub mod token;
