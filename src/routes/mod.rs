pub mod auth;
pub mod comments;
pub mod health;
pub mod pages;
pub mod roles;
pub mod tasks;
pub mod users;
