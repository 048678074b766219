pub mod advisor;
pub mod audit;
pub mod common;
pub mod document;
pub mod message;
pub mod session;
pub mod staff;
pub mod student;
pub mod webhook;
