pub mod commands;
pub mod console;
pub mod converter;
pub mod http;
pub mod llm;
pub mod plus_api;
pub mod runtime;
