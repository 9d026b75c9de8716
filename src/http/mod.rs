//! HTTP response handling for Enterprise API calls.

mod response;

pub use response::{
    ApiResponse, CommandExit, Diagnostic, EXIT_FAILURE, classify, validate_response,
};
