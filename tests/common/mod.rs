#![allow(dead_code)]

pub use bones_test_utils::builders;
pub use bones_test_utils::fake_backend;
pub use bones_test_utils::{init_tracing, with_timeout};
