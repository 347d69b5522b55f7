// crates/qalam-engine/src/engine/tests/mod.rs
mod test_api;
mod test_exec;
